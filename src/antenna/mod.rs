// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The frequency-specialized working model of an antenna: the sampled dish
surface, the feed illumination model and the pointing basis, derived from a
[`BandGeometry`](crate::geometry::BandGeometry) and an observing frequency.
 */

mod error;

pub use error::AntennaError;

use std::f64::consts::PI;

use marlu::{c64, constants::VEL_C};

use crate::{
    constants::{DISH_SAMPLES, TAPER_ANGLE_COEFF, TAPER_GAIN_COEFF},
    geometry::BandGeometry,
    math::{cross, dot, mat_vec, normalize, rotate_about, unit_diff, Vec3},
    pathology::Pathology,
    raytrace::Ray,
};

/// A frequency-specialized antenna model. Everything the ray tracer needs is
/// resolved here: wavelength, feed taper, the sampled dish-shape table and
/// the strut geometry in working units.
///
/// Derivation is deterministic; identical geometry and frequency give a
/// bit-identical model. A model must be re-derived for a new frequency, it
/// is never shared across frequencies.
pub struct Antenna {
    pub(crate) name: String,

    /// Observing frequency \[Hz\].
    pub(crate) freq_hz: f64,
    /// Wavelength \[m\].
    pub(crate) lambda: f64,

    // The sampled dish profile: height z and slope m at radii i * deltar.
    z: Vec<f64>,
    m: Vec<f64>,
    deltar: f64,
    /// Dish radius \[m\].
    pub(crate) radius: f64,
    /// Dish height at the rim \[m\]; the aperture plane sits here.
    pub(crate) zedge: f64,
    /// Coefficient of the best-fit paraboloid z = c r^2, seeding the
    /// dish-intersection search.
    pub(crate) best_parabola: f64,

    /// Subreflector height above the dish vertex \[m\].
    pub(crate) sub_h: f64,
    /// Feed phase-center position \[m\].
    pub(crate) feed: Vec3,
    /// Nominal feed boresight (towards the subreflector).
    pub(crate) feed_dir: Vec3,
    /// Feed boresight after pathology rotation.
    pub(crate) pfeed_dir: Vec3,
    /// Path-length constant of the Cassegrain system \[m\].
    pub(crate) k_path: f64,

    fa2pi: f64,

    pub(crate) leg_width: f64,
    pub(crate) leg_foot: f64,
    pub(crate) leg_foot_z: f64,
    pub(crate) leg_apex: f64,
    pub(crate) leg_angles: [f64; 4],

    pub(crate) hole_radius: f64,
    pub(crate) astigm_0: f64,
    pub(crate) astigm_45: f64,

    /// Antenna pointing direction and the transverse unit vectors
    /// completing the basis.
    pub(crate) dir: Vec3,
    pub(crate) hhat: Vec3,
    pub(crate) vhat: Vec3,
}

impl Antenna {
    /// Derive the working model for a band at an observing frequency.
    pub fn new(geom: &BandGeometry, freq_hz: f64) -> Result<Antenna, AntennaError> {
        geom.validate()?;
        if freq_hz <= 0.0 {
            return Err(AntennaError::InvalidFrequency { freq_hz });
        }

        // Sample the paraboloid z(r) = r^2/4F and its slope.
        let radius = geom.dish_radius;
        let deltar = radius / (DISH_SAMPLES as f64 - 1.0);
        let mut z = Vec::with_capacity(DISH_SAMPLES);
        let mut m = Vec::with_capacity(DISH_SAMPLES);
        for i in 0..DISH_SAMPLES {
            let r = i as f64 * deltar;
            z.push(r * r / (4.0 * geom.focal_length));
            m.push(r / (2.0 * geom.focal_length));
        }
        let zedge = z[DISH_SAMPLES - 1];
        let best_parabola = zedge / (radius * radius);

        // The feed x coordinate is mirrored to match the aperture-plane
        // handedness of the output grid.
        let feed = [-geom.feed_pos[0], geom.feed_pos[1], geom.feed_pos[2]];
        let dz = geom.sub_h - feed[2];
        let d = (feed[0] * feed[0] + feed[1] * feed[1] + dz * dz).sqrt();
        let k_path = if dz > 0.0 {
            geom.sub_h + d
        } else {
            dot(feed, feed).sqrt()
        };
        let feed_dir = [-feed[0] / d, -feed[1] / d, dz / d];

        let ftaper = geom.taper_at(freq_hz).abs();
        let fa2pi =
            2.0 * PI * ftaper.sqrt() * TAPER_ANGLE_COEFF / geom.sub_angle_deg.to_radians().sin();

        let leg_angles = match geom.leg_angles {
            Some(angles) => angles,
            None if geom.leg_width < 0.0 => crate::constants::LEG_CROSS_ANGLES,
            None => crate::constants::LEG_PLUS_ANGLES,
        };

        let mut antenna = Antenna {
            name: geom.name.clone(),
            freq_hz,
            lambda: VEL_C / freq_hz,
            z,
            m,
            deltar,
            radius,
            zedge,
            best_parabola,
            sub_h: geom.sub_h,
            feed,
            feed_dir,
            pfeed_dir: feed_dir,
            k_path,
            fa2pi,
            leg_width: geom.leg_width,
            leg_foot: geom.leg_foot,
            leg_foot_z: 0.0,
            leg_apex: geom.leg_apex,
            leg_angles,
            hole_radius: geom.hole_radius,
            astigm_0: geom.astigm_0,
            astigm_45: geom.astigm_45,
            dir: [0.0, 0.0, 1.0],
            hhat: [0.0; 3],
            vhat: [0.0; 3],
        };
        antenna.leg_foot_z = antenna.dish_value(geom.leg_foot).0;
        antenna.set_direction([0.0, 0.0, 1.0]);
        Ok(antenna)
    }

    /// The wavelength of the observing frequency \[m\].
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Point the antenna and recompute the transverse basis.
    pub(crate) fn set_direction(&mut self, dir: Vec3) {
        self.dir = dir;
        if dir[0] == 0.0 && dir[1] == 0.0 {
            self.hhat = [1.0, 0.0, 0.0];
            self.vhat = [0.0, 1.0, 0.0];
        } else {
            let mut hhat = [dir[1], -dir[0], 0.0];
            normalize(&mut hhat);
            self.hhat = hhat;
            self.vhat = cross(hhat, dir);
        }
    }

    /// Dish height and slope at radius `r`, reconstructed from the sampled
    /// profile: a quadratic is fitted to the slope at the three nearest
    /// samples and integrated for the height. Odd-symmetric in `r`.
    pub(crate) fn dish_value(&self, r: f64) -> (f64, f64) {
        if r == 0.0 {
            return (self.z[0], 0.0);
        }
        let (r, s) = if r < 0.0 { (-r, -1.0) } else { (r, 1.0) };
        let d = self.deltar;
        let dd = d * d;

        // the middle point
        let n = ((r / d + 0.5).floor() as usize).min(DISH_SAMPLES - 2);
        let x = r - n as f64 * d;

        let (ma, mb, mc, zav) = if n == 0 {
            (-self.m[1], 0.0, self.m[1], 2.0 * self.z[1] + self.z[0])
        } else {
            (
                self.m[n - 1],
                self.m[n],
                self.m[n + 1],
                self.z[n - 1] + self.z[n] + self.z[n + 1],
            )
        };

        let a = mb;
        let b = 0.5 * (mc - ma) / d;
        let c = 0.5 * (mc - 2.0 * mb + ma) / dd;
        let d0 = (zav - b * dd) / 3.0;

        let m = s * (a + b * x + c * x * x);
        let z = s * (d0 + a * x + b * x * x / 2.0 + c * x * x * x / 3.0);
        (z, m)
    }

    /// Dish height and slope at (x, y) with the astigmatism correction. The
    /// Zernike Z5/Z6 terms scale the symmetric profile multiplicatively and
    /// contribute a slope term of their own.
    pub(crate) fn astig_dish_value(&self, x: f64, y: f64) -> (f64, f64) {
        let rr = x * x + y * y;
        let r = rr.sqrt();

        if r == 0.0 || (self.astigm_0 == 0.0 && self.astigm_45 == 0.0) {
            return self.dish_value(r);
        }

        let theta = y.atan2(x);
        let sin2th = (2.0 * theta).sin();
        let cos2th = (2.0 * theta).cos();
        let rho = r / self.radius;
        let rho2 = rho * rho;

        let z5 = 6.0_f64.sqrt() * rho2 * sin2th;
        let z6 = 6.0_f64.sqrt() * rho2 * cos2th;

        let astigm = 1.0 + self.astigm_45 * z5 + self.astigm_0 * z6;
        let dastigm =
            2.0 * rho2 / r * 6.0_f64.sqrt() * (self.astigm_45 * sin2th + self.astigm_0 * cos2th);

        let (zn, mn) = self.dish_value(r);
        (zn * astigm, mn * astigm + dastigm * zn)
    }

    /// Feed power gain at an off-axis angle `theta` \[rad\].
    pub(crate) fn feed_func(&self, theta: f64) -> f64 {
        let stheta = theta.sin();
        (2.0 * TAPER_GAIN_COEFF * self.fa2pi * self.fa2pi * stheta * stheta).exp()
    }

    /// Feed power gain towards a traced ray's subreflector point.
    pub(crate) fn feed_gain(&self, ray: &Ray) -> f64 {
        let v = unit_diff(ray.sub.pos, ray.feed);
        let costheta = dot(self.pfeed_dir, v);
        (2.0 * TAPER_GAIN_COEFF * self.fa2pi * self.fa2pi * (1.0 - costheta * costheta)).exp()
    }

    /// The feed-frame basis: rows are hhat, vhat and the (pathologized)
    /// boresight.
    pub(crate) fn feed_basis(&self) -> [Vec3; 3] {
        let dir = self.pfeed_dir;
        if dir[0] == 0.0 && dir[1] == 0.0 {
            [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], dir]
        } else {
            let mut vhat = [dir[1], -dir[0], 0.0];
            normalize(&mut vhat);
            let hhat = cross(vhat, dir);
            [hhat, vhat, dir]
        }
    }

    /// The 3-vector feed E-field for a two-component polarization state.
    pub(crate) fn efield(&self, pol: [c64; 2]) -> [c64; 3] {
        let [hhat, vhat, _] = self.feed_basis();
        let mut e = [c64::new(0.0, 0.0); 3];
        for i in 0..3 {
            e[i] = c64::new(hhat[i], 0.0) * pol[0] + c64::new(vhat[i], 0.0) * pol[1];
        }
        e
    }

    /// Re-aim the nominal feed boresight at the pathologized subreflector
    /// reference point.
    pub(crate) fn align_feed(&mut self, p: &Pathology) {
        let f = [
            self.feed[0] + p.feed_shift[0],
            self.feed[1] + p.feed_shift[1],
            self.feed[2] + p.feed_shift[2],
        ];
        let s0 = [
            -p.sub_rot_point[0],
            -p.sub_rot_point[1],
            self.sub_h - p.sub_rot_point[2],
        ];
        let mut s = mat_vec(&p.sub_rot, s0);
        for i in 0..3 {
            s[i] += p.sub_rot_point[i] + p.sub_shift[i];
        }
        self.feed_dir = unit_diff(s, f);
    }

    /// Apply a resolved pathology: rotate the feed boresight and tip the
    /// pointing direction by the az/el offsets.
    pub(crate) fn apply_pathology(&mut self, p: &Pathology) {
        self.pfeed_dir = mat_vec(&p.feed_rot, self.feed_dir);
        if p.az_offset != 0.0 || p.el_offset != 0.0 {
            let dir = rotate_about(self.dir, self.hhat, p.el_offset);
            let dir = rotate_about(dir, self.vhat, p.az_offset);
            self.set_direction(dir);
        }
    }
}

impl std::fmt::Display for Antenna {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: freq = {} Hz, lambda = {} m, feed dir = ({}, {}, {})",
            self.name,
            self.freq_hz,
            self.lambda,
            self.pfeed_dir[0],
            self.pfeed_dir[1],
            self.pfeed_dir[2]
        )
    }
}
