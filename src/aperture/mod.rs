// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Aperture-plane illumination: tracing every sample of a regular grid through
the optics and assembling the complex field into a Jones image.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::ApertureError;

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, TAU};

use marlu::Jones;
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rayon::prelude::*;

use crate::{
    antenna::Antenna,
    constants::CENTRAL_RAY_OFFSET,
    geometry::{BandGeometry, PolBasis},
    pathology::Pathology,
    raytrace::{
        d_omega, leg_plane_wave_block2, leg_spherical_wave_block, ray_len, trace, trace_pol, Ray,
    },
};

/// Iteration budgets for the ray tracer's intersection searches. These are
/// bounded-cost policies, not accuracy guarantees: each dish refinement
/// roughly halves the surface-consistency residual, and running out of
/// budget is never an error because sub-wavelength positional accuracy is
/// all the aperture sum needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Convergence {
    /// Newton refinements of the subreflector-to-dish intersection against
    /// the real (astigmatic) surface.
    pub dish_iter: usize,
    /// Fixed-point iterations walking the dish launch point until the
    /// traced ray lands on the requested aperture pixel.
    pub aperture_iter: usize,
}

impl Default for Convergence {
    fn default() -> Convergence {
        Convergence {
            dish_iter: 7,
            aperture_iter: 6,
        }
    }
}

/// A request for one aperture-plane computation. The output image is
/// `ny` rows by `nx` columns with cell sizes (`dx`, `dy`) metres and the
/// first cell centred at (`x0`, `y0`); each output cell is the sum of
/// `oversamp` x `oversamp` traced samples.
#[derive(Clone, Debug, PartialEq)]
pub struct ApertureParams {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
    pub x0: f64,
    pub y0: f64,
    /// Samples traced per output cell per axis.
    pub oversamp: usize,
    /// Parallactic angle \[rad\].
    pub pa: f64,
    /// Observing frequency \[Hz\].
    pub freq_hz: f64,
    pub convergence: Convergence,
}

impl ApertureParams {
    /// A request with the default oversampling (1), zero parallactic angle
    /// and default convergence budgets.
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64, x0: f64, y0: f64, freq_hz: f64) -> Self {
        ApertureParams {
            nx,
            ny,
            dx,
            dy,
            x0,
            y0,
            oversamp: 1,
            pa: 0.0,
            freq_hz,
            convergence: Convergence::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ApertureError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(ApertureError::ZeroGridSize {
                nx: self.nx,
                ny: self.ny,
            });
        }
        if self.dx <= 0.0 || self.dy <= 0.0 {
            return Err(ApertureError::NonPositiveCell {
                dx: self.dx,
                dy: self.dy,
            });
        }
        if self.oversamp == 0 {
            return Err(ApertureError::ZeroOversample);
        }
        Ok(())
    }
}

/// One element of the per-pixel Jones matrix. The first four names are the
/// circular products, the last four the linear ones; either set indexes the
/// same matrix position (RR and XX are both element 0, and so on).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolProduct {
    RR,
    RL,
    LR,
    LL,
    XX,
    XY,
    YX,
    YY,
}

impl PolProduct {
    /// The Jones matrix element this product lands in.
    pub fn jones_index(self) -> usize {
        match self {
            PolProduct::RR | PolProduct::XX => 0,
            PolProduct::RL | PolProduct::XY => 1,
            PolProduct::LR | PolProduct::YX => 2,
            PolProduct::LL | PolProduct::YY => 3,
        }
    }
}

impl std::fmt::Display for PolProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolProduct::RR => "RR",
            PolProduct::RL => "RL",
            PolProduct::LR => "LR",
            PolProduct::LL => "LL",
            PolProduct::XX => "XX",
            PolProduct::XY => "XY",
            PolProduct::YX => "YX",
            PolProduct::YY => "YY",
        };
        write!(f, "{s}")
    }
}

/// Compute the full aperture-plane Jones image for a band at the requested
/// frequency, in the telescope's polarization basis. Blocked samples and
/// samples outside the annulus between the central hole and the dish edge
/// stay zero.
///
/// # Examples
///
/// ```
/// use cassbeam::{ApertureParams, GeometryTable, Pathology, calculate_aperture};
///
/// let table = GeometryTable::nominal_25m();
/// let geom = table.band_for_freq(1.4e9).unwrap();
/// let params = ApertureParams::new(32, 32, 1.0, 1.0, -16.0, -16.0, 1.4e9);
/// let image = calculate_aperture(geom, &params, &Pathology::default()).unwrap();
/// assert_eq!(image.dim(), (32, 32));
/// ```
pub fn calculate_aperture(
    geom: &BandGeometry,
    params: &ApertureParams,
    pathology: &Pathology,
) -> Result<Array2<Jones<f64>>, ApertureError> {
    run(geom, params, pathology, Mode::Full)
}

/// Like [`calculate_aperture`], but only the requested product is
/// accumulated; the other three Jones elements stay zero.
pub fn calculate_aperture_pol(
    geom: &BandGeometry,
    params: &ApertureParams,
    pathology: &Pathology,
    pol: PolProduct,
) -> Result<Array2<Jones<f64>>, ApertureError> {
    run(geom, params, pathology, Mode::Single(pol))
}

/// The linear-feed variant: the field is propagated for the X and Y feed
/// states independently and only the diagonal products exist (XY and YX
/// are identically zero).
pub fn calculate_aperture_lin_pol(
    geom: &BandGeometry,
    params: &ApertureParams,
    pathology: &Pathology,
    pol: PolProduct,
) -> Result<Array2<Jones<f64>>, ApertureError> {
    run(geom, params, pathology, Mode::LinearDiagonal(pol))
}

#[derive(Clone, Copy)]
enum Mode {
    Full,
    Single(PolProduct),
    LinearDiagonal(PolProduct),
}

/// The oversampled sampling grid and the exclusion radii, precomputed.
#[derive(Clone, Copy)]
struct Grid {
    nx_os: usize,
    os: usize,
    dx: f64,
    dy: f64,
    x0: f64,
    y0: f64,
    /// Parallactic angle rotation.
    pac: f64,
    pas: f64,
    /// Finite-difference step for the solid-angle Jacobian.
    eps: f64,
    r2: f64,
    h2: f64,
    radius: f64,
}

impl Grid {
    fn new(params: &ApertureParams, antenna: &Antenna) -> Grid {
        let os = params.oversamp;
        let dx = params.dx / os as f64;
        let dy = params.dy / os as f64;
        let (pas, pac) = (params.pa + FRAC_PI_2).sin_cos();
        Grid {
            nx_os: params.nx * os,
            os,
            dx,
            dy,
            x0: params.x0 - params.dx / 2.0 + dx / 2.0,
            y0: params.y0 - params.dy / 2.0 + dy / 2.0,
            pac,
            pas,
            eps: dx / 4.0,
            r2: antenna.radius * antenna.radius,
            h2: antenna.hole_radius * antenna.hole_radius,
            radius: antenna.radius,
        }
    }
}

fn run(
    geom: &BandGeometry,
    params: &ApertureParams,
    pathology: &Pathology,
    mode: Mode,
) -> Result<Array2<Jones<f64>>, ApertureError> {
    params.validate()?;

    let mut antenna = Antenna::new(geom, params.freq_hz)?;
    let p = pathology.resolve(&antenna);
    antenna.align_feed(&p);
    antenna.apply_pathology(&p);

    // The reference ray defining the zero-phase condition.
    let conv = params.convergence;
    let central = trace(&antenna, 0.0, CENTRAL_RAY_OFFSET, &p, conv.dish_iter)
        .ok_or(ApertureError::CentralRay)?;
    let l0 = ray_len(&central);

    // The two feed polarization states whose fields we propagate.
    let (pol_a, pol_b) = match mode {
        Mode::Full | Mode::Single(_) => feed_polarizations(&antenna, geom.pol_basis),
        // The linear variant always uses the bare linear states.
        Mode::LinearDiagonal(_) => {
            let px = [c64::new(0.0, 0.0), c64::new(1.0, 0.0)];
            let py = [c64::new(1.0, 0.0), c64::new(0.0, 0.0)];
            (px, py)
        }
    };
    let e_a = antenna.efield(pol_a);
    let e_b = antenna.efield(pol_b);

    let grid = Grid::new(params, &antenna);

    let mut image = Array2::from_elem((params.ny, params.nx), Jones::default());
    image
        .outer_iter_mut()
        .into_par_iter()
        .enumerate()
        .for_each(|(j_out, mut row)| {
            for j_sub in 0..grid.os {
                let j = j_out * grid.os + j_sub;
                for i in 0..grid.nx_os {
                    let Some((fp_amp, ray)) = sample_field(&antenna, &p, &grid, conv, l0, i, j)
                    else {
                        continue;
                    };
                    let jones = assemble_products(mode, fp_amp, &ray, &e_a, &e_b);
                    let out = &mut row[i / grid.os];
                    for k in 0..4 {
                        out[k] += jones[k];
                    }
                }
            }
        });

    Ok(image)
}

/// The feed polarization states for the telescope's basis, as unit states
/// in the feed's (hhat, vhat) frame. Circular feeds get the feed
/// orientation compensated so that the products refer to the sky frame.
fn feed_polarizations(antenna: &Antenna, basis: PolBasis) -> ([c64; 2], [c64; 2]) {
    match basis {
        PolBasis::Circular => {
            let mut pr = [
                c64::new(FRAC_1_SQRT_2, 0.0),
                c64::new(0.0, FRAC_1_SQRT_2),
            ];
            let mut pl = [
                c64::new(FRAC_1_SQRT_2, 0.0),
                c64::new(0.0, -FRAC_1_SQRT_2),
            ];

            // Compensate for the feed orientation.
            let feed_frame = antenna.feed_basis();
            let phase = feed_frame[0][1].atan2(feed_frame[0][0]);
            let (sp, cp) = phase.sin_cos();
            for q in [&mut pr, &mut pl] {
                let q0 = q[0];
                let q1 = q[1];
                q[0] = c64::new(cp, 0.0) * q0 + c64::new(sp, 0.0) * q1;
                q[1] = -c64::new(sp, 0.0) * q0 + c64::new(cp, 0.0) * q1;
            }
            (pr, pl)
        }
        PolBasis::Linear => (
            [c64::new(1.0, 0.0), c64::new(0.0, 0.0)],
            [c64::new(0.0, 0.0), c64::new(1.0, 0.0)],
        ),
    }
}

/// Trace the oversampled sample (i, j) and compute its complex amplitude:
/// the phase-retarded field strength sqrt(dOmega * feed gain). Returns
/// `None` for samples outside the dish annulus, blocked by a strut, or
/// whose rays cannot be traced.
fn sample_field(
    antenna: &Antenna,
    p: &Pathology,
    grid: &Grid,
    conv: Convergence,
    l0: f64,
    i: usize,
    j: usize,
) -> Option<(c64, Ray)> {
    // Parallactic-angle rotated aperture coordinates.
    let gx = grid.x0 + i as f64 * grid.dx;
    let gy = grid.y0 + j as f64 * grid.dy;
    let x = -(grid.pac * gx - grid.pas * gy);
    let y = grid.pas * gx + grid.pac * gy;

    if x.abs() > grid.radius || y.abs() > grid.radius {
        return None;
    }
    let r2 = x * x + y * y;
    if r2 > grid.r2 || r2 < grid.h2 {
        return None;
    }

    // Walk the dish launch point until the traced ray lands on this pixel.
    let mut x1 = x;
    let mut y1 = y;
    for _ in 0..conv.aperture_iter {
        let ray = trace(antenna, x1, y1, p, conv.dish_iter)?;
        x1 += x - ray.aper.pos[0];
        y1 += y - ray.aper.pos[1];
    }
    let ray = trace(antenna, x1, y1, p, conv.dish_iter)?;

    if leg_plane_wave_block2(antenna, &ray) || leg_spherical_wave_block(antenna, &ray) {
        return None;
    }

    // Two neighbouring rays, stepped towards the dish centre, for the
    // finite-difference solid angle.
    let ray_y = if y < 0.0 {
        trace(antenna, x1, y1 + grid.eps, p, conv.dish_iter)?
    } else {
        trace(antenna, x1, y1 - grid.eps, p, conv.dish_iter)?
    };
    let ray_x = if x < 0.0 {
        trace(antenna, x1 + grid.eps, y1, p, conv.dish_iter)?
    } else {
        trace(antenna, x1 - grid.eps, y1, p, conv.dish_iter)?
    };

    // Solid angle subtended at the feed by this sample's patch.
    let dx1 = ray_x.aper.pos[0] - ray.aper.pos[0];
    let dy1 = ray_x.aper.pos[1] - ray.aper.pos[1];
    let dx2 = ray_y.aper.pos[0] - ray.aper.pos[0];
    let dy2 = ray_y.aper.pos[1] - ray.aper.pos[1];
    let da = 0.5 * (dx1 * dy2 - dx2 * dy1).abs();
    let d_o = (d_omega(antenna, &ray_x, &ray_y, &ray, p) / da) * grid.dx * grid.dx;

    let dp = d_o * antenna.feed_gain(&ray);
    let amp = dp.sqrt();

    let length = ray_len(&ray);
    let phase = TAU * (length - l0) / antenna.lambda + p.phase_offset;
    let (sp, cp) = phase.sin_cos();
    let fp = c64::new(cp, sp);

    Some((fp * amp, ray))
}

/// Propagate the two feed fields along the ray and combine them into the
/// requested Jones products.
fn assemble_products(
    mode: Mode,
    fp_amp: c64,
    ray: &Ray,
    e_a: &[c64; 3],
    e_b: &[c64; 3],
) -> Jones<f64> {
    let iota = c64::new(0.0, 1.0);
    match mode {
        Mode::Full | Mode::Single(_) => {
            let e1 = trace_pol(*e_a, ray);
            let ex_a = fp_amp * e1[0];
            let ey_a = fp_amp * e1[1];
            let rr = ex_a - iota * ey_a;
            let rl = ex_a + iota * ey_a;

            let e1 = trace_pol(*e_b, ray);
            let ex_b = fp_amp * e1[0];
            let ey_b = fp_amp * e1[1];
            let lr = ex_b - iota * ey_b;
            let ll = ex_b + iota * ey_b;

            let jones = Jones::from([rr, rl, lr, ll]);
            match mode {
                Mode::Full => jones,
                Mode::Single(pol) => mask_to(jones, pol.jones_index()),
                Mode::LinearDiagonal(_) => unreachable!("handled by the outer match"),
            }
        }
        Mode::LinearDiagonal(pol) => {
            let e1 = trace_pol(*e_a, ray);
            let xx = fp_amp * e1[0];
            let e1 = trace_pol(*e_b, ray);
            let yy = fp_amp * e1[1];

            let zero = c64::new(0.0, 0.0);
            mask_to(Jones::from([xx, zero, zero, yy]), pol.jones_index())
        }
    }
}

/// Zero every Jones element except `index`.
fn mask_to(jones: Jones<f64>, index: usize) -> Jones<f64> {
    let mut out = Jones::default();
    out[index] = jones[index];
    out
}
