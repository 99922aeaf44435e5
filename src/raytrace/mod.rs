// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Geometric-optics ray tracing through a Cassegrain system: feed to
subreflector to dish to aperture plane, with strut blockage tests.
 */


use marlu::c64;

use crate::{
    antenna::Antenna,
    constants::LEG_ALIGN_COS,
    math::{cross, dot, length, normalize, sub, unit_diff, Vec3},
    pathology::Pathology,
};

/// Iteration budget for [`dish_from_sub`]'s inverse mapping.
pub const DEFAULT_INVERSE_ITERS: usize = 500;

/// A point on a reflecting surface with its outward unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    pub pos: Vec3,
    pub normal: Vec3,
}

/// One traced ray: where it meets each surface on the way from the feed to
/// the aperture plane. Built per aperture sample and discarded after use.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// Intersection with the aperture plane.
    pub aper: SurfacePoint,
    /// Intersection with the main dish.
    pub dish: SurfacePoint,
    /// Intersection with the subreflector.
    pub sub: SurfacePoint,
    /// The (possibly shifted) feed phase center.
    pub feed: Vec3,
}

/// Total geometric path length of a traced ray \[m\].
pub fn ray_len(ray: &Ray) -> f64 {
    length(sub(ray.feed, ray.sub.pos))
        + length(sub(ray.sub.pos, ray.dish.pos))
        + length(sub(ray.dish.pos, ray.aper.pos))
}

/// The subreflector point illuminating dish position (x, y), with its
/// normal. The reflected direction off the dish is intersected with the
/// sphere of constant path length about the feed; the normal bisects the
/// dish-ward and feed-ward directions.
pub fn sub_from_dish(a: &Antenna, x: f64, y: f64) -> SurfacePoint {
    let r = (x * x + y * y).sqrt();

    let (z, pos) = if r == 0.0 {
        let (z, _) = a.dish_value(0.0);
        (z, [0.0, 0.0, a.sub_h])
    } else {
        let (z, m) = a.astig_dish_value(x, y);

        // Reflected unit vector off the dish surface.
        let m = (2.0 * m.atan()).tan();
        let w = 1.0 / (1.0 + m * m).sqrt();
        let u = -m * (x / r) * w;
        let v = -m * (y / r) * w;

        let dx = a.feed[0] - x;
        let dy = a.feed[1] - y;
        let dz = a.feed[2] - z;
        let dl = a.k_path + z;

        let t = 0.5 * (dx * dx + dy * dy + dz * dz - dl * dl) / (-dl + u * dx + v * dy + w * dz);
        (z, [x + u * t, y + v * t, z + w * t])
    };

    let sf = unit_diff(a.feed, pos);
    let sd = unit_diff([x, y, z], pos);
    let mut normal = [sf[0] + sd[0], sf[1] + sd[1], sf[2] + sd[2]];
    normalize(&mut normal);

    SurfacePoint { pos, normal }
}

/// The inverse of [`sub_from_dish`]: find the dish point (and the
/// subreflector point feeding it) whose subreflector illumination lands at
/// (x, y). Newton steps on a finite-difference slope, with the step clamped
/// to a fraction of the dish radius.
///
/// Exhausting `niter` iterations is not fatal: the best estimate is
/// returned and a warning logged, since sub-wavelength positional accuracy
/// is all the aperture sum needs. `None` means the point left the dish.
pub fn dish_from_sub(
    a: &Antenna,
    x: f64,
    y: f64,
    niter: usize,
) -> Option<(SurfacePoint, SurfacePoint)> {
    const EPS: f64 = 0.001;

    let mut x1 = x;
    let mut y1 = y;
    let mut sub0 = sub_from_dish(a, x1, y1);
    let mut mx = 1.0;
    let mut my = 1.0;
    let mut converged = false;

    for _ in 0..niter {
        sub0 = sub_from_dish(a, x1, y1);
        let sub_xm = sub_from_dish(a, x1 - EPS, y1);
        let sub_xp = sub_from_dish(a, x1 + EPS, y1);
        let sub_ym = sub_from_dish(a, x1, y1 - EPS);
        let sub_yp = sub_from_dish(a, x1, y1 + EPS);
        mx = 0.5 * (sub_xp.pos[0] - sub_xm.pos[0]) / EPS;
        my = 0.5 * (sub_yp.pos[1] - sub_ym.pos[1]) / EPS;

        let mut dx = (x - sub0.pos[0]) / mx;
        let mut dy = (y - sub0.pos[1]) / my;
        let clamp = a.radius / 7.0;
        dx = dx.clamp(-clamp, clamp);
        dy = dy.clamp(-clamp, clamp);

        let r = (x1 * x1 + y1 * y1).sqrt();
        if r >= a.radius && x1 * dx + y1 * dy > 0.0 {
            return None;
        }
        x1 += 0.5 * dx;
        y1 += 0.5 * dy;
        if dx.abs() < 0.005 * EPS && dy.abs() < 0.005 * EPS {
            converged = true;
            break;
        }
    }
    if !converged {
        log::warn!(
            "dish_from_sub: inverse mapping at ({x}, {y}) not converged after {niter} iterations; using best estimate"
        );
    }

    let r = (x1 * x1 + y1 * y1).sqrt();
    if r > a.radius {
        return None;
    }

    let (z, _) = a.astig_dish_value(x1, y1);
    let d = (1.0 + mx * mx + my * my).sqrt();
    let dish = SurfacePoint {
        pos: [x1, y1, z],
        normal: [mx / d, my / d, 1.0 / d],
    };
    Some((dish, sub0))
}

/// Intersect a ray leaving the subreflector with the dish surface. A
/// quadratic solve against the best-fit paraboloid seeds `niter` Newton
/// refinements against the real (astigmatic) surface; the refinement count
/// is the caller's convergence budget and each step roughly halves the
/// normal-consistency residual.
pub fn intersect_dish(a: &Antenna, sub_pos: Vec3, unitdir: Vec3, niter: usize) -> SurfacePoint {
    // Seed on the ideal paraboloid, taking the greater root.
    let qa = a.best_parabola * (unitdir[0] * unitdir[0] + unitdir[1] * unitdir[1]);
    let qb =
        2.0 * a.best_parabola * (unitdir[0] * sub_pos[0] + unitdir[1] * sub_pos[1]) - unitdir[2];
    let qc = a.best_parabola * (sub_pos[0] * sub_pos[0] + sub_pos[1] * sub_pos[1]) - sub_pos[2];
    let mut t = if qa == 0.0 {
        -qc / qb
    } else {
        0.5 * ((qb * qb - 4.0 * qa * qc).sqrt() - qb) / qa
    };

    let mut x = [0.0; 3];
    let mut n = [0.0; 3];
    let mut iter = 0;
    loop {
        // Position and normal on the real dish.
        x[0] = sub_pos[0] + t * unitdir[0];
        x[1] = sub_pos[1] + t * unitdir[1];
        let r = (x[0] * x[0] + x[1] * x[1]).sqrt();
        let (z, m) = a.astig_dish_value(x[0], x[1]);
        x[2] = z;
        if r == 0.0 {
            n = [0.0, 0.0, 1.0];
        } else {
            n[2] = 1.0 / (1.0 + m * m).sqrt();
            n[0] = -m * (x[0] / r) * n[2];
            n[1] = -m * (x[1] / r) * n[2];
        }

        if iter >= niter {
            break;
        }
        iter += 1;

        let residual = dot(n, sub(x, sub_pos));
        let slope = dot(n, unitdir);
        t = residual / slope;
    }

    SurfacePoint { pos: x, normal: n }
}

/// Continue a ray reflected off the dish to the aperture plane at the dish
/// rim height.
pub fn intersect_aperture(a: &Antenna, dish: &SurfacePoint, unitdir: Vec3) -> SurfacePoint {
    let t = (a.zedge - dish.pos[2]) / unitdir[2];
    let mut pos = dish.pos;
    for i in 0..3 {
        pos[i] += t * unitdir[i];
    }
    SurfacePoint {
        pos,
        normal: [0.0, 0.0, 1.0],
    }
}

/// Trace the full ray path for the aperture sample launched from dish
/// position (x, y). Returns `None` when the pathologized subreflector
/// normal no longer faces the dish.
pub fn trace(a: &Antenna, x: f64, y: f64, p: &Pathology, dish_iter: usize) -> Option<Ray> {
    let mut sub = sub_from_dish(a, x, y);
    p.pathologize(&mut sub);

    if !(-1.0..=0.0).contains(&sub.normal[2]) {
        return None;
    }

    let feed = [
        a.feed[0] + p.feed_shift[0],
        a.feed[1] + p.feed_shift[1],
        a.feed[2] + p.feed_shift[2],
    ];

    // Reflect the feed-ward direction at the subreflector to get the
    // dish-ward direction.
    let fu = unit_diff(feed, sub.pos);
    let ndotf = dot(sub.normal, fu);
    let du = [
        2.0 * sub.normal[0] * ndotf - fu[0],
        2.0 * sub.normal[1] * ndotf - fu[1],
        2.0 * sub.normal[2] * ndotf - fu[2],
    ];

    let dish = intersect_dish(a, sub.pos, du, dish_iter);

    // Reflect again at the dish for the aperture-ward direction.
    let ndotd = dot(dish.normal, du);
    let au = [
        du[0] - 2.0 * dish.normal[0] * ndotd,
        du[1] - 2.0 * dish.normal[1] * ndotd,
        du[2] - 2.0 * dish.normal[2] * ndotd,
    ];

    let aper = intersect_aperture(a, &dish, au);

    Some(Ray {
        aper,
        dish,
        sub,
        feed,
    })
}

/// Solid angle subtended at the feed by the triangle of three adjacent
/// rays' subreflector points. Finite differencing sidesteps a closed-form
/// Jacobian for perturbed, astigmatic dishes.
pub fn d_omega(a: &Antenna, ray1: &Ray, ray2: &Ray, ray3: &Ray, p: &Pathology) -> f64 {
    let f = [
        a.feed[0] + p.feed_shift[0],
        a.feed[1] + p.feed_shift[1],
        a.feed[2] + p.feed_shift[2],
    ];

    let n1 = unit_diff(ray1.sub.pos, f);
    let n2 = unit_diff(ray2.sub.pos, f);
    let n3 = unit_diff(ray3.sub.pos, f);

    let c = cross(sub(n1, n3), sub(n2, n3));
    0.5 * length(c)
}

/// Propagate a polarization 3-vector along a traced ray, applying the
/// mirror reflection of the E-field at the subreflector and the dish.
pub fn trace_pol(e0: [c64; 3], ray: &Ray) -> [c64; 3] {
    let v1 = unit_diff(ray.sub.pos, ray.feed);
    let v2 = unit_diff(ray.dish.pos, ray.sub.pos);
    let v3 = unit_diff(ray.aper.pos, ray.dish.pos);

    let mut e1 = e0;
    for (va, vb) in [(v1, v2), (v2, v3)] {
        let r = unit_diff(va, vb);
        let fac = c64::new(r[0], 0.0) * e1[0]
            + c64::new(r[1], 0.0) * e1[1]
            + c64::new(r[2], 0.0) * e1[2];
        for i in 0..3 {
            e1[i] = c64::new(r[i], 0.0) * fac * 2.0 - e1[i];
        }
    }
    e1
}

/// Plane-wave (silhouette) strut blockage for an aperture position inside
/// the leg-foot circle: blocked when the point sits within half a leg
/// width of a strut's plan-view center line, on that strut's side.
pub fn leg_plane_wave_block(a: &Antenna, x: f64, y: f64) -> bool {
    // Outside the leg foot area the blockage is spherical wave.
    if x * x + y * y > a.leg_foot * a.leg_foot {
        return false;
    }
    if a.leg_width == 0.0 {
        return false;
    }

    let half_width = 0.5 * a.leg_width.abs();
    for theta in a.leg_angles {
        let (s, c) = theta.sin_cos();
        if c * x + s * y >= 0.0 && (-s * x + c * y).abs() < half_width {
            return true;
        }
    }
    false
}

/// Plane-wave strut blockage of the dish-to-aperture leg of a traced ray.
/// Only applies inside the leg-foot circle.
pub fn leg_plane_wave_block2(a: &Antenna, ray: &Ray) -> bool {
    if a.leg_width == 0.0 {
        return false;
    }
    let dr2 = ray.dish.pos[0] * ray.dish.pos[0] + ray.dish.pos[1] * ray.dish.pos[1];
    if dr2 >= a.leg_foot * a.leg_foot {
        return false;
    }

    let dr = sub(ray.aper.pos, ray.dish.pos);
    strut_blocks_segment(a, ray.dish.pos, dr)
}

/// Spherical-wave strut blockage of the dish-to-subreflector leg of a
/// traced ray. Only applies outside the leg-foot circle; inside it the
/// plane-wave test covers the struts.
pub fn leg_spherical_wave_block(a: &Antenna, ray: &Ray) -> bool {
    if a.leg_width == 0.0 {
        return false;
    }
    let dr2 = ray.dish.pos[0] * ray.dish.pos[0] + ray.dish.pos[1] * ray.dish.pos[1];
    if dr2 < a.leg_foot * a.leg_foot {
        return false;
    }

    let dr = sub(ray.sub.pos, ray.dish.pos);
    strut_blocks_segment(a, ray.dish.pos, dr)
}

/// Does any strut come within half a leg width of the ray segment starting
/// at `r0` with direction `dr`? Struts run from their foot on the dish to
/// the apex on the axis; only struts roughly aligned in azimuth with the
/// start point are candidates.
fn strut_blocks_segment(a: &Antenna, r0: Vec3, dr: Vec3) -> bool {
    let rr = r0[0] * r0[0] + r0[1] * r0[1];
    let l1 = [0.0, 0.0, a.leg_apex];

    for theta in a.leg_angles {
        let (s, c) = theta.sin_cos();
        let l0 = [a.leg_foot * c, a.leg_foot * s, a.leg_foot_z];
        let ll = l0[0] * l0[0] + l0[1] * l0[1];
        if (l0[0] * r0[0] + l0[1] * r0[1]) / (ll * rr).sqrt() < LEG_ALIGN_COS {
            continue;
        }

        let dl = sub(l1, l0);
        let d = sub(r0, l0);

        let mut n = cross(dr, dl);
        normalize(&mut n);

        if dot(d, n).abs() <= 0.5 * a.leg_width.abs() {
            return true;
        }
    }
    false
}
