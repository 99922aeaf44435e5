// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::{assert_abs_diff_eq, assert_relative_eq};

use super::*;
use crate::geometry::GeometryTable;

/// The end-to-end scenario: a 25 m dish (R = 12.5 m), subreflector at 6 m,
/// no struts, no astigmatism, no central hole.
fn unblocked_band() -> BandGeometry {
    let mut geom = GeometryTable::nominal_25m().band("L").unwrap().clone();
    geom.leg_width = 0.0;
    geom.hole_radius = 0.0;
    geom
}

/// Like [`unblocked_band`], but keeping the central hole.
fn holed_band() -> BandGeometry {
    let mut geom = unblocked_band();
    geom.hole_radius = 0.61;
    geom
}

fn strutted_band() -> BandGeometry {
    GeometryTable::nominal_25m().band("L").unwrap().clone()
}

/// A grid of `n` x `n` cells of size `cell` centred on the origin. With
/// even `n` no cell centre falls exactly on the axis.
fn centred_params(n: usize, cell: f64, freq_hz: f64) -> ApertureParams {
    let origin = -0.5 * (n as f64 - 1.0) * cell;
    ApertureParams::new(n, n, cell, cell, origin, origin, freq_hz)
}

/// The aperture-plane position of output cell (i, j) for `centred_params`,
/// ignoring the (numerically tiny) parallactic rotation residue.
fn cell_pos(params: &ApertureParams, i: usize, j: usize) -> (f64, f64) {
    let gx = params.x0 + i as f64 * params.dx;
    let gy = params.y0 + j as f64 * params.dy;
    (gy, gx)
}

#[test]
fn output_shape_matches_the_request() {
    let geom = unblocked_band();
    let params = ApertureParams::new(48, 32, 0.8, 0.8, -19.2, -12.8, 1.0e9);
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();
    assert_eq!(image.dim(), (32, 48));
}

#[test]
fn invalid_requests_are_rejected() {
    let geom = unblocked_band();
    let p = Pathology::default();

    let mut params = centred_params(16, 1.6, 1.0e9);
    params.nx = 0;
    assert!(matches!(
        calculate_aperture(&geom, &params, &p),
        Err(ApertureError::ZeroGridSize { .. })
    ));

    let mut params = centred_params(16, 1.6, 1.0e9);
    params.dy = -1.0;
    assert!(matches!(
        calculate_aperture(&geom, &params, &p),
        Err(ApertureError::NonPositiveCell { .. })
    ));

    let mut params = centred_params(16, 1.6, 1.0e9);
    params.oversamp = 0;
    assert!(matches!(
        calculate_aperture(&geom, &params, &p),
        Err(ApertureError::ZeroOversample)
    ));

    let params = centred_params(16, 1.6, -1.0);
    assert!(matches!(
        calculate_aperture(&geom, &params, &p),
        Err(ApertureError::Antenna(_))
    ));
}

#[test]
fn samples_outside_the_dish_annulus_are_zero() {
    let geom = holed_band();
    let params = centred_params(64, 0.45, 1.0e9);
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();

    let zero = c64::new(0.0, 0.0);
    let mut illuminated = 0;
    for j in 0..params.ny {
        for i in 0..params.nx {
            let (x, y) = cell_pos(&params, i, j);
            let r = (x * x + y * y).sqrt();
            let jones = image[(j, i)];
            if r < geom.hole_radius - 0.01 || r > geom.dish_radius + 0.01 {
                for k in 0..4 {
                    assert_eq!(jones[k], zero, "expected zero at r = {r}");
                }
            }
            if jones[0] != zero {
                illuminated += 1;
            }
        }
    }
    // Most of the annulus is illuminated.
    assert!(illuminated > 2000, "only {illuminated} cells illuminated");
}

#[test]
fn on_axis_phase_is_zero() {
    let geom = unblocked_band();
    let params = centred_params(64, 0.4, 1.0e9);
    let image =
        calculate_aperture_lin_pol(&geom, &params, &Pathology::default(), PolProduct::XX).unwrap();

    // The cells nearest the axis, and a sweep along the x = 0 column out to
    // the dish edge: the phase convention zeroes all of them for an
    // unperturbed paraboloid.
    let mid = params.nx / 2;
    for (i, j) in [(mid, mid), (mid - 1, mid), (mid, mid - 1), (mid - 1, mid - 1)] {
        let xx = image[(j, i)][0];
        assert!(xx.norm() > 0.0);
        assert_abs_diff_eq!(xx.arg(), 0.0, epsilon = 1e-8);
    }
    for j in 0..params.ny {
        let (x, y) = cell_pos(&params, mid, j);
        let r = (x * x + y * y).sqrt();
        if r < geom.hole_radius + 0.3 || r > geom.dish_radius - 0.3 {
            continue;
        }
        let xx = image[(j, mid)][0];
        assert!(xx.norm() > 0.0, "cell ({mid}, {j}) unexpectedly dark");
        assert_abs_diff_eq!(xx.arg(), 0.0, epsilon = 1e-8);
    }
}

#[test]
fn amplitude_is_circularly_symmetric() {
    let geom = unblocked_band();
    let params = centred_params(64, 0.4, 1.0e9);
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();

    // Reflecting or transposing the grid maps cell centres onto cell
    // centres; a circularly-symmetric amplitude must match across all of
    // them.
    let n = params.nx;
    for j in 0..n {
        for i in 0..n {
            let a = image[(j, i)][0].norm();
            let mirrored = image[(j, n - 1 - i)][0].norm();
            let transposed = image[(i, j)][0].norm();
            if a > 0.0 {
                assert_relative_eq!(a, mirrored, epsilon = 1e-6);
                assert_relative_eq!(a, transposed, epsilon = 1e-6);
            } else {
                assert_eq!(mirrored, 0.0);
                assert_eq!(transposed, 0.0);
            }
        }
    }
}

#[test]
fn identity_pathology_matches_default() {
    let geom = unblocked_band();
    let params = centred_params(32, 0.8, 1.0e9);
    let reference = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();

    let explicit_identity = Pathology::new()
        .with_sub_shift([0.0; 3])
        .with_feed_shift([0.0; 3])
        .with_focus(0.0);
    assert!(explicit_identity.is_identity());
    let image = calculate_aperture(&geom, &params, &explicit_identity).unwrap();

    for (a, b) in reference.iter().zip(image.iter()) {
        for k in 0..4 {
            assert_eq!(a[k], b[k]);
        }
    }
}

#[test]
fn inverse_pathologies_compose_to_the_unperturbed_result() {
    let geom = unblocked_band();
    let params = centred_params(32, 0.8, 1.0e9);
    let reference = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();

    let delta = [0.004, -0.002, 0.007];
    let p1 = Pathology::new().with_sub_shift(delta).with_feed_shift(delta);
    let p2 = Pathology::new()
        .with_sub_shift([-delta[0], -delta[1], -delta[2]])
        .with_feed_shift([-delta[0], -delta[1], -delta[2]]);

    // The perturbation alone moves power around...
    let perturbed = calculate_aperture(&geom, &params, &p1).unwrap();
    let mut max_diff: f64 = 0.0;
    for (a, b) in reference.iter().zip(perturbed.iter()) {
        max_diff = max_diff.max((a[0] - b[0]).norm());
    }
    assert!(max_diff > 1e-6, "perturbation had no effect");

    // ...but composed with its inverse it is the identity.
    let image = calculate_aperture(&geom, &params, &p1.compose(&p2)).unwrap();
    for (a, b) in reference.iter().zip(image.iter()) {
        for k in 0..4 {
            assert_abs_diff_eq!(a[k].re, b[k].re, epsilon = 1e-12);
            assert_abs_diff_eq!(a[k].im, b[k].im, epsilon = 1e-12);
        }
    }
}

#[test]
fn focus_error_curves_the_phase() {
    let geom = unblocked_band();
    let params = centred_params(32, 0.8, 1.0e9);
    let focused =
        calculate_aperture_lin_pol(&geom, &params, &Pathology::default(), PolProduct::XX).unwrap();
    let defocused = calculate_aperture_lin_pol(
        &geom,
        &params,
        &Pathology::new().with_focus(0.05),
        PolProduct::XX,
    )
    .unwrap();

    // Defocus shows up as an edge-to-centre phase gradient.
    let mid = params.nx / 2;
    let near = defocused[(mid, mid)][0];
    let far = defocused[(mid, 28)][0];
    assert!(near.norm() > 0.0 && far.norm() > 0.0);
    let curvature = (far.arg() - near.arg()).abs();
    assert!(curvature > 0.01, "expected a defocus phase gradient");

    let flat = (focused[(mid, 28)][0].arg() - focused[(mid, mid)][0].arg()).abs();
    assert!(flat < 1e-6);
}

#[test]
fn constant_phase_offset_is_applied() {
    let geom = unblocked_band();
    let params = centred_params(16, 1.6, 1.0e9);
    let offset = 0.5;
    let reference =
        calculate_aperture_lin_pol(&geom, &params, &Pathology::default(), PolProduct::XX).unwrap();
    let shifted = calculate_aperture_lin_pol(
        &geom,
        &params,
        &Pathology::new().with_phase_offset(offset),
        PolProduct::XX,
    )
    .unwrap();

    let mid = params.nx / 2;
    let a = reference[(mid, mid)][0];
    let b = shifted[(mid, mid)][0];
    assert_relative_eq!(a.norm(), b.norm(), epsilon = 1e-12);
    assert_abs_diff_eq!(b.arg() - a.arg(), offset, epsilon = 1e-9);
}

#[test]
fn single_pol_matches_the_full_computation() {
    let geom = unblocked_band();
    let params = centred_params(24, 1.1, 1.4e9);
    let p = Pathology::default();
    let full = calculate_aperture(&geom, &params, &p).unwrap();

    for (pol, k) in [
        (PolProduct::RR, 0),
        (PolProduct::RL, 1),
        (PolProduct::LR, 2),
        (PolProduct::LL, 3),
    ] {
        let single = calculate_aperture_pol(&geom, &params, &p, pol).unwrap();
        for (a, b) in full.iter().zip(single.iter()) {
            assert_eq!(a[k], b[k]);
            for other in (0..4).filter(|&o| o != k) {
                assert_eq!(b[other], c64::new(0.0, 0.0));
            }
        }
    }
}

#[test]
fn linear_cross_products_are_identically_zero() {
    let geom = unblocked_band();
    let params = centred_params(16, 1.6, 1.0e9);
    let p = Pathology::default();

    for pol in [PolProduct::XY, PolProduct::YX] {
        let image = calculate_aperture_lin_pol(&geom, &params, &p, pol).unwrap();
        for jones in image.iter() {
            for k in 0..4 {
                assert_eq!(jones[k], c64::new(0.0, 0.0));
            }
        }
    }

    // The diagonal products are not.
    let image = calculate_aperture_lin_pol(&geom, &params, &p, PolProduct::XX).unwrap();
    assert!(image.iter().any(|j| j[0].norm() > 0.0));
}

#[test]
fn strut_shadow_is_symmetric_under_quarter_turns() {
    let geom = strutted_band();
    // An odd grid puts cell centres right on the strut axes.
    let params = centred_params(65, 0.4, 1.0e9);
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();

    // Blocked cells inside the annulus form the shadow mask; four struts at
    // quarter turns must cast a mask with the same symmetry. A quarter
    // turn maps cell (i, j) to (n-1-j, i).
    let n = params.nx;
    let mask: Vec<bool> = image.iter().map(|j| j[0].norm() == 0.0).collect();
    for j in 0..n {
        for i in 0..n {
            let rotated = mask[i * n + (n - 1 - j)];
            assert_eq!(
                mask[j * n + i],
                rotated,
                "mask not symmetric at cell ({i}, {j})"
            );
        }
    }

    // And the struts do cast a shadow: the strutted image has more dark
    // cells than the unblocked one.
    let unblocked = calculate_aperture(&unblocked_band(), &params, &Pathology::default()).unwrap();
    let dark = |im: &ndarray::Array2<Jones<f64>>| {
        im.iter().filter(|j| j[0].norm() == 0.0).count()
    };
    assert!(dark(&image) > dark(&unblocked));
}

#[test]
fn oversampling_accumulates_into_the_requested_grid() {
    let geom = unblocked_band();
    let mut params = centred_params(16, 1.6, 1.0e9);
    params.oversamp = 2;
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();
    assert_eq!(image.dim(), (16, 16));
    assert!(image.iter().any(|j| j[0].norm() > 0.0));
}

#[test]
fn circular_basis_products_balance_on_axis() {
    // For an unpolarized ideal reflector the co-polar products RR and LL
    // carry equal magnitude.
    let geom = unblocked_band();
    let params = centred_params(32, 0.8, 1.0e9);
    let image = calculate_aperture(&geom, &params, &Pathology::default()).unwrap();
    let mid = params.nx / 2;
    let jones = image[(mid, mid)];
    assert!(jones[0].norm() > 0.0);
    assert_relative_eq!(jones[0].norm(), jones[3].norm(), epsilon = 1e-9);
}
