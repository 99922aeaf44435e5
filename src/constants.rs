// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

use std::f64::consts::PI;

/// Number of samples in the generated dish-shape table. The surface
/// reconstruction only ever looks at a sample and its two neighbours, so
/// this sets the radial resolution of the intersection search.
pub(crate) const DISH_SAMPLES: usize = 2000;

/// Exponent coefficient of the Gaussian feed taper model \[1/dB\].
pub(crate) const TAPER_GAIN_COEFF: f64 = -0.083;

/// Angular-scale coefficient of the Gaussian feed taper model.
pub(crate) const TAPER_ANGLE_COEFF: f64 = 0.1874;

/// A strut is only tested for blockage when the dish point lies roughly in
/// its azimuthal sector; this is the cosine cutoff for that test.
pub(crate) const LEG_ALIGN_COS: f64 = 0.7;

/// Strut azimuths for "+"-style legs (positive leg width).
pub(crate) const LEG_PLUS_ANGLES: [f64; 4] = [0.0, PI / 2.0, PI, 3.0 * PI / 2.0];

/// Strut azimuths for "x"-style legs (negative leg width).
pub(crate) const LEG_CROSS_ANGLES: [f64; 4] = [0.25 * PI, 0.75 * PI, 1.25 * PI, 1.75 * PI];

/// The reference ray defining the zero-phase condition is traced this far
/// off axis \[m\]; tracing exactly through the dish apex is singular.
pub(crate) const CENTRAL_RAY_OFFSET: f64 = 1.0e-5;
