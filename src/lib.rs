// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Ray-traced aperture illumination (primary beam) code for Cassegrain radio
telescopes.

Given a per-band physical description of an antenna ([`BandGeometry`]), an
observing frequency and an optional mechanical perturbation ([`Pathology`]),
[`calculate_aperture`] traces geometric-optics rays from the feed through
the subreflector and dish to the aperture plane and assembles the complex
illumination into a per-pixel Jones image, ready for the Fourier transform
that yields the far-field beam pattern.
 */

pub mod antenna;
pub mod aperture;
mod constants;
pub mod errors;
pub mod geometry;
pub(crate) mod math;
pub mod pathology;
pub mod raytrace;

pub use antenna::Antenna;
pub use aperture::{
    calculate_aperture, calculate_aperture_lin_pol, calculate_aperture_pol, ApertureParams,
    Convergence, PolProduct,
};
pub use errors::CassbeamError;
pub use geometry::{BandGeometry, GeometryCache, GeometryTable, PolBasis};
pub use pathology::Pathology;

// Re-exports.
pub use marlu::{c64, Jones};
