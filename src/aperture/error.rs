// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with aperture computations.

use thiserror::Error;

use crate::antenna::AntennaError;

#[derive(Error, Debug)]
pub enum ApertureError {
    #[error("The aperture grid must have at least one pixel per axis (got {nx} x {ny})")]
    ZeroGridSize { nx: usize, ny: usize },

    #[error("The aperture cell size must be positive (got dx = {dx}, dy = {dy})")]
    NonPositiveCell { dx: f64, dy: f64 },

    #[error("The oversampling factor must be at least 1")]
    ZeroOversample,

    #[error("The central reference ray could not be traced; the geometry does not form a working Cassegrain system")]
    CentralRay,

    #[error(transparent)]
    Antenna(#[from] AntennaError),
}
