// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with deriving a working antenna model.

use thiserror::Error;

use crate::geometry::GeometryError;

#[derive(Error, Debug)]
pub enum AntennaError {
    #[error("The observing frequency must be positive (got {freq_hz} Hz)")]
    InvalidFrequency { freq_hz: f64 },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
