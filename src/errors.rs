// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Errors associated with all aspects of cassbeam.
 */

use thiserror::Error;

use crate::{antenna::AntennaError, aperture::ApertureError, geometry::GeometryError};

#[derive(Error, Debug)]
pub enum CassbeamError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Antenna(#[from] AntennaError),

    #[error(transparent)]
    Aperture(#[from] ApertureError),
}
