// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with antenna geometry tables.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("No band of {observatory}/{antenna_type} covers {freq_hz} Hz")]
    UnknownBand {
        observatory: String,
        antenna_type: String,
        freq_hz: f64,
    },

    #[error("Geometry table for {observatory}/{antenna_type} has no bands")]
    EmptyTable {
        observatory: String,
        antenna_type: String,
    },

    #[error("Band {band}: field '{field}' must be positive (got {value})")]
    NonPositive {
        band: String,
        field: &'static str,
        value: f64,
    },

    #[error("Band {band}: the central hole radius ({hole} m) must be smaller than the dish radius ({dish} m)")]
    HoleLargerThanDish { band: String, hole: f64, dish: f64 },

    #[error("Band {band}: minimum frequency {min_freq_hz} Hz is not below maximum frequency {max_freq_hz} Hz")]
    InvertedFreqRange {
        band: String,
        min_freq_hz: f64,
        max_freq_hz: f64,
    },

    #[error("Band {band}: the taper polynomial must have 1 to 5 coefficients (got {got})")]
    TaperPolyLength { band: String, got: usize },
}
