// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Static antenna geometry: the per-band physical description of a Cassegrain
telescope, tables of bands keyed by frequency, and a read-mostly cache of
tables keyed by observatory and antenna type.
 */

mod error;

pub use error::GeometryError;

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// The polarization basis of a telescope's feeds. This decides how the two
/// computed field components are combined into polarization products.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolBasis {
    /// Circularly-polarized feeds (R/L products, e.g. the VLA).
    Circular,
    /// Linearly-polarized feeds (X/Y products, e.g. ALMA).
    Linear,
}

/// The immutable physical description of one observing band of a Cassegrain
/// antenna. All lengths are in metres, frequencies in Hz, angles in degrees
/// unless noted otherwise.
///
/// One of these is normally built per (observatory, band, antenna type)
/// combination and reused for every aperture computation on that band.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BandGeometry {
    /// Band name, e.g. "L".
    pub name: String,

    /// Lowest frequency this band covers \[Hz\].
    pub min_freq_hz: f64,
    /// Highest frequency this band covers \[Hz\].
    pub max_freq_hz: f64,

    /// Main dish radius \[m\].
    pub dish_radius: f64,
    /// Focal length of the main dish \[m\]. The dish profile is generated
    /// from this as z(r) = r^2 / 4F.
    pub focal_length: f64,
    /// Radius of the central hole in the dish \[m\]. Aperture samples inside
    /// it carry no power.
    pub hole_radius: f64,

    /// Height of the subreflector above the dish vertex \[m\].
    pub sub_h: f64,
    /// Half-angle subtended by the subreflector from the feed \[deg\]. The
    /// feed taper is normalized at this angle.
    pub sub_angle_deg: f64,

    /// Feed phase-center position \[m\].
    pub feed_pos: [f64; 3],

    /// Strut width \[m\]. Positive for "+"-style legs, negative for
    /// "x"-style legs (rotated 45 degrees), zero for no struts.
    pub leg_width: f64,
    /// Radius at which the struts meet the dish \[m\].
    pub leg_foot: f64,
    /// Height at which the struts meet the subreflector axis \[m\].
    pub leg_apex: f64,
    /// Explicit strut azimuths \[rad\], overriding the +/x styles implied by
    /// the sign of `leg_width`. Some antennas mount their legs at odd
    /// angles.
    pub leg_angles: Option<[f64; 4]>,

    /// Coefficients of the feed taper polynomial \[dB\], evaluated in powers
    /// of the frequency offset from `ref_freq_hz` in GHz. One to five
    /// coefficients.
    pub taper_poly: Vec<f64>,
    /// Reference frequency of the taper polynomial \[Hz\].
    pub ref_freq_hz: f64,

    /// Zernike Z6 (0-degree) astigmatism coefficient of the dish surface.
    pub astigm_0: f64,
    /// Zernike Z5 (45-degree) astigmatism coefficient of the dish surface.
    pub astigm_45: f64,

    /// The polarization basis of this telescope's feeds.
    pub pol_basis: PolBasis,
}

impl BandGeometry {
    /// Does this band cover the given frequency?
    pub fn covers(&self, freq_hz: f64) -> bool {
        self.min_freq_hz <= freq_hz && freq_hz <= self.max_freq_hz
    }

    /// Evaluate the feed taper polynomial at a frequency \[dB\].
    pub fn taper_at(&self, freq_hz: f64) -> f64 {
        let df_ghz = (freq_hz - self.ref_freq_hz) / 1e9;
        let mut taper = 0.0;
        let mut x = 1.0;
        for &c in &self.taper_poly {
            taper += c * x;
            x *= df_ghz;
        }
        taper
    }

    /// Check this band for values the ray tracer can't work with.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let positive = [
            ("dish_radius", self.dish_radius),
            ("focal_length", self.focal_length),
            ("sub_h", self.sub_h),
            ("sub_angle_deg", self.sub_angle_deg),
            ("ref_freq_hz", self.ref_freq_hz),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(GeometryError::NonPositive {
                    band: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        if self.hole_radius < 0.0 {
            return Err(GeometryError::NonPositive {
                band: self.name.clone(),
                field: "hole_radius",
                value: self.hole_radius,
            });
        }
        if self.hole_radius >= self.dish_radius {
            return Err(GeometryError::HoleLargerThanDish {
                band: self.name.clone(),
                hole: self.hole_radius,
                dish: self.dish_radius,
            });
        }
        if self.min_freq_hz >= self.max_freq_hz {
            return Err(GeometryError::InvertedFreqRange {
                band: self.name.clone(),
                min_freq_hz: self.min_freq_hz,
                max_freq_hz: self.max_freq_hz,
            });
        }
        if self.taper_poly.is_empty() || self.taper_poly.len() > 5 {
            return Err(GeometryError::TaperPolyLength {
                band: self.name.clone(),
                got: self.taper_poly.len(),
            });
        }
        Ok(())
    }
}

/// The bands of one (observatory, antenna type) combination, looked up by
/// frequency.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryTable {
    /// Observatory name, e.g. "VLA".
    pub observatory: String,
    /// Antenna type, e.g. "STANDARD".
    pub antenna_type: String,
    bands: Vec<BandGeometry>,
}

impl GeometryTable {
    /// Create a new [`GeometryTable`], validating every band.
    pub fn new<S: Into<String>>(
        observatory: S,
        antenna_type: S,
        bands: Vec<BandGeometry>,
    ) -> Result<GeometryTable, GeometryError> {
        let observatory = observatory.into();
        let antenna_type = antenna_type.into();
        if bands.is_empty() {
            return Err(GeometryError::EmptyTable {
                observatory,
                antenna_type,
            });
        }
        for band in &bands {
            band.validate()?;
        }
        Ok(GeometryTable {
            observatory,
            antenna_type,
            bands,
        })
    }

    /// All bands in this table.
    pub fn bands(&self) -> &[BandGeometry] {
        &self.bands
    }

    /// Get a band by name.
    pub fn band(&self, name: &str) -> Option<&BandGeometry> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// Find the band covering a frequency.
    pub fn band_for_freq(&self, freq_hz: f64) -> Result<&BandGeometry, GeometryError> {
        self.band_index_for_freq(freq_hz).map(|i| &self.bands[i])
    }

    /// Find the index of the band covering a frequency.
    pub fn band_index_for_freq(&self, freq_hz: f64) -> Result<usize, GeometryError> {
        self.bands
            .iter()
            .position(|b| b.covers(freq_hz))
            .ok_or_else(|| GeometryError::UnknownBand {
                observatory: self.observatory.clone(),
                antenna_type: self.antenna_type.clone(),
                freq_hz,
            })
    }

    /// A nominal 25 m Cassegrain antenna with two bands. Handy as a starting
    /// point and used by the tests and benchmarks; real work should load
    /// measured per-observatory tables.
    pub fn nominal_25m() -> GeometryTable {
        let l_band = BandGeometry {
            name: "L".to_string(),
            min_freq_hz: 1.0e9,
            max_freq_hz: 2.0e9,
            dish_radius: 12.5,
            focal_length: 9.0,
            hole_radius: 0.61,
            sub_h: 6.0,
            sub_angle_deg: 50.0,
            feed_pos: [0.0, 0.0, 1.5],
            leg_width: 0.27,
            leg_foot: 7.55,
            leg_apex: 8.8,
            leg_angles: None,
            taper_poly: vec![13.0],
            ref_freq_hz: 1.5e9,
            astigm_0: 0.0,
            astigm_45: 0.0,
            pol_basis: PolBasis::Circular,
        };
        let c_band = BandGeometry {
            name: "C".to_string(),
            min_freq_hz: 4.0e9,
            max_freq_hz: 8.0e9,
            taper_poly: vec![13.0, 0.1],
            ref_freq_hz: 6.0e9,
            ..l_band.clone()
        };
        GeometryTable::new("NOMINAL", "STANDARD", vec![l_band, c_band])
            .expect("the built-in table is valid")
    }
}

/// An explicit, caller-constructed cache of geometry tables keyed by
/// observatory and antenna type. Tables are built or loaded once, inserted,
/// and shared read-only afterwards; concurrent readers never block each
/// other.
#[derive(Default)]
pub struct GeometryCache {
    tables: RwLock<HashMap<(String, String), Arc<GeometryTable>>>,
}

impl GeometryCache {
    pub fn new() -> GeometryCache {
        GeometryCache::default()
    }

    /// Insert a table, replacing any previous table for the same
    /// observatory and antenna type. Returns the shared handle.
    pub fn insert(&self, table: GeometryTable) -> Arc<GeometryTable> {
        let key = (table.observatory.clone(), table.antenna_type.clone());
        let table = Arc::new(table);
        log::debug!(
            "caching geometry table for {}/{} ({} bands)",
            key.0,
            key.1,
            table.bands().len()
        );
        self.tables.write().insert(key, Arc::clone(&table));
        table
    }

    /// Get the table for an observatory and antenna type, if cached.
    pub fn table(&self, observatory: &str, antenna_type: &str) -> Option<Arc<GeometryTable>> {
        self.tables
            .read()
            .get(&(observatory.to_string(), antenna_type.to_string()))
            .cloned()
    }

    /// The number of cached tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
