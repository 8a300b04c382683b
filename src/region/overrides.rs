//! Known point → region corrections checked before any lookup.
//!
//! The remote service only covers the US and misplaces a few coastal
//! points, so those are pinned here. Matching is approximate:
//! `|a - b| <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * |b|` per axis,
//! where `b` is the table value.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::types::{OverrideError, RegionName};
use crate::point::GeoPoint;

pub const ABSOLUTE_TOLERANCE: f64 = 1e-8;
pub const RELATIVE_TOLERANCE: f64 = 1e-5;

// (latitude, longitude, region)
const BUILTIN_OVERRIDES: &[(f64, f64, &str)] = &[
    (42.31954001, -83.02434, "Ontario"),
    (38.72090002, -75.076, "Delaware"),
];

/// Closeness test used for override matching.
pub fn is_close(value: f64, reference: f64) -> bool {
    (value - reference).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * reference.abs()
}

/// One pinned point.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionOverride {
    pub point: GeoPoint,
    pub region: RegionName,
}

impl RegionOverride {
    pub fn new(point: GeoPoint, region: RegionName) -> Self {
        Self { point, region }
    }

    pub fn matches(&self, point: GeoPoint) -> bool {
        is_close(point.latitude(), self.point.latitude())
            && is_close(point.longitude(), self.point.longitude())
    }
}

/// On-disk shape of an override entry.
#[derive(Deserialize)]
struct OverrideRecord {
    latitude: f64,
    longitude: f64,
    region: String,
}

/// Immutable, ordered override list. First match wins.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: Vec<RegionOverride>,
}

impl OverrideTable {
    pub fn new(entries: Vec<RegionOverride>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The shipped corrections.
    pub fn builtin() -> Self {
        let entries = BUILTIN_OVERRIDES
            .iter()
            .filter_map(|&(lat, lon, name)| {
                RegionName::new(name)
                    .map(|region| RegionOverride::new(GeoPoint::new_unchecked(lat, lon), region))
            })
            .collect();
        Self { entries }
    }

    /// Load entries from a JSON array of `{"latitude", "longitude", "region"}`.
    pub fn from_json_file(path: &Path) -> Result<Self, OverrideError> {
        let data = fs::read_to_string(path).map_err(|source| OverrideError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, OverrideError> {
        let records: Vec<OverrideRecord> = serde_json::from_str(data)?;
        let entries = records
            .into_iter()
            .enumerate()
            .map(|(index, r)| {
                let point = GeoPoint::new(r.latitude, r.longitude)
                    .map_err(|source| OverrideError::InvalidPoint { index, source })?;
                let region =
                    RegionName::new(r.region).ok_or(OverrideError::EmptyRegion { index })?;
                Ok(RegionOverride::new(point, region))
            })
            .collect::<Result<Vec<_>, OverrideError>>()?;
        Ok(Self { entries })
    }

    /// Append `other`'s entries after this table's. Used while assembling
    /// the table at startup.
    pub fn chain(mut self, other: OverrideTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn find(&self, point: GeoPoint) -> Option<&RegionOverride> {
        self.entries.iter().find(|entry| entry.matches(point))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionOverride> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
