//! Core types for the region subsystem.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::point::{GeoPoint, MalformedPointError};

/// Display name of a US state or Canadian province. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RegionName(String);

impl RegionName {
    /// `None` when `name` is empty or whitespace only.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for RegionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// How a region was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    Override,
    Remote,
    Boundary,
}

impl fmt::Display for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Remote => write!(f, "remote"),
            Self::Boundary => write!(f, "boundary"),
        }
    }
}

/// A resolved point with its region and provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub point: GeoPoint,
    pub region: RegionName,
    pub source: RegionSource,
}

/// Failures of a single region lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request to region service failed: {0}")]
    Transport(#[source] ureq::Transport),

    #[error("region service answered with HTTP {status}")]
    Status { status: u16 },

    #[error("invalid response from region service: {0}")]
    InvalidResponse(#[source] std::io::Error),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error("no boundary contains {0}")]
    NotFound(GeoPoint),
}

/// A point could not be turned into a region.
#[derive(Debug, Error)]
#[error("could not resolve region for {point}: {source}")]
pub struct ResolutionError {
    pub point: GeoPoint,
    #[source]
    pub source: LookupError,
}

/// Problems loading an override table.
#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("cannot read override file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid override JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("override entry {index}: {source}")]
    InvalidPoint {
        index: usize,
        #[source]
        source: MalformedPointError,
    },

    #[error("override entry {index} has an empty region name")]
    EmptyRegion { index: usize },
}

/// Problems loading a boundary GeoJSON file.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("cannot read boundary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid boundary GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("boundary GeoJSON must be a FeatureCollection")]
    NotFeatureCollection,

    #[error("no usable boundary features (property '{property}')")]
    Empty { property: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_name_rejects_blank() {
        assert!(RegionName::new("").is_none());
        assert!(RegionName::new("   ").is_none());
        assert_eq!(RegionName::new("Texas").unwrap(), "Texas");
    }

    #[test]
    fn test_source_serializes_lowercase() {
        let json = serde_json::to_string(&RegionSource::Override).unwrap();
        assert_eq!(json, "\"override\"");
        assert_eq!(RegionSource::Boundary.to_string(), "boundary");
    }

    #[test]
    fn test_resolution_serializes_flat() {
        let res = Resolution {
            point: GeoPoint::new(42.5, -83.0).unwrap(),
            region: RegionName::new("Ontario").unwrap(),
            source: RegionSource::Override,
        };
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            serde_json::json!({
                "latitude": 42.5,
                "longitude": -83.0,
                "region": "Ontario",
                "source": "override"
            })
        );
    }

    #[test]
    fn test_resolution_error_keeps_source() {
        use std::error::Error as _;

        let err = ResolutionError {
            point: GeoPoint::new(1.0, 2.0).unwrap(),
            source: LookupError::Status { status: 503 },
        };
        assert_eq!(
            err.to_string(),
            "could not resolve region for POINT(2 1): region service answered with HTTP 503"
        );
        assert!(err.source().is_some());
    }
}
