//! Region lookup providers: the remote state API and offline boundary polygons.

use geo::{Contains, MultiPolygon, Point};
use geojson::{FeatureCollection, GeoJson};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::types::{BoundaryError, LookupError, RegionName, RegionSource};
use crate::point::GeoPoint;

/// Maps a point to the region containing it.
pub trait RegionLookup {
    fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError>;

    /// Provenance reported for regions found by this lookup.
    fn source(&self) -> RegionSource {
        RegionSource::Remote
    }
}

impl<L: RegionLookup + ?Sized> RegionLookup for &L {
    fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError> {
        (**self).lookup(point)
    }

    fn source(&self) -> RegionSource {
        (**self).source()
    }
}

impl<L: RegionLookup + ?Sized> RegionLookup for Box<L> {
    fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError> {
        (**self).lookup(point)
    }

    fn source(&self) -> RegionSource {
        (**self).source()
    }
}

// ─── Remote state API ───────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://us-state-api.herokuapp.com";

const USER_AGENT: &str = concat!("geo-events/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize, Debug)]
pub struct StateLookupResponse {
    #[serde(default)]
    pub state: Option<StateInfo>,
}

#[derive(Deserialize, Debug)]
pub struct StateInfo {
    #[serde(default)]
    pub name: Option<String>,
}

/// Pull `state.name` out of a decoded response.
pub fn state_name(response: StateLookupResponse) -> Result<RegionName, LookupError> {
    response
        .state
        .and_then(|state| state.name)
        .and_then(RegionName::new)
        .ok_or(LookupError::MissingField("state.name"))
}

/// `GET <base>/?lat=..&lon=..` against the US state API. One blocking call
/// per lookup, no retries.
pub struct HttpRegionLookup {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpRegionLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

impl Default for HttpRegionLookup {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl RegionLookup for HttpRegionLookup {
    fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError> {
        let response = self
            .agent
            .get(&self.endpoint())
            .query("lat", &point.latitude().to_string())
            .query("lon", &point.longitude().to_string())
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => LookupError::Status { status },
                ureq::Error::Transport(t) => LookupError::Transport(t),
            })?;

        let body: StateLookupResponse = response
            .into_json()
            .map_err(LookupError::InvalidResponse)?;

        state_name(body)
    }
}

// ─── Offline boundary polygons ──────────────────────────────────

struct Boundary {
    name: RegionName,
    polygon: MultiPolygon<f64>,
}

/// Point-in-polygon lookup over a boundary FeatureCollection. Features are
/// scanned in file order; the first one containing the point wins.
pub struct BoundaryLookup {
    boundaries: Vec<Boundary>,
}

impl BoundaryLookup {
    pub fn from_geojson_file(path: &Path, name_property: &str) -> Result<Self, BoundaryError> {
        let collection = read_feature_collection(path)?;
        Self::from_feature_collection(&collection, name_property)
    }

    pub fn from_feature_collection(
        collection: &FeatureCollection,
        name_property: &str,
    ) -> Result<Self, BoundaryError> {
        let mut boundaries = Vec::new();

        for (i, feature) in collection.features.iter().enumerate() {
            let Some(name) = feature
                .property(name_property)
                .and_then(|v| v.as_str())
                .and_then(RegionName::new)
            else {
                log::warn!("Boundary feature {i} has no '{name_property}' property; skipped");
                continue;
            };

            let Some(polygon) = feature.geometry.clone().and_then(to_multipolygon) else {
                log::warn!("Boundary feature {i} ({name}) is not a polygon; skipped");
                continue;
            };

            boundaries.push(Boundary { name, polygon });
        }

        if boundaries.is_empty() {
            return Err(BoundaryError::Empty {
                property: name_property.to_string(),
            });
        }

        log::info!("Loaded {} region boundaries", boundaries.len());
        Ok(Self { boundaries })
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

impl RegionLookup for BoundaryLookup {
    fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError> {
        let p = Point::new(point.longitude(), point.latitude());
        self.boundaries
            .iter()
            .find(|b| b.polygon.contains(&p))
            .map(|b| b.name.clone())
            .ok_or(LookupError::NotFound(point))
    }

    fn source(&self) -> RegionSource {
        RegionSource::Boundary
    }
}

/// Read a GeoJSON file that must hold a FeatureCollection.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, BoundaryError> {
    let data = fs::read_to_string(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feature_collection(&data)
}

pub fn parse_feature_collection(data: &str) -> Result<FeatureCollection, BoundaryError> {
    match data.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(BoundaryError::NotFeatureCollection),
    }
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}
