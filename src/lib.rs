//! Geo Events: resolves `POINT(lon lat)` event locations to US states and
//! Canadian provinces, and aggregates the enriched events per region and
//! per day.
//!
//! Resolution is synchronous and uncached: pinned overrides first, then a
//! single lookup (remote state API or offline boundary polygons).

pub mod enrich;
pub mod error;
pub mod point;
pub mod region;
pub mod report;
pub mod stats;

pub use enrich::{Enricher, EnrichmentSummary, FailurePolicy};
pub use error::{GeoEventsError, RecordError};
pub use point::{parse, GeoPoint, LatitudeBound, MalformedPointError, PointParser};
pub use region::{
    BoundaryLookup, HttpRegionLookup, LookupError, OverrideTable, RegionLookup, RegionName,
    RegionResolver, RegionSource, Resolution, ResolutionError,
};
