//! Region resolution subsystem.
//!
//! Maps a [`GeoPoint`](crate::point::GeoPoint) to a US state or Canadian
//! province: pinned overrides first, then a pluggable lookup (the remote
//! state API, or offline boundary polygons).

pub mod overrides;
pub mod providers;
pub mod resolver;
pub mod types;

pub use overrides::{OverrideTable, RegionOverride};
pub use providers::{BoundaryLookup, HttpRegionLookup, RegionLookup, DEFAULT_BASE_URL};
pub use resolver::RegionResolver;
pub use types::{
    BoundaryError, LookupError, OverrideError, RegionName, RegionSource, Resolution,
    ResolutionError,
};
