//! Region resolver: override table first, then the injected lookup.
//!
//! Nothing is cached. Each call re-checks the table and, on a miss,
//! performs exactly one lookup.

use super::overrides::OverrideTable;
use super::providers::{HttpRegionLookup, RegionLookup};
use super::types::{RegionName, RegionSource, Resolution, ResolutionError};
use crate::error::RecordError;
use crate::point::{GeoPoint, PointParser};

pub struct RegionResolver<L> {
    overrides: OverrideTable,
    lookup: L,
}

impl<L: RegionLookup> RegionResolver<L> {
    pub fn new(overrides: OverrideTable, lookup: L) -> Self {
        Self { overrides, lookup }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Name of the region containing `point`.
    pub fn resolve(&self, point: GeoPoint) -> Result<RegionName, ResolutionError> {
        self.resolve_detailed(point).map(|r| r.region)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the name came from.
    pub fn resolve_detailed(&self, point: GeoPoint) -> Result<Resolution, ResolutionError> {
        if let Some(entry) = self.overrides.find(point) {
            log::debug!("{point} -> {} (override)", entry.region);
            return Ok(Resolution {
                point,
                region: entry.region.clone(),
                source: RegionSource::Override,
            });
        }

        let region = self
            .lookup
            .lookup(point)
            .map_err(|source| ResolutionError { point, source })?;
        let source = self.lookup.source();
        log::debug!("{point} -> {region} ({source})");

        Ok(Resolution {
            point,
            region,
            source,
        })
    }

    /// Parse a raw geography string, then resolve it.
    pub fn resolve_raw(&self, parser: &PointParser, raw: &str) -> Result<Resolution, RecordError> {
        let point = parser.parse(raw)?;
        Ok(self.resolve_detailed(point)?)
    }
}

impl RegionResolver<HttpRegionLookup> {
    /// Built-in overrides in front of the public state API.
    pub fn with_defaults() -> Self {
        Self::new(OverrideTable::builtin(), HttpRegionLookup::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::types::LookupError;
    use std::cell::RefCell;

    /// Answers from a fixed name and records every call.
    struct FakeLookup {
        answer: Option<&'static str>,
        calls: RefCell<Vec<GeoPoint>>,
    }

    impl FakeLookup {
        fn answering(name: &'static str) -> Self {
            Self { answer: Some(name), calls: RefCell::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { answer: None, calls: RefCell::new(Vec::new()) }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl RegionLookup for FakeLookup {
        fn lookup(&self, point: GeoPoint) -> Result<RegionName, LookupError> {
            self.calls.borrow_mut().push(point);
            match self.answer {
                Some(name) => Ok(RegionName::new(name).unwrap()),
                None => Err(LookupError::Status { status: 503 }),
            }
        }
    }

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_override_ontario_skips_lookup() {
        let resolver = RegionResolver::new(OverrideTable::builtin(), FakeLookup::answering("Michigan"));
        let region = resolver.resolve(point(42.31954001, -83.02434)).unwrap();
        assert_eq!(region, "Ontario");
        assert_eq!(resolver.lookup().call_count(), 0);
    }

    #[test]
    fn test_override_delaware_skips_lookup() {
        let resolver = RegionResolver::new(OverrideTable::builtin(), FakeLookup::failing());
        let res = resolver.resolve_detailed(point(38.72090002, -75.076)).unwrap();
        assert_eq!(res.region, "Delaware");
        assert_eq!(res.source, RegionSource::Override);
        assert_eq!(resolver.lookup().call_count(), 0);
    }

    #[test]
    fn test_lookup_called_once_on_miss() {
        let resolver = RegionResolver::new(OverrideTable::builtin(), FakeLookup::answering("Washington"));
        let p = point(47.6254, -122.04619996);
        let res = resolver.resolve_detailed(p).unwrap();
        assert_eq!(res.region, "Washington");
        assert_eq!(res.source, RegionSource::Remote);
        assert_eq!(*resolver.lookup().calls.borrow(), vec![p]);
    }

    #[test]
    fn test_lookup_failure_becomes_resolution_error() {
        let resolver = RegionResolver::new(OverrideTable::builtin(), FakeLookup::failing());
        let p = point(30.0, -97.0);
        let err = resolver.resolve(p).unwrap_err();
        assert_eq!(err.point, p);
        assert!(matches!(err.source, LookupError::Status { status: 503 }));
    }

    #[test]
    fn test_repeated_resolve_is_not_cached() {
        let resolver = RegionResolver::new(OverrideTable::empty(), FakeLookup::answering("Texas"));
        let p = point(30.0, -97.0);
        assert_eq!(resolver.resolve(p).unwrap(), resolver.resolve(p).unwrap());
        assert_eq!(resolver.lookup().call_count(), 2);
    }

    #[test]
    fn test_custom_table_replaces_builtin() {
        let resolver = RegionResolver::new(OverrideTable::empty(), FakeLookup::answering("Michigan"));
        assert_eq!(resolver.resolve(point(42.31954001, -83.02434)).unwrap(), "Michigan");
    }

    #[test]
    fn test_resolve_raw() {
        let resolver = RegionResolver::new(OverrideTable::builtin(), FakeLookup::answering("Ohio"));
        let parser = PointParser::default();

        let res = resolver.resolve_raw(&parser, "POINT(-83.02434 42.31954001)").unwrap();
        assert_eq!(res.region, "Ontario");

        let err = resolver.resolve_raw(&parser, "POINT(1)").unwrap_err();
        assert!(matches!(err, RecordError::Point(_)));
        assert_eq!(resolver.lookup().call_count(), 0);
    }

    #[test]
    fn test_lookup_through_reference() {
        let fake = FakeLookup::answering("Iowa");
        let resolver = RegionResolver::new(OverrideTable::empty(), &fake);
        assert_eq!(resolver.resolve(point(42.0, -93.0)).unwrap(), "Iowa");
        assert_eq!(fake.call_count(), 1);
    }
}
