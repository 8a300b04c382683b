//! Batch enrichment: adds a region column to an event CSV.
//!
//! Records are resolved strictly one after another. Nothing is written
//! until every record has been handled, so an aborted run leaves no
//! partial output behind.

use csv::StringRecord;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{GeoEventsError, RecordError};
use crate::point::PointParser;
use crate::region::{RegionLookup, RegionName, RegionResolver, RegionSource};

pub const ID_COLUMN: &str = "id";
pub const GEO_COLUMN: &str = "geo";
pub const REGION_COLUMN: &str = "state";

const PROGRESS_EVERY: usize = 100;

/// What to do with a record whose point cannot be parsed or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the whole batch on the first failure.
    #[default]
    AbortFast,
    /// Leave failed records out of the output and report them.
    CollectErrors,
    /// Keep failed records, tagged with this region name.
    Sentinel(RegionName),
}

/// A record that failed under a non-aborting policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub row: usize,
    pub id: String,
    pub geo: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub written: usize,
    pub overridden: usize,
    pub substituted: usize,
    pub failures: Vec<RecordFailure>,
}

/// Enriched rows, ready to be written.
#[derive(Debug, Clone)]
pub struct EnrichedTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub summary: EnrichmentSummary,
}

impl EnrichedTable {
    pub fn write<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<(), GeoEventsError> {
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub struct Enricher<'a, L> {
    resolver: &'a RegionResolver<L>,
    parser: PointParser,
    policy: FailurePolicy,
}

impl<'a, L: RegionLookup> Enricher<'a, L> {
    pub fn new(resolver: &'a RegionResolver<L>) -> Self {
        Self {
            resolver,
            parser: PointParser::default(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_parser(mut self, parser: PointParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read `input`, resolve every record and write the result to `output`.
    pub fn enrich_file(&self, input: &Path, output: &Path) -> Result<EnrichmentSummary, GeoEventsError> {
        let table = self.enrich(csv::Reader::from_path(input)?)?;
        let mut writer = csv::Writer::from_path(output)?;
        table.write(&mut writer)?;
        log::info!("Wrote {} enriched records to {}", table.rows.len(), output.display());
        Ok(table.summary)
    }

    pub fn enrich<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<EnrichedTable, GeoEventsError> {
        let mut headers = reader.headers()?.clone();
        let id_idx = column_index(&headers, ID_COLUMN)?;
        let geo_idx = column_index(&headers, GEO_COLUMN)?;
        let region_idx = headers.iter().position(|h| h == REGION_COLUMN);

        let records = reader.records().collect::<Result<Vec<_>, _>>()?;

        // ids must be unique before any lookup is spent
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            let id = record.get(id_idx).unwrap_or_default();
            if !seen.insert(id) {
                return Err(GeoEventsError::DuplicateId(id.to_string()));
            }
        }

        if region_idx.is_none() {
            headers.push_field(REGION_COLUMN);
        }

        let mut summary = EnrichmentSummary {
            total: records.len(),
            ..EnrichmentSummary::default()
        };
        let mut rows = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            let id = record.get(id_idx).unwrap_or_default();
            let geo = record.get(geo_idx).unwrap_or_default();

            let region = match self.resolver.resolve_raw(&self.parser, geo) {
                Ok(resolution) => {
                    if resolution.source == RegionSource::Override {
                        summary.overridden += 1;
                    }
                    resolution.region.into_string()
                }
                Err(source) => match &self.policy {
                    FailurePolicy::AbortFast => {
                        return Err(GeoEventsError::Row {
                            row,
                            id: id.to_string(),
                            source,
                        });
                    }
                    FailurePolicy::CollectErrors => {
                        log::warn!("Skipping row {row} (id '{id}'): {source}");
                        summary.failures.push(failure(row, id, geo, &source));
                        continue;
                    }
                    FailurePolicy::Sentinel(name) => {
                        log::warn!("Row {row} (id '{id}') tagged '{name}': {source}");
                        summary.failures.push(failure(row, id, geo, &source));
                        summary.substituted += 1;
                        name.to_string()
                    }
                },
            };

            rows.push(with_region(record, region_idx, &region));

            if row % PROGRESS_EVERY == 0 {
                log::info!("Resolved {row}/{} records", summary.total);
            }
        }

        summary.written = rows.len();
        log::info!(
            "Enriched {}/{} records ({} overrides, {} failures)",
            summary.written,
            summary.total,
            summary.overridden,
            summary.failures.len()
        );

        Ok(EnrichedTable {
            headers,
            rows,
            summary,
        })
    }
}

fn column_index(headers: &StringRecord, name: &'static str) -> Result<usize, GeoEventsError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or(GeoEventsError::MissingColumn(name))
}

fn with_region(record: &StringRecord, region_idx: Option<usize>, region: &str) -> StringRecord {
    match region_idx {
        Some(idx) => record
            .iter()
            .enumerate()
            .map(|(i, field)| if i == idx { region } else { field })
            .collect(),
        None => {
            let mut out = record.clone();
            out.push_field(region);
            out
        }
    }
}

fn failure(row: usize, id: &str, geo: &str, error: &RecordError) -> RecordFailure {
    RecordFailure {
        row,
        id: id.to_string(),
        geo: geo.to_string(),
        error: error.to_string(),
    }
}
