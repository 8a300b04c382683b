//! Aggregates over enriched events: per region, per boundary feature and per day.

use chrono::NaiveDate;
use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::enrich::REGION_COLUMN;
use crate::error::GeoEventsError;

pub const VALUE_COLUMN: &str = "eventValue";
pub const CREATED_COLUMN: &str = "created";

/// Centered window for the daily moving average.
pub const DEFAULT_WINDOW: usize = 7;

/// One row of an enriched event file, reduced to what the aggregates need.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedEvent {
    pub region: String,
    /// `None` when the value cell is empty; such events are not counted.
    pub value: Option<f64>,
    pub date: NaiveDate,
}

pub fn read_enriched_file(path: &Path) -> Result<Vec<EnrichedEvent>, GeoEventsError> {
    read_enriched_events(csv::Reader::from_path(path)?)
}

pub fn read_enriched_events<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<EnrichedEvent>, GeoEventsError> {
    let headers = reader.headers()?.clone();
    let idx = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(GeoEventsError::MissingColumn(name))
    };
    let region_idx = idx(REGION_COLUMN)?;
    let value_idx = idx(VALUE_COLUMN)?;
    let created_idx = idx(CREATED_COLUMN)?;

    let mut events = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let raw_value = record.get(value_idx).unwrap_or_default().trim();
        let value = if raw_value.is_empty() {
            None
        } else {
            Some(raw_value.parse::<f64>().map_err(|_| GeoEventsError::InvalidField {
                row,
                column: VALUE_COLUMN,
                value: raw_value.to_string(),
            })?)
        };

        let created = record.get(created_idx).unwrap_or_default();
        let date = parse_day(created).ok_or_else(|| GeoEventsError::InvalidField {
            row,
            column: CREATED_COLUMN,
            value: created.to_string(),
        })?;

        events.push(EnrichedEvent {
            region: record.get(region_idx).unwrap_or_default().to_string(),
            value,
            date,
        });
    }

    log::debug!("Read {} enriched events", events.len());
    Ok(events)
}

/// Calendar day from the first ten characters of a timestamp.
fn parse_day(created: &str) -> Option<NaiveDate> {
    let day = created.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Event count and summed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub count: u64,
    pub total: f64,
}

impl Totals {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.count += 1;
            self.total += v;
        }
    }
}

/// Totals per region, ordered by region name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionStats {
    regions: BTreeMap<String, Totals>,
}

impl RegionStats {
    pub fn from_events(events: &[EnrichedEvent]) -> Self {
        let mut regions: BTreeMap<String, Totals> = BTreeMap::new();
        for event in events.iter().filter(|e| !e.region.is_empty()) {
            regions.entry(event.region.clone()).or_default().add(event.value);
        }
        Self { regions }
    }

    pub fn get(&self, region: &str) -> Option<&Totals> {
        self.regions.get(region)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Totals)> {
        self.regions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Sum over all regions.
    pub fn overall(&self) -> Totals {
        self.regions.values().fold(Totals::default(), |acc, t| Totals {
            count: acc.count + t.count,
            total: acc.total + t.total,
        })
    }
}

// ─── Daily series ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub count: u64,
    pub total: f64,
    pub average_count: f64,
    pub average_total: f64,
}

/// Totals for every day from the first to the last event, zero-filled.
pub fn daily_totals(events: &[EnrichedEvent]) -> Vec<(NaiveDate, Totals)> {
    let mut by_day: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for event in events {
        by_day.entry(event.date).or_default().add(event.value);
    }

    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| (day, by_day.get(&day).copied().unwrap_or_default()))
        .collect()
}

/// Centered moving average over `window` days (odd). Days without a full
/// window on both sides are dropped, so the series loses `window / 2`
/// days at each end.
pub fn moving_average(events: &[EnrichedEvent], window: usize) -> Result<Vec<DailyPoint>, GeoEventsError> {
    if window == 0 || window % 2 == 0 {
        return Err(GeoEventsError::InvalidWindow(window));
    }

    let days = daily_totals(events);
    let half = window / 2;
    let n = days.len();
    if n < window {
        log::warn!("Only {n} days of data; a {window}-day average needs at least {window}");
        return Ok(Vec::new());
    }

    let points = (half..n - half)
        .map(|i| {
            let span = &days[i - half..=i + half];
            let count_sum: u64 = span.iter().map(|(_, t)| t.count).sum();
            let total_sum: f64 = span.iter().map(|(_, t)| t.total).sum();
            let (date, totals) = days[i];
            DailyPoint {
                date,
                count: totals.count,
                total: totals.total,
                average_count: count_sum as f64 / window as f64,
                average_total: total_sum / window as f64,
            }
        })
        .collect();

    Ok(points)
}

// ─── Choropleth ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoroplethRow {
    pub region: String,
    pub id: i64,
    pub count: u64,
    pub total: f64,
}

/// One row per named boundary feature; regions without events get zeros.
/// Regions with events but no boundary (e.g. Canadian provinces on a US
/// map) are left out and logged.
pub fn choropleth_rows(
    stats: &RegionStats,
    boundaries: &FeatureCollection,
    name_property: &str,
    id_property: &str,
) -> Vec<ChoroplethRow> {
    let mut rows = Vec::new();

    for (i, feature) in boundaries.features.iter().enumerate() {
        let Some(name) = feature.property(name_property).and_then(JsonValue::as_str) else {
            log::warn!("Boundary feature {i} has no '{name_property}'; skipped");
            continue;
        };
        let Some(id) = feature.property(id_property).and_then(feature_id) else {
            log::warn!("Boundary feature {i} ({name}) has no numeric '{id_property}'; skipped");
            continue;
        };

        let totals = stats.get(name).copied().unwrap_or_default();
        rows.push(ChoroplethRow {
            region: name.to_string(),
            id,
            count: totals.count,
            total: totals.total,
        });
    }

    let mapped: HashSet<&str> = rows.iter().map(|r| r.region.as_str()).collect();
    let unmapped: Vec<&str> = stats
        .iter()
        .map(|(name, _)| name)
        .filter(|name| !mapped.contains(name))
        .collect();
    if !unmapped.is_empty() {
        log::info!("No boundary for {}; left out of the choropleth", unmapped.join(", "));
    }

    rows
}

/// Feature ids come either as numbers or as zero-padded strings ("06").
fn feature_id(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
