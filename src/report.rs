//! Chart-ready outputs: CSV tables and an annotated boundary GeoJSON.

use geojson::feature::Id;
use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::enrich::RecordFailure;
use crate::error::GeoEventsError;
use crate::stats::{ChoroplethRow, DailyPoint, RegionStats};

pub const REGION_STATS_FILE: &str = "events_per_state.csv";
pub const DAILY_FILE: &str = "daily_moving_average.csv";
pub const CHOROPLETH_CSV_FILE: &str = "choropleth.csv";
pub const CHOROPLETH_GEOJSON_FILE: &str = "choropleth.geojson";

pub const COUNT_PROPERTY: &str = "event_count";
pub const VALUE_PROPERTY: &str = "event_value";

#[derive(Serialize)]
struct RegionRow<'a> {
    state: &'a str,
    count: u64,
    total: f64,
}

const REGION_STATS_HEADER: [&str; 3] = ["state", "count", "total"];
const DAILY_HEADER: [&str; 5] = ["date", "count", "total", "average_count", "average_total"];
const CHOROPLETH_HEADER: [&str; 4] = ["region", "id", "count", "total"];
const FAILURES_HEADER: [&str; 4] = ["row", "id", "geo", "error"];

pub fn write_region_stats<W: Write>(writer: W, stats: &RegionStats) -> Result<(), GeoEventsError> {
    let rows: Vec<RegionRow<'_>> = stats
        .iter()
        .map(|(state, totals)| RegionRow {
            state,
            count: totals.count,
            total: totals.total,
        })
        .collect();
    write_rows(writer, &REGION_STATS_HEADER, &rows)
}

pub fn write_daily_series<W: Write>(writer: W, points: &[DailyPoint]) -> Result<(), GeoEventsError> {
    write_rows(writer, &DAILY_HEADER, points)
}

pub fn write_choropleth_csv<W: Write>(writer: W, rows: &[ChoroplethRow]) -> Result<(), GeoEventsError> {
    write_rows(writer, &CHOROPLETH_HEADER, rows)
}

pub fn write_failures<W: Write>(writer: W, failures: &[RecordFailure]) -> Result<(), GeoEventsError> {
    write_rows(writer, &FAILURES_HEADER, failures)
}

/// The header is written explicitly so an empty table still has one.
fn write_rows<W: Write, T: Serialize>(writer: W, header: &[&str], rows: &[T]) -> Result<(), GeoEventsError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Copy of `boundaries` with each matched feature's `id` set and its
/// count/value attached as properties, ready for a choropleth renderer.
pub fn annotate_boundaries(
    boundaries: &FeatureCollection,
    rows: &[ChoroplethRow],
    name_property: &str,
) -> FeatureCollection {
    let by_name: HashMap<&str, &ChoroplethRow> =
        rows.iter().map(|r| (r.region.as_str(), r)).collect();

    let mut annotated = boundaries.clone();
    for feature in &mut annotated.features {
        let Some(row) = feature
            .property(name_property)
            .and_then(JsonValue::as_str)
            .and_then(|name| by_name.get(name).copied())
        else {
            continue;
        };
        feature.id = Some(Id::Number(row.id.into()));
        feature.set_property(COUNT_PROPERTY, row.count);
        feature.set_property(VALUE_PROPERTY, row.total);
    }
    annotated
}

/// Everything the `stats` command produces.
pub struct ReportSet<'a> {
    pub regions: &'a RegionStats,
    pub daily: &'a [DailyPoint],
    pub choropleth: Option<Choropleth<'a>>,
}

pub struct Choropleth<'a> {
    pub boundaries: &'a FeatureCollection,
    pub rows: &'a [ChoroplethRow],
    pub name_property: &'a str,
}

/// Write all reports into `out_dir`, creating it if needed. Returns the
/// written paths.
pub fn write_reports(out_dir: &Path, reports: &ReportSet<'_>) -> Result<Vec<PathBuf>, GeoEventsError> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    let path = out_dir.join(REGION_STATS_FILE);
    write_region_stats(fs::File::create(&path)?, reports.regions)?;
    written.push(path);

    let path = out_dir.join(DAILY_FILE);
    write_daily_series(fs::File::create(&path)?, reports.daily)?;
    written.push(path);

    if let Some(choropleth) = &reports.choropleth {
        let path = out_dir.join(CHOROPLETH_CSV_FILE);
        write_choropleth_csv(fs::File::create(&path)?, choropleth.rows)?;
        written.push(path);

        let annotated =
            annotate_boundaries(choropleth.boundaries, choropleth.rows, choropleth.name_property);
        let path = out_dir.join(CHOROPLETH_GEOJSON_FILE);
        fs::write(&path, serde_json::to_string(&annotated)?)?;
        written.push(path);
    }

    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::providers::parse_feature_collection;
    use crate::stats::{EnrichedEvent, RegionStats};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn stats() -> RegionStats {
        let date = NaiveDate::from_ymd_opt(2022, 8, 1).unwrap();
        RegionStats::from_events(&[
            EnrichedEvent { region: "Texas".into(), value: Some(2.5), date },
            EnrichedEvent { region: "Ohio".into(), value: Some(1.0), date },
            EnrichedEvent { region: "Texas".into(), value: Some(0.5), date },
        ])
    }

    fn boundaries() -> FeatureCollection {
        parse_feature_collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"NAME": "Texas", "STATE": "48"}, "geometry": null},
                {"type": "Feature", "properties": {"NAME": "Utah", "STATE": "49"}, "geometry": null}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_write_region_stats() {
        let mut out = Vec::new();
        write_region_stats(&mut out, &stats()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "state,count,total\nOhio,1,1.0\nTexas,2,3.0\n"
        );
    }

    #[test]
    fn test_write_daily_series() {
        let point = DailyPoint {
            date: NaiveDate::from_ymd_opt(2022, 9, 4).unwrap(),
            count: 4,
            total: 40.0,
            average_count: 4.0,
            average_total: 40.0,
        };
        let mut out = Vec::new();
        write_daily_series(&mut out, &[point]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("date,count,total,average_count,average_total"));
        assert_eq!(lines.next(), Some("2022-09-04,4,40.0,4.0,40.0"));
    }

    #[test]
    fn test_write_failures() {
        let failure = RecordFailure {
            row: 2,
            id: "x".into(),
            geo: "POINT(1)".into(),
            error: "bad point".into(),
        };
        let mut out = Vec::new();
        write_failures(&mut out, &[failure]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "row,id,geo,error\n2,x,POINT(1),bad point\n");
    }

    #[test]
    fn test_annotate_boundaries() {
        let rows = vec![
            ChoroplethRow { region: "Texas".into(), id: 48, count: 2, total: 3.0 },
            ChoroplethRow { region: "Utah".into(), id: 49, count: 0, total: 0.0 },
        ];
        let annotated = annotate_boundaries(&boundaries(), &rows, "NAME");

        let texas = &annotated.features[0];
        assert_eq!(texas.id, Some(Id::Number(48.into())));
        assert_eq!(texas.property(COUNT_PROPERTY), Some(&serde_json::json!(2)));
        assert_eq!(texas.property(VALUE_PROPERTY), Some(&serde_json::json!(3.0)));
        assert_eq!(annotated.features[1].property(COUNT_PROPERTY), Some(&serde_json::json!(0)));
    }

    #[test]
    fn test_write_reports() {
        let dir = TempDir::new().unwrap();
        let out_dir = dir.path().join("reports");
        let stats = stats();
        let boundaries = boundaries();
        let rows = crate::stats::choropleth_rows(&stats, &boundaries, "NAME", "STATE");

        let written = write_reports(
            &out_dir,
            &ReportSet {
                regions: &stats,
                daily: &[],
                choropleth: Some(Choropleth {
                    boundaries: &boundaries,
                    rows: &rows,
                    name_property: "NAME",
                }),
            },
        )
        .unwrap();

        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|p| p.exists()));

        let geojson = fs::read_to_string(out_dir.join(CHOROPLETH_GEOJSON_FILE)).unwrap();
        let annotated = parse_feature_collection(&geojson).unwrap();
        assert_eq!(annotated.features.len(), 2);
        assert_eq!(annotated.features[1].property(COUNT_PROPERTY), Some(&serde_json::json!(0)));

        let csv = fs::read_to_string(out_dir.join(CHOROPLETH_CSV_FILE)).unwrap();
        assert!(csv.starts_with("region,id,count,total\nTexas,48,2,3.0\n"));
    }

    #[test]
    fn test_write_reports_without_boundaries() {
        let dir = TempDir::new().unwrap();
        let written = write_reports(
            dir.path(),
            &ReportSet { regions: &stats(), daily: &[], choropleth: None },
        )
        .unwrap();
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_empty_tables_keep_headers() {
        let dir = TempDir::new().unwrap();
        write_reports(
            dir.path(),
            &ReportSet { regions: &RegionStats::default(), daily: &[], choropleth: None },
        )
        .unwrap();

        let daily = fs::read_to_string(dir.path().join(DAILY_FILE)).unwrap();
        assert_eq!(daily, "date,count,total,average_count,average_total\n");
        let per_state = fs::read_to_string(dir.path().join(REGION_STATS_FILE)).unwrap();
        assert_eq!(per_state, "state,count,total\n");

        let mut failures = Vec::new();
        write_failures(&mut failures, &[]).unwrap();
        assert_eq!(String::from_utf8(failures).unwrap(), "row,id,geo,error\n");

        let mut choropleth = Vec::new();
        write_choropleth_csv(&mut choropleth, &[]).unwrap();
        assert_eq!(String::from_utf8(choropleth).unwrap(), "region,id,count,total\n");
    }
}
