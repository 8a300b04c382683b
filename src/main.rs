use clap::{Parser, Subcommand};
use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};

use geo_events::enrich::{Enricher, FailurePolicy};
use geo_events::region::providers::read_feature_collection;
use geo_events::region::{
    BoundaryLookup, HttpRegionLookup, OverrideTable, RegionLookup, RegionName, RegionResolver,
    DEFAULT_BASE_URL,
};
use geo_events::report::{self, Choropleth, ReportSet};
use geo_events::stats::{self, RegionStats, DEFAULT_WINDOW};
use geo_events::{GeoEventsError, LatitudeBound, PointParser};

/// Geo Events: region enrichment and aggregation for geo-tagged events
///
/// Resolves POINT(lon lat) strings to US states / Canadian provinces and
/// summarises event counts and values per region and per day.
///
/// Examples:
///   geo-events resolve "POINT(-122.04619996 47.62540000)"
///   geo-events enrich --input event_data.csv --output event_data_extended.csv
///   geo-events enrich --input event_data.csv --output out.csv --policy sentinel
///   geo-events stats --input event_data_extended.csv --boundaries gz_2010_us_040_00_500k.json
#[derive(Parser)]
#[command(name = "geo-events", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the state lookup service.
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Extra overrides: JSON array of {"latitude", "longitude", "region"}.
    #[arg(long, global = true)]
    overrides: Option<PathBuf>,

    /// Do not use the built-in overrides.
    #[arg(long, global = true)]
    no_builtin_overrides: bool,

    /// Resolve offline against this boundary GeoJSON instead of the service.
    #[arg(long, global = true)]
    offline_boundaries: Option<PathBuf>,

    /// Boundary property holding the region name.
    #[arg(long, global = true, default_value = "NAME")]
    name_property: String,

    /// Reject latitudes outside -90..90 (default only rejects beyond ±180).
    #[arg(long, global = true)]
    strict_latitude: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a single geography point and print it as JSON.
    Resolve {
        #[arg(allow_hyphen_values = true)]
        point: String,
    },

    /// Add a `state` column to an event CSV.
    Enrich {
        #[arg(long, short = 'i')]
        input: PathBuf,

        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Failure policy: "abort", "collect" or "sentinel".
        #[arg(long, default_value = "abort", value_parser = parse_policy)]
        policy: PolicyKind,

        /// Region name used for failed records with --policy sentinel.
        #[arg(long, default_value = "Unknown", value_parser = parse_sentinel)]
        sentinel: RegionName,

        /// Write failed records to this CSV.
        #[arg(long)]
        errors: Option<PathBuf>,
    },

    /// Aggregate an enriched CSV into chart-ready reports.
    Stats {
        #[arg(long, short = 'i')]
        input: PathBuf,

        #[arg(long, default_value = "reports")]
        out_dir: PathBuf,

        /// Boundary GeoJSON for the choropleth outputs.
        #[arg(long)]
        boundaries: Option<PathBuf>,

        /// Boundary property holding the numeric feature id.
        #[arg(long, default_value = "STATE")]
        id_property: String,

        /// Moving-average window in days (odd).
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
    },
}

#[derive(Clone, Copy)]
enum PolicyKind {
    Abort,
    Collect,
    Sentinel,
}

fn parse_policy(s: &str) -> Result<PolicyKind, String> {
    match s.to_lowercase().as_str() {
        "abort" | "abort-fast" => Ok(PolicyKind::Abort),
        "collect" | "collect-errors" => Ok(PolicyKind::Collect),
        "sentinel" => Ok(PolicyKind::Sentinel),
        _ => Err(format!("Unknown policy '{}'. Use 'abort', 'collect' or 'sentinel'.", s)),
    }
}

fn parse_sentinel(s: &str) -> Result<RegionName, String> {
    RegionName::new(s).ok_or_else(|| "Sentinel region name must not be blank.".to_string())
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            log::debug!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), GeoEventsError> {
    let parser = PointParser::new(if cli.strict_latitude {
        LatitudeBound::Geographic
    } else {
        LatitudeBound::Lenient
    });

    match &cli.command {
        Command::Resolve { point } => {
            let resolver = build_resolver(cli)?;
            let resolution = resolver.resolve_raw(&parser, point)?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Command::Enrich {
            input,
            output,
            policy,
            sentinel,
            errors,
        } => {
            let resolver = build_resolver(cli)?;
            let policy = match policy {
                PolicyKind::Abort => FailurePolicy::AbortFast,
                PolicyKind::Collect => FailurePolicy::CollectErrors,
                PolicyKind::Sentinel => FailurePolicy::Sentinel(sentinel.clone()),
            };
            let summary = Enricher::new(&resolver)
                .with_parser(parser)
                .with_policy(policy)
                .enrich_file(input, output)?;

            if let Some(path) = errors {
                report::write_failures(fs::File::create(path)?, &summary.failures)?;
                log::info!("Wrote {} failed records to {}", summary.failures.len(), path.display());
            }
            eprintln!(
                "  {} of {} records written to {} ({} overrides, {} failed)",
                summary.written,
                summary.total,
                output.display(),
                summary.overridden,
                summary.failures.len()
            );
        }
        Command::Stats {
            input,
            out_dir,
            boundaries,
            id_property,
            window,
        } => run_stats(cli, input, out_dir, boundaries.as_deref(), id_property, *window)?,
    }

    Ok(())
}

fn run_stats(
    cli: &Cli,
    input: &Path,
    out_dir: &Path,
    boundaries: Option<&Path>,
    id_property: &str,
    window: usize,
) -> Result<(), GeoEventsError> {
    let events = stats::read_enriched_file(input)?;
    let regions = RegionStats::from_events(&events);
    let daily = stats::moving_average(&events, window)?;

    let collection = boundaries.map(read_feature_collection).transpose()?;
    let rows = collection
        .as_ref()
        .map(|fc| stats::choropleth_rows(&regions, fc, &cli.name_property, id_property))
        .unwrap_or_default();

    let written = report::write_reports(
        out_dir,
        &ReportSet {
            regions: &regions,
            daily: &daily,
            choropleth: collection.as_ref().map(|fc| Choropleth {
                boundaries: fc,
                rows: &rows,
                name_property: &cli.name_property,
            }),
        },
    )?;

    let overall = regions.overall();
    eprintln!(
        "  {} events across {} regions, total value {:.2}; {} reports in {}",
        overall.count,
        regions.len(),
        overall.total,
        written.len(),
        out_dir.display()
    );
    Ok(())
}

fn build_resolver(cli: &Cli) -> Result<RegionResolver<Box<dyn RegionLookup>>, GeoEventsError> {
    let mut overrides = if cli.no_builtin_overrides {
        OverrideTable::empty()
    } else {
        OverrideTable::builtin()
    };
    if let Some(path) = &cli.overrides {
        overrides = overrides.chain(OverrideTable::from_json_file(path)?);
    }
    log::debug!("{} override entries", overrides.len());

    let lookup: Box<dyn RegionLookup> = match &cli.offline_boundaries {
        Some(path) => Box::new(BoundaryLookup::from_geojson_file(path, &cli.name_property)?),
        None => Box::new(HttpRegionLookup::new(cli.base_url.clone())),
    };

    Ok(RegionResolver::new(overrides, lookup))
}
