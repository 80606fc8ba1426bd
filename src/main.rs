//! CLI entry point for the fleet/fuel reconciliation tool.
//!
//! Provides subcommands for the fuel, fleet and personnel reports, plus
//! helpers to inspect key normalization and the unit alias table.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_fuel_recon::{
    analyzers::{aggregate::GroupBy, outliers::Metric},
    config::{Settings, parse_threshold, source_list},
    filter::RecordFilter,
    loader::Loader,
    model::LocationType,
    normalize::UnitNormalizer,
    output::{append_record, print_json},
    pipeline::{FuelQuery, Pipeline, PersonnelQuery},
    report::{self, DEFAULT_MAX_ROWS},
    source::SourceId,
    stats::FuelStats,
};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fleet_fuel_recon")]
#[command(about = "Reconciles fuel, fleet and personnel spreadsheets", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    /// Directory to write CSV/JSON exports to
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    /// Gzip-compress exports
    #[arg(long, global = true, default_value_t = false)]
    gzip: bool,

    /// Rows shown per console table
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ROWS)]
    max_rows: usize,

    #[command(subcommand)]
    command: Commands,
}

/// Source overrides; each falls back to its environment variable.
#[derive(Args)]
struct SourceArgs {
    /// Fuel records (path or URL) [FUEL_SOURCE]
    #[arg(long, global = true)]
    fuel: Option<String>,
    /// Fleet roster [FLEET_SOURCE]
    #[arg(long, global = true)]
    fleet: Option<String>,
    /// Unit to municipality/neighborhood mapping [GEO_SOURCE]
    #[arg(long, global = true)]
    geo: Option<String>,
    /// Lease rate table [LEASE_SOURCE]
    #[arg(long, global = true)]
    lease: Option<String>,
    /// Personnel rosters, comma-separated [PERSONNEL_SOURCES]
    #[arg(long, global = true)]
    personnel: Option<String>,
    /// Function grades by war name [FUNCTIONS_SOURCE]
    #[arg(long, global = true)]
    functions: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Entities {
    Municipality,
    Neighborhood,
}

impl From<Entities> for LocationType {
    fn from(e: Entities) -> Self {
        match e {
            Entities::Municipality => LocationType::Municipality,
            Entities::Neighborhood => LocationType::Neighborhood,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fuel consumption KPIs, groupings and anomalies
    Fuel {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Units to keep (repeatable); compared by canonical name
        #[arg(long = "unit")]
        units: Vec<String>,

        /// Fuel types to keep (repeatable)
        #[arg(long = "fuel-type")]
        fuel_types: Vec<String>,

        /// unit, plate, fuel-type or month
        #[arg(short, long, default_value = "unit")]
        group_by: GroupBy,

        /// Metric for anomaly detection: liters or amount
        #[arg(short, long, default_value = "liters")]
        metric: Metric,

        /// Z-score threshold [ZSCORE_THRESHOLD]
        #[arg(long, value_parser = threshold_arg)]
        threshold: Option<f64>,

        /// CSV file to append run statistics to
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Fleet composition, duplicate plates and the redistribution plan
    Fleet {
        /// Coverage entity for the vehicles-per-entity ratio
        #[arg(long, value_enum, default_value_t = Entities::Municipality)]
        entities: Entities,
    },
    /// Merged personnel roster, search and headcounts
    Personnel {
        /// Substring matched against name, registration, war name, rank, sector and posting
        #[arg(short, long, default_value = "")]
        search: String,

        /// Statuses to keep (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
    },
    /// Print canonical plate and unit keys for the given values
    Normalize {
        #[arg(value_name = "VALUE", required = true)]
        values: Vec<String>,
    },
    /// Validate and list the unit alias table
    Rules,
}

fn threshold_arg(raw: &str) -> std::result::Result<f64, String> {
    parse_threshold(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_fuel_recon.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_fuel_recon.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    apply_overrides(&mut settings, &cli.sources);

    let rules = settings.alias_rules()?;
    info!(
        version = rules.version(),
        rules = rules.rules().len(),
        enabled = rules.enabled().count(),
        "Unit alias rules loaded"
    );
    let normalizer = UnitNormalizer::new(rules);

    match cli.command {
        Commands::Rules => {
            report::keys::render_rules(normalizer.rules());
        }
        Commands::Normalize { values } => {
            report::keys::render_keys(&values, &normalizer);
        }
        Commands::Fuel {
            from,
            to,
            units,
            fuel_types,
            group_by,
            metric,
            threshold,
            history,
        } => {
            let query = FuelQuery {
                filter: RecordFilter::default()
                    .between(from, to)
                    .units(&units, &normalizer)
                    .fuel_types(&fuel_types),
                group_by,
                metric,
                threshold: threshold.unwrap_or(settings.zscore_threshold),
            };
            let fuel_source = settings.sources.fuel.as_ref().map(SourceId::to_string).unwrap_or_default();
            let mut pipeline = pipeline(&settings, normalizer)?;

            match pipeline.fuel(&query).await {
                Ok(fuel) => {
                    print_json(&fuel.stats)?;
                    report::fuel::render(&fuel, cli.max_rows);
                    if let Some(dir) = &cli.export_dir {
                        let written = report::fuel::export(&fuel, dir, cli.gzip)?;
                        info!(files = written.len(), dir = %dir.display(), "Fuel exports written");
                    }
                    if let Some(path) = &history {
                        append_record(path, &fuel.stats)?;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Fuel run failed");
                    if let Some(path) = &history {
                        let error_stats = FuelStats::from_error(e.kind(), &e.to_string())
                            .with_run_info(&fuel_source, &query.filter.to_string());
                        if let Err(history_err) = append_record(path, &error_stats) {
                            warn!(error = %history_err, path = %path.display(), "Failed to record run history");
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Fleet { entities } => {
            let mut pipeline = pipeline(&settings, normalizer)?;
            let fleet = pipeline.fleet(entities.into()).await?;
            report::fleet::render(&fleet, cli.max_rows);
            if let Some(dir) = &cli.export_dir {
                let written = report::fleet::export(&fleet, dir, cli.gzip)?;
                info!(files = written.len(), dir = %dir.display(), "Fleet exports written");
            }
        }
        Commands::Personnel { search, statuses } => {
            let mut pipeline = pipeline(&settings, normalizer)?;
            let people = pipeline.personnel(&PersonnelQuery { search, statuses }).await?;
            report::personnel::render(&people, cli.max_rows);
            if let Some(dir) = &cli.export_dir {
                let written = report::personnel::export(&people, dir, cli.gzip)?;
                info!(files = written.len(), dir = %dir.display(), "Personnel exports written");
            }
        }
    }

    Ok(())
}

/// CLI source flags take precedence over the environment.
fn apply_overrides(settings: &mut Settings, args: &SourceArgs) {
    let sources = &mut settings.sources;
    let set = |slot: &mut Option<SourceId>, value: &Option<String>| {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            *slot = Some(SourceId::parse(v));
        }
    };
    set(&mut sources.fuel, &args.fuel);
    set(&mut sources.fleet, &args.fleet);
    set(&mut sources.geo, &args.geo);
    set(&mut sources.lease, &args.lease);
    set(&mut sources.functions, &args.functions);
    if let Some(list) = &args.personnel {
        sources.personnel = source_list(list);
    }
}

fn pipeline(
    settings: &Settings,
    normalizer: UnitNormalizer,
) -> Result<Pipeline<Box<dyn fleet_fuel_recon::fetch::HttpClient>>> {
    let loader = Loader::new(
        settings.http_client()?,
        settings.cache_ttl,
        settings.declared_schema()?,
    );
    Ok(Pipeline::new(loader, normalizer, settings.sources.clone()))
}
