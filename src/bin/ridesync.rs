//! RideSync CLI - Command-line interface for RideSync
//!
//! Commands:
//! - sync: Sync workouts from an activity export into rides
//! - zones: Heart rate zone distribution for one workout
//! - colors: Route colors for one workout and metric
//! - trends: Summarize a trends file
//! - doctor: Diagnose configuration and input files

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ridesync::adapters::{ExportAdapter, MemoryStore, WorkoutStore};
use ridesync::assembler::RideAssembler;
use ridesync::normalizer::{route_colors, ScalingMode};
use ridesync::trends::{TrendAggregator, TrendSummary};
use ridesync::types::{MetricKind, Ride, WorkoutHandle};
use ridesync::zones::{Zone, ZoneClassifier};
use ridesync::{
    init_logging, AssemblyError, ComputeError, LogFormat, LoggingConfig, SyncConfig, SyncError,
    SyncPipeline, PRODUCER_NAME, RIDESYNC_VERSION,
};

/// RideSync - Cycling workout sync and derived-metrics engine
#[derive(Parser)]
#[command(name = "ridesync")]
#[command(version = RIDESYNC_VERSION)]
#[command(about = "Turn recorded cycling workouts into enriched ride records", long_about = None)]
struct Cli {
    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync workouts from an activity export into rides
    Sync {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Only sync workouts started at or after this instant (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Sync configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum heart rate (overrides config)
        #[arg(long)]
        max_hr: Option<f64>,

        /// Workouts assembled concurrently (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Trends file to update with the synced rides
        #[arg(long)]
        trends: Option<PathBuf>,
    },

    /// Heart rate zone distribution for one workout
    Zones {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Workout identifier
        #[arg(short, long)]
        workout: String,

        /// Sync configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum heart rate (overrides config)
        #[arg(long)]
        max_hr: Option<f64>,

        /// Resting heart rate, enables heart-rate-reserve zones (overrides config)
        #[arg(long)]
        resting_hr: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route colors for one workout and metric
    Colors {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Workout identifier
        #[arg(short, long)]
        workout: String,

        /// Metric used for coloring
        #[arg(long, default_value = "speed")]
        metric: MetricArg,

        /// Response curve
        #[arg(long, default_value = "linear")]
        curve: CurveArg,

        /// Curve parameter (exponent base or sigmoid steepness)
        #[arg(long, default_value = "2.0")]
        curve_param: f64,
    },

    /// Summarize a trends file
    Trends {
        /// Trends file path
        #[arg(short, long)]
        trends: PathBuf,

        /// Sync configuration file (supplies the default window)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Percent-change window in days (overrides config)
        #[arg(long)]
        window_days: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input files
    Doctor {
        /// Check an export file
        #[arg(long)]
        input: Option<PathBuf>,

        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a trends file
        #[arg(long)]
        trends: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one ride per line)
    Ndjson,
    /// JSON array of rides
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[derive(Clone, ValueEnum)]
enum MetricArg {
    HeartRate,
    Speed,
    Altitude,
}

#[derive(Clone, ValueEnum)]
enum CurveArg {
    Linear,
    Exponential,
    Logarithmic,
    Sigmoid,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl From<MetricArg> for MetricKind {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::HeartRate => MetricKind::HeartRate,
            MetricArg::Speed => MetricKind::Speed,
            MetricArg::Altitude => MetricKind::Altitude,
        }
    }
}

impl CurveArg {
    fn scaling_mode(&self, param: f64) -> ScalingMode {
        match self {
            CurveArg::Linear => ScalingMode::Linear,
            CurveArg::Exponential => ScalingMode::Exponential { base: param },
            CurveArg::Logarithmic => ScalingMode::Logarithmic,
            CurveArg::Sigmoid => ScalingMode::Sigmoid { steepness: param },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level(cli.log_level.clone())
        .with_format(cli.log_format.clone().into());
    if let Err(e) = init_logging(&logging) {
        eprintln!("failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RideSyncCliError> {
    match cli.command {
        Commands::Sync {
            input,
            output,
            output_format,
            since,
            config,
            max_hr,
            concurrency,
            trends,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(max_hr) = max_hr {
                config = config.with_max_heart_rate(max_hr);
            }
            if let Some(concurrency) = concurrency {
                config = config.with_max_concurrent_workouts(concurrency);
            }
            config.validate()?;
            cmd_sync(&input, &output, output_format, since, config, trends.as_deref()).await
        }

        Commands::Zones {
            input,
            workout,
            config,
            max_hr,
            resting_hr,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(max_hr) = max_hr {
                config = config.with_max_heart_rate(max_hr);
            }
            if resting_hr.is_some() {
                config = config.with_resting_heart_rate(resting_hr);
            }
            config.validate()?;
            cmd_zones(&input, &workout, config, json).await
        }

        Commands::Colors {
            input,
            workout,
            metric,
            curve,
            curve_param,
        } => cmd_colors(&input, &workout, metric.into(), curve.scaling_mode(curve_param)).await,

        Commands::Trends {
            trends,
            config,
            window_days,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(window_days) = window_days {
                config = config.with_trend_window_days(window_days);
            }
            config.validate()?;
            cmd_trends(&trends, &config, json)
        }

        Commands::Doctor {
            input,
            config,
            trends,
            json,
        } => cmd_doctor(input.as_deref(), config.as_deref(), trends.as_deref(), json),
    }
}

async fn cmd_sync(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    since: Option<DateTime<Utc>>,
    config: SyncConfig,
    trends_path: Option<&Path>,
) -> Result<(), RideSyncCliError> {
    let store = load_store(input)?;
    let since = since.unwrap_or_else(|| earliest_start(&store));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling sync");
            on_interrupt.cancel();
        }
    });

    let pipeline = SyncPipeline::new(Arc::new(store), config);
    let report = match trends_path {
        // Load existing trends, append and save
        Some(path) => {
            let mut trends = if path.exists() {
                TrendAggregator::from_json(&fs::read_to_string(path)?)?
            } else {
                TrendAggregator::new()
            };
            let report = pipeline.sync_into(since, &cancel, &mut trends).await?;
            fs::write(path, trends.to_json()?)?;
            for line in pipeline.trend_summary(&trends) {
                info!(
                    metric = ?line.metric,
                    average = ?line.current_average,
                    change_pct = line.percent_change,
                    "trend"
                );
            }
            info!(path = %path.display(), "trends updated");
            report
        }
        None => pipeline.sync_with_cancel(since, &cancel).await?,
    };
    if report.is_partial() {
        warn!(failed = report.failure_count(), "some workouts could not be synced");
    }

    let output_data = format_output(&report.rides, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

async fn cmd_zones(input: &Path, workout_id: &str, config: SyncConfig, json: bool) -> Result<(), RideSyncCliError> {
    let max_hr = config.max_heart_rate;
    let resting_hr = config.resting_heart_rate;
    let ride = assemble_one(input, workout_id, config).await?;

    let durations = ZoneClassifier::aggregate_durations(&ride.heart_rate, max_hr, resting_hr);
    let percentages = durations.percentages();
    let seconds = durations.to_seconds();

    let report = ZoneReport {
        workout_id: ride.workout_id.clone(),
        max_heart_rate: max_hr,
        resting_heart_rate: resting_hr,
        zones: Zone::ALL
            .iter()
            .map(|zone| ZoneLine {
                zone: *zone,
                name: zone.name().to_string(),
                color: zone.color().to_hex(),
                seconds: seconds.get(zone).copied().unwrap_or(0.0),
                share: percentages.get(zone).copied().unwrap_or(0.0),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Zones for workout {}", report.workout_id);
        println!("=========================");
        for line in &report.zones {
            println!(
                "  {:<11} {:>8.0}s {:>6.1}%",
                line.name,
                line.seconds,
                line.share * 100.0
            );
        }
    }

    Ok(())
}

async fn cmd_colors(
    input: &Path,
    workout_id: &str,
    metric: MetricKind,
    mode: ScalingMode,
) -> Result<(), RideSyncCliError> {
    let ride = assemble_one(input, workout_id, SyncConfig::default()).await?;
    let series = metric.series(&ride);
    let colors = route_colors(&ride, metric, mode);

    let points: Vec<ColorPoint> = series
        .iter()
        .zip(colors)
        .map(|(entry, color)| ColorPoint {
            timestamp: entry.timestamp,
            value: entry.value,
            color: color.to_hex(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}

fn cmd_trends(path: &Path, config: &SyncConfig, json: bool) -> Result<(), RideSyncCliError> {
    let trends = TrendAggregator::from_json(&fs::read_to_string(path)?)?;
    let window = config.trend_window();
    let summary = trends.summary(window);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Trends ({} day window)", window.num_days());
        println!("======================");
        for line in &summary {
            print_trend_line(line);
        }
    }
    Ok(())
}

fn print_trend_line(line: &TrendSummary) {
    match line.current_average {
        Some(avg) => println!(
            "  {:<20} avg {:>8.1} {:<5} change {:>+5.0}% ({} rides)",
            format!("{:?}", line.metric),
            avg,
            line.unit,
            line.percent_change,
            line.count
        ),
        None => println!("  {:<20} no data", format!("{:?}", line.metric)),
    }
}

fn cmd_doctor(
    input: Option<&Path>,
    config: Option<&Path>,
    trends: Option<&Path>,
    json: bool,
) -> Result<(), RideSyncCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "ridesync_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("RideSync version {}", RIDESYNC_VERSION),
    });

    if let Some(path) = input {
        checks.push(check_file("export", path, |content| {
            let workouts = ExportAdapter::parse(content)?;
            Ok(format!("Export file valid ({} workouts)", workouts.len()))
        }));
    }

    if let Some(path) = config {
        checks.push(check_file("config", path, |content| {
            let config = SyncConfig::from_json(content)?;
            Ok(format!(
                "Config valid (max HR {}, {} concurrent workouts)",
                config.max_heart_rate,
                config.concurrency()
            ))
        }));
    }

    if let Some(path) = trends {
        checks.push(check_file("trends", path, |content| {
            let trends = TrendAggregator::from_json(content)?;
            Ok(format!(
                "Trends file valid ({} rides of speed data)",
                trends.len(ridesync::TrendMetric::AverageSpeed)
            ))
        }));
    }

    // Check stdin is available (for `--input -`)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (export can be piped in)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: RIDESYNC_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("RideSync Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(RideSyncCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn check_file(
    name: &str,
    path: &Path,
    validate: impl FnOnce(&str) -> Result<String, RideSyncCliError>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    let (status, message) = match fs::read_to_string(path) {
        Ok(content) => match validate(&content) {
            Ok(message) => (CheckStatus::Ok, message),
            Err(e) => (CheckStatus::Error, CliError::from(e).message),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read {}: {}", path.display(), e)),
    };

    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

fn read_input(path: &Path) -> Result<String, RideSyncCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_store(input: &Path) -> Result<MemoryStore, RideSyncCliError> {
    let store = ExportAdapter::load(&read_input(input)?)?;
    if store.workouts().is_empty() {
        return Err(RideSyncCliError::NoWorkouts);
    }
    Ok(store)
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig, RideSyncCliError> {
    match path {
        Some(path) => Ok(SyncConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(SyncConfig::default()),
    }
}

fn earliest_start(store: &MemoryStore) -> DateTime<Utc> {
    store
        .workouts()
        .iter()
        .map(|s| s.workout.start)
        .min()
        .unwrap_or_else(Utc::now)
}

fn find_workout(store: &MemoryStore, workout_id: &str) -> Result<WorkoutHandle, RideSyncCliError> {
    store
        .workouts()
        .iter()
        .find(|s| s.workout.id == workout_id)
        .map(|s| s.workout.clone())
        .ok_or_else(|| RideSyncCliError::WorkoutNotFound(workout_id.to_string()))
}

async fn assemble_one(input: &Path, workout_id: &str, config: SyncConfig) -> Result<Ride, RideSyncCliError> {
    let store = load_store(input)?;
    let workout = find_workout(&store, workout_id)?;
    let store: Arc<dyn WorkoutStore> = Arc::new(store);
    let assembler = RideAssembler::new(store, config);
    Ok(assembler.assemble(&workout, &CancellationToken::new()).await?)
}

fn format_output(rides: &[Ride], format: &OutputFormat) -> Result<String, RideSyncCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for ride in rides {
                lines.push(serde_json::to_string(ride)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(rides)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(rides)?),
    }
}

// Error types

#[derive(Debug)]
enum RideSyncCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Sync(SyncError),
    Assembly(AssemblyError),
    NoWorkouts,
    WorkoutNotFound(String),
    DoctorFailed,
}

impl From<io::Error> for RideSyncCliError {
    fn from(e: io::Error) -> Self {
        RideSyncCliError::Io(e)
    }
}

impl From<ComputeError> for RideSyncCliError {
    fn from(e: ComputeError) -> Self {
        RideSyncCliError::Compute(e)
    }
}

impl From<serde_json::Error> for RideSyncCliError {
    fn from(e: serde_json::Error) -> Self {
        RideSyncCliError::Json(e)
    }
}

impl From<SyncError> for RideSyncCliError {
    fn from(e: SyncError) -> Self {
        RideSyncCliError::Sync(e)
    }
}

impl From<AssemblyError> for RideSyncCliError {
    fn from(e: AssemblyError) -> Self {
        RideSyncCliError::Assembly(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RideSyncCliError> for CliError {
    fn from(e: RideSyncCliError) -> Self {
        match e {
            RideSyncCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RideSyncCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the ridesync.export.v1 format".to_string()),
            },
            RideSyncCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RideSyncCliError::Sync(SyncError::Cancelled) => CliError {
                code: "CANCELLED".to_string(),
                message: "Sync was cancelled".to_string(),
                hint: None,
            },
            RideSyncCliError::Sync(e) => CliError {
                code: "FETCH_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that the activity store is readable".to_string()),
            },
            RideSyncCliError::Assembly(e) => CliError {
                code: "ASSEMBLY_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("The workout needs heart rate samples".to_string()),
            },
            RideSyncCliError::NoWorkouts => CliError {
                code: "NO_WORKOUTS".to_string(),
                message: "No workouts found in input".to_string(),
                hint: Some("Ensure the export file is not empty".to_string()),
            },
            RideSyncCliError::WorkoutNotFound(id) => CliError {
                code: "WORKOUT_NOT_FOUND".to_string(),
                message: format!("Workout '{}' not found", id),
                hint: Some("Run 'ridesync sync' to list workout ids".to_string()),
            },
            RideSyncCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ZoneReport {
    workout_id: String,
    max_heart_rate: f64,
    resting_heart_rate: Option<f64>,
    zones: Vec<ZoneLine>,
}

#[derive(serde::Serialize)]
struct ZoneLine {
    zone: Zone,
    name: String,
    color: String,
    seconds: f64,
    share: f64,
}

#[derive(serde::Serialize)]
struct ColorPoint {
    timestamp: DateTime<Utc>,
    value: f64,
    color: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
