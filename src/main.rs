use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crowdwatch::ai::{
    AnalysisOrchestrator, AnalysisRequest, AnalysisResult, ProviderGateway, TaskPayload, TaskType,
};
use crowdwatch::aggregator::ZoneAggregator;
use crowdwatch::alerts::{Alert, AlertComposer};
use crowdwatch::config::Config;
use crowdwatch::error::{AnalysisError, ConfigError};
use crowdwatch::events::NewSample;
use crowdwatch::telemetry::{SampleFilter, TelemetryStore};
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line arguments for crowdwatch
#[derive(Parser)]
#[command(
    name = "crowdwatch",
    about = "Crowd-density telemetry and AI-assisted event safety analysis",
    long_about = "Stores per-zone crowd-density samples, summarizes them into zone snapshots, \
                  and asks AI providers for safety plans, flow predictions, incident \
                  classification, live monitoring, reports and assistant replies."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append samples from a JSON-lines file to the telemetry journal
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print zone snapshots as JSON
    Zones {
        /// Only samples from this event
        #[arg(long, value_name = "ID")]
        event: Option<String>,

        /// Only this zone
        #[arg(long, value_name = "ID")]
        zone: Option<String>,

        /// Print the most recent sample per zone instead of snapshots
        #[arg(long, conflicts_with = "hourly")]
        latest: bool,

        /// Print per-hour averages instead of snapshots
        #[arg(long)]
        hourly: bool,
    },

    /// Run one analysis task and print the result as JSON
    Analyze {
        /// Task name (e.g. safety-planning, crowd-flow, anomaly, live-monitoring, report, chat)
        #[arg(value_name = "TASK")]
        task: TaskType,

        /// JSON file holding the task payload
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,

        /// Include zone snapshots from the telemetry journal in the prompt
        #[arg(long)]
        with_snapshot: bool,

        /// Restrict the snapshot to one event
        #[arg(long, value_name = "ID", requires = "with_snapshot")]
        event: Option<String>,
    },
}

/// Load configuration from file or use defaults
///
/// A missing or unreadable file falls back to defaults. A directory, or a
/// file that parses but fails validation, is an error.
fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = config_path else {
        info!("Using default configuration");
        return Ok(Config::default());
    };

    if path.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "--config must name a file, {} is a directory",
            path.display()
        )));
    }

    info!("Loading configuration from: {}", path.display());
    match Config::from_file(path) {
        Err(ConfigError::ReadError(e)) => {
            warn!("Configuration file unreadable ({}), using defaults", e);
            Ok(Config::default())
        }
        loaded => loaded,
    }
}

/// Parse a JSON-lines file of samples, skipping blank lines
fn read_samples(path: &Path) -> Result<Vec<NewSample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read samples from {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid sample", path.display(), i + 1))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_ingest(config: &Config, file: &Path) -> Result<()> {
    let samples = read_samples(file)?;
    let store = TelemetryStore::open(&config.telemetry.journal_path).with_context(|| {
        format!(
            "Failed to open journal {}",
            config.telemetry.journal_path.display()
        )
    })?;

    let stored = store.append_batch(samples)?;
    info!(
        "Ingested {} samples, journal now holds {}",
        stored.len(),
        store.len()
    );
    println!("{}", stored.len());
    Ok(())
}

fn run_zones(
    config: &Config,
    event: Option<String>,
    zone: Option<String>,
    latest: bool,
    hourly: bool,
) -> Result<()> {
    let store = TelemetryStore::open_read_only(&config.telemetry.journal_path)?;

    if latest {
        let mut samples = store.latest_by_zone(event.as_deref());
        if let Some(zone) = &zone {
            samples.retain(|s| &s.zone_id == zone);
        }
        return print_json(&samples);
    }

    let mut filter = match event {
        Some(event) => SampleFilter::for_event(event),
        None => SampleFilter::default(),
    };
    if let Some(zone) = zone {
        filter = filter.zone(zone);
    }

    if hourly {
        let query = store.query(filter);
        print_json(&ZoneAggregator::hourly_profile(query.iter()))
    } else {
        print_json(&store.aggregate(filter))
    }
}

#[derive(Serialize)]
struct AnalysisOutput {
    result: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    alerts: Option<Vec<Alert>>,
}

async fn run_analyze(
    config: &Config,
    task: TaskType,
    payload_path: &Path,
    with_snapshot: bool,
    event: Option<String>,
) -> Result<()> {
    let raw = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read payload {}", payload_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Payload {} is not valid JSON", payload_path.display()))?;
    let payload = TaskPayload::from_value(task, value)
        .with_context(|| format!("Payload does not match task {}", task))?;

    let mut request = AnalysisRequest::new(payload);
    if with_snapshot {
        let store = TelemetryStore::open_read_only(&config.telemetry.journal_path)?;
        let filter = match event {
            Some(event) => SampleFilter::for_event(event),
            None => SampleFilter::default(),
        };
        request = request.with_snapshot(store.aggregate(filter));
    }

    let gateway = ProviderGateway::from_config(config)?;
    let orchestrator = AnalysisOrchestrator::new(Arc::new(gateway));

    let result = match orchestrator.analyze(&request).await {
        Ok(result) => result,
        Err(AnalysisError::ProviderExhausted { attempts }) => {
            for attempt in &attempts {
                error!(
                    "  {}/{}: {}",
                    attempt.provider, attempt.model, attempt.error
                );
            }
            bail!("All {} provider candidates failed", attempts.len());
        }
    };

    let alerts = match &request.payload {
        TaskPayload::LiveMonitoring(status) => {
            let composer = AlertComposer::from_config(&config.alerts);
            Some(composer.compose(&result, &status.recent_incidents))
        }
        _ => None,
    };

    print_json(&AnalysisOutput { result, alerts })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Ingest { file } => run_ingest(&config, &file),
        Command::Zones {
            event,
            zone,
            latest,
            hourly,
        } => run_zones(&config, event, zone, latest, hourly),
        Command::Analyze {
            task,
            payload,
            with_snapshot,
            event,
        } => run_analyze(&config, task, &payload, with_snapshot, event).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from([
            "crowdwatch",
            "analyze",
            "live-monitoring",
            "--payload",
            "status.json",
            "--with-snapshot",
            "--event",
            "evt-1",
            "--verbose",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Analyze {
                task,
                payload,
                with_snapshot,
                event,
            } => {
                assert_eq!(task, TaskType::LiveMonitoring);
                assert_eq!(payload, PathBuf::from("status.json"));
                assert!(with_snapshot);
                assert_eq!(event.as_deref(), Some("evt-1"));
            }
            _ => panic!("Expected analyze command"),
        }

        assert!(Cli::try_parse_from(["crowdwatch", "analyze", "bogus", "--payload", "p.json"]).is_err());
        assert!(Cli::try_parse_from(["crowdwatch", "zones", "--latest", "--hourly"]).is_err());
    }

    #[test]
    fn test_load_config_falls_back_on_missing_file() {
        let config = load_config(Some(Path::new("/nonexistent/crowdwatch.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(load_config(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_config_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            load_config(Some(dir.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zones_does_not_create_journal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.telemetry.journal_path = dir.path().join("samples.jsonl");

        run_zones(&config, None, None, false, false).unwrap();
        run_zones(&config, Some("e1".to_string()), None, true, false).unwrap();
        assert!(!config.telemetry.journal_path.exists());
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[gateway]\ntimeout_secs = 0\n").unwrap();

        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_read_samples_reports_line_numbers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"zoneId":"z1","eventId":"e1","peopleCount":3,"densityPercentage":30.0}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_samples(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(":3: invalid sample"));
    }

    #[test]
    fn test_ingest_then_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.telemetry.journal_path = dir.path().join("samples.jsonl");

        let samples_path = dir.path().join("input.jsonl");
        std::fs::write(
            &samples_path,
            concat!(
                r#"{"zoneId":"z1","eventId":"e1","peopleCount":4,"densityPercentage":40.0,"timestamp":"2026-05-01T18:00:00Z"}"#,
                "\n",
                r#"{"zoneId":"z1","eventId":"e1","peopleCount":6,"densityPercentage":60.0,"timestamp":"2026-05-01T18:01:00Z"}"#,
                "\n"
            ),
        )
        .unwrap();

        run_ingest(&config, &samples_path).unwrap();

        let store = TelemetryStore::open(&config.telemetry.journal_path).unwrap();
        let snapshots = store.aggregate(SampleFilter::for_event("e1"));
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].sample_count, 2);
        assert_eq!(snapshots[0].avg_density_percentage, 50.0);
    }
}
