//! `alertmanager` command-line surface.
//!
//! # Responsibility
//! - Parse flags and subcommands, falling back to environment variables.
//! - Wire the SQLite stores, services and notifier for one invocation.
//! - Render every result as JSON on stdout.
//!
//! # Invariants
//! - Client errors (bad input, unknown alert key) map to exit code 2.
//! - Storage and configuration faults map to exit code 1.

use alertmanager_core::db::open_db;
use alertmanager_core::{
    Actor, AlertCandidate, AlertId, AlertManagerConfig, AlertService, AlertServiceError,
    CheckinRequest, LogNotifier, SqliteEventLog, SqliteSwitchRepository, SwitchService,
    SwitchServiceError,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Alert ingestion and dead man's switch tracking.
#[derive(Debug, Parser)]
#[command(name = "alertmanager")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, env = "ALERTMANAGER_DB")]
    pub db: PathBuf,

    /// Log level (`trace`..`error`); defaults by build profile.
    #[arg(long, env = "ALERTMANAGER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files; stderr when omitted.
    #[arg(long, env = "ALERTMANAGER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Active alert operations.
    #[command(subcommand)]
    Alerts(AlertsCommand),
    /// Dead man's switch operations.
    #[command(subcommand)]
    Switches(SwitchesCommand),
}

#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// List active alerts ordered by key.
    List,
    /// Raise one alert.
    Ingest(IngestArgs),
    /// Acknowledge an active alert by key.
    Ack(AckArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(long)]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub details: String,
}

#[derive(Debug, Args)]
pub struct AckArgs {
    /// Alert key as printed by `alerts list`.
    pub key: AlertId,

    /// Name recorded on the acknowledgment event.
    #[arg(long, default_value = "cli")]
    pub actor: String,
}

#[derive(Debug, Subcommand)]
pub enum SwitchesCommand {
    /// List switches ordered by subject.
    List,
    /// Record a check-in; acknowledges the switch's alert if it is firing.
    CheckIn(CheckInArgs),
    /// Raise alerts for every switch past its TTL.
    Sweep,
}

#[derive(Debug, Args)]
pub struct CheckInArgs {
    #[arg(long)]
    pub subject: String,

    /// Duration until the next expected check-in, e.g. `24h` or `1h30m`.
    #[arg(long)]
    pub ttl: String,
}

/// Invocation failure, split by who has to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    Client(String),
    Server(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Client(_) => 2,
            Self::Server(_) => 1,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(message) | Self::Server(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<AlertServiceError> for CliError {
    fn from(value: AlertServiceError) -> Self {
        if value.is_client_error() {
            Self::Client(value.to_string())
        } else {
            Self::Server(value.to_string())
        }
    }
}

impl From<SwitchServiceError> for CliError {
    fn from(value: SwitchServiceError) -> Self {
        if value.is_client_error() {
            Self::Client(value.to_string())
        } else {
            Self::Server(value.to_string())
        }
    }
}

fn server<E: Display>(err: E) -> CliError {
    CliError::Server(err.to_string())
}

/// Runs one parsed command against the database and returns its JSON output.
///
/// # Errors
/// - [`CliError::Client`] for rejected input or unknown alert keys.
/// - [`CliError::Server`] for configuration, encoding or storage faults.
pub fn execute(cli: &Cli, config: &AlertManagerConfig) -> Result<Value, CliError> {
    let conn = open_db(&cli.db).map_err(server)?;
    let log = SqliteEventLog::new(&conn, config.stream.clone());
    let alerts = AlertService::new(log, LogNotifier, config);

    match &cli.command {
        Commands::Alerts(AlertsCommand::List) => {
            let active = alerts.list_active_alerts()?;
            serde_json::to_value(active).map_err(server)
        }
        Commands::Alerts(AlertsCommand::Ingest(args)) => {
            let candidate = AlertCandidate::new(args.subject.clone(), args.details.clone(), Utc::now());
            let raised = alerts.ingest_committed(&[candidate])?;
            Ok(json!({
                "committed": !raised.is_empty(),
                "raised": raised,
            }))
        }
        Commands::Alerts(AlertsCommand::Ack(args)) => {
            alerts.acknowledge(args.key, Actor::External(args.actor.clone()))?;
            Ok(json!({ "acknowledged": args.key }))
        }
        Commands::Switches(command) => {
            let switches = SwitchService::new(&alerts, SqliteSwitchRepository::new(&conn));
            match command {
                SwitchesCommand::List => {
                    let listed = switches.list_switches()?;
                    serde_json::to_value(listed).map_err(server)
                }
                SwitchesCommand::CheckIn(args) => {
                    let request = CheckinRequest::new(args.subject.clone(), args.ttl.clone());
                    let outcome = switches.check_in(&request, Utc::now())?;
                    Ok(json!({
                        "switch": outcome.switch,
                        "auto_acknowledged": outcome.acknowledged,
                    }))
                }
                SwitchesCommand::Sweep => {
                    let outcome = switches.sweep_expired(Utc::now())?;
                    Ok(json!({
                        "expired": outcome.expired,
                        "raised": outcome.raised,
                    }))
                }
            }
        }
    }
}
