//! pulse-cli — operational CLI for the Pulse record store
//!
//! Talks to the backing Postgres directly through the store layer.
//!
//! # Subcommands
//! - `init`                          — create tables and run schema upgrades
//! - `health`                        — database round-trip check
//! - `sweep [--days N]`              — retention sweep across all record kinds
//! - `read <kind> [filters...]`      — page through records as JSON
//! - `aggregate <kind> <aggregation> [filters...]` — run one aggregation

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use pulse_core::{
    AggregateRecordsRequest, AggregationKind, PulseConfig, ReadRecordsRequest, RecordKind,
    TimeRange,
};
use pulse_store::RecordStore;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "pulse-cli", version, about = "Pulse record store operations")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "pulse.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create identity and record tables, then apply schema upgrades
    Init,

    /// Check database connectivity
    Health,

    /// Delete records older than the retention period
    Sweep {
        /// Retention period in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Read records of one kind as JSON
    Read {
        kind: KindArg,

        /// Restrict to these owning apps (repeatable)
        #[arg(short, long = "package")]
        packages: Vec<String>,

        /// Window start, RFC 3339 (e.g. 2026-08-01T00:00:00Z)
        #[arg(long)]
        start: String,

        /// Window end, RFC 3339, exclusive
        #[arg(long)]
        end: String,

        #[arg(long)]
        page_size: Option<usize>,

        /// Token returned by the previous page
        #[arg(long)]
        page_token: Option<i64>,

        /// Newest first instead of oldest first
        #[arg(long)]
        descending: bool,
    },

    /// Aggregate records of one kind over a window
    Aggregate {
        kind: KindArg,
        aggregation: AggregationArg,

        #[arg(short, long = "package")]
        packages: Vec<String>,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Steps,
    HeartRate,
    SleepSession,
    Weight,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Steps => RecordKind::Steps,
            KindArg::HeartRate => RecordKind::HeartRate,
            KindArg::SleepSession => RecordKind::SleepSession,
            KindArg::Weight => RecordKind::Weight,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggregationArg {
    Sum,
    Average,
    Min,
    Max,
}

impl From<AggregationArg> for AggregationKind {
    fn from(aggregation: AggregationArg) -> Self {
        match aggregation {
            AggregationArg::Sum => AggregationKind::Sum,
            AggregationArg::Average => AggregationKind::Average,
            AggregationArg::Min => AggregationKind::Min,
            AggregationArg::Max => AggregationKind::Max,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_range(start: &str, end: &str) -> anyhow::Result<TimeRange> {
    let start = parse_instant(start)?;
    let end = parse_instant(end)?;
    TimeRange::new(start, end).ok_or_else(|| anyhow::anyhow!("window start is after its end"))
}

fn parse_instant(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| anyhow::anyhow!("bad timestamp {value}: {e}"))?
        .with_timezone(&Utc))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match PulseConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let pool = match pulse_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let store = RecordStore::new(pool);

    match args.command {
        Commands::Init => {
            store.initialize().await?;
            println!("Schema ready (version {})", pulse_store::SCHEMA_VERSION);
        }

        Commands::Health => match pulse_core::db::health_check(store.pool()).await {
            Ok(version) => println!("PostgreSQL connected: {version}"),
            Err(e) => {
                println!("PostgreSQL connection failed: {e}");
                std::process::exit(1);
            }
        },

        Commands::Sweep { days } => {
            let days = days.unwrap_or(config.retention.auto_delete_after_days);
            let deleted = store.auto_delete(days).await?;
            println!("Deleted {deleted} records older than {days} days");
        }

        Commands::Read {
            kind,
            packages,
            start,
            end,
            page_size,
            page_token,
            descending,
        } => {
            let request = ReadRecordsRequest {
                kind: kind.into(),
                package_filter: packages,
                id_filter: None,
                time_range: parse_range(&start, &end)?,
                page_size,
                page_token,
                ascending: !descending,
            };
            let page = store.read(&request).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }

        Commands::Aggregate {
            kind,
            aggregation,
            packages,
            start,
            end,
        } => {
            let request = AggregateRecordsRequest {
                kind: kind.into(),
                aggregation: aggregation.into(),
                package_filter: packages,
                time_range: parse_range(&start, &end)?,
            };
            let outcome = store.aggregate(&request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
