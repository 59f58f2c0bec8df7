//! laqn-export - Harvest LAQN measurements into InfluxDB line protocol.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use laqn::{
    parse_date_arg, InfluxSink, LineProtocolSink, PipelineDriver, PointSink, ReqwestSource,
    RunSummary, Settings,
};
use log::info;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

const DEBUG_VALUE_WIDTH: usize = 40;

#[derive(Parser)]
#[command(
    name = "laqn-export",
    version,
    about = "Download LAQN measurements and export them as time-series points"
)]
struct Cli {
    /// First day to download (YYYY, YYYY-MM or YYYY-MM-DD)
    #[arg(short, long, value_parser = parse_date_arg)]
    start_date: NaiveDate,

    /// Day the download stops at, exclusive
    #[arg(short, long, value_parser = parse_date_arg)]
    end_date: NaiveDate,

    /// Location of the settings file
    #[arg(short, long, default_value = "Settings/config.json")]
    config: PathBuf,

    /// Print line protocol to stdout instead of writing to InfluxDB
    #[arg(long, conflicts_with = "output")]
    dry_run: bool,

    /// Write line protocol to this file instead of InfluxDB
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("Start: {}", cli.start_date);
    info!("End: {}", cli.end_date);

    let settings = Settings::load(&cli.config)?;
    info!("Imported settings from {}", cli.config.display());
    if settings.debug_stats {
        log_settings(&cli.config)?;
    }

    let summary = if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        run(settings, LineProtocolSink::new(BufWriter::new(file)), &cli).await?
    } else if cli.dry_run {
        run(settings, LineProtocolSink::new(io::stdout().lock()), &cli).await?
    } else {
        let Some(influx) = settings.influx.clone() else {
            bail!(
                "No Influx section in {}; use --dry-run or --output to export without a database",
                cli.config.display()
            );
        };
        run(settings, InfluxSink::new(influx), &cli).await?
    };

    for failure in &summary.failures {
        info!("Skipped {}: {}", failure.key, failure.reason);
    }
    Ok(())
}

async fn run<S: PointSink>(settings: Settings, sink: S, cli: &Cli) -> anyhow::Result<RunSummary> {
    let mut driver = PipelineDriver::builder()
        .settings(settings)
        .source(ReqwestSource::new()?)
        .sink(sink)
        .build();
    let summary = driver
        .run()
        .start(cli.start_date)
        .end(cli.end_date)
        .call()
        .await?;
    Ok(summary)
}

/// Logs the top-level settings entries, shortening long values.
fn log_settings(path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let Some(entries) = value.as_object() else {
        return Ok(());
    };
    info!("Settings from {}:", path.display());
    for (key, item) in entries {
        info!("  {}: {}", key, truncate(&item.to_string(), DEBUG_VALUE_WIDTH));
    }
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    match value.char_indices().nth(width) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
