use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use netsim_types::{EntityId, Metric};

#[derive(Parser, Debug)]
#[command(author, version, about = "Discrete-event network simulator (TCP Reno / FAST)")]
struct Args {
    /// Path to the network topology JSON file.
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Log bucket length in seconds, must be > 0.
    #[arg(short = 'i', long = "interval", default_value_t = 1.0)]
    interval: f64,

    /// Enable debug-level tracing.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress info-level status messages.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Stop the simulation after this many virtual seconds even if flows remain.
    #[arg(long = "time-limit", default_value_t = f64::INFINITY)]
    time_limit: f64,

    /// Write the collected sample series to this path as a JSON trace.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.quiet);
    info!(file = %args.file.display(), "netsim starting");

    let spec = netsim_topology::load_from_path(&args.file)?;
    let mut controller = netsim_topology::build(spec, args.interval)?;

    controller.run(args.time_limit)?;
    info!(time = controller.current_time(), "simulation complete");

    let series = controller.finish_and_collect();
    if let Some(path) = &args.trace_out {
        write_trace(path, &series)?;
    }

    Ok(())
}

fn init_logging(debug: bool, quiet: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[derive(Serialize)]
struct SeriesEntry {
    metric: String,
    entity: String,
    points: Vec<(f64, f64)>,
}

#[derive(Serialize)]
struct Trace {
    series: Vec<SeriesEntry>,
}

fn write_trace(
    path: &Path,
    series: &std::collections::HashMap<(Metric, EntityId), Vec<(f64, f64)>>,
) -> Result<()> {
    let mut entries: Vec<SeriesEntry> = series
        .iter()
        .map(|((metric, entity), points)| SeriesEntry {
            metric: metric.to_string(),
            entity: entity.to_string(),
            points: points.clone(),
        })
        .collect();
    entries.sort_by(|a, b| (&a.metric, &a.entity).cmp(&(&b.metric, &b.entity)));
    let trace = Trace { series: entries };

    let data = serde_json::to_vec_pretty(&trace).context("failed to serialize simulation trace")?;
    fs::write(path, &data).with_context(|| format!("failed to write trace file '{}'", path.display()))?;
    Ok(())
}
