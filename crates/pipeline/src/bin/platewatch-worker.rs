//! platewatch-worker: runs the decision pipeline over finalized tracks.
//!
//! Reads one JSON `FinalizedTrack` per line from stdin and writes one JSON
//! `TrackOutcome` per emitted event to stdout. A periodic tick retries due
//! webhook deliveries and purges expired watch-list items.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use platewatch_core::config::load_dotenv;
use platewatch_core::{Config, FinalizedTrack, SystemClock};
use platewatch_notify::{HttpTransport, LoggingRelayDriver};
use platewatch_pipeline::{build_pipeline, RecognitionPipeline, TrackOutcome};

// ── CLI ─────────────────────────────────────────────────────────────

/// Plate decision worker: watch-lists, rules, webhooks and relays.
#[derive(Parser, Debug)]
#[command(name = "platewatch-worker", version, about)]
struct Cli {
    /// Configuration profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "PLATEWATCH_PROFILE", default_value = "")]
    profile: String,

    /// Override the directory holding lists/rules/subscriptions/relays YAML.
    #[arg(long)]
    rules_dir: Option<PathBuf>,

    /// Override the retry tick interval in seconds.
    #[arg(long)]
    retry_interval: Option<u64>,

    /// Print discarded tracks too, not only emitted events.
    #[arg(long)]
    print_discarded: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::for_profile(&cli.profile)?;
    if let Some(dir) = cli.rules_dir {
        config.rules.rules_dir = dir;
    }
    if let Some(secs) = cli.retry_interval {
        config.webhook.retry_interval_seconds = secs;
    }
    config.log_summary();

    let transport = Arc::new(HttpTransport::from_config(&config.webhook)?);
    let pipeline = build_pipeline(
        &config,
        transport,
        Arc::new(LoggingRelayDriver),
        Arc::new(SystemClock),
    )?;

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.webhook.retry_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("platewatch-worker started");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&pipeline, &line, cli.print_discarded).await,
                    Ok(None) => {
                        info!("input closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to read input");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                pipeline.tick().await;
            }
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    // Give pending retries one last chance before exit.
    pipeline.tick().await;
    for sample in pipeline.counters().snapshot() {
        info!(name = %sample.name, labels = ?sample.labels, value = sample.value, "counter");
    }
    info!(events = pipeline.events().len(), "platewatch-worker exited cleanly");
    Ok(())
}

async fn handle_line(pipeline: &RecognitionPipeline, line: &str, print_discarded: bool) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let track: FinalizedTrack = match serde_json::from_str(line) {
        Ok(track) => track,
        Err(e) => {
            warn!(error = %e, "skipping malformed track");
            return;
        }
    };
    let outcome = match pipeline.process_track(track).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "failed to process track");
            return;
        }
    };
    if !outcome.is_emitted() && !print_discarded {
        return;
    }
    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "failed to serialize outcome"),
    }
    if let TrackOutcome::Emitted { dispatch, .. } = &outcome {
        debug!(
            deliveries = dispatch.deliveries.len(),
            relays = dispatch.relays.len(),
            "dispatch finished"
        );
    }
}
