//! detlink viewer: entry point.
//!
//! ```text
//! detlink-viewer                    Listen with defaults
//! detlink-viewer --config <path>    Use custom config TOML
//! detlink-viewer --bind 0.0.0.0:9000 --json
//! detlink-viewer --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use detlink_core::{DetectionSession, PollSignal, UdpChannel, spawn_overlay_dispatch};

use detlink_viewer::config::{OutputFormat, ViewerConfig};
use detlink_viewer::renderer;

/// How often poll counters are logged.
const STATS_INTERVAL: Duration = Duration::from_secs(10);

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "detlink-viewer", about = "Detection overlay viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "detlink-viewer.toml")]
    config: PathBuf,

    /// Local UDP address to listen on (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Only accept detections from this sender (overrides config).
    #[arg(short, long)]
    peer: Option<String>,

    /// Emit JSON lines on stdout instead of log lines.
    #[arg(long)]
    json: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(addr) = cli.bind {
        config.udp.bind_addr = addr;
    }
    if let Some(addr) = cli.peer {
        config.udp.peer_addr = addr;
    }
    if cli.json {
        config.output.format = OutputFormat::Json;
    }

    // Logs go to stderr so JSON output stays clean.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("detlink-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("channel: {}", config.channel);
    info!("listening on {}", config.udp.bind_addr);
    info!(
        "surface: {}x{}",
        config.surface.width, config.surface.height
    );

    // ── 1. Build the session ────────────────────────────────────

    let channel = Arc::new(UdpChannel::new(config.udp_config()?));
    let (_surface_tx, surface_rx) = watch::channel(config.surface_extent());
    let session = DetectionSession::new(
        channel,
        config.channel,
        config.label_table(),
        surface_rx,
        config.poller_config(),
    );
    session.set_drawing(config.poller.draw_on_connect)?;

    let dispatch = spawn_overlay_dispatch(
        session.poller().batch_receiver(),
        renderer::from_format(config.output.format),
    );

    // ── 2. Supervise ────────────────────────────────────────────

    let mut signals = session.poller().signals();
    let stats_rx = session.poller().stats_receiver();
    let mut stats_timer = tokio::time::interval(STATS_INTERVAL);
    stats_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reconnect = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(reconnect);
    let mut reconnect_pending = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Ctrl-C received, shutting down");
                break;
            }

            () = &mut reconnect, if reconnect_pending => {
                reconnect_pending = false;
                match session.open().await {
                    Ok(()) => info!("channel {} open", config.channel),
                    Err(e) => {
                        warn!("open failed: {e}; retrying in {}ms", config.reconnect.delay_ms);
                        reconnect.as_mut().reset(Instant::now() + config.reconnect_delay());
                        reconnect_pending = true;
                    }
                }
            }

            signal = signals.recv() => match signal {
                Ok(PollSignal::Fatal(e)) => {
                    warn!("channel lost: {e}");
                    if !config.reconnect.enabled {
                        break;
                    }
                    reconnect.as_mut().reset(Instant::now() + config.reconnect_delay());
                    reconnect_pending = true;
                }
                Ok(PollSignal::Decode(e)) => debug!("dropped message: {e}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("{n} poll signals skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = stats_timer.tick() => {
                let stats = *stats_rx.borrow();
                info!(
                    "ticks={} batches={} timeouts={} decode_errors={}",
                    stats.ticks, stats.batches, stats.timeouts, stats.decode_errors
                );
            }
        }
    }

    // ── 3. Shutdown ─────────────────────────────────────────────

    session.close().await?;
    drop(session);
    let _ = dispatch.await;

    Ok(())
}
