//! detlink sender: entry point.
//!
//! ```text
//! detlink-sender                      Send to 127.0.0.1:7340
//! detlink-sender --target <addr>      Send elsewhere
//! detlink-sender --config <path>      Load a custom config TOML
//! detlink-sender --gen-config         Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use detlink_sender::config::SenderConfig;
use detlink_sender::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "detlink-sender", about = "Synthetic detection sender")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "detlink-sender.toml")]
    config: PathBuf,

    /// Viewer address (overrides config).
    #[arg(short, long)]
    target: Option<String>,

    /// Messages per second (overrides config).
    #[arg(short, long)]
    rate: Option<u32>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SenderConfig::load(&cli.config);
    if let Some(addr) = cli.target {
        config.network.target_addr = addr;
    }
    if let Some(rate) = cli.rate {
        config.scene.rate_hz = rate;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("detlink-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("target: {}", config.network.target_addr);
    info!("rate: {} Hz", config.scene.rate_hz);
    info!(
        "scene: {} boxes on {}x{}",
        config.scene.boxes, config.scene.image_width, config.scene.image_height
    );

    let service = SenderService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
