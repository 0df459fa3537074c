//! Configuration for the synthetic detection sender.

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use detlink_core::ImageExtent;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Synthetic scene settings.
    pub scene: SceneConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Where the viewer listens.
    pub target_addr: String,
    /// Local address to send from.
    pub bind_addr: String,
}

/// What gets sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Messages per second.
    pub rate_hz: u32,
    /// Source image width the coordinates refer to.
    pub image_width: u32,
    /// Source image height the coordinates refer to.
    pub image_height: u32,
    /// Boxes per message.
    pub boxes: usize,
    /// Class indices are drawn from `0..class_count`.
    pub class_count: u32,
    /// Send an empty message every N frames; 0 never does.
    pub blank_every: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            target_addr: "127.0.0.1:7340".into(),
            bind_addr: "0.0.0.0:0".into(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            rate_hz: 30,
            image_width: 640,
            image_height: 480,
            boxes: 3,
            class_count: 80,
            blank_every: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn target_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.network.target_addr.parse()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.network.bind_addr.parse()
    }

    /// Time between messages. Rate is clamped to 1..=1000 Hz.
    pub fn send_period(&self) -> Duration {
        Duration::from_secs(1) / self.scene.rate_hz.clamp(1, 1000)
    }

    /// Source image extent; `None` if either dimension is zero.
    pub fn image_extent(&self) -> Option<ImageExtent> {
        ImageExtent::new(self.scene.image_width, self.scene.image_height)
    }
}

// ── Tests ────────────────────────────────────────────────────────
