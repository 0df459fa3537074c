//! Viewer configuration.

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use detlink_core::poller::{DEFAULT_BUFFER_CAPACITY, DEFAULT_PERIOD};
use detlink_core::{ChannelId, LabelTable, PollerConfig, SurfaceExtent, UdpChannelConfig};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Channel identity passed to the manager.
    pub channel: ChannelId,
    /// UDP socket settings.
    pub udp: UdpConfig,
    /// Render surface size.
    pub surface: SurfaceConfig,
    /// Poll loop tuning.
    pub poller: PollConfig,
    /// Class label table.
    pub labels: LabelsConfig,
    /// Where batches go.
    pub output: OutputConfig,
    /// Recovery after transport failures.
    pub reconnect: ReconnectConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// UDP socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Local address detections arrive on.
    pub bind_addr: String,
    /// Accept datagrams only from this sender. Empty accepts anyone.
    pub peer_addr: String,
    /// Per-read wait in milliseconds.
    pub read_timeout_ms: u64,
}

/// Render surface size in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

/// Poll loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Tick period in milliseconds.
    pub period_ms: u64,
    /// Bytes requested per read.
    pub buffer_capacity: usize,
    /// Start drawing as soon as the channel connects.
    pub draw_on_connect: bool,
}

/// Class label table. Empty means the built-in COCO table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub names: Vec<String>,
}

/// Renderer selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// How batches are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One log line per batch.
    #[default]
    Log,
    /// One JSON array per batch on stdout.
    Json,
}

/// Recovery after transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reopen the channel after a fatal read error.
    pub enabled: bool,
    /// Wait before each reconnect attempt, in milliseconds.
    pub delay_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7340".into(),
            peer_addr: String::new(),
            read_timeout_ms: 5,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD.as_millis() as u64,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            draw_on_connect: true,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 1000,
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

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
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

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    // ── Conversions ──────────────────────────────────────────────

    pub fn udp_config(&self) -> Result<UdpChannelConfig, AddrParseError> {
        let peer_addr = match self.udp.peer_addr.trim() {
            "" => None,
            addr => Some(addr.parse::<SocketAddr>()?),
        };
        Ok(UdpChannelConfig {
            bind_addr: self.udp.bind_addr.parse()?,
            peer_addr,
            read_timeout: Duration::from_millis(self.udp.read_timeout_ms.max(1)),
        })
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            period: Duration::from_millis(self.poller.period_ms.max(1)),
            buffer_capacity: self.poller.buffer_capacity.max(64),
        }
    }

    pub fn surface_extent(&self) -> SurfaceExtent {
        SurfaceExtent::new(self.surface.width, self.surface.height)
    }

    pub fn label_table(&self) -> LabelTable {
        if self.labels.names.is_empty() {
            LabelTable::coco()
        } else {
            LabelTable::new(&self.labels.names)
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.delay_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────
