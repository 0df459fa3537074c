//! Headless overlay renderers.
//!
//! The viewer has no window; it "draws" by describing each batch,
//! either as a log line or as one JSON array per line on a writer.

use std::io::Write;

use tracing::{info, warn};

use detlink_core::{DetectionBatch, OverlayRenderer};

use crate::config::OutputFormat;

/// Build the renderer selected in the config.
pub fn from_format(format: OutputFormat) -> Box<dyn OverlayRenderer> {
    match format {
        OutputFormat::Log => Box::new(LogRenderer::default()),
        OutputFormat::Json => Box::new(JsonRenderer::new(std::io::stdout())),
    }
}

// ── LogRenderer ──────────────────────────────────────────────────

/// Logs a summary of every batch through `tracing`.
#[derive(Debug, Default)]
pub struct LogRenderer {
    showing: bool,
}

impl OverlayRenderer for LogRenderer {
    fn clear(&mut self) {
        if self.showing {
            info!("overlay cleared");
        }
        self.showing = false;
    }

    fn show(&mut self, batch: DetectionBatch) {
        self.showing = true;
        let summary = batch
            .iter()
            .map(|b| {
                format!(
                    "{} {}% @ ({},{} {}x{})",
                    b.label, b.confidence, b.x, b.y, b.width, b.height
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        info!("{} boxes: {summary}", batch.len());
    }
}

// ── JsonRenderer ─────────────────────────────────────────────────

/// Writes each batch as a JSON array followed by a newline.
///
/// A clear is written as `[]` so consumers see boxes disappear.
pub struct JsonRenderer<W> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_batch(&mut self, batch: &DetectionBatch) {
        let result = serde_json::to_writer(&mut self.out, batch)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!("failed to write batch: {e}");
        }
    }
}

impl<W: Write + Send + 'static> OverlayRenderer for JsonRenderer<W> {
    fn clear(&mut self) {
        self.write_batch(&DetectionBatch::new());
    }

    fn show(&mut self, batch: DetectionBatch) {
        self.write_batch(&batch);
    }
}

// ── Tests ────────────────────────────────────────────────────────
