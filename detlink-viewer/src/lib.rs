//! # detlink-viewer: Detection overlay consumer
//!
//! Listens for detection datagrams, rescales them to a configured
//! render surface, and "draws" each batch through a headless renderer
//! (log lines or JSON lines). Reconnects after transport failures.

pub mod config;
pub mod renderer;
