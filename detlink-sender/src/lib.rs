//! # detlink-sender: Synthetic detection source
//!
//! Stands in for an inference process during development: streams a
//! moving set of boxes to `detlink-viewer` using the same wire codec
//! the viewer decodes.

pub mod config;
pub mod service;
