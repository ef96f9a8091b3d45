//! Prometheus exporter for the BIRD routing daemon.
//!
//! Each scrape of the HTTP endpoint runs `birdcl show protocols all`, parses
//! its output with [`birdwatcher_common`] and returns one line per metric.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  birdcl command │────>│     Scraper     │────>│   HTTP Server   │
//! │ (show protocols)│     │ (parse, filter) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! birdwatcher-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod http;
pub mod scrape;

pub use config::ExporterConfig;
pub use http::HttpServer;
pub use scrape::{ScrapeError, Scraper, SharedScraper};
