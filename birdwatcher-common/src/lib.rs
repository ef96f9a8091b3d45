//! Birdwatcher Common Library
//!
//! This crate turns the output of `birdcl show protocols all` into flat
//! metric tuples:
//!
//! - [`tokens`] - Line tokenizer and banner/header filter
//! - [`parser`] - Protocol record state machine producing [`Metric`]s
//! - [`metric`] - Metric tuple and its text rendering
//! - [`config`] - Configuration loading (JSON5 format) and logging settings
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use birdwatcher_common::parse_str;
//!
//! let text = "static1  Static   master   up     2016-10-21\n  Preference:     200\n";
//! let metrics = parse_str(text).collect::<birdwatcher_common::Result<Vec<_>>>().unwrap();
//!
//! assert_eq!(metrics[0].to_string(), "bird_up{bird_protocol_instance=\"static1\"} 1");
//! assert_eq!(metrics[1].value, 200);
//! ```

pub mod config;
pub mod error;
pub mod metric;
pub mod parser;
pub mod tokens;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use metric::{INSTANCE_LABEL, Metric, render_metrics};
pub use parser::{ProtocolParser, ShowProtocols, parse_show_protocols, parse_str};
pub use tokens::{TokenLine, skip_garbage, tokenize};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// Logs go to stderr. `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Example
///
/// ```ignore
/// use birdwatcher_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
