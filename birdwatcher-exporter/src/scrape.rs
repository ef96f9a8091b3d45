//! Runs the BIRD status command and turns its output into metrics.
//!
//! Every scrape spawns a fresh command and parses its complete output; nothing
//! is cached between scrapes and concurrent scrapes do not share state apart
//! from the statistics counters.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use birdwatcher_common::{Metric, parse_show_protocols};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::{BirdcConfig, FilterConfig};

/// Reasons a scrape can fail.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("No status command configured")]
    EmptyCommand,

    #[error("Failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Failed to parse status output: {0}")]
    Parse(#[from] birdwatcher_common::Error),
}

/// Filter on the protocol instance label.
pub struct InstanceFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl InstanceFilter {
    /// Create a new filter from configuration.
    ///
    /// Invalid patterns are rejected by config validation and skipped here.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<glob::Pattern> {
            patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect()
        };

        Self {
            include: compile(&config.include_instances),
            exclude: compile(&config.exclude_instances),
        }
    }

    /// Check if a metric should be exported.
    pub fn should_include(&self, metric: &Metric) -> bool {
        let Some(instance) = metric.instance() else {
            return true;
        };

        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(instance)) {
            return false;
        }

        !self.exclude.iter().any(|p| p.matches(instance))
    }
}

impl Default for InstanceFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// Scrape statistics.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Scrapes attempted.
    pub scrapes_total: u64,
    /// Scrapes that returned an error.
    pub scrapes_failed: u64,
    /// Metrics returned by successful scrapes.
    pub metrics_exported: u64,
}

/// Invokes the status command and parses its output.
pub struct Scraper {
    birdc: BirdcConfig,
    filter: InstanceFilter,
    stats: RwLock<ScrapeStats>,
}

/// Create a shareable scraper handle.
pub type SharedScraper = Arc<Scraper>;

impl Scraper {
    /// Create a new scraper.
    pub fn new(birdc: BirdcConfig, filters: FilterConfig) -> Self {
        Self {
            birdc,
            filter: InstanceFilter::new(&filters),
            stats: RwLock::new(ScrapeStats::default()),
        }
    }

    /// Run the status command once and return all metrics it produced.
    pub async fn scrape(&self) -> Result<Vec<Metric>, ScrapeError> {
        let started = Instant::now();
        self.stats.write().scrapes_total += 1;

        let result = self.run().await;

        let mut stats = self.stats.write();
        match &result {
            Ok(metrics) => {
                stats.metrics_exported += metrics.len() as u64;
                debug!(
                    metrics = metrics.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scrape succeeded"
                );
            }
            Err(_) => stats.scrapes_failed += 1,
        }

        result
    }

    /// Get scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }

    async fn run(&self) -> Result<Vec<Metric>, ScrapeError> {
        let stdout = self.run_command().await?;

        let mut metrics = Vec::new();
        for metric in parse_show_protocols(stdout.as_slice()) {
            let metric = metric?;
            if self.filter.should_include(&metric) {
                metrics.push(metric);
            } else {
                trace!(metric = %metric, "Metric filtered out");
            }
        }

        Ok(metrics)
    }

    async fn run_command(&self) -> Result<Vec<u8>, ScrapeError> {
        let (program, args) = self
            .birdc
            .command
            .split_first()
            .ok_or(ScrapeError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScrapeError::Command {
                program: program.clone(),
                source,
            })?;

        let timeout = Duration::from_secs(self.birdc.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ScrapeError::Timeout {
                program: program.clone(),
                timeout_secs: self.birdc.timeout_secs,
            })?
            .map_err(|source| ScrapeError::Command {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ScrapeError::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
