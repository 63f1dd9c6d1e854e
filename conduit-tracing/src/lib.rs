//! Ambient structured logging for the workspace (spec §1's "logging ...
//! treated as leaf dependencies", carried anyway per this exercise's rule
//! that ambient concerns are never dropped for a Non-goal).
//!
//! Grounded on the teacher's `dozer-tracing` crate role: every other crate
//! calls `log::{debug,info,warn,error}!` through `conduit_types::log`, and
//! a binary wiring this workspace together calls [`init`] once at startup
//! to route those macro calls into a real subscriber. The teacher's own
//! stack additionally exports to OpenTelemetry/Prometheus; that layer
//! belongs to the service-wiring/observability surface spec.md §1 places
//! out of scope for this core, so it's dropped here (see `DESIGN.md`).

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// One JSON object per line, for ingestion by a log pipeline.
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Passed straight to [`EnvFilter::try_new`]; falls back to `"info"`
    /// on a malformed directive rather than panicking at startup.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber and bridges the `log` facade macros
/// (`conduit_types::log::{info,warn,...}`) into `tracing`'s event
/// pipeline, since every operator crate in this workspace logs through
/// `log`, not `tracing`, directly.
///
/// Safe to call more than once: subsequent calls are no-ops, matching how
/// a connector's own test harness and the process entry point might both
/// want logging initialized without coordinating who goes first.
pub fn init(config: TracingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_target(true)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("conduit_tracing::init called more than once; keeping the existing subscriber");
    }

    if tracing_log::LogTracer::init().is_err() {
        tracing::debug!("LogTracer already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_info_filter_and_pretty_format() {
        let config = TracingConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
