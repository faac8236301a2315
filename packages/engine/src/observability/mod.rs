// packages/engine/src/observability/mod.rs
//! Logging and metrics setup
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! overrides the configured level.

use crate::utils::config::ObservabilityConfig;
use crate::utils::errors::{EngineError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            EngineError::ConfigError(format!("Invalid log level {}: {}", config.log_level, e))
        })?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| EngineError::ConfigError(format!("Failed to install subscriber: {}", e)))
}

/// Start the Prometheus scrape endpoint, if one is configured
///
/// Without an address the metric macros are no-ops.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(addr) = &config.metrics_addr else {
        return Ok(());
    };

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid metrics address {}: {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::ConfigError(format!("Failed to start metrics exporter: {}", e)))?;

    describe_metrics();
    info!("Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "dashboard_http_requests_total",
        "Events API requests by route and status"
    );
    metrics::describe_histogram!(
        "dashboard_http_request_duration_seconds",
        "Events API request latency"
    );
    metrics::describe_counter!("dashboard_events_created_total", "Driving events stored");
    metrics::describe_counter!(
        "dashboard_maneuvers_completed_total",
        "Accelerations and brakings completed by dashboard sessions"
    );
    metrics::describe_counter!(
        "dashboard_event_persist_failures_total",
        "Completed maneuvers the Events API did not store"
    );
    metrics::describe_counter!("dashboard_replay_steps_total", "Replayed driving events");
}
