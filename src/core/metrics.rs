use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(
        "quiz_generation_requests_total",
        "Calls to the generation service by outcome"
    );
    metrics::describe_histogram!(
        "quiz_generation_duration_seconds",
        "Latency of generation service calls"
    );
    metrics::describe_counter!("quizzes_persisted_total", "Quizzes committed to the store");
    metrics::describe_counter!("quiz_attempts_total", "Attempt submissions by outcome");
    Ok(())
}

/// Prometheus text exposition, when the recorder is installed.
pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
