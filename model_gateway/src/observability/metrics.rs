//! Prometheus metrics for the chat gateway.
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`start_prometheus`] installs a recorder.

use std::{net::SocketAddr, time::Duration};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

pub mod metrics_labels {
    pub const RESULT_SUCCESS: &str = "success";
    pub const RESULT_ERROR: &str = "error";
}

/// Install the Prometheus recorder and its HTTP listener.
pub fn start_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus exporter: {}", e))?;
    Metrics::describe();
    info!(addr = %addr, "Prometheus metrics listener started");
    Ok(())
}

pub struct Metrics;

impl Metrics {
    fn describe() {
        describe_counter!("chat_requests_total", "Chat requests by mode and final status");
        describe_histogram!(
            "chat_request_duration_seconds",
            "Wall time of chat requests by mode"
        );
        describe_counter!("chat_model_calls_total", "Model calls issued by the tool loop");
        describe_counter!("chat_tool_calls_total", "Tool executions by tool and result");
        describe_counter!(
            "chat_tool_registry_fallback_total",
            "Requests that fell back to the built-in tool list"
        );
    }

    pub fn record_request(mode: &'static str, status: &'static str, duration: Duration) {
        counter!("chat_requests_total", "mode" => mode, "status" => status).increment(1);
        histogram!("chat_request_duration_seconds", "mode" => mode).record(duration.as_secs_f64());
    }

    pub fn record_model_call() {
        counter!("chat_model_calls_total").increment(1);
    }

    pub fn record_tool_call(tool: &str, success: bool) {
        let result = if success {
            metrics_labels::RESULT_SUCCESS
        } else {
            metrics_labels::RESULT_ERROR
        };
        counter!("chat_tool_calls_total", "tool" => tool.to_string(), "result" => result)
            .increment(1);
    }

    pub fn record_tool_registry_fallback() {
        counter!("chat_tool_registry_fallback_total").increment(1);
    }
}
