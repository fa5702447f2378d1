//! Process-wide request counters and their Prometheus text rendering.
//!
//! The counters mirror what a vLLM server exposes so routers and autoscalers
//! pointed at this server see the same gauges they would in production.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::model::catalog;
use crate::model::Variant;

/// Static KV-cache utilisation reported on every scrape.
pub const GPU_CACHE_USAGE_PERC: f64 = 0.5;

#[derive(Debug, Default)]
struct MetricsState {
    request_count: u64,
    total_latency_seconds: f64,
    running_requests: u64,
    waiting_requests: u64,
    running_adapters: BTreeMap<&'static str, u64>,
    waiting_adapters: BTreeMap<&'static str, u64>,
}

/// Shared counters, updated by every completion and read by `/metrics`.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    state: Mutex<MetricsState>,
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub total_latency_seconds: f64,
    pub running_requests: u64,
    pub waiting_requests: u64,
    /// Adapters with at least one request in the compute phase.
    pub running_adapters: Vec<&'static str>,
    /// Adapters with at least one request in the queue phase.
    pub waiting_adapters: Vec<&'static str>,
}

impl MetricsSnapshot {
    pub fn average_latency_seconds(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.total_latency_seconds / self.request_count as f64
        }
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request entered the queue.
    pub fn record_start(&self, variant: Variant) {
        let mut state = self.state.lock();
        state.waiting_requests += 1;
        if let Some(adapter) = adapter_of(variant) {
            *state.waiting_adapters.entry(adapter).or_default() += 1;
        }
    }

    /// A queued request was admitted to the compute phase.
    pub fn record_running(&self, variant: Variant) {
        let mut state = self.state.lock();
        state.waiting_requests = state.waiting_requests.saturating_sub(1);
        state.running_requests += 1;
        if let Some(adapter) = adapter_of(variant) {
            decrement(&mut state.waiting_adapters, adapter);
            *state.running_adapters.entry(adapter).or_default() += 1;
        }
    }

    /// A running request finished after `latency_seconds` of wall-clock time.
    pub fn record_complete(&self, variant: Variant, latency_seconds: f64) {
        let mut state = self.state.lock();
        state.running_requests = state.running_requests.saturating_sub(1);
        state.request_count += 1;
        state.total_latency_seconds += latency_seconds.max(0.0);
        if let Some(adapter) = adapter_of(variant) {
            decrement(&mut state.running_adapters, adapter);
        }
    }

    /// Withdraws a request that never completed. Nothing is counted.
    pub fn record_abandoned(&self, variant: Variant, was_running: bool) {
        let mut state = self.state.lock();
        let state = &mut *state;
        let (total, adapters) = if was_running {
            (&mut state.running_requests, &mut state.running_adapters)
        } else {
            (&mut state.waiting_requests, &mut state.waiting_adapters)
        };
        *total = total.saturating_sub(1);
        if let Some(adapter) = adapter_of(variant) {
            decrement(adapters, adapter);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot {
            request_count: state.request_count,
            total_latency_seconds: state.total_latency_seconds,
            running_requests: state.running_requests,
            waiting_requests: state.waiting_requests,
            running_adapters: state.running_adapters.keys().copied().collect(),
            waiting_adapters: state.waiting_adapters.keys().copied().collect(),
        }
    }
}

fn adapter_of(variant: Variant) -> Option<&'static str> {
    catalog::lookup(variant).adapter
}

fn decrement(counts: &mut BTreeMap<&'static str, u64>, adapter: &'static str) {
    if let Some(count) = counts.get_mut(adapter) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(adapter);
        }
    }
}

/// Renders a snapshot in the Prometheus text exposition format (0.0.4).
/// Block order is fixed so consecutive scrapes diff cleanly.
pub fn render_metrics(snapshot: &MetricsSnapshot, max_lora: usize, timestamp: i64) -> String {
    let mut lines = Vec::new();

    push_block(
        &mut lines,
        "vllm:num_requests_running",
        "Number of requests currently running on GPU.",
        "gauge",
        "",
        snapshot.running_requests.to_string(),
    );
    push_block(
        &mut lines,
        "vllm:num_requests_waiting",
        "Number of requests waiting to be processed.",
        "gauge",
        "",
        snapshot.waiting_requests.to_string(),
    );
    push_block(
        &mut lines,
        "vllm:gpu_cache_usage_perc",
        "GPU KV-cache usage. 1 means 100 percent usage.",
        "gauge",
        "",
        GPU_CACHE_USAGE_PERC.to_string(),
    );

    let labels = format!(
        "{{running_lora_adapters=\"{}\",max_lora=\"{}\",waiting_lora_adapters=\"{}\"}}",
        escape_label(&snapshot.running_adapters.join(",")),
        max_lora,
        escape_label(&snapshot.waiting_adapters.join(",")),
    );
    push_block(
        &mut lines,
        "vllm:lora_requests_info",
        "Running stats on lora requests.",
        "gauge",
        &labels,
        timestamp.to_string(),
    );

    push_block(
        &mut lines,
        "vllm:request_success_total",
        "Count of successfully processed requests.",
        "counter",
        "",
        snapshot.request_count.to_string(),
    );
    push_block(
        &mut lines,
        "vllm:request_latency_seconds_total",
        "Cumulative end-to-end request latency in seconds.",
        "gauge",
        "",
        format!("{:.4}", snapshot.total_latency_seconds),
    );
    push_block(
        &mut lines,
        "vllm:request_latency_seconds_avg",
        "Average end-to-end request latency in seconds.",
        "gauge",
        "",
        format!("{:.4}", snapshot.average_latency_seconds()),
    );

    let mut body = lines.join("\n");
    body.push('\n');
    body
}

fn push_block(
    lines: &mut Vec<String>,
    name: &str,
    help: &str,
    kind: &str,
    labels: &str,
    value: String,
) {
    lines.push(format!("# HELP {name} {help}"));
    lines.push(format!("# TYPE {name} {kind}"));
    lines.push(format!("{name}{labels} {value}"));
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
