use std::{sync::Arc, time::Instant};

use tracing::debug;

use crate::{
    error::ServiceError,
    metrics::MetricsRegistry,
    model::{AdapterSignals, CompletionRequest, CompletionResponse, catalog, resolve},
    timing::TimingSimulator,
};

/// A completion call as it arrives from the HTTP layer, body still unparsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionCall<'a> {
    pub query_lora: Option<&'a str>,
    pub header_lora: Option<&'a str>,
    pub body: &'a [u8],
}

/// Answers completion calls: resolve the adapter, simulate the queue and
/// compute phases, then return the canned payload.
#[derive(Clone)]
pub struct CompletionService {
    registry: Arc<MetricsRegistry>,
    simulator: TimingSimulator,
}

impl CompletionService {
    pub fn new(registry: Arc<MetricsRegistry>, simulator: TimingSimulator) -> Self {
        Self {
            registry,
            simulator,
        }
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// The body is validated before the request is admitted, so a rejected
    /// call never touches the gauges.
    pub async fn handle(&self, call: CompletionCall<'_>) -> Result<CompletionResponse, ServiceError> {
        let started = Instant::now();
        let request = CompletionRequest::from_body(call.body)?;

        let variant = resolve(&AdapterSignals {
            query_lora: call.query_lora,
            header_lora: call.header_lora,
            body_lora: request.lora.as_deref(),
            body_model: request.model.as_deref(),
        });

        let in_flight = self.simulator.admit(self.registry.clone(), variant);
        let in_flight = self.simulator.run(in_flight).await;

        let entry = catalog::lookup(variant);
        let response =
            CompletionResponse::new(entry.model_name, entry.text, chrono::Utc::now().timestamp());

        let latency = started.elapsed();
        in_flight.complete(latency);

        debug!(
            model = entry.model_name,
            prompt_chars = request.prompt.chars().count(),
            latency_ms = latency.as_secs_f64() * 1000.0,
            "completion served"
        );

        Ok(response)
    }
}
