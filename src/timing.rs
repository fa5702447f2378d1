//! Synthetic queue and compute phases.
//!
//! A request is admitted as waiting, held for the queue delay, promoted to
//! running, then held for the compute delay. Every transition is written to
//! the [`MetricsRegistry`] as it happens, so scrapes taken mid-request see
//! live gauges.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{config::AppConfig, metrics::MetricsRegistry, model::Variant};

/// How the simulator waits. Swapped out in tests to gate or skip holds.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn hold(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn hold(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[derive(Clone)]
pub struct TimingSimulator {
    queue_delay: Duration,
    compute_delay: Duration,
    delay: Arc<dyn Delay>,
}

impl TimingSimulator {
    pub fn new(queue_delay: Duration, compute_delay: Duration, delay: Arc<dyn Delay>) -> Self {
        Self {
            queue_delay,
            compute_delay,
            delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.queue_delay, config.compute_delay, Arc::new(TokioDelay))
    }

    /// Registers a new waiting request.
    pub fn admit(&self, registry: Arc<MetricsRegistry>, variant: Variant) -> InFlight {
        registry.record_start(variant);
        InFlight {
            registry,
            variant,
            running: false,
            settled: false,
        }
    }

    /// Runs the queue and compute holds for an admitted request.
    pub async fn run(&self, mut request: InFlight) -> InFlight {
        self.delay.hold(self.queue_delay).await;
        request.registry.record_running(request.variant);
        request.running = true;
        self.delay.hold(self.compute_delay).await;
        request
    }
}

/// A request the registry is currently counting as waiting or running.
///
/// Dropping it without calling [`InFlight::complete`] withdraws it from the
/// gauges without counting it as served.
#[derive(Debug)]
pub struct InFlight {
    registry: Arc<MetricsRegistry>,
    variant: Variant,
    running: bool,
    settled: bool,
}

impl InFlight {
    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.running
    }

    pub fn complete(mut self, latency: Duration) {
        self.registry
            .record_complete(self.variant, latency.as_secs_f64());
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(variant = ?self.variant, running = self.running, "request abandoned");
            self.registry.record_abandoned(self.variant, self.running);
        }
    }
}
