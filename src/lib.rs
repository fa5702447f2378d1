pub mod completion;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod server;
pub mod timing;

pub use completion::{CompletionCall, CompletionService};
pub use config::{AppConfig, Args};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use model::{CompletionRequest, CompletionResponse, Variant};
pub use server::{build_router, build_router_with};
pub use timing::{Delay, TimingSimulator, TokioDelay};
