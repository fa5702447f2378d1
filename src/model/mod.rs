pub mod catalog;
mod resolver;
mod types;

pub use catalog::{CatalogEntry, Variant};
pub use resolver::{AdapterSignals, resolve};
pub use types::{CompletionChoice, CompletionRequest, CompletionResponse, DEFAULT_PROMPT, Usage};
