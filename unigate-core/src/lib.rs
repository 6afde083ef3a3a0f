//! Unigate Core Library
//!
//! Multi-provider LLM gateway core: one canonical chat request/response
//! shape, dispatched to heterogeneous vendor APIs and normalized back.
//!
//! The crate is organized as:
//! - [`protocol`] — the canonical data model
//! - [`providers`] — per-provider adapters, the registry, parameter mapping,
//!   the repair loop, and the [`providers::Dispatcher`] entry point
//! - [`stream`] — the streaming normalization state machine with async and
//!   blocking bindings
//! - [`extract`] — the heuristic JSON extraction fallback
//! - [`batch`] — batch output aggregation
//! - [`http`] — pooled transport and the process-wide client cache
//! - [`config`] — secret handling

pub mod batch;
pub mod config;
pub mod extract;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod stream;

pub use protocol::{ChatRequest, ChatResponse, Message, StreamChunk, Usage};
pub use providers::{Dispatcher, GatewayError, GatewayResult, ProviderId, ProviderRegistry};

/// Returns the version of the Unigate Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
