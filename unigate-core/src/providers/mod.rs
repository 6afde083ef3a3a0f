//! Provider adapters and dispatch
//!
//! One [`ProviderConfig`] implementation per (provider, model-family) pair,
//! selected by the [`ProviderRegistry`]. The [`Dispatcher`] drives the full
//! request lifecycle over them: parameter mapping, transport, the bounded
//! repair loop, and response normalization.

pub mod adapter;
pub mod anthropic;
pub mod asi;
pub mod azure;
pub mod dispatch;
pub mod error;
pub mod openai;
pub mod params;
pub mod registry;
pub mod repair;
pub mod vertex;

pub use adapter::ProviderConfig;
pub use dispatch::Dispatcher;
pub use error::{GatewayError, GatewayResult};
pub use registry::{ProviderId, ProviderRegistry};
pub use repair::{apply_repair, classify_repair, RepairAction};
