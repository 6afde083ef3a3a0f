//! Provider config trait
//!
//! The unit of per-provider, per-model-family behavior. One implementation
//! exists per (provider, model-family) pair; the registry selects it by
//! pattern, callers never construct configs directly.

use crate::http::CallKind;
use crate::protocol::{ChatRequest, ChatResponse, StreamChunk};
use crate::providers::error::GatewayResult;
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-provider adapter behavior
///
/// Implementations must be stateless: the same config instance is shared
/// across concurrent requests through the registry.
pub trait ProviderConfig: Send + Sync + std::fmt::Debug {
    /// Short provider-family name, e.g. "openai" or "openai-reasoning"
    fn name(&self) -> &'static str;

    /// Canonical parameter names this config accepts for the given model
    fn supported_params(&self, model: &str) -> &'static [&'static str];

    /// Map canonical optional parameters into provider-native parameters.
    ///
    /// Supported parameters are copied across, possibly renamed. Unsupported
    /// parameters are silently omitted when `drop_unsupported` is set,
    /// otherwise mapping fails naming the offending parameter. The returned
    /// map may carry the internal `json_mode` marker consumed by
    /// [`ProviderConfig::transform_response`]; it is stripped before the
    /// request goes on the wire.
    fn map_params(
        &self,
        params: &BTreeMap<String, Value>,
        model: &str,
        drop_unsupported: bool,
    ) -> GatewayResult<BTreeMap<String, Value>>;

    /// Build the provider wire body from a canonical request and its mapped
    /// parameters
    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value>;

    /// Normalize a raw provider response body into the canonical shape.
    ///
    /// `json_mode` is set when the caller requested structured JSON through a
    /// rewrite (synthetic tool / prompt); implementations then run the
    /// heuristic extraction fallback over free-text output.
    fn transform_response(
        &self,
        raw: Value,
        headers: &BTreeMap<String, String>,
        json_mode: bool,
    ) -> GatewayResult<ChatResponse>;

    /// Parse one raw stream frame into a canonical chunk.
    ///
    /// Must be defensive: a malformed frame returns `None` and the stream
    /// normalizer degrades it to an empty chunk. Never panics, never errors.
    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk>;

    /// Base URL for this provider
    fn base_url(&self) -> &str;

    /// Endpoint path for a call kind
    fn endpoint(&self, call_kind: CallKind) -> &str;

    /// Headers required by this provider
    fn headers(&self, api_key: &str) -> BTreeMap<String, String>;
}
