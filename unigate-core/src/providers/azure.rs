//! Azure OpenAI provider config (GPT-5 deployments)
//!
//! Same wire shape as OpenAI reasoning models; differs in authentication
//! (`api-key` header instead of a bearer token) and in the deployment-scoped
//! endpoint path.

use crate::http::CallKind;
use crate::protocol::{ChatRequest, ChatResponse, StreamChunk};
use crate::providers::adapter::ProviderConfig;
use crate::providers::error::GatewayResult;
use crate::providers::openai;
use crate::providers::params;
use crate::providers::ProviderId;
use serde_json::Value;
use std::collections::BTreeMap;

const SUPPORTED_PARAMS: &[&str] = &[
    "max_tokens",
    "stop",
    "tools",
    "tool_choice",
    "response_format",
    "stream",
    "seed",
    "user",
];

/// Azure OpenAI GPT-5 deployment config
#[derive(Debug)]
pub struct AzureConfig;

impl ProviderConfig for AzureConfig {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn supported_params(&self, _model: &str) -> &'static [&'static str] {
        SUPPORTED_PARAMS
    }

    fn map_params(
        &self,
        params: &BTreeMap<String, Value>,
        model: &str,
        drop_unsupported: bool,
    ) -> GatewayResult<BTreeMap<String, Value>> {
        params::map_params(
            params,
            self.supported_params(model),
            &[("max_tokens", "max_completion_tokens")],
            ProviderId::Azure,
            model,
            drop_unsupported,
        )
    }

    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value> {
        Ok(openai::chat_body(request, mapped_params))
    }

    fn transform_response(
        &self,
        raw: Value,
        headers: &BTreeMap<String, String>,
        json_mode: bool,
    ) -> GatewayResult<ChatResponse> {
        openai::normalize_response(raw, headers, json_mode, ProviderId::Azure)
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        openai::parse_chunk(raw)
    }

    fn base_url(&self) -> &str {
        // Deployment host comes from the resource; callers override via the
        // dispatcher's base-url hook.
        "https://example.openai.azure.com"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/openai/deployments/gpt-5/chat/completions?api-version=2024-12-01-preview",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("api-key".to_string(), api_key.to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_azure_uses_api_key_header() {
        let headers = AzureConfig.headers("azure-key");
        assert_eq!(headers["api-key"], "azure-key");
        assert!(!headers.contains_key("Authorization"));
    }

    #[test]
    fn test_max_tokens_renamed() {
        let mut params = BTreeMap::new();
        params.insert("max_tokens".to_string(), json!(512));
        let mapped = AzureConfig.map_params(&params, "gpt-5", false).unwrap();
        assert_eq!(mapped["max_completion_tokens"], json!(512));
        assert!(!mapped.contains_key("max_tokens"));
    }

    #[test]
    fn test_temperature_rejected_without_drop() {
        let mut params = BTreeMap::new();
        params.insert("temperature".to_string(), json!(0.3));
        assert!(AzureConfig.map_params(&params, "gpt-5", false).is_err());
        let mapped = AzureConfig.map_params(&params, "gpt-5", true).unwrap();
        assert!(mapped.is_empty());
    }
}
