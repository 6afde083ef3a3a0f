//! ASI provider config
//!
//! OpenAI-compatible chat endpoint with two quirks: a literal temperature of
//! 0 is rejected (nudged to near-zero), and there is no native structured
//! output (JSON mode goes through the synthetic-tool rewrite).

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
    "temperature",
    "max_tokens",
    "stop",
    "tools",
    "tool_choice",
    "response_format",
    "stream",
    "top_p",
    "presence_penalty",
    "frequency_penalty",
    "user",
];

/// ASI chat config
#[derive(Debug)]
pub struct AsiConfig;

impl ProviderConfig for AsiConfig {
    fn name(&self) -> &'static str {
        "asi"
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
        let mut mapped = params::map_params(
            params,
            self.supported_params(model),
            &[],
            ProviderId::Asi,
            model,
            drop_unsupported,
        )?;
        params::nudge_zero_temperature(&mut mapped);
        params::json_format_to_tool(&mut mapped);
        Ok(mapped)
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
        openai::normalize_response(raw, headers, json_mode, ProviderId::Asi)
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        openai::parse_chunk(raw)
    }

    fn base_url(&self) -> &str {
        "https://api.asi1.ai/v1"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/chat/completions",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        openai::bearer_headers(api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_temperature_nudged() {
        let mut params = BTreeMap::new();
        params.insert("temperature".to_string(), json!(0.0));
        let mapped = AsiConfig.map_params(&params, "asi1-mini", false).unwrap();
        assert_eq!(mapped["temperature"], json!(1e-5));
    }

    #[test]
    fn test_json_mode_rewritten() {
        let mut params = BTreeMap::new();
        params.insert(
            "response_format".to_string(),
            json!({"type": "json_object"}),
        );
        let mut mapped = AsiConfig.map_params(&params, "asi1-mini", false).unwrap();
        assert!(!mapped.contains_key("response_format"));
        assert!(mapped.contains_key("tools"));
        assert!(params::take_json_mode(&mut mapped));
    }
}
