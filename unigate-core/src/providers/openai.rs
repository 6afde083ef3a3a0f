//! OpenAI provider configs and shared OpenAI-compatible wire helpers
//!
//! Two configs live here: the generic GPT chat family and the reasoning
//! family (o-series, gpt-5), which renames `max_tokens` and accepts a smaller
//! parameter set. The wire helpers are reused by every OpenAI-compatible
//! provider (Azure, ASI).

use crate::extract;
use crate::http::CallKind;
use crate::protocol::{
    ChatRequest, ChatResponse, Choice, Delta, HiddenParams, Message, MessageRole, StreamChunk,
    ToolCall, ToolCallDelta, Usage, OPTIONAL_PARAMS,
};
use crate::providers::adapter::ProviderConfig;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::params::{self, JSON_TOOL_NAME};
use crate::providers::ProviderId;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Parameters accepted by reasoning models; no sampling controls
const REASONING_PARAMS: &[&str] = &[
    "max_tokens",
    "stop",
    "tools",
    "tool_choice",
    "response_format",
    "stream",
    "seed",
    "user",
];

/// Generic OpenAI GPT chat config
#[derive(Debug)]
pub struct OpenAiConfig;

impl ProviderConfig for OpenAiConfig {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn supported_params(&self, _model: &str) -> &'static [&'static str] {
        OPTIONAL_PARAMS
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
            &[],
            ProviderId::OpenAi,
            model,
            drop_unsupported,
        )
    }

    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value> {
        Ok(chat_body(request, mapped_params))
    }

    fn transform_response(
        &self,
        raw: Value,
        headers: &BTreeMap<String, String>,
        json_mode: bool,
    ) -> GatewayResult<ChatResponse> {
        normalize_response(raw, headers, json_mode, ProviderId::OpenAi)
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        parse_chunk(raw)
    }

    fn base_url(&self) -> &str {
        "https://api.openai.com/v1"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/chat/completions",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        bearer_headers(api_key)
    }
}

/// OpenAI reasoning-model config (o-series, gpt-5 family)
#[derive(Debug)]
pub struct OpenAiReasoningConfig;

impl ProviderConfig for OpenAiReasoningConfig {
    fn name(&self) -> &'static str {
        "openai-reasoning"
    }

    fn supported_params(&self, _model: &str) -> &'static [&'static str] {
        REASONING_PARAMS
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
            ProviderId::OpenAi,
            model,
            drop_unsupported,
        )
    }

    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value> {
        Ok(chat_body(request, mapped_params))
    }

    fn transform_response(
        &self,
        raw: Value,
        headers: &BTreeMap<String, String>,
        json_mode: bool,
    ) -> GatewayResult<ChatResponse> {
        normalize_response(raw, headers, json_mode, ProviderId::OpenAi)
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        parse_chunk(raw)
    }

    fn base_url(&self) -> &str {
        "https://api.openai.com/v1"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/chat/completions",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        bearer_headers(api_key)
    }
}

/// Whether a model name belongs to the reasoning family
pub fn is_reasoning_model(model: &str) -> bool {
    const PATTERNS: &[&str] = &["o1", "o3", "o4", "gpt-5"];
    PATTERNS.iter().any(|prefix| {
        model == *prefix
            || model
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('-') || rest.starts_with('.'))
    })
}

// ---------------------------------------------------------------------------
// Shared OpenAI-compatible wire helpers
// ---------------------------------------------------------------------------

pub(crate) fn bearer_headers(api_key: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Authorization".to_string(),
        format!("Bearer {}", api_key),
    );
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn parse_role(role: &str) -> MessageRole {
    match role {
        "system" => MessageRole::System,
        "user" => MessageRole::User,
        "tool" => MessageRole::Tool,
        _ => MessageRole::Assistant,
    }
}

fn wire_message(message: &Message) -> Value {
    let mut out = Map::new();
    out.insert("role".to_string(), json!(wire_role(message.role)));
    out.insert("content".to_string(), json!(message.content));
    if let Some(tool_calls) = &message.tool_calls {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": tc.tool_type,
                    "function": {"name": tc.name, "arguments": tc.arguments},
                })
            })
            .collect();
        out.insert("tool_calls".to_string(), json!(calls));
    }
    if let Some(id) = &message.tool_call_id {
        out.insert("tool_call_id".to_string(), json!(id));
    }
    Value::Object(out)
}

/// Build an OpenAI-shaped chat body: model + messages + mapped parameters,
/// with the request's extra_body merged in last (never interpreted).
pub(crate) fn chat_body(request: &ChatRequest, mapped_params: &BTreeMap<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert(
        "messages".to_string(),
        Value::Array(request.messages.iter().map(wire_message).collect()),
    );
    for (name, value) in mapped_params {
        body.insert(name.clone(), value.clone());
    }
    for (name, value) in &request.extra_body {
        body.insert(name.clone(), value.clone());
    }
    Value::Object(body)
}

fn parse_message(value: &Value, json_mode: bool) -> Message {
    let role = value
        .get("role")
        .and_then(|v| v.as_str())
        .map_or(MessageRole::Assistant, parse_role);

    let tool_calls: Option<Vec<ToolCall>> =
        value.get("tool_calls").and_then(|v| v.as_array()).map(|calls| {
            calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    tool_type: tc
                        .get("type")
                        .and_then(|v| v.as_str())
                        .unwrap_or("function")
                        .to_string(),
                    name: tc
                        .pointer("/function/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    arguments: tc
                        .pointer("/function/arguments")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                })
                .collect()
        });

    let text = value
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let content = if json_mode {
        // Prefer the synthetic tool's arguments; otherwise recover JSON from
        // the free-text output.
        tool_calls
            .as_ref()
            .and_then(|calls| calls.iter().find(|tc| tc.name == JSON_TOOL_NAME))
            .map(|tc| tc.arguments.clone())
            .unwrap_or_else(|| extract::extract_json_string(&text))
    } else {
        text
    };

    Message {
        role,
        content,
        tool_calls,
        tool_call_id: None,
    }
}

pub(crate) fn parse_usage(value: &Value) -> Option<Usage> {
    let usage = value.get("usage")?;
    let prompt = usage.get("prompt_tokens").and_then(|v| v.as_u64())?;
    let completion = usage
        .get("completion_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    Some(Usage::new(prompt, completion))
}

/// Normalize an OpenAI-shaped response body into the canonical shape
pub(crate) fn normalize_response(
    raw: Value,
    headers: &BTreeMap<String, String>,
    json_mode: bool,
    provider: ProviderId,
) -> GatewayResult<ChatResponse> {
    let choices_raw = raw
        .get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GatewayError::Serialization(format!(
            "{} response missing 'choices' array",
            provider.as_str()
        )))?;

    let choices = choices_raw
        .iter()
        .enumerate()
        .map(|(fallback_index, choice)| Choice {
            index: choice
                .get("index")
                .and_then(|v| v.as_u64())
                .map_or(fallback_index, |i| i as usize),
            message: choice
                .get("message")
                .map(|m| parse_message(m, json_mode))
                .unwrap_or_else(|| Message::assistant("")),
            finish_reason: choice
                .get("finish_reason")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
        .collect();

    Ok(ChatResponse {
        id: raw
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        created: raw.get("created").and_then(|v| v.as_i64()).unwrap_or(0),
        model: raw
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        choices,
        usage: parse_usage(&raw),
        hidden: HiddenParams {
            raw,
            headers: headers.clone(),
        },
    })
}

/// Parse one OpenAI-shaped SSE data frame into a canonical chunk.
///
/// Returns `None` for frames that do not parse; the stream normalizer
/// degrades those to empty chunks.
pub(crate) fn parse_chunk(raw: &str) -> Option<StreamChunk> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let choice = value.get("choices")?.as_array()?.first();

    let (delta, finish_reason) = match choice {
        Some(choice) => {
            let delta_raw = choice.get("delta").cloned().unwrap_or(Value::Null);
            let tool_call = delta_raw
                .get("tool_calls")
                .and_then(|v| v.as_array())
                .and_then(|calls| calls.first())
                .map(|tc| ToolCallDelta {
                    index: tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                    id: tc.get("id").and_then(|v| v.as_str()).map(str::to_string),
                    name: tc
                        .pointer("/function/name")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    arguments: tc
                        .pointer("/function/arguments")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                });
            (
                Delta {
                    role: delta_raw
                        .get("role")
                        .and_then(|v| v.as_str())
                        .map(parse_role),
                    content: delta_raw
                        .get("content")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    tool_call,
                },
                choice
                    .get("finish_reason")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            )
        }
        // Usage-only terminal frames have an empty choices array.
        None => (Delta::default(), None),
    };

    Some(StreamChunk {
        id: value
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        created: value.get("created").and_then(|v| v.as_i64()).unwrap_or(0),
        model: value
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        delta,
        finish_reason,
        usage: parse_usage(&value),
    })
}
