//! Anthropic provider config
//!
//! Handles the Messages API differences: system prompt as a separate field,
//! strict role alternation, `stop_sequences` naming, content-block responses,
//! and JSON mode via the synthetic-tool rewrite (no native structured output).

use crate::extract;
use crate::http::CallKind;
use crate::protocol::{
    ChatRequest, ChatResponse, Choice, HiddenParams, Message, MessageRole, StreamChunk, ToolCall,
    Usage,
};
use crate::providers::adapter::ProviderConfig;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::params::{self, JSON_TOOL_NAME};
use crate::providers::ProviderId;
use serde_json::{json, Map, Value};
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
    "user",
];

/// Anthropic Messages API config
#[derive(Debug)]
pub struct AnthropicConfig;

impl AnthropicConfig {
    /// Map a stop_reason to the canonical finish_reason vocabulary
    fn finish_reason(stop_reason: &str) -> String {
        match stop_reason {
            "end_turn" | "stop_sequence" => "stop".to_string(),
            "max_tokens" => "length".to_string(),
            "tool_use" => "tool_calls".to_string(),
            other => other.to_string(),
        }
    }
}

impl ProviderConfig for AnthropicConfig {
    fn name(&self) -> &'static str {
        "anthropic"
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
            &[("stop", "stop_sequences")],
            ProviderId::Anthropic,
            model,
            drop_unsupported,
        )?;
        params::json_format_to_tool(&mut mapped);
        Ok(mapped)
    }

    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value> {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(request.model));

        // System messages become the top-level system field; everything else
        // stays in the messages array.
        let mut system = String::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(&message.content);
                }
                MessageRole::User | MessageRole::Tool => {
                    messages.push(json!({"role": "user", "content": message.content}));
                }
                MessageRole::Assistant => {
                    messages.push(json!({"role": "assistant", "content": message.content}));
                }
            }
        }
        if !system.is_empty() {
            body.insert("system".to_string(), json!(system));
        }
        body.insert("messages".to_string(), Value::Array(messages));

        for (name, value) in mapped_params {
            body.insert(name.clone(), value.clone());
        }
        // max_tokens is mandatory on the Messages API.
        body.entry("max_tokens".to_string())
            .or_insert_with(|| json!(4096));

        // Anthropic's forced-tool syntax differs from the OpenAI shape the
        // rewrite produces.
        if let Some(choice) = body.get("tool_choice") {
            if choice.pointer("/function/name").is_some() {
                body.insert(
                    "tool_choice".to_string(),
                    json!({"type": "tool", "name": JSON_TOOL_NAME}),
                );
            }
        }
        if let Some(tools) = body.remove("tools") {
            let converted: Vec<Value> = tools
                .as_array()
                .into_iter()
                .flatten()
                .map(|tool| {
                    tool.get("function").map_or_else(
                        || tool.clone(),
                        |function| {
                            json!({
                                "name": function.get("name").cloned().unwrap_or_default(),
                                "description": function.get("description").cloned().unwrap_or_default(),
                                "input_schema": function
                                    .get("parameters")
                                    .cloned()
                                    .unwrap_or_else(|| json!({"type": "object"})),
                            })
                        },
                    )
                })
                .collect();
            body.insert("tools".to_string(), json!(converted));
        }

        for (name, value) in &request.extra_body {
            body.insert(name.clone(), value.clone());
        }
        Ok(Value::Object(body))
    }

    fn transform_response(
        &self,
        raw: Value,
        headers: &BTreeMap<String, String>,
        json_mode: bool,
    ) -> GatewayResult<ChatResponse> {
        let content_blocks = raw
            .get("content")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GatewayError::Serialization("anthropic response missing 'content' array".to_string())
            })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in content_blocks {
            match block.get("type").and_then(|v| v.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall {
                        id: block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                        tool_type: "function".to_string(),
                        name: block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                        arguments: block
                            .get("input")
                            .map(|v| v.to_string())
                            .unwrap_or_default(),
                    });
                }
                _ => {}
            }
        }

        let content = if json_mode {
            tool_calls
                .iter()
                .find(|tc| tc.name == JSON_TOOL_NAME)
                .map(|tc| tc.arguments.clone())
                .unwrap_or_else(|| extract::extract_json_string(&text))
        } else {
            text
        };

        let usage = raw.get("usage").map(|usage| {
            Usage::new(
                usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                usage
                    .get("output_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            )
        });

        let message = Message {
            role: MessageRole::Assistant,
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        };

        Ok(ChatResponse {
            id: raw
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            model: raw
                .get("model")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: raw
                    .get("stop_reason")
                    .and_then(|v| v.as_str())
                    .map(Self::finish_reason),
            }],
            usage,
            hidden: HiddenParams {
                raw,
                headers: headers.clone(),
            },
        })
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let event_type = value.get("type").and_then(|v| v.as_str())?;

        let mut chunk = StreamChunk::empty();
        match event_type {
            "message_start" => {
                let message = value.get("message")?;
                chunk.id = message
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                chunk.model = message
                    .get("model")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                chunk.delta.role = Some(MessageRole::Assistant);
            }
            "content_block_delta" => {
                chunk.delta.content = value
                    .pointer("/delta/text")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
            }
            "message_delta" => {
                chunk.finish_reason = value
                    .pointer("/delta/stop_reason")
                    .and_then(|v| v.as_str())
                    .map(Self::finish_reason);
                chunk.usage = value.get("usage").map(|usage| {
                    Usage::new(
                        usage
                            .get("input_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0),
                        usage
                            .get("output_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0),
                    )
                });
            }
            "message_stop" => {
                chunk.finish_reason = Some("stop".to_string());
            }
            // ping and other event types carry no content
            _ => {}
        }
        Some(chunk)
    }

    fn base_url(&self) -> &str {
        "https://api.anthropic.com/v1"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/messages",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), api_key.to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("anthropic-version".to_string(), "2023-06-01".to_string());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message as Msg;

    #[test]
    fn test_system_extracted_and_stop_renamed() {
        let request = ChatRequest::builder(ProviderId::Anthropic, "claude-sonnet-4")
            .message(Msg::system("Be brief"))
            .message(Msg::user("Hello"))
            .param("stop", json!(["END"]))
            .param("max_tokens", json!(128))
            .build();

        let config = AnthropicConfig;
        let mapped = config
            .map_params(&request.params, &request.model, false)
            .unwrap();
        let body = config.transform_request(&request, &mapped).unwrap();

        assert_eq!(body["system"], json!("Be brief"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["stop_sequences"], json!(["END"]));
        assert_eq!(body["max_tokens"], json!(128));
    }

    #[test]
    fn test_max_tokens_defaulted() {
        let request = ChatRequest::builder(ProviderId::Anthropic, "claude-sonnet-4")
            .message(Msg::user("Hi"))
            .build();
        let config = AnthropicConfig;
        let body = config
            .transform_request(&request, &BTreeMap::new())
            .unwrap();
        assert_eq!(body["max_tokens"], json!(4096));
    }

    #[test]
    fn test_json_format_becomes_anthropic_tool() {
        let request = ChatRequest::builder(ProviderId::Anthropic, "claude-sonnet-4")
            .message(Msg::user("Give me JSON"))
            .param("response_format", json!({"type": "json_object"}))
            .build();

        let config = AnthropicConfig;
        let mut mapped = config
            .map_params(&request.params, &request.model, false)
            .unwrap();
        assert!(params::take_json_mode(&mut mapped));

        let body = config.transform_request(&request, &mapped).unwrap();
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": JSON_TOOL_NAME}));
        assert_eq!(body["tools"][0]["name"], json!(JSON_TOOL_NAME));
        assert!(body["tools"][0].get("input_schema").is_some());
    }

    #[test]
    fn test_response_normalized() {
        let raw = json!({
            "id": "msg_01XYZ",
            "model": "claude-sonnet-4",
            "content": [{"type": "text", "text": "Hello there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 15, "output_tokens": 12}
        });

        let response = AnthropicConfig
            .transform_response(raw, &BTreeMap::new(), false)
            .unwrap();
        assert_eq!(response.id, "msg_01XYZ");
        assert_eq!(response.choices[0].message.content, "Hello there");
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 15);
        assert_eq!(usage.completion_tokens, 12);
        assert_eq!(usage.total_tokens, 27);
    }

    #[test]
    fn test_stream_events_parsed() {
        let config = AnthropicConfig;

        let start = config
            .parse_stream_chunk(
                r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-sonnet-4"}}"#,
            )
            .unwrap();
        assert_eq!(start.delta.role, Some(MessageRole::Assistant));

        let delta = config
            .parse_stream_chunk(
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            )
            .unwrap();
        assert_eq!(delta.delta.content.as_deref(), Some("Hi"));

        let end = config
            .parse_stream_chunk(
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":9}}"#,
            )
            .unwrap();
        assert_eq!(end.finish_reason.as_deref(), Some("stop"));
        assert_eq!(end.usage.unwrap().completion_tokens, 9);

        assert!(config.parse_stream_chunk("garbage").is_none());
    }
}
