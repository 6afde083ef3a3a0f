//! Vertex AI (Gemini) provider config
//!
//! The Gemini envelope differs structurally from the OpenAI shape: contents
//! instead of messages, candidates instead of choices, usageMetadata instead
//! of usage. Batch output artifacts from Vertex also flow through this
//! config's response transform.

use crate::extract;
use crate::http::CallKind;
use crate::protocol::{
    ChatRequest, ChatResponse, Choice, Delta, HiddenParams, Message, MessageRole, StreamChunk,
    Usage,
};
use crate::providers::adapter::ProviderConfig;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::params;
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
];

/// Vertex AI Gemini config
#[derive(Debug)]
pub struct VertexConfig;

impl VertexConfig {
    fn finish_reason(reason: &str) -> String {
        match reason {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            "SAFETY" | "RECITATION" => "content_filter".to_string(),
            other => other.to_lowercase(),
        }
    }
}

impl ProviderConfig for VertexConfig {
    fn name(&self) -> &'static str {
        "vertex"
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
            &[
                ("max_tokens", "maxOutputTokens"),
                ("stop", "stopSequences"),
                ("top_p", "topP"),
            ],
            ProviderId::Vertex,
            model,
            drop_unsupported,
        )?;
        // Gemini takes structured output as a generation-config MIME type.
        if let Some(format) = mapped.remove("response_format") {
            let format_type = format.get("type").and_then(|v| v.as_str()).unwrap_or("");
            if format_type == "json_object" || format_type == "json_schema" {
                mapped.insert(
                    "responseMimeType".to_string(),
                    json!("application/json"),
                );
            }
        }
        Ok(mapped)
    }

    fn transform_request(
        &self,
        request: &ChatRequest,
        mapped_params: &BTreeMap<String, Value>,
    ) -> GatewayResult<Value> {
        let mut body = Map::new();

        let mut system = String::new();
        let mut contents = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(&message.content);
                }
                MessageRole::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{"text": message.content}],
                })),
                MessageRole::User | MessageRole::Tool => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": message.content}],
                })),
            }
        }
        if !system.is_empty() {
            body.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system}]}),
            );
        }
        body.insert("contents".to_string(), Value::Array(contents));

        // Generation parameters nest under generationConfig; tool params stay
        // top level.
        let mut generation_config = Map::new();
        for (name, value) in mapped_params {
            match name.as_str() {
                "tools" | "tool_choice" | "stream" => {
                    body.insert(name.clone(), value.clone());
                }
                _ => {
                    generation_config.insert(name.clone(), value.clone());
                }
            }
        }
        if !generation_config.is_empty() {
            body.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
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
        let candidates = raw
            .get("candidates")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GatewayError::Serialization(
                    "vertex response missing 'candidates' array".to_string(),
                )
            })?;

        let choices = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let text: String = candidate
                    .pointer("/content/parts")
                    .and_then(|v| v.as_array())
                    .map(|parts| {
                        parts
                            .iter()
                            .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                            .collect()
                    })
                    .unwrap_or_default();

                let content = if json_mode {
                    extract::extract_json_string(&text)
                } else {
                    text
                };

                Choice {
                    index,
                    message: Message {
                        role: MessageRole::Assistant,
                        content,
                        tool_calls: None,
                        tool_call_id: None,
                    },
                    finish_reason: candidate
                        .get("finishReason")
                        .and_then(|v| v.as_str())
                        .map(Self::finish_reason),
                }
            })
            .collect();

        let usage = raw.get("usageMetadata").map(|usage| {
            Usage::new(
                usage
                    .get("promptTokenCount")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                usage
                    .get("candidatesTokenCount")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            )
        });

        Ok(ChatResponse {
            id: raw
                .get("responseId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            model: raw
                .get("modelVersion")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            choices,
            usage,
            hidden: HiddenParams {
                raw,
                headers: headers.clone(),
            },
        })
    }

    fn parse_stream_chunk(&self, raw: &str) -> Option<StreamChunk> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let candidate = value.get("candidates")?.as_array()?.first()?;

        let text: String = candidate
            .pointer("/content/parts")
            .and_then(|v| v.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let mut chunk = StreamChunk::empty();
        chunk.model = value
            .get("modelVersion")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        chunk.delta = Delta {
            role: None,
            content: Some(text),
            tool_call: None,
        };
        chunk.finish_reason = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .map(Self::finish_reason);
        chunk.usage = value.get("usageMetadata").map(|usage| {
            Usage::new(
                usage
                    .get("promptTokenCount")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                usage
                    .get("candidatesTokenCount")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            )
        });
        Some(chunk)
    }

    fn base_url(&self) -> &str {
        "https://aiplatform.googleapis.com/v1"
    }

    fn endpoint(&self, call_kind: CallKind) -> &str {
        match call_kind {
            CallKind::Chat => "/publishers/google/models/gemini:generateContent",
        }
    }

    fn headers(&self, api_key: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", api_key),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message as Msg;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest::builder(ProviderId::Vertex, "gemini-2.0-flash")
            .message(Msg::system("Short answers"))
            .message(Msg::user("Hi"))
            .param("max_tokens", json!(64))
            .param("temperature", json!(0.5))
            .build();

        let config = VertexConfig;
        let mapped = config
            .map_params(&request.params, &request.model, false)
            .unwrap();
        let body = config.transform_request(&request, &mapped).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("Short answers")
        );
        assert_eq!(body["contents"][0]["role"], json!("user"));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(64));
        assert_eq!(body["generationConfig"]["temperature"], json!(0.5));
    }

    #[test]
    fn test_response_normalized() {
        let raw = json!({
            "responseId": "resp-1",
            "modelVersion": "gemini-2.0-flash",
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
        });

        let response = VertexConfig
            .transform_response(raw, &BTreeMap::new(), false)
            .unwrap();
        assert_eq!(response.choices[0].message.content, "Hello world");
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 6);
    }

    #[test]
    fn test_stream_chunk_parsed() {
        let chunk = VertexConfig
            .parse_stream_chunk(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}],"modelVersion":"gemini-2.0-flash"}"#,
            )
            .unwrap();
        assert_eq!(chunk.delta.content.as_deref(), Some("Hi"));
        assert!(chunk.finish_reason.is_none());
    }
}
