//! Core protocol types for LLM interactions
//!
//! The canonical shapes prioritize:
//! - Type safety through enums and strong typing
//! - A fixed optional-parameter vocabulary mapped generically per provider
//! - Streaming support through a dedicated chunk type
//! - Opaque round-tripping of raw vendor payloads for debugging/cost tools

use crate::config::SecretString;
use crate::providers::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The fixed vocabulary of optional parameter names a [`ChatRequest`] may carry.
///
/// Parameter mapping only ever consults this set; providers declare which
/// subset they support per model and how names are rewritten on the wire.
pub const OPTIONAL_PARAMS: &[&str] = &[
    "temperature",
    "max_tokens",
    "stop",
    "tools",
    "tool_choice",
    "response_format",
    "stream",
    "top_p",
    "frequency_penalty",
    "presence_penalty",
    "seed",
    "user",
];

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
    /// Tool response (for tool use support)
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content of the message
    pub content: String,

    /// Tool calls (for assistant messages with tool use)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (for tool response messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a message with an arbitrary role
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Empty placeholder message used by request-shape repair
    pub fn placeholder(role: MessageRole) -> Self {
        Self::new(role, "")
    }
}

/// Tool call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Type of tool (usually "function")
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Function name
    pub name: String,

    /// Function arguments (JSON string)
    pub arguments: String,
}

/// Canonical chat request
///
/// Immutable once built and sent: the repair loop clones and rewrites a copy,
/// it never mutates a request that has already gone out on the wire.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier to use
    pub model: String,

    /// Messages in the conversation, in order
    pub messages: Vec<Message>,

    /// Optional parameters, keyed by names from [`OPTIONAL_PARAMS`]
    pub params: BTreeMap<String, serde_json::Value>,

    /// Which provider this request is destined for
    pub provider: ProviderId,

    /// Credential for the provider
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Optional organization identifier (forwarded as a header where supported)
    pub organization: Option<String>,

    /// Extra headers merged into the outbound request, never interpreted
    pub extra_headers: BTreeMap<String, String>,

    /// Extra body fields merged into the outbound payload, never interpreted
    pub extra_body: BTreeMap<String, serde_json::Value>,
}

impl ChatRequest {
    /// Start building a request for a (provider, model) pair
    pub fn builder(provider: ProviderId, model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder::new(provider, model)
    }

    /// Whether the caller asked for a streamed response
    pub fn wants_stream(&self) -> bool {
        self.params
            .get("stream")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Builder for [`ChatRequest`]
pub struct ChatRequestBuilder {
    model: String,
    messages: Vec<Message>,
    params: BTreeMap<String, serde_json::Value>,
    provider: ProviderId,
    api_key: SecretString,
    timeout: Duration,
    organization: Option<String>,
    extra_headers: BTreeMap<String, String>,
    extra_body: BTreeMap<String, serde_json::Value>,
}

impl ChatRequestBuilder {
    /// Create a new builder with the required fields
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            params: BTreeMap::new(),
            provider,
            api_key: SecretString::default(),
            timeout: Duration::from_secs(30),
            organization: None,
            extra_headers: BTreeMap::new(),
            extra_body: BTreeMap::new(),
        }
    }

    /// Append a message
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Replace the full message sequence
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Set an optional parameter by name
    pub fn param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<SecretString>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the organization identifier
    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Add an extra pass-through header
    pub fn extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Add an extra pass-through body field
    pub fn extra_body(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_body.insert(name.into(), value);
        self
    }

    /// Build the request
    pub fn build(self) -> ChatRequest {
        ChatRequest {
            model: self.model,
            messages: self.messages,
            params: self.params,
            provider: self.provider,
            api_key: self.api_key,
            timeout: self.timeout,
            organization: self.organization,
            extra_headers: self.extra_headers,
            extra_body: self.extra_body,
        }
    }
}

/// Canonical chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Unique response ID
    pub id: String,

    /// Creation timestamp (Unix seconds)
    pub created: i64,

    /// Model that produced the response
    pub model: String,

    /// Response choices, in index order
    pub choices: Vec<Choice>,

    /// Token usage information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Opaque vendor payload and headers, round-tripped for debugging and
    /// cost tooling, never interpreted by callers
    #[serde(default)]
    pub hidden: HiddenParams,
}

/// Response choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    pub index: usize,

    /// Generated message
    pub message: Message,

    /// Finish reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Opaque vendor metadata carried alongside a response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiddenParams {
    /// Raw vendor payload as received
    #[serde(default)]
    pub raw: serde_json::Value,

    /// Response headers as received
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// One incremental unit of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Response ID the chunk belongs to
    pub id: String,

    /// Creation timestamp (Unix seconds)
    pub created: i64,

    /// Model producing the stream
    pub model: String,

    /// Partial message fragment
    pub delta: Delta,

    /// Finish reason, set only on the terminal chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Usage, present only on the terminal chunk for providers that report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A zero-content chunk, used for keep-alives and degraded frames
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            created: 0,
            model: String::new(),
            delta: Delta::default(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Whether the chunk carries no content at all
    pub fn is_empty(&self) -> bool {
        self.delta.role.is_none()
            && self.delta.content.as_deref().is_none_or(str::is_empty)
            && self.delta.tool_call.is_none()
            && self.finish_reason.is_none()
            && self.usage.is_none()
    }
}

/// Partial message fragment within a stream chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Role, present only on the first chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,

    /// Content fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool-call fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallDelta>,
}

/// Tool call fragment for streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index in the tool calls array
    pub index: usize,

    /// Tool call ID, present only on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Function name, present only on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Token usage information
///
/// `total_tokens == prompt_tokens + completion_tokens` holds for every value
/// produced by this type's constructors and by [`Usage::combine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,

    /// Tokens in the completion
    pub completion_tokens: u64,

    /// Total tokens used
    pub total_tokens: u64,
}

impl Usage {
    /// Create a usage value; the total is derived, not caller-supplied
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Field-wise saturating sum of two usage values
    pub fn combine(&self, other: &Usage) -> Usage {
        Usage::new(
            self.prompt_tokens.saturating_add(other.prompt_tokens),
            self.completion_tokens
                .saturating_add(other.completion_tokens),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::builder(ProviderId::OpenAi, "gpt-4o")
            .message(Message::system("You are helpful"))
            .message(Message::user("Hi"))
            .param("temperature", serde_json::json!(0.7))
            .param("stream", serde_json::json!(true))
            .api_key("sk-test")
            .build();

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert!(request.wants_stream());
        assert_eq!(request.params["temperature"], serde_json::json!(0.7));
    }

    #[test]
    fn test_usage_combine() {
        let a = Usage::new(10, 5);
        let b = Usage::new(3, 7);
        let combined = a.combine(&b);
        assert_eq!(combined.prompt_tokens, 13);
        assert_eq!(combined.completion_tokens, 12);
        assert_eq!(combined.total_tokens, 25);
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = StreamChunk::empty();
        assert!(chunk.is_empty());

        let mut with_content = StreamChunk::empty();
        with_content.delta.content = Some("hi".to_string());
        assert!(!with_content.is_empty());
    }

    proptest! {
        #[test]
        fn usage_combine_upholds_total_invariant(
            p1 in 0u64..=u64::MAX / 2,
            c1 in 0u64..=u64::MAX / 2,
            p2 in 0u64..=u64::MAX / 2,
            c2 in 0u64..=u64::MAX / 2,
        ) {
            let combined = Usage::new(p1, c1).combine(&Usage::new(p2, c2));
            prop_assert_eq!(
                combined.total_tokens,
                combined.prompt_tokens.saturating_add(combined.completion_tokens)
            );
        }
    }
}
