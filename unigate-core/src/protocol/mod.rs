//! Canonical protocol types
//!
//! Every provider is translated to and from the single request/response shape
//! defined here. Providers never leak their own wire structs past the
//! `providers` module boundary.

pub mod types;

pub use types::{
    ChatRequest, ChatRequestBuilder, ChatResponse, Choice, Delta, HiddenParams, Message,
    MessageRole, StreamChunk, ToolCall, ToolCallDelta, Usage, OPTIONAL_PARAMS,
};
