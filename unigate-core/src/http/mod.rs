//! HTTP transport layer
//!
//! Handles the outbound side of dispatch: pooled reqwest clients, the
//! process-wide client cache, error-envelope mapping, and request ID
//! correlation. Providers only describe *what* to send; everything about
//! *how* it goes over the wire lives here.

pub mod cache;
pub mod client;
pub mod error;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub use cache::{cached_client, ClientKey, ClientMode};
pub use client::HttpClient;

/// Type of API call being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Chat completion request
    Chat,
    // Future additions:
    // Embeddings,
    // Batch submission
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Type of API call
    pub call_kind: CallKind,

    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(call_kind: CallKind, timeout: Duration) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
            timeout,
        }
    }
}
