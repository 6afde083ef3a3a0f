//! Gateway error types and handling

use crate::providers::ProviderId;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the dispatch and normalization engine
///
/// Every variant that reaches a caller exposes `{status_code, message,
/// provider, model}` through the accessor methods so errors can be handled
/// programmatically. `RequestShape`, `StreamParse`, and `BatchLine` are
/// normally recovered inline and only escape when recovery is exhausted.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No provider config matched the (provider, model) pair
    #[error("No provider config for provider '{provider}' and model '{model}'")]
    UnsupportedProvider { provider: String, model: String },

    /// A parameter is unsupported and drop-params is disabled
    #[error("Provider '{provider}' does not support parameter '{param}' for model '{model}'. {hint}")]
    UnsupportedParameter {
        param: String,
        provider: ProviderId,
        model: String,
        hint: String,
    },

    /// The provider rejected the request's message shape
    #[error("Request shape rejected by {provider} for model '{model}': {message}")]
    RequestShape {
        message: String,
        provider: ProviderId,
        model: String,
        status_code: u16,
        /// Invalid top-level fields named by the provider, when parseable
        invalid_fields: Vec<String>,
    },

    /// Network or HTTP failure, propagated verbatim, never retried here
    #[error("Transport error from {provider} for model '{model}' (status {status_code}): {message}")]
    Transport {
        status_code: u16,
        message: String,
        provider: ProviderId,
        model: String,
    },

    /// A single malformed stream frame; recovered by degrading to an empty chunk
    #[error("Failed to parse stream chunk from {provider}: {message}")]
    StreamParse { message: String, provider: ProviderId },

    /// A single unparseable or uncostable batch output line; logged and skipped
    #[error("Batch output line {line} could not be processed: {message}")]
    BatchLine { line: usize, message: String },

    /// Invalid gateway configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request or response serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// HTTP status code associated with this error, when one applies
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RequestShape { status_code, .. } | Self::Transport { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    /// Provider the error originated from, when known
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::UnsupportedProvider { provider, .. } => Some(provider),
            Self::UnsupportedParameter { provider, .. }
            | Self::RequestShape { provider, .. }
            | Self::Transport { provider, .. }
            | Self::StreamParse { provider, .. } => Some(provider.as_str()),
            _ => None,
        }
    }

    /// Model the error relates to, when known
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::UnsupportedProvider { model, .. }
            | Self::UnsupportedParameter { model, .. }
            | Self::RequestShape { model, .. }
            | Self::Transport { model, .. } => Some(model),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_accessors() {
        let err = GatewayError::Transport {
            status_code: 503,
            message: "overloaded".to_string(),
            provider: ProviderId::Anthropic,
            model: "claude-sonnet-4".to_string(),
        };
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.provider(), Some("anthropic"));
        assert_eq!(err.model(), Some("claude-sonnet-4"));
    }

    #[test]
    fn test_unsupported_parameter_names_offender() {
        let err = GatewayError::UnsupportedParameter {
            param: "temperature".to_string(),
            provider: ProviderId::OpenAi,
            model: "o1-mini".to_string(),
            hint: "Enable drop_params to omit it silently.".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("temperature"));
        assert!(message.contains("o1-mini"));
        assert!(message.contains("drop_params"));
    }
}
