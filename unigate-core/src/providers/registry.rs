//! Provider config registry
//!
//! Resolves a (provider, model) pair to the single config variant that owns
//! it. Lookup is priority-ordered pattern matching: reasoning-model name
//! patterns beat the generic family config, which beats the provider's
//! passthrough default. An unknown provider is always an error — silently
//! picking the wrong adapter would corrupt parameter mapping downstream.

use crate::providers::adapter::ProviderConfig;
use crate::providers::anthropic::AnthropicConfig;
use crate::providers::asi::AsiConfig;
use crate::providers::azure::AzureConfig;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::openai::{is_reasoning_model, OpenAiConfig, OpenAiReasoningConfig};
use crate::providers::vertex::VertexConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported provider identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Azure,
    Anthropic,
    Vertex,
    Asi,
}

impl ProviderId {
    /// The `custom_llm_provider` discriminator string for this provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::Anthropic => "anthropic",
            Self::Vertex => "vertex",
            Self::Asi => "asi",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "azure" => Ok(Self::Azure),
            "anthropic" => Ok(Self::Anthropic),
            "vertex" | "vertex_ai" => Ok(Self::Vertex),
            "asi" => Ok(Self::Asi),
            other => Err(GatewayError::UnsupportedProvider {
                provider: other.to_string(),
                model: String::new(),
            }),
        }
    }
}

/// Registry of provider config variants
///
/// Configs are stateless and shared; one registry instance serves the whole
/// process.
pub struct ProviderRegistry {
    openai: Arc<dyn ProviderConfig>,
    openai_reasoning: Arc<dyn ProviderConfig>,
    azure: Arc<dyn ProviderConfig>,
    anthropic: Arc<dyn ProviderConfig>,
    vertex: Arc<dyn ProviderConfig>,
    asi: Arc<dyn ProviderConfig>,
}

impl ProviderRegistry {
    /// Create a registry with the built-in config variants
    pub fn new() -> Self {
        Self {
            openai: Arc::new(OpenAiConfig),
            openai_reasoning: Arc::new(OpenAiReasoningConfig),
            azure: Arc::new(AzureConfig),
            anthropic: Arc::new(AnthropicConfig),
            vertex: Arc::new(VertexConfig),
            asi: Arc::new(AsiConfig),
        }
    }

    /// Resolve the config for a (provider, model) pair.
    ///
    /// Exactly one config matches any supported pair; an unknown provider
    /// string fails rather than defaulting.
    pub fn resolve(
        &self,
        provider: &str,
        model: &str,
    ) -> GatewayResult<(ProviderId, Arc<dyn ProviderConfig>)> {
        let id = ProviderId::from_str(provider).map_err(|_| GatewayError::UnsupportedProvider {
            provider: provider.to_string(),
            model: model.to_string(),
        })?;
        Ok((id, self.resolve_id(id, model)))
    }

    /// Resolve the config for an already-parsed provider identity
    pub fn resolve_id(&self, provider: ProviderId, model: &str) -> Arc<dyn ProviderConfig> {
        match provider {
            // Reasoning-model patterns take precedence over the GPT family
            // default.
            ProviderId::OpenAi if is_reasoning_model(model) => {
                Arc::clone(&self.openai_reasoning)
            }
            ProviderId::OpenAi => Arc::clone(&self.openai),
            ProviderId::Azure => Arc::clone(&self.azure),
            ProviderId::Anthropic => Arc::clone(&self.anthropic),
            ProviderId::Vertex => Arc::clone(&self.vertex),
            ProviderId::Asi => Arc::clone(&self.asi),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("openai", "gpt-4o", "openai"; "gpt family")]
    #[test_case("openai", "o1-mini", "openai-reasoning"; "o1 pattern beats family")]
    #[test_case("openai", "gpt-5-turbo", "openai-reasoning"; "gpt-5 pattern beats family")]
    #[test_case("azure", "gpt-5", "azure"; "azure deployment")]
    #[test_case("anthropic", "claude-sonnet-4", "anthropic"; "anthropic family")]
    #[test_case("vertex", "gemini-2.0-flash", "vertex"; "vertex family")]
    #[test_case("asi", "asi1-mini", "asi"; "asi family")]
    fn test_resolve_matches_exactly_one(provider: &str, model: &str, expected: &str) {
        let registry = ProviderRegistry::new();
        let (_, config) = registry.resolve(provider, model).unwrap();
        assert_eq!(config.name(), expected);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("nonexistent", "some-model").unwrap_err();
        match err {
            GatewayError::UnsupportedProvider { provider, model } => {
                assert_eq!(provider, "nonexistent");
                assert_eq!(model, "some-model");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_provider_id_round_trip() {
        for id in [
            ProviderId::OpenAi,
            ProviderId::Azure,
            ProviderId::Anthropic,
            ProviderId::Vertex,
            ProviderId::Asi,
        ] {
            assert_eq!(ProviderId::from_str(id.as_str()).unwrap(), id);
        }
    }
}
