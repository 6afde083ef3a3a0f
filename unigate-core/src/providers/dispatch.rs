//! Request dispatch
//!
//! Ties the layers together: registry resolution, parameter mapping, request
//! transformation, the pooled transport, the bounded repair loop, and
//! response normalization. Completion and streaming share the same prepare
//! and repair logic; only the final transport call differs.

use crate::http::{cached_client, CallKind, ClientKey, ClientMode, HttpClient, RequestOptions};
use crate::protocol::types::{ChatRequest, ChatResponse, StreamChunk};
use crate::providers::adapter::ProviderConfig;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::params::take_json_mode;
use crate::providers::registry::{ProviderId, ProviderRegistry};
use crate::providers::repair::{apply_repair, classify_repair};
use crate::stream::{BlockingChunks, ChunkNormalizer, NormalizedStream};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Total sends allowed per logical request, including the original.
///
/// Exactly one repair attempt; the ceiling is a constant, not a config knob.
const MAX_SEND_ATTEMPTS: usize = 2;

/// Entry point for dispatching canonical requests to providers
pub struct Dispatcher {
    registry: ProviderRegistry,
    drop_params: bool,
    base_url_override: Option<String>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            drop_params: false,
            base_url_override: None,
        }
    }

    /// Permit silently dropping parameters a provider does not support,
    /// instead of failing the request
    pub fn drop_unsupported_params(mut self, drop: bool) -> Self {
        self.drop_params = drop;
        self
    }

    /// Override the provider base URL (Azure resource hosts, proxies, tests)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Send a chat completion request and return the normalized response
    pub async fn complete(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        self.complete_with_mode(request, ClientMode::Async).await
    }

    /// Open a streamed chat completion as a normalized async stream
    pub async fn stream(&self, request: &ChatRequest) -> GatewayResult<NormalizedStream> {
        let (config, frames) = self.open_stream_frames(request, ClientMode::Async).await?;
        let normalizer = ChunkNormalizer::new(config, request.model.clone());
        Ok(NormalizedStream::new(frames, normalizer))
    }

    /// Blocking variant of [`Dispatcher::complete`]
    pub fn complete_blocking(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        blocking_runtime()?.block_on(self.complete_with_mode(request, ClientMode::Sync))
    }

    /// Blocking variant of [`Dispatcher::stream`]: collects the raw frames,
    /// then normalizes them through the same state machine as the async path
    pub fn stream_blocking_collected(
        &self,
        request: &ChatRequest,
    ) -> GatewayResult<Vec<StreamChunk>> {
        let runtime = blocking_runtime()?;
        let (config, frames) = runtime.block_on(self.open_stream_frames(request, ClientMode::Sync))?;
        let frames: Vec<String> = runtime.block_on(frames.try_collect())?;
        let normalizer = ChunkNormalizer::new(config, request.model.clone());
        Ok(BlockingChunks::new(frames.into_iter(), normalizer).collect())
    }

    async fn complete_with_mode(
        &self,
        request: &ChatRequest,
        mode: ClientMode,
    ) -> GatewayResult<ChatResponse> {
        let config = self.registry.resolve_id(request.provider, &request.model);
        let client = self.client_for(request, &config, mode)?;
        let mut current = request.clone();

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            let prepared = self.prepare(&config, &current, false)?;
            let options = RequestOptions::new(CallKind::Chat, current.timeout);
            debug!(
                provider = current.provider.as_str(),
                model = %current.model,
                attempt,
                "dispatching completion"
            );

            let result = client
                .send_json(
                    &prepared.url,
                    &prepared.headers,
                    &prepared.body,
                    &options,
                    current.provider,
                    &current.model,
                )
                .await;

            match result {
                Ok((_, headers, raw)) => {
                    return config.transform_response(raw, &headers, prepared.json_mode);
                }
                Err(e) => current = self.repair_or_fail(&current, e, attempt)?,
            }
        }

        // The loop always returns or propagates within MAX_SEND_ATTEMPTS.
        Err(GatewayError::Configuration(
            "dispatch loop exhausted without a response".to_string(),
        ))
    }

    async fn open_stream_frames(
        &self,
        request: &ChatRequest,
        mode: ClientMode,
    ) -> GatewayResult<(Arc<dyn ProviderConfig>, BoxStream<'static, GatewayResult<String>>)> {
        let config = self.registry.resolve_id(request.provider, &request.model);
        let client = self.client_for(request, &config, mode)?;
        let mut current = request.clone();

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            let prepared = self.prepare(&config, &current, true)?;
            let options = RequestOptions::new(CallKind::Chat, current.timeout);
            debug!(
                provider = current.provider.as_str(),
                model = %current.model,
                attempt,
                "opening completion stream"
            );

            let result = client
                .send_stream(
                    &prepared.url,
                    &prepared.headers,
                    &prepared.body,
                    &options,
                    current.provider,
                    &current.model,
                )
                .await;

            match result {
                Ok(frames) => {
                    info!(
                        provider = current.provider.as_str(),
                        model = %current.model,
                        "stream opened"
                    );
                    return Ok((Arc::clone(&config), frames));
                }
                Err(e) => current = self.repair_or_fail(&current, e, attempt)?,
            }
        }

        Err(GatewayError::Configuration(
            "dispatch loop exhausted without a stream".to_string(),
        ))
    }

    /// Decide the fate of a failed send: a repaired request for the next
    /// attempt, or the error itself.
    fn repair_or_fail(
        &self,
        current: &ChatRequest,
        error: GatewayError,
        attempt: usize,
    ) -> GatewayResult<ChatRequest> {
        if attempt >= MAX_SEND_ATTEMPTS {
            return Err(error);
        }
        match classify_repair(&error, self.drop_params) {
            Some(action) => {
                warn!(
                    provider = current.provider.as_str(),
                    model = %current.model,
                    repair = ?action,
                    "request rejected, retrying once with repair"
                );
                Ok(apply_repair(current, &action))
            }
            None => Err(error),
        }
    }

    fn prepare(
        &self,
        config: &Arc<dyn ProviderConfig>,
        request: &ChatRequest,
        streaming: bool,
    ) -> GatewayResult<Prepared> {
        let mut mapped = config.map_params(&request.params, &request.model, self.drop_params)?;
        let json_mode = take_json_mode(&mut mapped);
        if streaming {
            mapped.insert("stream".to_string(), Value::Bool(true));
        } else {
            // A stray stream flag on the completion path would switch the
            // provider into SSE output.
            mapped.remove("stream");
        }

        let body = config.transform_request(request, &mapped)?;

        let base_url = self
            .base_url_override
            .as_deref()
            .unwrap_or_else(|| config.base_url());
        let url = format!("{}{}", base_url, config.endpoint(CallKind::Chat));
        url::Url::parse(&url).map_err(|e| {
            GatewayError::Configuration(format!("Invalid endpoint URL '{}': {}", url, e))
        })?;

        let mut headers = config.headers(request.api_key.expose_secret());
        if request.provider == ProviderId::OpenAi {
            if let Some(org) = &request.organization {
                headers.insert("OpenAI-Organization".to_string(), org.clone());
            }
        }
        for (name, value) in &request.extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        Ok(Prepared {
            url,
            headers,
            body,
            json_mode,
        })
    }

    fn client_for(
        &self,
        request: &ChatRequest,
        config: &Arc<dyn ProviderConfig>,
        mode: ClientMode,
    ) -> GatewayResult<HttpClient> {
        let base_url = self
            .base_url_override
            .clone()
            .unwrap_or_else(|| config.base_url().to_string());
        let key = ClientKey {
            credential_fingerprint: request.api_key.fingerprint(),
            base_url,
            timeout_ms: request.timeout.as_millis() as u64,
            retry_count: (MAX_SEND_ATTEMPTS - 1) as u32,
            organization: request.organization.clone(),
            mode,
        };
        cached_client(&key)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

struct Prepared {
    url: String,
    headers: BTreeMap<String, String>,
    body: Value,
    json_mode: bool,
}

fn blocking_runtime() -> GatewayResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| GatewayError::Configuration(format!("Failed to build runtime: {}", e)))
}
