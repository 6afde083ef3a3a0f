//! HTTP client implementation using reqwest

use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::{GatewayError, GatewayResult, ProviderId};
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("unigate/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client handle with connection pooling
///
/// Clones share the same pool and the same staleness flag; the client cache
/// hands out clones of one handle per key.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    closed: Arc<AtomicBool>,
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with the given request timeout
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            closed: Arc::new(AtomicBool::new(false)),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Whether the underlying connection has been marked dead
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the handle dead so the cache evicts it on next lookup
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn transport_error(
        &self,
        e: &reqwest::Error,
        provider: ProviderId,
        model: &str,
        request_id: uuid::Uuid,
    ) -> GatewayError {
        if e.is_connect() {
            // A handle that cannot connect is stale; let the cache rebuild it.
            self.mark_closed();
        }
        let status_code = e.status().map_or(0, |s| s.as_u16());
        GatewayError::Transport {
            status_code,
            message: format!("{} [request_id: {}]", e, request_id),
            provider,
            model: model.to_string(),
        }
    }

    /// Send a JSON request and return (status, headers, body)
    pub async fn send_json(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &Value,
        options: &RequestOptions,
        provider: ProviderId,
        model: &str,
    ) -> GatewayResult<(u16, BTreeMap<String, String>, Value)> {
        let request_id = options.request_id;
        debug!(%url, provider = provider.as_str(), model, %request_id, "sending request");

        let mut builder = self
            .client
            .post(url)
            .timeout(options.timeout)
            .json(body)
            .header("X-Request-ID", request_id.to_string());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&e, provider, model, request_id))?;

        let status = response.status();
        let response_headers = header_map(response.headers());

        if !status.is_success() {
            let body_text = response.text().await.ok();
            warn!(
                status = status.as_u16(),
                provider = provider.as_str(),
                %request_id,
                "request failed"
            );
            return Err(map_http_error(status, body_text.as_deref(), provider, model));
        }

        let text = response.text().await.map_err(|e| GatewayError::Transport {
            status_code: status.as_u16(),
            message: format!("Failed to read response body: {} [request_id: {}]", e, request_id),
            provider,
            model: model.to_string(),
        })?;

        if text.len() > self.max_response_size {
            return Err(GatewayError::Transport {
                status_code: status.as_u16(),
                message: format!(
                    "Response size {} exceeds maximum {}",
                    text.len(),
                    self.max_response_size
                ),
                provider,
                model: model.to_string(),
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            GatewayError::Serialization(format!(
                "Invalid response body from {}: {} [request_id: {}]",
                provider.as_str(),
                e,
                request_id
            ))
        })?;

        info!(provider = provider.as_str(), model, %request_id, "request completed");
        Ok((status.as_u16(), response_headers, value))
    }

    /// Send a streaming request and return the raw SSE data frames in arrival
    /// order.
    ///
    /// Dropping the returned stream cancels the underlying transport read.
    pub async fn send_stream(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &Value,
        options: &RequestOptions,
        provider: ProviderId,
        model: &str,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<String>>> {
        let request_id = options.request_id;
        debug!(%url, provider = provider.as_str(), model, %request_id, "opening stream");

        let mut builder = self
            .client
            .post(url)
            .timeout(options.timeout)
            .json(body)
            .header("X-Request-ID", request_id.to_string())
            .header("Accept", "text/event-stream");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&e, provider, model, request_id))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.ok();
            return Err(map_http_error(status, body_text.as_deref(), provider, model));
        }

        let model = model.to_string();
        let stream = response
            .bytes_stream()
            .eventsource()
            .map(move |result| match result {
                Ok(event) => Ok(event.data),
                Err(e) => Err(GatewayError::Transport {
                    status_code: 0,
                    message: format!("Stream error: {} [request_id: {}]", e, request_id),
                    provider,
                    model: model.clone(),
                }),
            });

        Ok(stream.boxed())
    }
}

fn header_map(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_flag_shared_across_clones() {
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let clone = client.clone();
        assert!(!clone.is_closed());
        client.mark_closed();
        assert!(clone.is_closed());
    }
}
