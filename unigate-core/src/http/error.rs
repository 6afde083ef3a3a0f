//! HTTP error mapping utilities
//!
//! Maps provider error envelopes onto the gateway error taxonomy. Request
//! shape violations (role alternation, trailing role, named invalid fields)
//! become `RequestShape` so the repair loop can act on them; everything else
//! is a `Transport` error propagated verbatim.

use crate::providers::{GatewayError, ProviderId};
use reqwest::StatusCode;
use serde_json::Value;

/// Map an HTTP error status and response body to a gateway error
pub fn map_http_error(
    status: StatusCode,
    body: Option<&str>,
    provider: ProviderId,
    model: &str,
) -> GatewayError {
    let json = body.and_then(|b| serde_json::from_str::<Value>(b).ok());
    let message = json
        .as_ref()
        .and_then(extract_error_message)
        .or_else(|| body.map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let invalid_fields = json.as_ref().map(extract_invalid_fields).unwrap_or_default();

    let is_shape_error = status == StatusCode::UNPROCESSABLE_ENTITY && !invalid_fields.is_empty()
        || status.is_client_error() && mentions_message_shape(&message);

    if is_shape_error {
        GatewayError::RequestShape {
            message,
            provider,
            model: model.to_string(),
            status_code: status.as_u16(),
            invalid_fields,
        }
    } else {
        GatewayError::Transport {
            status_code: status.as_u16(),
            message,
            provider,
            model: model.to_string(),
        }
    }
}

fn mentions_message_shape(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("roles must alternate")
        || lower.contains("alternate between")
        || (lower.contains("last message") || lower.contains("final message"))
            && lower.contains("user")
}

/// Extract a human-readable message from common provider error envelopes
fn extract_error_message(json: &Value) -> Option<String> {
    // OpenAI format: { "error": { "message": "...", "type": "...", "code": "..." } }
    if let Some(message) = json.pointer("/error/message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }

    // Generic format: { "message": "..." }
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }

    // Bare string error: { "error": "..." }
    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Some(error.to_string());
    }

    None
}

/// Extract the top-level parameter names an unprocessable-entity body flags
/// as invalid
pub fn extract_invalid_fields(json: &Value) -> Vec<String> {
    let mut fields = Vec::new();

    // OpenAI format: error.param, a single name or an array of names
    match json.pointer("/error/param") {
        Some(Value::String(param)) => fields.push(param.clone()),
        Some(Value::Array(params)) => {
            fields.extend(params.iter().filter_map(|p| p.as_str().map(str::to_string)));
        }
        _ => {}
    }

    // Validation-list format: { "errors": [{"param": ..} | {"field": ..}, ..] }
    if let Some(errors) = json.get("errors").and_then(|v| v.as_array()) {
        for error in errors {
            if let Some(name) = error
                .get("param")
                .or_else(|| error.get("field"))
                .and_then(|v| v.as_str())
            {
                fields.push(name.to_string());
            }
        }
    }

    // FastAPI-style: { "detail": [{"loc": ["body", "temperature"], ..}, ..] }
    if let Some(detail) = json.get("detail").and_then(|v| v.as_array()) {
        for entry in detail {
            if let Some(name) = entry
                .get("loc")
                .and_then(|v| v.as_array())
                .and_then(|loc| loc.last())
                .and_then(|v| v.as_str())
            {
                fields.push(name.to_string());
            }
        }
    }

    fields.dedup();
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_alternation_maps_to_request_shape() {
        let body = json!({"error": {"message": "messages: roles must alternate between user and assistant"}});
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            Some(&body.to_string()),
            ProviderId::Anthropic,
            "claude-sonnet-4",
        );
        assert!(matches!(err, GatewayError::RequestShape { .. }));
    }

    #[test]
    fn test_unprocessable_with_fields_maps_to_request_shape() {
        let body = json!({
            "error": {"message": "unprocessable entity", "param": ["temperature", "seed"]}
        });
        let err = map_http_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            Some(&body.to_string()),
            ProviderId::OpenAi,
            "gpt-4o",
        );
        match err {
            GatewayError::RequestShape { invalid_fields, status_code, .. } => {
                assert_eq!(invalid_fields, vec!["temperature", "seed"]);
                assert_eq!(status_code, 422);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_server_error_maps_to_transport() {
        let err = map_http_error(
            StatusCode::SERVICE_UNAVAILABLE,
            Some("overloaded"),
            ProviderId::Anthropic,
            "claude-sonnet-4",
        );
        match err {
            GatewayError::Transport { status_code, message, .. } => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_detail_loc_fields_extracted() {
        let json = json!({"detail": [{"loc": ["body", "logit_bias"], "msg": "extra"}]});
        assert_eq!(extract_invalid_fields(&json), vec!["logit_bias"]);
    }
}
