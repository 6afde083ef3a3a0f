//! Parameter mapping engine
//!
//! Shared machinery behind every config's `map_params`: copy supported
//! parameters across (renaming where the provider's wire name differs), drop
//! or reject unsupported ones, and apply explicit per-provider value
//! rewrites. Each config opts into the rewrites it needs; nothing here is
//! applied implicitly.

use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::ProviderId;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Internal marker carried in mapped params when a JSON response_format was
/// rewritten into a tool call. Stripped before the request is serialized.
pub const JSON_MODE_MARKER: &str = "json_mode";

/// Name of the synthetic tool used to force structured output on providers
/// without native JSON mode.
pub const JSON_TOOL_NAME: &str = "json_response";

/// Map canonical parameters to provider-native ones under the drop/raise policy.
///
/// `renames` lists `(canonical, provider_native)` pairs; parameters in
/// `supported` but absent from `renames` keep their canonical name.
pub fn map_params(
    params: &BTreeMap<String, Value>,
    supported: &[&str],
    renames: &[(&str, &str)],
    provider: ProviderId,
    model: &str,
    drop_unsupported: bool,
) -> GatewayResult<BTreeMap<String, Value>> {
    let mut mapped = BTreeMap::new();

    for (name, value) in params {
        if !supported.contains(&name.as_str()) {
            if drop_unsupported {
                tracing::debug!(
                    provider = provider.as_str(),
                    model,
                    param = name.as_str(),
                    "dropping unsupported parameter"
                );
                continue;
            }
            return Err(GatewayError::UnsupportedParameter {
                param: name.clone(),
                provider,
                model: model.to_string(),
                hint: "Enable drop_params to omit it silently, or remove it from the request."
                    .to_string(),
            });
        }

        let wire_name = renames
            .iter()
            .find(|(canonical, _)| canonical == name)
            .map_or(name.as_str(), |(_, native)| *native);

        mapped.insert(wire_name.to_string(), value.clone());
    }

    Ok(mapped)
}

/// Rewrite a literal temperature of 0 to a near-zero value.
///
/// Some providers reject `temperature: 0` outright; 1e-5 is behaviorally
/// equivalent and accepted.
pub fn nudge_zero_temperature(mapped: &mut BTreeMap<String, Value>) {
    if let Some(value) = mapped.get_mut("temperature") {
        if value.as_f64() == Some(0.0) {
            *value = json!(1e-5);
        }
    }
}

/// Rewrite a JSON `response_format` into a single synthetic tool call with a
/// forced `tool_choice`, for providers without native structured output.
///
/// Sets the [`JSON_MODE_MARKER`] so the response path knows to run the
/// extraction fallback over whatever comes back.
pub fn json_format_to_tool(mapped: &mut BTreeMap<String, Value>) {
    let Some(format) = mapped.remove("response_format") else {
        return;
    };

    let format_type = format.get("type").and_then(|v| v.as_str()).unwrap_or("");
    if format_type != "json_object" && format_type != "json_schema" {
        // Plain text format needs no rewrite; put it back untouched.
        mapped.insert("response_format".to_string(), format);
        return;
    }

    let schema = format
        .pointer("/json_schema/schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "object"}));

    mapped.insert(
        "tools".to_string(),
        json!([{
            "type": "function",
            "function": {
                "name": JSON_TOOL_NAME,
                "description": "Return the response as a JSON object",
                "parameters": schema,
            }
        }]),
    );
    mapped.insert(
        "tool_choice".to_string(),
        json!({"type": "function", "function": {"name": JSON_TOOL_NAME}}),
    );
    mapped.insert(JSON_MODE_MARKER.to_string(), json!(true));
}

/// Take the json-mode marker out of a mapped parameter set
pub fn take_json_mode(mapped: &mut BTreeMap<String, Value>) -> bool {
    mapped
        .remove(JSON_MODE_MARKER)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_supported_param_copied() {
        let input = params(&[("temperature", json!(0.5))]);
        let mapped = map_params(
            &input,
            &["temperature"],
            &[],
            ProviderId::OpenAi,
            "gpt-4o",
            false,
        )
        .unwrap();
        assert_eq!(mapped["temperature"], json!(0.5));
    }

    #[test]
    fn test_rename_applied() {
        let input = params(&[("max_tokens", json!(256))]);
        let mapped = map_params(
            &input,
            &["max_tokens"],
            &[("max_tokens", "max_completion_tokens")],
            ProviderId::OpenAi,
            "o1",
            false,
        )
        .unwrap();
        assert!(!mapped.contains_key("max_tokens"));
        assert_eq!(mapped["max_completion_tokens"], json!(256));
    }

    #[test]
    fn test_unsupported_dropped_when_enabled() {
        let input = params(&[("temperature", json!(0.5)), ("seed", json!(42))]);
        let mapped = map_params(
            &input,
            &["temperature"],
            &[],
            ProviderId::OpenAi,
            "o1",
            true,
        )
        .unwrap();
        assert_eq!(mapped.len(), 1);
        assert!(mapped.contains_key("temperature"));
    }

    #[test]
    fn test_unsupported_raises_when_drop_disabled() {
        let input = params(&[("seed", json!(42))]);
        let err = map_params(
            &input,
            &["temperature"],
            &[],
            ProviderId::OpenAi,
            "o1",
            false,
        )
        .unwrap_err();
        match err {
            GatewayError::UnsupportedParameter { param, model, .. } => {
                assert_eq!(param, "seed");
                assert_eq!(model, "o1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_temperature_nudged() {
        let mut mapped = params(&[("temperature", json!(0.0))]);
        nudge_zero_temperature(&mut mapped);
        assert_eq!(mapped["temperature"], json!(1e-5));

        let mut untouched = params(&[("temperature", json!(0.7))]);
        nudge_zero_temperature(&mut untouched);
        assert_eq!(untouched["temperature"], json!(0.7));
    }

    #[test]
    fn test_json_format_rewritten_to_tool() {
        let mut mapped = params(&[("response_format", json!({"type": "json_object"}))]);
        json_format_to_tool(&mut mapped);

        assert!(!mapped.contains_key("response_format"));
        assert_eq!(
            mapped["tools"][0]["function"]["name"],
            json!(JSON_TOOL_NAME)
        );
        assert_eq!(
            mapped["tool_choice"]["function"]["name"],
            json!(JSON_TOOL_NAME)
        );
        assert!(take_json_mode(&mut mapped));
        assert!(!mapped.contains_key(JSON_MODE_MARKER));
    }

    #[test]
    fn test_text_format_left_alone() {
        let mut mapped = params(&[("response_format", json!({"type": "text"}))]);
        json_format_to_tool(&mut mapped);
        assert_eq!(mapped["response_format"], json!({"type": "text"}));
        assert!(!take_json_mode(&mut mapped));
    }
}
