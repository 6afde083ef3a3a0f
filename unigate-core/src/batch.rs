//! Batch output aggregation
//!
//! A completed batch job's output artifact is a JSON-Lines file with a
//! provider-specific envelope per line. Aggregation folds the successful
//! lines into combined usage, cost, and the set of models observed. Batch
//! files can hold thousands of lines from long-running jobs, so a single bad
//! line is never fatal: it is logged and skipped, and aggregation continues.

use crate::protocol::types::Usage;
use crate::providers::error::{GatewayError, GatewayResult};
use crate::providers::registry::{ProviderId, ProviderRegistry};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Pricing collaborator
///
/// Pricing tables live outside this crate; aggregation only needs a cost per
/// (model, provider, usage) triple.
pub trait CostCalculator {
    fn cost(&self, model: &str, provider: ProviderId, usage: &Usage) -> Result<f64, String>;
}

/// Aggregate result over one batch output artifact
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Sum of per-line costs
    pub total_cost: f64,

    /// Combined usage across all successful lines
    pub usage: Usage,

    /// Distinct model names observed
    pub models: BTreeSet<String>,

    /// Lines folded into the summary
    pub processed: usize,

    /// Lines skipped: failed, malformed, or uncostable
    pub skipped: usize,
}

/// Aggregate the full decoded content of a batch job's output artifact.
///
/// `fallback_model` stands in when a line's response omits the model name.
/// Always completes; per-line problems reduce to skips.
pub fn aggregate_batch(
    content: &str,
    provider: ProviderId,
    fallback_model: &str,
    registry: &ProviderRegistry,
    cost: &dyn CostCalculator,
) -> BatchSummary {
    let mut summary = BatchSummary {
        total_cost: 0.0,
        usage: Usage::default(),
        models: BTreeSet::new(),
        processed: 0,
        skipped: 0,
    };

    for (number, line) in content.lines().enumerate() {
        let number = number + 1;
        if line.trim().is_empty() {
            continue;
        }

        match aggregate_line(line, number, provider, fallback_model, registry, cost) {
            Ok(Some((line_usage, line_cost, model))) => {
                summary.usage = summary.usage.combine(&line_usage);
                summary.total_cost += line_cost;
                summary.models.insert(model);
                summary.processed += 1;
            }
            Ok(None) => {
                // Unsuccessful result for this line; not an aggregation error.
                debug!(line = number, "skipping unsuccessful batch line");
                summary.skipped += 1;
            }
            Err(e) => {
                warn!(line = number, error = %e, "skipping bad batch line");
                summary.skipped += 1;
            }
        }
    }

    summary
}

/// Fold one line: `Ok(None)` for a line the provider marked unsuccessful,
/// `Err` for a line that cannot be processed.
fn aggregate_line(
    line: &str,
    number: usize,
    provider: ProviderId,
    fallback_model: &str,
    registry: &ProviderRegistry,
    cost: &dyn CostCalculator,
) -> GatewayResult<Option<(Usage, f64, String)>> {
    let record: Value = serde_json::from_str(line).map_err(|e| GatewayError::BatchLine {
        line: number,
        message: format!("invalid JSON: {}", e),
    })?;

    let Some(body) = successful_body(&record, provider) else {
        return Ok(None);
    };

    let model_hint = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(fallback_model)
        .to_string();

    let config = registry.resolve_id(provider, &model_hint);
    let response = config
        .transform_response(body.clone(), &Default::default(), false)
        .map_err(|e| GatewayError::BatchLine {
            line: number,
            message: format!("untransformable response body: {}", e),
        })?;

    let usage = response.usage.ok_or_else(|| GatewayError::BatchLine {
        line: number,
        message: "response carries no usage".to_string(),
    })?;

    let model = if response.model.is_empty() {
        model_hint
    } else {
        response.model
    };

    let line_cost = cost
        .cost(&model, provider, &usage)
        .map_err(|e| GatewayError::BatchLine {
            line: number,
            message: format!("cost calculation failed: {}", e),
        })?;

    Ok(Some((usage, line_cost, model)))
}

/// Apply the provider's success predicate and locate the vendor response body
fn successful_body(record: &Value, provider: ProviderId) -> Option<&Value> {
    match provider {
        ProviderId::Anthropic => {
            let result_type = record.pointer("/result/type").and_then(|v| v.as_str())?;
            if result_type != "succeeded" {
                return None;
            }
            record.pointer("/result/message")
        }
        ProviderId::Vertex => {
            let status = record.get("status").and_then(|v| v.as_str()).unwrap_or("");
            if !status.is_empty() && status != "JOB_STATE_SUCCEEDED" {
                return None;
            }
            record.get("response")
        }
        // OpenAI-style envelope, shared by the compatible providers.
        ProviderId::OpenAi | ProviderId::Azure | ProviderId::Asi => {
            let status_code = record.pointer("/response/status_code").and_then(|v| v.as_u64())?;
            if status_code != 200 {
                return None;
            }
            record.pointer("/response/body")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FlatRate(f64);

    impl CostCalculator for FlatRate {
        fn cost(&self, _model: &str, _provider: ProviderId, usage: &Usage) -> Result<f64, String> {
            Ok(self.0 * usage.total_tokens as f64)
        }
    }

    struct AlwaysFails;

    impl CostCalculator for AlwaysFails {
        fn cost(&self, model: &str, _provider: ProviderId, _usage: &Usage) -> Result<f64, String> {
            Err(format!("no pricing for {}", model))
        }
    }

    fn openai_line(status_code: u64, prompt: u64, completion: u64) -> String {
        json!({
            "custom_id": "req-1",
            "response": {
                "status_code": status_code,
                "body": {
                    "id": "chatcmpl-1",
                    "created": 1700000000,
                    "model": "gpt-4o",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "ok"},
                        "finish_reason": "stop"
                    }],
                    "usage": {
                        "prompt_tokens": prompt,
                        "completion_tokens": completion,
                        "total_tokens": prompt + completion
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_failed_line_skipped_and_usage_invariant_holds() {
        let content = [
            openai_line(200, 10, 5),
            openai_line(500, 99, 99),
            openai_line(200, 20, 3),
        ]
        .join("\n");

        let registry = ProviderRegistry::new();
        let summary = aggregate_batch(&content, ProviderId::OpenAi, "gpt-4o", &registry, &FlatRate(0.5));

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.usage.prompt_tokens, 30);
        assert_eq!(summary.usage.completion_tokens, 8);
        assert_eq!(
            summary.usage.total_tokens,
            summary.usage.prompt_tokens + summary.usage.completion_tokens
        );
        assert_eq!(summary.total_cost, 0.5 * 38.0);
        assert_eq!(summary.models.len(), 1);
        assert!(summary.models.contains("gpt-4o"));
    }

    #[test]
    fn test_malformed_line_does_not_abort() {
        let content = format!("{}\nnot json at all\n{}", openai_line(200, 1, 1), openai_line(200, 2, 2));
        let registry = ProviderRegistry::new();
        let summary =
            aggregate_batch(&content, ProviderId::OpenAi, "gpt-4o", &registry, &FlatRate(1.0));
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_uncostable_line_skipped() {
        let registry = ProviderRegistry::new();
        let summary = aggregate_batch(
            &openai_line(200, 4, 4),
            ProviderId::OpenAi,
            "gpt-4o",
            &registry,
            &AlwaysFails,
        );
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_cost, 0.0);
    }

    #[test]
    fn test_anthropic_success_predicate() {
        let succeeded = json!({
            "custom_id": "req-1",
            "result": {
                "type": "succeeded",
                "message": {
                    "id": "msg-1",
                    "model": "claude-sonnet-4",
                    "role": "assistant",
                    "content": [{"type": "text", "text": "hi"}],
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 3, "output_tokens": 2}
                }
            }
        })
        .to_string();
        let errored = json!({
            "custom_id": "req-2",
            "result": {"type": "errored", "error": {"message": "overloaded"}}
        })
        .to_string();

        let content = format!("{}\n{}", succeeded, errored);
        let registry = ProviderRegistry::new();
        let summary = aggregate_batch(
            &content,
            ProviderId::Anthropic,
            "claude-sonnet-4",
            &registry,
            &FlatRate(1.0),
        );
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.models.contains("claude-sonnet-4"));
        assert_eq!(summary.usage.total_tokens, 5);
    }
}
