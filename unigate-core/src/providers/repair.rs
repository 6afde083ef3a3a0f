//! Request-shape repair
//!
//! Some providers reject requests for structural reasons the caller cannot
//! always anticipate: strict role alternation, a required trailing user
//! message, or parameters the deployed model variant refuses. Each such
//! rejection maps to exactly one repair, applied to a fresh copy of the
//! request. Classification is centralized here so dispatch never inspects
//! error text itself.

use crate::protocol::types::{ChatRequest, Message};
use crate::providers::error::GatewayError;
use tracing::debug;

/// A single corrective rewrite of a rejected request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    /// Insert placeholder messages so roles strictly alternate
    RepairRoles,
    /// Append an empty user message so the conversation ends with one
    AppendUser,
    /// Remove the named parameters the provider flagged as invalid
    DropParams(Vec<String>),
}

/// Decide whether an error is repairable, and how.
///
/// Returns `None` for everything that is not a known shape rejection;
/// transient transport failures are deliberately not retried here.
pub fn classify_repair(error: &GatewayError, allow_drop_params: bool) -> Option<RepairAction> {
    let GatewayError::RequestShape {
        message,
        invalid_fields,
        ..
    } = error
    else {
        return None;
    };

    let lower = message.to_lowercase();

    if lower.contains("roles must alternate") || lower.contains("alternate between") {
        return Some(RepairAction::RepairRoles);
    }

    if (lower.contains("last message") || lower.contains("final message"))
        && lower.contains("user")
    {
        return Some(RepairAction::AppendUser);
    }

    if allow_drop_params && !invalid_fields.is_empty() {
        return Some(RepairAction::DropParams(invalid_fields.clone()));
    }

    None
}

/// Apply a repair to a copy of the request; the original is left untouched.
pub fn apply_repair(request: &ChatRequest, action: &RepairAction) -> ChatRequest {
    let mut repaired = request.clone();
    match action {
        RepairAction::RepairRoles => {
            repaired.messages = alternate_roles(&request.messages);
            debug!(
                before = request.messages.len(),
                after = repaired.messages.len(),
                "inserted placeholders to restore role alternation"
            );
        }
        RepairAction::AppendUser => {
            repaired.messages.push(Message::user(""));
            debug!("appended empty trailing user message");
        }
        RepairAction::DropParams(params) => {
            for param in params {
                repaired.params.remove(param);
            }
            debug!(dropped = ?params, "dropped rejected parameters");
        }
    }
    repaired
}

/// Insert an empty opposite-role placeholder between consecutive same-role
/// messages
fn alternate_roles(messages: &[Message]) -> Vec<Message> {
    let mut result: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        if let Some(previous) = result.last() {
            if previous.role == message.role {
                result.push(Message::placeholder(opposite_role(message.role)));
            }
        }
        result.push(message.clone());
    }
    result
}

fn opposite_role(role: crate::protocol::types::MessageRole) -> crate::protocol::types::MessageRole {
    use crate::protocol::types::MessageRole;
    match role {
        MessageRole::User => MessageRole::Assistant,
        _ => MessageRole::User,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::MessageRole;
    use crate::providers::ProviderId;

    fn shape_error(message: &str, invalid_fields: Vec<String>) -> GatewayError {
        GatewayError::RequestShape {
            message: message.to_string(),
            provider: ProviderId::Anthropic,
            model: "claude-sonnet-4".to_string(),
            status_code: 400,
            invalid_fields,
        }
    }

    #[test]
    fn test_role_alternation_message_classified() {
        let err = shape_error("messages: roles must alternate between user and assistant", vec![]);
        assert_eq!(classify_repair(&err, true), Some(RepairAction::RepairRoles));
    }

    #[test]
    fn test_trailing_user_message_classified() {
        let err = shape_error("the final message must be from the user", vec![]);
        assert_eq!(classify_repair(&err, true), Some(RepairAction::AppendUser));
    }

    #[test]
    fn test_invalid_fields_classified_only_when_dropping_allowed() {
        let err = shape_error("unprocessable entity", vec!["seed".to_string()]);
        assert_eq!(
            classify_repair(&err, true),
            Some(RepairAction::DropParams(vec!["seed".to_string()]))
        );
        assert_eq!(classify_repair(&err, false), None);
    }

    #[test]
    fn test_transport_errors_are_not_repairable() {
        let err = GatewayError::Transport {
            status_code: 503,
            message: "overloaded".to_string(),
            provider: ProviderId::OpenAi,
            model: "gpt-4o".to_string(),
        };
        assert_eq!(classify_repair(&err, true), None);
    }

    #[test]
    fn test_repair_roles_inserts_placeholders() {
        let request = ChatRequest::builder(ProviderId::Anthropic, "claude-sonnet-4")
            .message(Message::user("first"))
            .message(Message::user("second"))
            .message(Message::assistant("reply"))
            .message(Message::assistant("more"))
            .build();

        let repaired = apply_repair(&request, &RepairAction::RepairRoles);
        let roles: Vec<MessageRole> = repaired.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
            ]
        );
        // The original request is untouched.
        assert_eq!(request.messages.len(), 4);
    }

    #[test]
    fn test_append_user_adds_empty_trailing_message() {
        let request = ChatRequest::builder(ProviderId::Anthropic, "claude-sonnet-4")
            .message(Message::user("question"))
            .message(Message::assistant("partial"))
            .build();

        let repaired = apply_repair(&request, &RepairAction::AppendUser);
        let last = repaired.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::User);
        assert!(last.content.is_empty());
    }

    #[test]
    fn test_drop_params_removes_only_named_keys() {
        let request = ChatRequest::builder(ProviderId::OpenAi, "gpt-4o")
            .message(Message::user("hi"))
            .param("temperature", serde_json::json!(0.7))
            .param("seed", serde_json::json!(42))
            .build();

        let repaired = apply_repair(
            &request,
            &RepairAction::DropParams(vec!["seed".to_string()]),
        );
        assert!(!repaired.params.contains_key("seed"));
        assert!(repaired.params.contains_key("temperature"));
    }
}
