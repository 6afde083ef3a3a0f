//! Secrets handling and redaction
//!
//! API keys travel through request structs and client-cache keys, so the
//! wrapper type guarantees they never leak through Display/Debug output and
//! provides a stable fingerprint for cache keying.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A wrapper type for sensitive strings like API keys
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    /// Create a new secret string
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Stable, non-reversible fingerprint of the secret.
    ///
    /// Used as the credential component of transport client-cache keys so two
    /// requests with the same key share a pooled client without the key
    /// itself being stored in the cache.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.value.hash(&mut hasher);
        hasher.finish()
    }

    /// Get a partially redacted version for debugging
    pub fn partial_redact(&self) -> String {
        if self.value.is_empty() {
            return "[EMPTY]".to_string();
        }

        let len = self.value.len();
        if len <= 8 {
            "[REDACTED]".to_string()
        } else if self.value.starts_with("sk-") || self.value.starts_with("pk-") {
            format!("{}...{}", &self.value[..3], &self.value[len - 4..])
        } else {
            format!(
                "{}...{}",
                &self.value[..2.min(len)],
                &self.value[len.saturating_sub(2)..]
            )
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Collaborator boundary for secret lookup.
///
/// The gateway asks for secrets by name and treats the answer as opaque;
/// where the value comes from (env, vault, keychain) is the caller's concern.
pub trait SecretStore: Send + Sync {
    /// Look up a secret by name, returning `None` when it is not set
    fn get_secret(&self, name: &str) -> Option<SecretString>;
}

/// Environment-variable backed secret store
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get_secret(&self, name: &str) -> Option<SecretString> {
        std::env::var(name).ok().map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redaction() {
        let secret = SecretString::new("sk-1234567890abcdef");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(secret.partial_redact(), "sk-...cdef");
    }

    #[test]
    fn test_secret_string_expose() {
        let secret = SecretString::new("my-secret-value");
        assert_eq!(secret.expose_secret(), "my-secret-value");
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = SecretString::new("sk-aaaa");
        let b = SecretString::new("sk-bbbb");
        assert_eq!(a.fingerprint(), SecretString::new("sk-aaaa").fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_env_secrets_lookup() {
        std::env::set_var("UNIGATE_TEST_SECRET", "value-123");
        let store = EnvSecrets;
        let secret = store.get_secret("UNIGATE_TEST_SECRET").unwrap();
        assert_eq!(secret.expose_secret(), "value-123");
        assert!(store.get_secret("UNIGATE_TEST_SECRET_MISSING").is_none());
        std::env::remove_var("UNIGATE_TEST_SECRET");
    }
}
