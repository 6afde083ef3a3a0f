//! Credential plumbing for the gateway core
//!
//! The gateway never owns credential storage. Callers hand each request an
//! already-resolved [`SecretString`], and anything that needs to look a secret
//! up by name goes through the [`SecretStore`] collaborator.

pub mod secrets;

pub use secrets::{EnvSecrets, SecretStore, SecretString};
