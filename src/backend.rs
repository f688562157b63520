//! # Backend Traits
//!
//! Trait seams for the two backends a sync pass talks to.
//!
//! The source and target live in different trust domains and are
//! authenticated independently, so they are modeled as two distinct
//! traits: a [`SourceBackend`] can only be read from, a
//! [`TargetBackend`] is where all mutations go. The type system then
//! rules out ever issuing a write through the source session.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::config::{AuthMethodDeclaration, RoleDeclaration, SecretDeclaration};
use crate::error::Result;

/// Outcome of reading a secret path.
///
/// "Not found" is an expected, explicitly-checked outcome, kept apart
/// from transport errors so callers never dereference a missing
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretReadOutcome {
    Found(Map<String, Value>),
    NotFound,
}

/// Credential pair the backend generates when a role is created.
///
/// Always read back from the backend, never invented locally: the
/// secret identifier is write-once on the backend side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCredentials {
    pub role_id: String,
    pub secret_id: String,
}

/// Read-only session against the source backend.
#[async_trait]
pub trait SourceBackend: Send + Sync {
    /// Read the secret value at `{mount}/{path}`.
    async fn read_secret(&self, mount: &str, path: &str) -> Result<SecretReadOutcome>;
}

/// Mutating session against the target backend.
#[async_trait]
pub trait TargetBackend: Send + Sync {
    /// Enabled secret engine mounts, keys without trailing slash.
    async fn list_engines(&self) -> Result<HashSet<String>>;

    /// Enable the declared secret engine at its mount path.
    async fn enable_engine(&self, decl: &SecretDeclaration) -> Result<()>;

    /// Enabled auth method mounts, keys without trailing slash.
    async fn list_auth_methods(&self) -> Result<HashSet<String>>;

    /// Enable the declared auth method at its mount path.
    async fn enable_auth_method(&self, decl: &AuthMethodDeclaration) -> Result<()>;

    /// Upload a policy document. Replace-in-place, inherently
    /// idempotent.
    async fn put_policy(&self, name: &str, document: &str) -> Result<()>;

    /// Role names existing under an auth mount. An auth mount that
    /// has never had a role is an empty set, not an error.
    async fn list_roles(&self, auth_path: &str) -> Result<Vec<String>>;

    /// Create the declared role.
    async fn create_role(&self, decl: &RoleDeclaration) -> Result<()>;

    /// Derive the generated credential pair for a freshly created
    /// role.
    async fn read_role_credentials(&self, decl: &RoleDeclaration) -> Result<RoleCredentials>;

    /// Write a secret payload at `{mount}/{path}`, overwriting any
    /// existing value.
    async fn write_secret(&self, mount: &str, path: &str, data: &Map<String, Value>) -> Result<()>;
}
