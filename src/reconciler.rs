//! # Resource Reconciler
//!
//! Generic create-if-absent reconciliation, instantiated per resource
//! kind. One pass fetches the existing resource set with a single
//! list call, then creates each desired resource whose key is absent,
//! in declared order, strictly sequentially. Resources that already
//! exist are left untouched: presence is the only thing checked, no
//! diffing, no update-on-drift.
//!
//! Policies are the deliberate exception: the backend's policy write
//! is replace-in-place and therefore idempotent on its own, so they
//! are always re-put without an existence check.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::backend::TargetBackend;
use crate::config::{AuthMethodDeclaration, Policy, RoleDeclaration, SecretDeclaration};
use crate::emit;
use crate::error::{Result, Stage};
use crate::observer::SyncObserver;

/// A reconcilable resource kind: key extraction, the list call and
/// the create call, parameterized over the declaration type.
#[async_trait]
pub trait ResourceKind {
    type Resource: Sync;

    /// Human-readable kind name for checkpoints.
    fn kind(&self) -> &'static str;

    /// Stage label attached to failures.
    fn stage(&self) -> Stage;

    /// Identity of a declared resource within the backend.
    fn key(&self, resource: &Self::Resource) -> String;

    /// Keys of the resources that already exist. Called once per
    /// reconciliation pass, never per item.
    async fn existing(
        &self,
        target: &dyn TargetBackend,
        desired: &[Self::Resource],
    ) -> Result<HashSet<String>>;

    /// Create one missing resource.
    async fn create(
        &self,
        target: &dyn TargetBackend,
        resource: &Self::Resource,
        observer: &dyn SyncObserver,
    ) -> Result<()>;
}

/// Reconcile a desired resource set against the target backend.
///
/// Fail-fast: the first list or create error aborts the remaining
/// items and is surfaced annotated with the stage and resource key.
/// Returns the number of resources created.
pub async fn reconcile<K>(
    kind: &K,
    target: &dyn TargetBackend,
    desired: &[K::Resource],
    observer: &dyn SyncObserver,
) -> Result<usize>
where
    K: ResourceKind + Sync,
{
    let existing = kind
        .existing(target, desired)
        .await
        .map_err(|e| e.in_stage(kind.stage(), "list"))?;

    let mut created = 0;
    for resource in desired {
        let key = kind.key(resource);
        if existing.contains(&key) {
            observer.resource_skipped(kind.kind(), &key);
            continue;
        }
        kind.create(target, resource, observer)
            .await
            .map_err(|e| e.in_stage(kind.stage(), &key))?;
        observer.resource_created(kind.kind(), &key);
        created += 1;
    }
    Ok(created)
}

/// Secret engines, keyed by mount path.
#[derive(Debug, Default)]
pub struct EngineKind;

#[async_trait]
impl ResourceKind for EngineKind {
    type Resource = SecretDeclaration;

    fn kind(&self) -> &'static str {
        "engine"
    }

    fn stage(&self) -> Stage {
        Stage::Engines
    }

    fn key(&self, resource: &SecretDeclaration) -> String {
        resource.mount.clone()
    }

    async fn existing(
        &self,
        target: &dyn TargetBackend,
        _desired: &[SecretDeclaration],
    ) -> Result<HashSet<String>> {
        target.list_engines().await
    }

    async fn create(
        &self,
        target: &dyn TargetBackend,
        resource: &SecretDeclaration,
        _observer: &dyn SyncObserver,
    ) -> Result<()> {
        target.enable_engine(resource).await
    }
}

/// Auth methods, keyed by mount path.
#[derive(Debug, Default)]
pub struct AuthMethodKind;

#[async_trait]
impl ResourceKind for AuthMethodKind {
    type Resource = AuthMethodDeclaration;

    fn kind(&self) -> &'static str {
        "auth method"
    }

    fn stage(&self) -> Stage {
        Stage::AuthMethods
    }

    fn key(&self, resource: &AuthMethodDeclaration) -> String {
        resource.path.clone()
    }

    async fn existing(
        &self,
        target: &dyn TargetBackend,
        _desired: &[AuthMethodDeclaration],
    ) -> Result<HashSet<String>> {
        target.list_auth_methods().await
    }

    async fn create(
        &self,
        target: &dyn TargetBackend,
        resource: &AuthMethodDeclaration,
        _observer: &dyn SyncObserver,
    ) -> Result<()> {
        target.enable_auth_method(resource).await
    }
}

/// AppRoles, keyed by `{auth path}/{role name}`.
///
/// Creation is the one place credentials come into existence: the
/// backend generates the pair and this kind reads it back, persisting
/// it when the declaration carries an output directory.
/// An already-existing role is never touched, because a second
/// secret-id generation would not reproduce the original value.
#[derive(Debug, Default)]
pub struct RoleKind;

fn role_key(path: &str, name: &str) -> String {
    format!("{path}/{name}")
}

#[async_trait]
impl ResourceKind for RoleKind {
    type Resource = RoleDeclaration;

    fn kind(&self) -> &'static str {
        "role"
    }

    fn stage(&self) -> Stage {
        Stage::Roles
    }

    fn key(&self, resource: &RoleDeclaration) -> String {
        role_key(&resource.path, &resource.name)
    }

    async fn existing(
        &self,
        target: &dyn TargetBackend,
        desired: &[RoleDeclaration],
    ) -> Result<HashSet<String>> {
        // One list call per distinct auth path, in declared order.
        let mut seen_paths = Vec::new();
        for decl in desired {
            if !seen_paths.iter().any(|p| p == &decl.path) {
                seen_paths.push(decl.path.clone());
            }
        }

        let mut existing = HashSet::new();
        for auth_path in seen_paths {
            for name in target.list_roles(&auth_path).await? {
                existing.insert(role_key(&auth_path, &name));
            }
        }
        Ok(existing)
    }

    async fn create(
        &self,
        target: &dyn TargetBackend,
        resource: &RoleDeclaration,
        observer: &dyn SyncObserver,
    ) -> Result<()> {
        target.create_role(resource).await?;
        let credentials = target.read_role_credentials(resource).await?;

        if let Some(output) = &resource.output {
            let file = emit::write_role_credentials(output, &resource.name, &credentials).await?;
            observer.credentials_emitted(&resource.name, &file);
        }
        Ok(())
    }
}

/// Upload every policy document. No existence check: the put is
/// replace-in-place on the backend side.
pub async fn apply_policies(
    target: &dyn TargetBackend,
    policies: &[Policy],
    observer: &dyn SyncObserver,
) -> Result<usize> {
    for policy in policies {
        target
            .put_policy(&policy.name, &policy.document)
            .await
            .map_err(|e| e.in_stage(Stage::Policies, &policy.name))?;
        observer.policy_written(&policy.name);
    }
    Ok(policies.len())
}
