//! # Sync Orchestrator
//!
//! Sequences one full sync pass against one configuration document:
//! authenticate against the target, reconcile engines, then auth
//! methods, then policies, then roles (emitting fresh credentials),
//! then authenticate against the source and replicate the declared
//! secrets across.
//!
//! Single pass, no retries between stages, nothing rolled back on
//! failure. Everything already reconciled stays put; a rerun is safe
//! because every stage is create-if-absent or idempotent-put.
//!
//! The source and target sessions are authenticated independently and
//! held as separate trait objects for the duration of the pass.

use tracing::info;

use crate::auth::authenticate;
use crate::backend::TargetBackend;
use crate::config::{load_policies, Config, Policy};
use crate::error::{Result, Stage};
use crate::observer::SyncObserver;
use crate::reconciler::{self, AuthMethodKind, EngineKind, RoleKind};
use crate::replicate::replicate;
use crate::vault::VaultSession;

/// What one sync pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub engines_created: usize,
    pub auth_methods_created: usize,
    pub policies_written: usize,
    pub roles_created: usize,
    pub secrets_copied: usize,
}

/// Run the target-side reconciliation stages in order.
pub async fn reconcile_target(
    target: &dyn TargetBackend,
    config: &Config,
    policies: &[Policy],
    observer: &dyn SyncObserver,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    report.engines_created =
        reconciler::reconcile(&EngineKind, target, &config.source_secrets, observer).await?;
    report.auth_methods_created =
        reconciler::reconcile(&AuthMethodKind, target, &config.target_auth_methods, observer)
            .await?;
    report.policies_written = reconciler::apply_policies(target, policies, observer).await?;
    report.roles_created =
        reconciler::reconcile(&RoleKind, target, &config.target_auth_approles, observer).await?;

    Ok(report)
}

/// Run one full sync pass.
pub async fn run(config: &Config, observer: &dyn SyncObserver) -> Result<SyncReport> {
    match run_pass(config, observer).await {
        Ok(report) => Ok(report),
        Err(err) => {
            if let Some(stage) = err.stage() {
                observer.stage_failed(stage, &err);
            }
            Err(err)
        }
    }
}

async fn run_pass(config: &Config, observer: &dyn SyncObserver) -> Result<SyncReport> {
    // Pre-flight: policy documents come off disk before any backend
    // is touched.
    let policies = match &config.source_policies_path {
        Some(dir) => load_policies(dir)
            .map_err(|e| e.in_stage(Stage::Policies, dir.display().to_string()))?,
        None => Vec::new(),
    };

    let target_token = authenticate(&config.target_auth)
        .await
        .map_err(|e| e.in_stage(Stage::Authenticate, &config.target_auth.address))?;
    let target = VaultSession::new(&config.target_auth.address, target_token);
    info!("Authenticated against target {}", target.address());

    let mut report = reconcile_target(&target, config, &policies, observer).await?;

    // The source session is acquired only once the target is fully
    // reconciled, right before replication needs it.
    let source_token = authenticate(&config.source_auth)
        .await
        .map_err(|e| e.in_stage(Stage::Authenticate, &config.source_auth.address))?;
    let source = VaultSession::new(&config.source_auth.address, source_token);
    info!("Authenticated against source {}", source.address());

    report.secrets_copied = replicate(&source, &target, &config.source_secrets, observer).await?;

    info!(
        "Sync complete: {} engines, {} auth methods, {} policies, {} roles, {} secrets",
        report.engines_created,
        report.auth_methods_created,
        report.policies_written,
        report.roles_created,
        report.secrets_copied
    );
    Ok(report)
}
