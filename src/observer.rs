//! # Sync Observer
//!
//! Checkpoint reporting for a sync pass. The orchestrator and
//! reconcilers call into a [`SyncObserver`] at defined points instead
//! of logging through hidden process-wide state, so tests can record
//! events and alternative frontends can render progress differently.

use std::path::Path;

use crate::error::{Stage, SyncError};

/// Reporting capability invoked at sync checkpoints.
///
/// All methods default to no-ops so implementors only override the
/// checkpoints they care about.
pub trait SyncObserver: Send + Sync {
    /// A desired resource was absent and has been created.
    fn resource_created(&self, kind: &str, key: &str) {
        let _ = (kind, key);
    }

    /// A desired resource already existed and was left untouched.
    fn resource_skipped(&self, kind: &str, key: &str) {
        let _ = (kind, key);
    }

    /// A policy document was uploaded (always re-put).
    fn policy_written(&self, name: &str) {
        let _ = name;
    }

    /// Generated role credentials were persisted to disk.
    fn credentials_emitted(&self, role: &str, file: &Path) {
        let _ = (role, file);
    }

    /// A secret value was copied from source to target.
    fn secret_replicated(&self, path: &str) {
        let _ = path;
    }

    /// A stage failed and the run is aborting.
    fn stage_failed(&self, stage: Stage, error: &SyncError) {
        let _ = (stage, error);
    }
}

/// Default observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn resource_created(&self, kind: &str, key: &str) {
        tracing::info!("Created {} {}", kind, key);
    }

    fn resource_skipped(&self, kind: &str, key: &str) {
        tracing::debug!("{} {} already exists, skipping", kind, key);
    }

    fn policy_written(&self, name: &str) {
        tracing::info!("Wrote policy {}", name);
    }

    fn credentials_emitted(&self, role: &str, file: &Path) {
        tracing::info!("Emitted credentials for role {} to {}", role, file.display());
    }

    fn secret_replicated(&self, path: &str) {
        tracing::info!("Replicated secret {}", path);
    }

    fn stage_failed(&self, stage: Stage, error: &SyncError) {
        tracing::error!("Stage {} failed: {}", stage, error);
    }
}

/// Test observer that records every checkpoint in order.
#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl SyncObserver for RecordingObserver {
        fn resource_created(&self, kind: &str, key: &str) {
            self.push(format!("created {kind} {key}"));
        }

        fn resource_skipped(&self, kind: &str, key: &str) {
            self.push(format!("skipped {kind} {key}"));
        }

        fn policy_written(&self, name: &str) {
            self.push(format!("policy {name}"));
        }

        fn credentials_emitted(&self, role: &str, file: &Path) {
            self.push(format!("emitted {role} {}", file.display()));
        }

        fn secret_replicated(&self, path: &str) {
            self.push(format!("replicated {path}"));
        }

        fn stage_failed(&self, stage: Stage, _error: &SyncError) {
            self.push(format!("failed {stage}"));
        }
    }
}
