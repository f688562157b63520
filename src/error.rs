//! # Error Types
//!
//! Error taxonomy for a sync run. Every variant is fatal: the run
//! aborts at the first error and nothing already reconciled is rolled
//! back (reconciliation is idempotent, so a rerun is the recovery
//! path).

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Stage labels for the orchestrator's single-pass state machine.
///
/// A failure carries the stage it happened in so that fail-fast runs
/// stay diagnosable without a partial-progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticate,
    Engines,
    AuthMethods,
    Policies,
    Roles,
    Secrets,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Authenticate => "authenticate",
            Stage::Engines => "engines",
            Stage::AuthMethods => "auth-methods",
            Stage::Policies => "policies",
            Stage::Roles => "roles",
            Stage::Secrets => "secrets",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or unreadable configuration. Pre-flight only.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Login against a backend failed (bad credentials or unreachable
    /// address).
    #[error("authentication against {address} failed: {reason}")]
    Authentication { address: String, reason: String },

    /// The auth config names a method this tool does not implement.
    /// The original behavior of returning an empty token here hid
    /// misconfigurations until the first backend call.
    #[error("unsupported auth method: {0:?}")]
    UnsupportedAuthMethod(String),

    /// Any backend list/create/read/write call failure.
    #[error("backend {operation} at {path} failed: {reason}")]
    Backend {
        operation: &'static str,
        path: String,
        reason: String,
    },

    /// A declared secret path was absent at the source at read time.
    /// Distinguished from transport errors so the replicator never
    /// writes a null payload.
    #[error("secret not found at {path}")]
    SecretNotFound { path: String },

    /// Unable to create the output directory or write a credential
    /// file.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Wrapper annotating a failure with the stage and resource key
    /// it occurred on.
    #[error("stage {stage} failed for {key}: {source}")]
    Stage {
        stage: Stage,
        key: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Annotate this error with the stage and resource key it belongs
    /// to. Already-annotated errors are left untouched so nested
    /// helpers do not stack wrappers.
    pub fn in_stage(self, stage: Stage, key: impl Into<String>) -> SyncError {
        match self {
            err @ SyncError::Stage { .. } => err,
            err => SyncError::Stage {
                stage,
                key: key.into(),
                source: Box::new(err),
            },
        }
    }

    /// The stage this error was annotated with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SyncError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
