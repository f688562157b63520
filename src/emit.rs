//! # Credential Emitter
//!
//! Persists the generated credential pair of a freshly created role
//! to a per-role JSON file. Called exactly once, immediately after
//! first creation: the secret identifier is write-once on the backend
//! side, so an existing role never goes through here again.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::backend::RoleCredentials;
use crate::error::{Result, SyncError};

/// Write `{dir}/{role}.json` containing the pretty-printed credential
/// pair, creating the directory (with parents) if needed. Returns the
/// written file path.
pub async fn write_role_credentials(
    dir: &Path,
    role: &str,
    credentials: &RoleCredentials,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).await.map_err(|e| SyncError::Filesystem {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let file = dir.join(format!("{role}.json"));
    // Pretty-printed so the artifact stays human-diffable.
    let body = serde_json::to_string_pretty(credentials).map_err(|e| {
        SyncError::Configuration(format!("failed to serialize credentials for {role}: {e}"))
    })?;

    fs::write(&file, body).await.map_err(|e| SyncError::Filesystem {
        path: file.clone(),
        source: e,
    })?;

    Ok(file)
}
