//! # Secret Replicator
//!
//! Copies declared secret values from the source backend to the
//! target backend, mount-namespaced, in declared order. The payload
//! is written unmodified: no field filtering, no diffing against the
//! target, always overwrite.
//!
//! Fail-fast on any read or write failure: partial secret replication
//! is unsafe to leave silently incomplete, so the whole run aborts.

use tracing::debug;

use crate::backend::{SecretReadOutcome, SourceBackend, TargetBackend};
use crate::config::SecretDeclaration;
use crate::error::{Result, Stage, SyncError};
use crate::observer::SyncObserver;

/// Replicate every declared secret path from source to target.
/// Returns the number of secrets copied.
pub async fn replicate(
    source: &dyn SourceBackend,
    target: &dyn TargetBackend,
    declarations: &[SecretDeclaration],
    observer: &dyn SyncObserver,
) -> Result<usize> {
    let mut copied = 0;

    for declaration in declarations {
        for path in &declaration.paths {
            let full_path = format!("{}/{path}", declaration.mount);
            debug!("Replicating {}", full_path);

            let outcome = source
                .read_secret(&declaration.mount, path)
                .await
                .map_err(|e| e.in_stage(Stage::Secrets, &full_path))?;

            let data = match outcome {
                SecretReadOutcome::Found(data) => data,
                SecretReadOutcome::NotFound => {
                    return Err(SyncError::SecretNotFound {
                        path: full_path.clone(),
                    }
                    .in_stage(Stage::Secrets, &full_path));
                }
            };

            target
                .write_secret(&declaration.mount, path, &data)
                .await
                .map_err(|e| e.in_stage(Stage::Secrets, &full_path))?;

            observer.secret_replicated(&full_path);
            copied += 1;
        }
    }

    Ok(copied)
}
