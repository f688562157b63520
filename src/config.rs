//! # Configuration
//!
//! Declarative desired-state document for one sync pass, plus the
//! policy file lister. The config is loaded once per run and immutable
//! afterwards.
//!
//! Loading is fail-fast: an unreadable file or malformed JSON aborts
//! the run before anything touches a backend. Optional fields stay
//! absent rather than zero-valued, because absence is meaningful (a
//! role with no `output` directory means "do not emit credentials").

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// Policy files are recognized by this extension.
const POLICY_EXTENSION: &str = "hcl";

/// Backend auth descriptor: where to log in and how.
///
/// `method` is kept as a free string on purpose: an unrecognized
/// discriminator must surface as `UnsupportedAuthMethod` at
/// authentication time, not as a deserialization error with no
/// context.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub address: String,
    pub method: String,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

/// A secret engine mount plus the secret paths declared under it.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretDeclaration {
    pub engine: String,
    pub mount: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

/// An auth method to enable at a mount path.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthMethodDeclaration {
    pub path: String,
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// An AppRole to create under an auth mount.
///
/// `options` is forwarded verbatim to the role write endpoint, so it
/// stays arbitrary JSON. `output`, when present, is the directory the
/// generated credential pair is emitted into on first creation.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleDeclaration {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub options: HashMap<String, Value>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// The full desired end state for one sync pass.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source_auth: AuthConfig,
    #[serde(default)]
    pub source_secrets: Vec<SecretDeclaration>,
    #[serde(default)]
    pub source_policies_path: Option<PathBuf>,
    pub target_auth: AuthConfig,
    #[serde(default)]
    pub target_auth_methods: Vec<AuthMethodDeclaration>,
    #[serde(default)]
    pub target_auth_approles: Vec<RoleDeclaration>,
}

impl Config {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&data).map_err(|e| {
            SyncError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

/// A named access-control document, uploaded verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub document: String,
}

/// List policy documents from a directory.
///
/// Picks up `.hcl` files only, sorted by file name so upload order is
/// deterministic. The policy name is the file name with the extension
/// stripped.
pub fn load_policies(dir: &Path) -> Result<Vec<Policy>> {
    let mut policies = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SyncError::Configuration(format!(
                "failed to list policy directory {}: {e}",
                dir.display()
            ))
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(POLICY_EXTENSION) {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                SyncError::Configuration(format!("invalid policy file name: {}", path.display()))
            })?
            .to_string();

        let document = std::fs::read_to_string(path).map_err(|e| SyncError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        })?;

        policies.push(Policy { name, document });
    }

    Ok(policies)
}
