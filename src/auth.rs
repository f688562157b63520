//! # Authenticator
//!
//! Exchanges configured credentials for a session token against a
//! backend address. Two methods are supported, selected by the
//! `method` discriminator on the auth config:
//!
//! - `token`: the token is taken verbatim from the credentials, with
//!   no network call.
//! - `approle`: one login request to the backend's AppRole endpoint;
//!   the session token comes from the response's auth block.
//!
//! Any other discriminator fails with `UnsupportedAuthMethod` rather
//! than returning an empty token.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{Result, SyncError};

const METHOD_TOKEN: &str = "token";
const METHOD_APPROLE: &str = "approle";

/// AppRole login request body.
#[derive(Debug, Serialize)]
struct AppRoleLogin<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

/// The auth block of a successful login response. Only the client
/// token is consumed; lease metadata is ignored.
#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

/// Exchange the configured credentials for a session token.
pub async fn authenticate(auth: &AuthConfig) -> Result<String> {
    match auth.method.as_str() {
        METHOD_TOKEN => {
            let token = auth.credentials.get("token").ok_or_else(|| {
                SyncError::Configuration(format!(
                    "auth method \"token\" for {} is missing the \"token\" credential",
                    auth.address
                ))
            })?;
            Ok(token.clone())
        }
        METHOD_APPROLE => login_approle(auth).await,
        other => Err(SyncError::UnsupportedAuthMethod(other.to_string())),
    }
}

async fn login_approle(auth: &AuthConfig) -> Result<String> {
    let role_id = require_credential(auth, "role_id")?;
    let secret_id = require_credential(auth, "secret_id")?;

    let url = format!("{}/v1/auth/approle/login", auth.address);
    debug!("Logging in via AppRole at {}", auth.address);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&AppRoleLogin { role_id, secret_id })
        .send()
        .await
        .map_err(|e| SyncError::Authentication {
            address: auth.address.clone(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Authentication {
            address: auth.address.clone(),
            reason: format!("login returned {status}: {body}"),
        });
    }

    let login: LoginResponse =
        response
            .json()
            .await
            .map_err(|e| SyncError::Authentication {
                address: auth.address.clone(),
                reason: format!("malformed login response: {e}"),
            })?;

    Ok(login.auth.client_token)
}

fn require_credential<'a>(auth: &'a AuthConfig, key: &str) -> Result<&'a str> {
    auth.credentials
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| {
            SyncError::Configuration(format!(
                "auth method \"approle\" for {} is missing the {key:?} credential",
                auth.address
            ))
        })
}
