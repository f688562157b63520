//! # Vault Backend Session
//!
//! Native REST client for the Vault HTTP API v1. One session is one
//! backend address plus one bearer token; sessions are created fresh
//! after authentication and never reused across backends.
//!
//! This implementation:
//! - talks plain HTTP via reqwest, so it works against any
//!   Vault-compatible endpoint (including mock servers in tests)
//! - maps a 404 on secret read to an explicit not-found outcome
//! - treats a 404 on role listing as "no roles yet", since a fresh
//!   auth mount has no role index

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::backend::{RoleCredentials, SecretReadOutcome, SourceBackend, TargetBackend};
use crate::config::{AuthMethodDeclaration, RoleDeclaration, SecretDeclaration};
use crate::error::{Result, SyncError};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// One authenticated session against a Vault backend.
pub struct VaultSession {
    http: reqwest::Client,
    address: String,
    token: String,
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// `data.keys` listing payload, as returned by list endpoints.
#[derive(Debug, Deserialize)]
struct KeyList {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KeyListResponse {
    data: KeyList,
}

impl VaultSession {
    pub fn new(address: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            address: address.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path)
    }

    async fn request(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut request = self
            .http
            .request(method, self.url(path))
            .header(TOKEN_HEADER, &self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| SyncError::Backend {
            operation,
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reject non-2xx responses, folding the response body into the
    /// error reason.
    async fn expect_success(
        operation: &'static str,
        path: &str,
        response: Response,
    ) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Backend {
            operation,
            path: path.to_string(),
            reason: format!("{status}: {body}"),
        })
    }

    async fn parse_json(operation: &'static str, path: &str, response: Response) -> Result<Value> {
        response.json().await.map_err(|e| SyncError::Backend {
            operation,
            path: path.to_string(),
            reason: format!("malformed response: {e}"),
        })
    }

    /// Fetch a mount table (`sys/mounts` or `sys/auth`) as a set of
    /// mount paths with the trailing slash stripped.
    async fn list_mount_table(&self, operation: &'static str, path: &str) -> Result<HashSet<String>> {
        let response = self.request(operation, Method::GET, path, None).await?;
        let response = Self::expect_success(operation, path, response).await?;
        let value = Self::parse_json(operation, path, response).await?;
        Ok(mount_keys(&value))
    }
}

/// Extract mount keys from a mount table response.
///
/// Newer Vault versions wrap the table in `data`; older ones return
/// it at the top level mixed with request metadata, so only object
/// values count as mounts.
fn mount_keys(value: &Value) -> HashSet<String> {
    let table = value
        .get("data")
        .and_then(Value::as_object)
        .or_else(|| value.as_object());

    table
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| v.is_object())
                .map(|(k, _)| k.trim_end_matches('/').to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get("data")
        .and_then(|d| d.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl SourceBackend for VaultSession {
    async fn read_secret(&self, mount: &str, path: &str) -> Result<SecretReadOutcome> {
        let full = format!("{mount}/{path}");
        let response = self.request("read secret", Method::GET, &full, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SecretReadOutcome::NotFound);
        }
        let response = Self::expect_success("read secret", &full, response).await?;
        let value = Self::parse_json("read secret", &full, response).await?;

        let data = value
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| SyncError::Backend {
                operation: "read secret",
                path: full.clone(),
                reason: "response has no data object".to_string(),
            })?;
        Ok(SecretReadOutcome::Found(data))
    }
}

#[async_trait]
impl TargetBackend for VaultSession {
    async fn list_engines(&self) -> Result<HashSet<String>> {
        self.list_mount_table("list engines", "sys/mounts").await
    }

    async fn enable_engine(&self, decl: &SecretDeclaration) -> Result<()> {
        let path = format!("sys/mounts/{}", decl.mount);
        let body = json!({
            "type": decl.engine,
            "options": decl.options,
        });
        debug!("Enabling {} engine at {}", decl.engine, decl.mount);
        let response = self
            .request("enable engine", Method::POST, &path, Some(&body))
            .await?;
        Self::expect_success("enable engine", &path, response).await?;
        Ok(())
    }

    async fn list_auth_methods(&self) -> Result<HashSet<String>> {
        self.list_mount_table("list auth methods", "sys/auth").await
    }

    async fn enable_auth_method(&self, decl: &AuthMethodDeclaration) -> Result<()> {
        let path = format!("sys/auth/{}", decl.path);
        let body = json!({
            "type": decl.method_type,
            "options": decl.options,
        });
        debug!("Enabling {} auth method at {}", decl.method_type, decl.path);
        let response = self
            .request("enable auth method", Method::POST, &path, Some(&body))
            .await?;
        Self::expect_success("enable auth method", &path, response).await?;
        Ok(())
    }

    async fn put_policy(&self, name: &str, document: &str) -> Result<()> {
        let path = format!("sys/policy/{name}");
        let body = json!({ "policy": document });
        let response = self
            .request("put policy", Method::PUT, &path, Some(&body))
            .await?;
        Self::expect_success("put policy", &path, response).await?;
        Ok(())
    }

    async fn list_roles(&self, auth_path: &str) -> Result<Vec<String>> {
        let path = format!("auth/{auth_path}/role?list=true");
        let response = self.request("list roles", Method::GET, &path, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::expect_success("list roles", &path, response).await?;
        let listing: KeyListResponse = response.json().await.map_err(|e| SyncError::Backend {
            operation: "list roles",
            path,
            reason: format!("malformed response: {e}"),
        })?;
        Ok(listing.data.keys)
    }

    async fn create_role(&self, decl: &RoleDeclaration) -> Result<()> {
        let path = format!("auth/{}/role/{}", decl.path, decl.name);
        let body = serde_json::to_value(&decl.options).map_err(|e| SyncError::Backend {
            operation: "create role",
            path: path.clone(),
            reason: format!("unserializable role options: {e}"),
        })?;
        let response = self
            .request("create role", Method::POST, &path, Some(&body))
            .await?;
        Self::expect_success("create role", &path, response).await?;
        Ok(())
    }

    async fn read_role_credentials(&self, decl: &RoleDeclaration) -> Result<RoleCredentials> {
        let role_path = format!("auth/{}/role/{}", decl.path, decl.name);

        // Generating a secret-id is a write; the role-id read comes
        // after so a failed generation never leaves a half-derived
        // pair.
        let secret_id_path = format!("{role_path}/secret-id");
        let response = self
            .request("generate secret-id", Method::POST, &secret_id_path, Some(&json!({})))
            .await?;
        let response = Self::expect_success("generate secret-id", &secret_id_path, response).await?;
        let value = Self::parse_json("generate secret-id", &secret_id_path, response).await?;
        let secret_id = string_field(&value, "secret_id").ok_or_else(|| SyncError::Backend {
            operation: "generate secret-id",
            path: secret_id_path.clone(),
            reason: "response has no secret_id".to_string(),
        })?;

        let role_id_path = format!("{role_path}/role-id");
        let response = self
            .request("read role-id", Method::GET, &role_id_path, None)
            .await?;
        let response = Self::expect_success("read role-id", &role_id_path, response).await?;
        let value = Self::parse_json("read role-id", &role_id_path, response).await?;
        let role_id = string_field(&value, "role_id").ok_or_else(|| SyncError::Backend {
            operation: "read role-id",
            path: role_id_path.clone(),
            reason: "response has no role_id".to_string(),
        })?;

        Ok(RoleCredentials { role_id, secret_id })
    }

    async fn write_secret(&self, mount: &str, path: &str, data: &Map<String, Value>) -> Result<()> {
        let full = format!("{mount}/{path}");
        let body = Value::Object(data.clone());
        let response = self
            .request("write secret", Method::POST, &full, Some(&body))
            .await?;
        Self::expect_success("write secret", &full, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer) -> VaultSession {
        VaultSession::new(&server.uri(), "s.test".to_string())
    }

    mod mount_table_tests {
        use super::*;

        #[test]
        fn test_mount_keys_from_data_wrapper() {
            let value = serde_json::json!({
                "request_id": "abc",
                "data": {
                    "kv-a/": {"type": "kv"},
                    "sys/": {"type": "system"}
                }
            });
            let keys = mount_keys(&value);
            assert!(keys.contains("kv-a"));
            assert!(keys.contains("sys"));
            assert_eq!(keys.len(), 2);
        }

        #[test]
        fn test_mount_keys_from_legacy_top_level() {
            let value = serde_json::json!({
                "request_id": "abc",
                "lease_id": "",
                "kv-a/": {"type": "kv"}
            });
            // No data wrapper: only object values count as mounts.
            let keys = mount_keys(&value);
            assert_eq!(keys, HashSet::from(["kv-a".to_string()]));
        }

        #[tokio::test]
        async fn test_list_engines_sends_token_header() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/sys/mounts"))
                .and(header("X-Vault-Token", "s.test"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": {"kv-a/": {"type": "kv"}}
                })))
                .expect(1)
                .mount(&server)
                .await;

            let engines = session(&server).list_engines().await.unwrap();
            assert_eq!(engines, HashSet::from(["kv-a".to_string()]));
        }

        #[tokio::test]
        async fn test_enable_engine_posts_type_and_options() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/sys/mounts/kv-a"))
                .and(body_json(serde_json::json!({
                    "type": "kv",
                    "options": {"version": "1"}
                })))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            let decl = SecretDeclaration {
                engine: "kv".to_string(),
                mount: "kv-a".to_string(),
                options: HashMap::from([("version".to_string(), "1".to_string())]),
                paths: vec![],
            };
            session(&server).enable_engine(&decl).await.unwrap();
        }
    }

    mod secret_tests {
        use super::*;

        #[tokio::test]
        async fn test_read_secret_found() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/kv-a/foo"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": {"x": 1}
                })))
                .mount(&server)
                .await;

            let outcome = session(&server).read_secret("kv-a", "foo").await.unwrap();
            match outcome {
                SecretReadOutcome::Found(data) => {
                    assert_eq!(data.get("x"), Some(&serde_json::json!(1)));
                }
                SecretReadOutcome::NotFound => panic!("expected Found"),
            }
        }

        #[tokio::test]
        async fn test_read_secret_absent_is_not_found_not_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/kv-a/missing"))
                .respond_with(
                    ResponseTemplate::new(404)
                        .set_body_json(serde_json::json!({"errors": []})),
                )
                .mount(&server)
                .await;

            let outcome = session(&server).read_secret("kv-a", "missing").await.unwrap();
            assert_eq!(outcome, SecretReadOutcome::NotFound);
        }

        #[tokio::test]
        async fn test_read_secret_server_error_is_backend_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/kv-a/foo"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let err = session(&server).read_secret("kv-a", "foo").await.unwrap_err();
            assert!(matches!(err, SyncError::Backend { .. }));
        }

        #[tokio::test]
        async fn test_write_secret_posts_payload_unmodified() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/kv-a/foo"))
                .and(body_json(serde_json::json!({"x": 1, "y": "two"})))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            let data = serde_json::json!({"x": 1, "y": "two"})
                .as_object()
                .cloned()
                .unwrap();
            session(&server).write_secret("kv-a", "foo", &data).await.unwrap();
        }
    }

    mod policy_and_role_tests {
        use super::*;

        #[tokio::test]
        async fn test_put_policy_wraps_document() {
            let server = MockServer::start().await;
            Mock::given(method("PUT"))
                .and(path("/v1/sys/policy/admin"))
                .and(body_json(serde_json::json!({"policy": "path \"*\" {}"})))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            session(&server).put_policy("admin", "path \"*\" {}").await.unwrap();
        }

        #[tokio::test]
        async fn test_list_roles_on_fresh_mount_is_empty() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/auth/approle/role"))
                .and(query_param("list", "true"))
                .respond_with(
                    ResponseTemplate::new(404)
                        .set_body_json(serde_json::json!({"errors": []})),
                )
                .mount(&server)
                .await;

            let roles = session(&server).list_roles("approle").await.unwrap();
            assert!(roles.is_empty());
        }

        #[tokio::test]
        async fn test_list_roles_returns_keys() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/auth/approle/role"))
                .and(query_param("list", "true"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": {"keys": ["ci", "deploy"]}
                })))
                .mount(&server)
                .await;

            let roles = session(&server).list_roles("approle").await.unwrap();
            assert_eq!(roles, vec!["ci".to_string(), "deploy".to_string()]);
        }

        #[tokio::test]
        async fn test_role_credentials_are_read_back_from_backend() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/auth/approle/role/ci/secret-id"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": {"secret_id": "sid-123", "secret_id_accessor": "acc"}
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/v1/auth/approle/role/ci/role-id"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": {"role_id": "rid-456"}
                })))
                .expect(1)
                .mount(&server)
                .await;

            let decl = RoleDeclaration {
                path: "approle".to_string(),
                name: "ci".to_string(),
                options: HashMap::new(),
                output: None,
            };
            let creds = session(&server).read_role_credentials(&decl).await.unwrap();
            assert_eq!(creds.role_id, "rid-456");
            assert_eq!(creds.secret_id, "sid-123");
        }

        #[tokio::test]
        async fn test_create_role_posts_options() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/auth/approle/role/ci"))
                .and(body_json(serde_json::json!({"token_policies": ["ci"]})))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            let decl = RoleDeclaration {
                path: "approle".to_string(),
                name: "ci".to_string(),
                options: HashMap::from([(
                    "token_policies".to_string(),
                    serde_json::json!(["ci"]),
                )]),
                output: None,
            };
            session(&server).create_role(&decl).await.unwrap();
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = VaultSession::new("http://t:8200", "s.secret".to_string());
        let debug = format!("{session:?}");
        assert!(!debug.contains("s.secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_address_trailing_slash_trimmed() {
        let session = VaultSession::new("http://t:8200/", "t".to_string());
        assert_eq!(session.address(), "http://t:8200");
    }
}
