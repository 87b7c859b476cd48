use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::outcome::{ApiError, ApiOutcome};
use super::types::{
    AuditLogPage, ErrorBody, LoginRequest, LoginResponse, NewUser, PackageList, PackageMetadata,
    User, UserList,
};
use super::AuthApi;
use crate::config::ApiConfig;
use crate::models::Credential;

pub const DEFAULT_AUDIT_PAGE: u32 = 1;
pub const DEFAULT_AUDIT_LIMIT: u32 = 20;

/// HTTP client for the registry's npm and console endpoints.
///
/// Every call takes the credential to present explicitly; the client keeps
/// no session of its own.
#[derive(Clone, Debug)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        info!(
            "Creating registry client for '{}' (timeout {} ms)",
            config.base_url, config.timeout_in_ms
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(RegistryClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, auth: Option<&Credential>) -> RequestBuilder {
        debug!("Sending registry request {} {}", method, path);
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match auth {
            Some(credential) => builder.bearer_auth(credential.as_str()),
            None => builder,
        }
    }

    /// `GET /<name>`: full package document.
    pub async fn get_package(
        &self,
        auth: Option<&Credential>,
        name: &str,
    ) -> ApiOutcome<PackageMetadata> {
        let path = format!("/{}", encode_package_name(name));
        send_json(self.request(Method::GET, &path, auth)).await
    }

    /// `GET /-/api/packages`: every package stored or cached by the registry.
    pub async fn list_packages(&self, auth: Option<&Credential>) -> ApiOutcome<PackageList> {
        send_json(self.request(Method::GET, "/-/api/packages", auth)).await
    }

    pub async fn search(&self, auth: Option<&Credential>, query: &str) -> ApiOutcome<PackageList> {
        let request = self
            .request(Method::GET, "/-/api/search", auth)
            .query(&[("q", query)]);
        send_json(request).await
    }

    pub async fn delete_package(&self, auth: Option<&Credential>, name: &str) -> ApiOutcome<()> {
        let path = format!("/{}", encode_package_name(name));
        send_empty(self.request(Method::DELETE, &path, auth)).await
    }

    pub async fn list_users(&self, auth: Option<&Credential>) -> ApiOutcome<Vec<User>> {
        send_json::<UserList>(self.request(Method::GET, "/-/api/admin/users", auth))
            .await
            .map(|list| list.users)
    }

    pub async fn create_user(&self, auth: Option<&Credential>, user: &NewUser) -> ApiOutcome<()> {
        let request = self
            .request(Method::POST, "/-/api/admin/users", auth)
            .json(user);
        send_empty(request).await
    }

    pub async fn delete_user(&self, auth: Option<&Credential>, name: &str) -> ApiOutcome<()> {
        let path = format!("/-/api/admin/users/{}", urlencoding::encode(name));
        send_empty(self.request(Method::DELETE, &path, auth)).await
    }

    /// Pages are 1-based; `None` picks page 1 with 20 entries.
    pub async fn audit_logs(
        &self,
        auth: Option<&Credential>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> ApiOutcome<AuditLogPage> {
        let page = page.unwrap_or(DEFAULT_AUDIT_PAGE).to_string();
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).to_string();
        let request = self
            .request(Method::GET, "/-/api/admin/audit-logs", auth)
            .query(&[("page", page.as_str()), ("limit", limit.as_str())]);
        send_json(request).await
    }
}

#[async_trait::async_trait]
impl AuthApi for RegistryClient {
    async fn login(&self, username: &str, password: &str) -> ApiOutcome<LoginResponse> {
        let path = format!("/-/user/org.couchdb.user:{}", urlencoding::encode(username));
        let request = self.request(Method::PUT, &path, None).json(&LoginRequest {
            name: username,
            password,
        });
        send_json(request).await
    }

    async fn current_user(&self, credential: &Credential) -> ApiOutcome<User> {
        send_json(self.request(Method::GET, "/-/api/user", Some(credential))).await
    }

    async fn end_session(&self, credential: &Credential) -> ApiOutcome<()> {
        send_empty(self.request(Method::DELETE, "/-/api/session", Some(credential))).await
    }
}

/// Scoped names keep their `@` but the scope separator must travel as `%2F`.
pub fn encode_package_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(scoped) => format!("@{}", urlencoding::encode(scoped)),
        None => urlencoding::encode(name).into_owned(),
    }
}

async fn fetch(request: RequestBuilder) -> ApiOutcome<Vec<u8>> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            return ApiOutcome::Failed(ApiError::Transport(format!("request timed out: {}", e)))
        }
        Err(e) => return ApiOutcome::Failed(ApiError::Transport(e.to_string())),
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        debug!("Registry rejected the presented credential");
        return ApiOutcome::Unauthorized;
    }

    let body = match response.bytes().await {
        Ok(body) => body.to_vec(),
        Err(e) => {
            return ApiOutcome::Failed(ApiError::Transport(format!(
                "failed to read response body: {}",
                e
            )))
        }
    };

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        return ApiOutcome::Failed(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    ApiOutcome::Success(body)
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ApiOutcome<T> {
    match fetch(request).await {
        ApiOutcome::Success(body) => match serde_json::from_slice(&body) {
            Ok(value) => ApiOutcome::Success(value),
            Err(e) => ApiOutcome::Failed(ApiError::Decode(e.to_string())),
        },
        ApiOutcome::Unauthorized => ApiOutcome::Unauthorized,
        ApiOutcome::Failed(e) => ApiOutcome::Failed(e),
    }
}

async fn send_empty(request: RequestBuilder) -> ApiOutcome<()> {
    fetch(request).await.map(|_| ())
}
