//! Wire types for the registry endpoints the console talks to.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of `PUT /-/user/org.couchdb.user:<name>`.
#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub name: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LoginResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    /// The issued token, only when the server reported success and sent a non-empty one.
    pub fn accepted_token(&self) -> Option<&str> {
        match self.token.as_deref() {
            Some(token) if self.ok && !token.is_empty() => Some(token),
            _ => None,
        }
    }
}

/// A registry account as reported by `/-/api/user` and the admin listing.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserList {
    pub users: Vec<User>,
}

/// Body of `POST /-/api/admin/users`.
#[derive(Serialize, Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub private: Option<bool>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Response of both the package listing and the search endpoint.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PackageList {
    pub packages: Vec<PackageSummary>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, PackageVersion>,
    #[serde(default)]
    pub time: HashMap<String, String>,
    #[serde(default)]
    pub readme: Option<String>,
}

impl PackageMetadata {
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.dist_tags
            .get("latest")
            .and_then(|version| self.versions.get(version))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub dependencies: Option<HashMap<String, String>>,
    #[serde(default)]
    pub dev_dependencies: Option<HashMap<String, String>>,
    #[serde(default)]
    pub dist: Option<Dist>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Repository {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Dist {
    pub tarball: String,
    pub shasum: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: u64,
    pub action: String,
    pub username: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub detail: String,
    pub created_at: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Error body the registry sends with non-2xx responses.
#[derive(Deserialize, Debug)]
pub(crate) struct ErrorBody {
    pub error: String,
}
