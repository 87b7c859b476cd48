pub mod client;
pub mod outcome;
pub mod types;

pub use client::{encode_package_name, RegistryClient};
pub use outcome::{ApiError, ApiOutcome};
pub use types::*;

use crate::models::Credential;

/// The authentication endpoints the session depends on.
///
/// `RegistryClient` is the production implementation; the session only sees
/// this trait so it can be driven without a live registry.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `PUT /-/user/org.couchdb.user:<name>` with `{name, password}`.
    async fn login(&self, username: &str, password: &str) -> ApiOutcome<LoginResponse>;

    /// `GET /-/api/user`: who the credential belongs to.
    async fn current_user(&self, credential: &Credential) -> ApiOutcome<User>;

    /// `DELETE /-/api/session`: best-effort server-side logout.
    async fn end_session(&self, credential: &Credential) -> ApiOutcome<()>;
}
