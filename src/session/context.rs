use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::{ApiOutcome, AuthApi};
use crate::config::DEFAULT_TIMEOUT_IN_MS;
use crate::models::{is_admin_role, Credential, Identity};
use crate::router::{safe_redirect_target, GuardDecision};
use crate::storage::{DurableStorage, ROLE_KEY, SESSION_KEYS, TOKEN_KEY, USERNAME_KEY};

/// The single source of truth for "am I signed in, and as whom".
///
/// Constructed explicitly and passed by reference to whatever needs it.
/// In-memory fields mirror the `token`, `username` and `role` storage keys.
pub struct SessionContext {
    storage: Arc<dyn DurableStorage>,
    request_timeout: Duration,
    credential: Option<Credential>,
    username: Option<String>,
    role: Option<String>,
}

impl SessionContext {
    /// An empty session over `storage`. Call [`SessionContext::init`] to load it.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        SessionContext {
            storage,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_IN_MS),
            credential: None,
            username: None,
            role: None,
        }
    }

    /// `new` followed by `init`.
    pub fn start(storage: Arc<dyn DurableStorage>) -> Self {
        let mut session = Self::new(storage);
        session.init();
        session
    }

    /// Upper bound on each call made during `login`; a call that exceeds it counts as failed.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Overwrites the in-memory fields with what storage holds.
    ///
    /// Expiry is not checked here; the navigation guard does that lazily.
    pub fn init(&mut self) {
        self.credential = self.storage.get(TOKEN_KEY).map(Credential::new);
        self.username = self.storage.get(USERNAME_KEY);
        self.role = self.storage.get(ROLE_KEY);
        debug!(
            storage = self.storage.name(),
            logged_in = self.credential.is_some(),
            "Session loaded from storage"
        );
    }

    /// Exchanges a name and password for a credential.
    ///
    /// Returns `false` without touching any state when the registry rejects the
    /// login or cannot be reached. On success the role is fetched once more on a
    /// best-effort basis; if that fails the login still succeeds with no role.
    pub async fn login(&mut self, api: &dyn AuthApi, username: &str, password: &str) -> bool {
        info!("Login attempted for '{}'", username);

        let response = match self.bounded(api.login(username, password)).await {
            ApiOutcome::Success(response) => response,
            ApiOutcome::Unauthorized => {
                info!("Login rejected for '{}'", username);
                return false;
            }
            ApiOutcome::Failed(e) => {
                warn!("Login failed for '{}': {}", username, e);
                return false;
            }
        };
        let token = match response.accepted_token() {
            Some(token) => token.to_string(),
            None => {
                info!("Login rejected for '{}'", username);
                return false;
            }
        };

        let credential = Credential::new(token);
        self.storage.set(TOKEN_KEY, credential.as_str());
        self.storage.set(USERNAME_KEY, username);
        self.credential = Some(credential.clone());
        self.username = Some(username.to_string());
        // A role left behind by a previous account must not survive into this one.
        if self.role.take().is_some() || self.storage.get(ROLE_KEY).is_some() {
            self.storage.remove(ROLE_KEY);
        }
        info!("Login succeeded for '{}'", username);

        match self.bounded(api.current_user(&credential)).await {
            ApiOutcome::Success(user) => {
                self.storage.set(ROLE_KEY, &user.role);
                self.role = Some(user.role);
            }
            ApiOutcome::Unauthorized => {
                warn!("Identity lookup for '{}' was refused; role unknown", username);
            }
            ApiOutcome::Failed(e) => {
                warn!("Identity lookup for '{}' failed; role unknown: {}", username, e);
            }
        }
        true
    }

    /// Clears the credential and identity from memory and storage. Local only, never fails.
    pub fn logout(&mut self) {
        self.credential = None;
        self.username = None;
        self.role = None;
        for key in SESSION_KEYS {
            self.storage.remove(key);
        }
        debug!("Session cleared");
    }

    /// Asks the registry to end the session, then logs out locally regardless of the answer.
    pub async fn sign_out(&mut self, api: &dyn AuthApi) {
        if let Some(credential) = self.credential.clone() {
            match self.bounded(api.end_session(&credential)).await {
                ApiOutcome::Success(()) => debug!("Registry session ended"),
                ApiOutcome::Unauthorized => debug!("Registry session was already gone"),
                ApiOutcome::Failed(e) => warn!("Failed to end registry session: {}", e),
            }
        }
        self.logout();
    }

    /// Reacts to the result of a registry call made with this session's credential.
    ///
    /// A 401 means the registry no longer honours the credential: the session
    /// is cleared and the caller is told to send the user to the login page,
    /// returning afterwards to `current_path`.
    pub fn handle_outcome<T>(
        &mut self,
        outcome: &ApiOutcome<T>,
        current_path: &str,
    ) -> Option<GuardDecision> {
        if !outcome.is_unauthorized() {
            return None;
        }
        info!("Registry refused the session credential, logging out");
        self.logout();
        Some(GuardDecision::RedirectLogin {
            redirect: safe_redirect_target(current_path),
        })
    }

    /// Drops a credential that failed validation, along with its identity.
    pub(crate) fn purge(&mut self) {
        info!("Purging invalid or expired credential");
        self.logout();
    }

    pub fn is_logged_in(&self) -> bool {
        self.credential.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.credential.is_some() && is_admin_role(self.role.as_deref())
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Who the session belongs to. Always `None` without a credential.
    pub fn identity(&self) -> Option<Identity> {
        self.credential.as_ref()?;
        self.username
            .as_ref()
            .map(|username| Identity::new(username.clone(), self.role.clone()))
    }

    pub fn storage(&self) -> &Arc<dyn DurableStorage> {
        &self.storage
    }

    async fn bounded<T>(&self, call: impl Future<Output = ApiOutcome<T>>) -> ApiOutcome<T> {
        match timeout(self.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => ApiOutcome::Failed(crate::api::ApiError::Transport(format!(
                "no answer within {} ms",
                self.request_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, LoginResponse, User};
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned answers for the three auth endpoints, counting calls.
    struct FakeAuth {
        login: ApiOutcome<LoginResponse>,
        user: ApiOutcome<User>,
        end_session: ApiOutcome<()>,
        calls: AtomicUsize,
    }

    impl FakeAuth {
        fn accepting(token: &str, role: Option<&str>) -> Self {
            FakeAuth {
                login: ApiOutcome::Success(LoginResponse {
                    ok: true,
                    id: Some("org.couchdb.user:alice".to_string()),
                    token: Some(token.to_string()),
                }),
                user: match role {
                    Some(role) => ApiOutcome::Success(User {
                        username: "alice".to_string(),
                        email: None,
                        role: role.to_string(),
                        created_at: None,
                        last_login: None,
                    }),
                    None => ApiOutcome::Failed(ApiError::Transport("connection reset".into())),
                },
                end_session: ApiOutcome::Success(()),
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting(login: ApiOutcome<LoginResponse>) -> Self {
            FakeAuth {
                login,
                ..FakeAuth::accepting("unused", Some("developer"))
            }
        }
    }

    #[async_trait::async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, _username: &str, _password: &str) -> ApiOutcome<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.login.clone()
        }

        async fn current_user(&self, _credential: &Credential) -> ApiOutcome<User> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.user.clone()
        }

        async fn end_session(&self, _credential: &Credential) -> ApiOutcome<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.end_session.clone()
        }
    }

    /// Never answers, to exercise the request timeout.
    struct SilentAuth;

    #[async_trait::async_trait]
    impl AuthApi for SilentAuth {
        async fn login(&self, _username: &str, _password: &str) -> ApiOutcome<LoginResponse> {
            std::future::pending().await
        }

        async fn current_user(&self, _credential: &Credential) -> ApiOutcome<User> {
            std::future::pending().await
        }

        async fn end_session(&self, _credential: &Credential) -> ApiOutcome<()> {
            std::future::pending().await
        }
    }

    fn memory() -> Arc<dyn DurableStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn test_init_reads_storage_and_is_idempotent() {
        let storage = memory();
        storage.set(TOKEN_KEY, "a.b.c");
        storage.set(USERNAME_KEY, "alice");
        storage.set(ROLE_KEY, "admin");

        let mut session = SessionContext::new(storage.clone());
        assert!(!session.is_logged_in());

        session.init();
        let first = (
            session.credential().cloned(),
            session.username().map(str::to_string),
            session.role().map(str::to_string),
        );
        session.init();
        let second = (
            session.credential().cloned(),
            session.username().map(str::to_string),
            session.role().map(str::to_string),
        );
        assert_eq!(first, second);
        assert!(session.is_logged_in());
        assert!(session.is_admin());
        // init never validates, even an obviously bogus token is loaded as-is
        assert_eq!(session.credential().map(Credential::as_str), Some("a.b.c"));
    }

    #[test]
    fn test_identity_requires_a_credential() {
        let storage = memory();
        storage.set(USERNAME_KEY, "alice");
        storage.set(ROLE_KEY, "admin");
        let session = SessionContext::start(storage);

        assert!(!session.is_logged_in());
        assert!(!session.is_admin());
        assert_eq!(session.identity(), None);
    }

    #[tokio::test]
    async fn test_login_success_persists_token_username_and_role() {
        let storage = memory();
        let mut session = SessionContext::new(storage.clone());
        let api = FakeAuth::accepting("x.y.z", Some("admin"));

        assert!(session.login(&api, "alice", "correct").await);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("x.y.z"));
        assert_eq!(storage.get(USERNAME_KEY).as_deref(), Some("alice"));
        assert_eq!(storage.get(ROLE_KEY).as_deref(), Some("admin"));
        assert!(session.is_logged_in());
        assert!(session.is_admin());
        assert_eq!(
            session.identity(),
            Some(Identity::new("alice", Some("admin".to_string())))
        );
    }

    #[tokio::test]
    async fn test_identity_failure_does_not_fail_login() {
        let storage = memory();
        let mut session = SessionContext::new(storage.clone());
        let api = FakeAuth::accepting("x.y.z", None);

        assert!(session.login(&api, "alice", "correct").await);
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("x.y.z"));
        assert_eq!(storage.get(USERNAME_KEY).as_deref(), Some("alice"));
        assert_eq!(storage.get(ROLE_KEY), None);
        assert_eq!(session.role(), None);
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn test_stale_role_is_dropped_on_new_login() {
        let storage = memory();
        storage.set(ROLE_KEY, "admin");
        let mut session = SessionContext::start(storage.clone());
        let api = FakeAuth::accepting("x.y.z", None);

        assert!(session.login(&api, "bob", "pw").await);
        assert_eq!(storage.get(ROLE_KEY), None);
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn test_rejected_login_mutates_nothing() {
        for outcome in [
            ApiOutcome::Success(LoginResponse {
                ok: false,
                id: None,
                token: None,
            }),
            ApiOutcome::Unauthorized,
            ApiOutcome::Failed(ApiError::Transport("connection refused".into())),
        ] {
            let storage = memory();
            let mut session = SessionContext::new(storage.clone());
            let api = FakeAuth::rejecting(outcome);

            assert!(!session.login(&api, "alice", "wrong").await);
            // no identity lookup after a failed login
            assert_eq!(api.calls.load(Ordering::SeqCst), 1);
            for key in SESSION_KEYS {
                assert_eq!(storage.get(key), None);
            }
            assert!(!session.is_logged_in());
        }
    }

    #[tokio::test]
    async fn test_login_times_out() {
        let storage = memory();
        let mut session =
            SessionContext::new(storage.clone()).with_request_timeout(Duration::from_millis(50));

        assert!(!session.login(&SilentAuth, "alice", "correct").await);
        assert_eq!(storage.get(TOKEN_KEY), None);
    }

    #[test]
    fn test_logout_clears_everything() {
        let storage = memory();
        storage.set(TOKEN_KEY, "x.y.z");
        storage.set(USERNAME_KEY, "alice");
        storage.set(ROLE_KEY, "admin");
        storage.set("locale", "en");
        let mut session = SessionContext::start(storage.clone());

        session.logout();
        assert!(!session.is_logged_in());
        assert_eq!(session.identity(), None);
        for key in SESSION_KEYS {
            assert_eq!(storage.get(key), None);
        }
        // unrelated keys are left alone
        assert_eq!(storage.get("locale").as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_sign_out_logs_out_even_when_registry_fails() {
        let storage = memory();
        storage.set(TOKEN_KEY, "x.y.z");
        let mut session = SessionContext::start(storage.clone());
        let api = FakeAuth {
            end_session: ApiOutcome::Failed(ApiError::Status {
                status: 500,
                message: "boom".into(),
            }),
            ..FakeAuth::accepting("x.y.z", None)
        };

        session.sign_out(&api).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_logged_in());
        assert_eq!(storage.get(TOKEN_KEY), None);
    }

    #[test]
    fn test_unauthorized_outcome_logs_out_and_redirects() {
        let storage = memory();
        storage.set(TOKEN_KEY, "x.y.z");
        let mut session = SessionContext::start(storage.clone());

        let ok: ApiOutcome<u8> = ApiOutcome::Success(1);
        assert_eq!(session.handle_outcome(&ok, "/packages"), None);
        assert!(session.is_logged_in());

        let denied: ApiOutcome<u8> = ApiOutcome::Unauthorized;
        assert_eq!(
            session.handle_outcome(&denied, "/packages?q=pad"),
            Some(GuardDecision::RedirectLogin {
                redirect: "/packages?q=pad".to_string()
            })
        );
        assert!(!session.is_logged_in());
        assert_eq!(storage.get(TOKEN_KEY), None);
    }
}
