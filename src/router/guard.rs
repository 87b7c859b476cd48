use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::routes::{RouteRequirement, HOME_PATH, LOGIN_PATH};
use crate::models::Credential;
use crate::session::SessionContext;
use crate::storage::TOKEN_KEY;

/// Terminal outcome of evaluating one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Send the user to log in, then back to `redirect` (always root-relative).
    RedirectLogin { redirect: String },
    RedirectHome,
}

impl GuardDecision {
    /// Where the user actually ends up when heading for `destination`.
    pub fn location(&self, destination: &str) -> String {
        match self {
            GuardDecision::Allow => destination.to_string(),
            GuardDecision::RedirectLogin { redirect } => login_location(redirect),
            GuardDecision::RedirectHome => HOME_PATH.to_string(),
        }
    }
}

/// `redirect` if it stays on this origin, otherwise `/`.
///
/// Only paths starting with exactly one `/` are kept. `//host` is a
/// protocol-relative URL and `/\host` is read the same way by browsers.
pub fn safe_redirect_target(path: &str) -> String {
    let same_origin =
        path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\");
    if same_origin {
        path.to_string()
    } else {
        warn!("Discarding unsafe redirect target '{}'", path);
        HOME_PATH.to_string()
    }
}

/// `/login?redirect=<target>`; slashes are left readable.
pub fn login_location(redirect: &str) -> String {
    let encoded = urlencoding::encode(redirect).replace("%2F", "/");
    format!("{}?redirect={}", LOGIN_PATH, encoded)
}

/// The sanitized `redirect` query value of a login page location, `/` when absent.
pub fn redirect_from_query(location: &str) -> String {
    let query = match location.split_once('?') {
        Some((_, query)) => query.split('#').next().unwrap_or_default(),
        None => return HOME_PATH.to_string(),
    };
    let raw = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "redirect")
        .map(|(_, value)| value.replace('+', " "));
    match raw {
        Some(raw) => match urlencoding::decode(&raw) {
            Ok(decoded) => safe_redirect_target(&decoded),
            Err(_) => HOME_PATH.to_string(),
        },
        None => HOME_PATH.to_string(),
    }
}

/// Decides, before every view transition, whether the session may see the destination.
///
/// Validation only looks at the token's expiry. It saves the user a round
/// trip to a page that would fail anyway; the registry re-checks every call.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard;

impl NavigationGuard {
    pub fn new() -> Self {
        NavigationGuard
    }

    pub fn evaluate(
        &self,
        session: &mut SessionContext,
        full_path: &str,
        requirement: RouteRequirement,
    ) -> GuardDecision {
        self.evaluate_at(session, full_path, requirement, Utc::now())
    }

    /// As [`NavigationGuard::evaluate`] with an explicit clock.
    pub fn evaluate_at(
        &self,
        session: &mut SessionContext,
        full_path: &str,
        requirement: RouteRequirement,
        now: DateTime<Utc>,
    ) -> GuardDecision {
        // Storage is re-read every time so another process logging out is noticed.
        let stored = session.storage().get(TOKEN_KEY).map(Credential::new);
        let valid = match &stored {
            Some(credential) => credential.is_valid_at(now),
            None => false,
        };
        // A credential held in memory must be the one in storage, otherwise
        // neither it nor the identity stored next to it can be trusted.
        let diverged = session.credential().is_some() && session.credential() != stored.as_ref();
        let orphaned_identity =
            stored.is_none() && (session.username().is_some() || session.role().is_some());

        let authenticated = if (stored.is_some() && !valid) || diverged || orphaned_identity {
            session.purge();
            false
        } else if stored.is_some() && session.credential().is_none() {
            debug!("Session created in storage, loading it");
            session.init();
            valid
        } else {
            valid
        };

        let decision = if requirement.requires_auth && !authenticated {
            GuardDecision::RedirectLogin {
                redirect: safe_redirect_target(full_path),
            }
        } else if requirement.requires_admin && !session.is_admin() {
            info!("Non-admin session denied '{}'", full_path);
            GuardDecision::RedirectHome
        } else {
            GuardDecision::Allow
        };

        debug!(destination = full_path, ?decision, "Navigation evaluated");
        decision
    }
}
