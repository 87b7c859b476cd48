use tracing::debug;

use super::guard::{GuardDecision, NavigationGuard};
use super::routes::{RouteName, RouteTable};
use crate::session::SessionContext;

/// Identifies one navigation attempt. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NavigationTicket(u64);

/// A navigation that has started but whose decision has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNavigation {
    pub ticket: NavigationTicket,
    pub full_path: String,
}

/// The guard's decision together with what the view layer needs to apply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResult {
    pub destination: String,
    pub route: RouteName,
    pub decision: GuardDecision,
    /// Where the user lands once the decision is applied.
    pub location: String,
    /// Title of the requested destination.
    pub title: String,
}

/// Runs the guard for each navigation and applies only the latest result.
pub struct Navigator {
    routes: RouteTable,
    guard: NavigationGuard,
    latest: u64,
    current: Option<String>,
}

impl Navigator {
    pub fn new(routes: RouteTable) -> Self {
        Navigator {
            routes,
            guard: NavigationGuard::new(),
            latest: 0,
            current: None,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The location of the last applied navigation.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Registers a new attempt, superseding every earlier one still in flight.
    pub fn begin(&mut self, full_path: &str) -> PendingNavigation {
        self.latest += 1;
        PendingNavigation {
            ticket: NavigationTicket(self.latest),
            full_path: full_path.to_string(),
        }
    }

    /// Runs the guard for `pending` against the current session state.
    pub fn evaluate(
        &self,
        session: &mut SessionContext,
        pending: &PendingNavigation,
    ) -> NavigationResult {
        let route = self.routes.resolve(&pending.full_path);
        let decision = self
            .guard
            .evaluate(session, &pending.full_path, route.requirement);
        NavigationResult {
            destination: pending.full_path.clone(),
            route: route.name,
            location: decision.location(&pending.full_path),
            title: route.document_title(),
            decision,
        }
    }

    /// Applies `result` unless a newer navigation began after `ticket`.
    pub fn commit(
        &mut self,
        ticket: NavigationTicket,
        result: NavigationResult,
    ) -> Option<NavigationResult> {
        if ticket != NavigationTicket(self.latest) {
            debug!(
                destination = result.destination.as_str(),
                "Discarding superseded navigation"
            );
            return None;
        }
        self.current = Some(result.location.clone());
        Some(result)
    }

    /// `begin`, `evaluate` and `commit` in one step.
    pub fn navigate(
        &mut self,
        session: &mut SessionContext,
        full_path: &str,
    ) -> Option<NavigationResult> {
        let pending = self.begin(full_path);
        let result = self.evaluate(session, &pending);
        self.commit(pending.ticket, result)
    }
}
