pub mod guard;
pub mod navigator;
pub mod routes;

pub use guard::{
    login_location, redirect_from_query, safe_redirect_target, GuardDecision, NavigationGuard,
};
pub use navigator::{NavigationResult, NavigationTicket, Navigator, PendingNavigation};
pub use routes::{Route, RouteDef, RouteName, RouteRequirement, RouteTable, APP_TITLE};
