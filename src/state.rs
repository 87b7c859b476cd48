//! Everything one console process holds.
//!
//! Built once by [`crate::startup::bootstrap`] and handed to whatever drives
//! the console.

use std::sync::Arc;

use crate::api::RegistryClient;
use crate::config::ConfigV1;
use crate::router::Navigator;
use crate::session::SessionContext;

pub struct ConsoleState {
    /// Configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Client for the registry the console administers.
    pub client: RegistryClient,
    /// Who is signed in, backed by the configured durable storage.
    pub session: SessionContext,
    /// Route table plus guard; applies only the latest navigation.
    pub navigator: Navigator,
}
