//! Wiring of storage, session, registry client and router from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::{ApiError, RegistryClient};
use crate::config::ConfigV1;
use crate::router::{Navigator, RouteTable};
use crate::session::SessionContext;
use crate::state::ConsoleState;
use crate::storage::create_storage;

/// Creates the console state and loads any session left in storage.
///
/// No network call is made here.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn bootstrap(config: ConfigV1) -> Result<ConsoleState, ApiError> {
    let config = Arc::new(config);
    let storage = create_storage(&config.storage);
    let client = RegistryClient::new(&config.api)?;
    let session = SessionContext::start(storage)
        .with_request_timeout(Duration::from_millis(config.api.timeout_in_ms));

    info!(
        registry = client.base_url(),
        logged_in = session.is_logged_in(),
        "Console started"
    );

    Ok(ConsoleState {
        config,
        client,
        session,
        navigator: Navigator::new(RouteTable::console()),
    })
}
