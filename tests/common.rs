#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use grape_console::api::RegistryClient;
use grape_console::config::ApiConfig;
use grape_console::session::SessionContext;
use grape_console::storage::{DurableStorage, MemoryStorage};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    username: &'a str,
    role: &'a str,
    exp: i64,
    iat: i64,
}

/// A registry-style HS256 token expiring `ttl_secs` from now (negative for the past).
pub fn mint_token(username: &str, role: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        username,
        role,
        exp: now + ttl_secs,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"registry-secret"),
    )
    .expect("token should encode")
}

pub fn client_for(url: &str) -> RegistryClient {
    RegistryClient::new(&ApiConfig {
        base_url: url.to_string(),
        timeout_in_ms: 2_000,
    })
    .expect("client should build")
}

pub fn memory_session() -> (SessionContext, Arc<dyn DurableStorage>) {
    let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
    (SessionContext::start(storage.clone()), storage)
}
