//! Library exports for grape-console, shared between the binary and tests.

pub mod api;
pub mod config;
pub mod models;
pub mod router;
pub mod session;
pub mod startup;
pub mod state;
pub mod storage;
pub mod utils;
