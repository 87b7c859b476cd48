pub mod context;

pub use context::SessionContext;
