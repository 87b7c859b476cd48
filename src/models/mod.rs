pub mod credential;
pub mod identity;

pub use credential::{Claims, Credential, CredentialError};
pub use identity::{is_admin_role, Identity, ADMIN_ROLE};
