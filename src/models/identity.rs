use serde::{Deserialize, Serialize};

/// Role string the registry assigns to administrators.
pub const ADMIN_ROLE: &str = "admin";

/// Who the current session belongs to.
///
/// `role` stays `None` when the follow-up "who am I" lookup failed; the
/// session is still authenticated in that case.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Option<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Option<String>) -> Self {
        Identity {
            username: username.into(),
            role,
        }
    }

    /// Exact match against [`ADMIN_ROLE`], no role hierarchy.
    pub fn is_admin(&self) -> bool {
        is_admin_role(self.role.as_deref())
    }
}

pub fn is_admin_role(role: Option<&str>) -> bool {
    role == Some(ADMIN_ROLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_requires_exact_role() {
        assert!(Identity::new("root", Some("admin".to_string())).is_admin());
        assert!(!Identity::new("alice", Some("Admin".to_string())).is_admin());
        assert!(!Identity::new("alice", Some("admin ".to_string())).is_admin());
        assert!(!Identity::new("alice", Some("developer".to_string())).is_admin());
        assert!(!Identity::new("alice", None).is_admin());
    }
}
