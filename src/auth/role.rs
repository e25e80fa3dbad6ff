use serde::{Deserialize, Serialize};

/// Authorization tag stored on a user and carried in access tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Download,
    Upload,
    Delete,
    ManageUsers,
}

impl Role {
    /// Parses a stored role tag. Unknown tags yield `None` and grant nothing.
    pub fn parse(tag: &str) -> Option<Role> {
        match tag {
            "Admin" => Some(Role::Admin),
            "User" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }

    pub fn allows(self, cap: Capability) -> bool {
        match (self, cap) {
            (Role::Admin, _) => true,
            (Role::User, Capability::Download | Capability::Upload) => true,
            (Role::User, Capability::Delete | Capability::ManageUsers) => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability check for a possibly role-less user.
pub fn can(role: Option<Role>, cap: Capability) -> bool {
    role.is_some_and(|r| r.allows(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_may_delete() {
        assert!(can(Some(Role::Admin), Capability::Delete));
        assert!(!can(Some(Role::User), Capability::Delete));
        assert!(!can(None, Capability::Delete));
        assert!(!can(Role::parse("admin"), Capability::Delete));
        assert!(!can(Role::parse(""), Capability::Delete));
    }

    #[test]
    fn any_role_may_download() {
        assert!(can(Some(Role::User), Capability::Download));
        assert!(can(Some(Role::Admin), Capability::Download));
        assert!(!can(None, Capability::Download));
    }

    #[test]
    fn parse_matches_serde_tags() {
        for role in [Role::Admin, Role::User] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }
}
