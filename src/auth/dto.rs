use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use super::role::Role;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub zone: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub registered_modules: Vec<String>,
}

/// Request body for login. `login` accepts a username or an email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for an admin role change.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub zone: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub registered_modules: Vec<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        let role = u.role();
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            name: u.name,
            display_name: u.display_name,
            role,
            zone: u.zone,
            branch: u.branch,
            registered_modules: u.registered_modules,
        }
    }
}
