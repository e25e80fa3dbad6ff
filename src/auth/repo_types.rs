use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::role::Role;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub zone: Option<String>,
    pub branch: Option<String>,
    pub registered_modules: Vec<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }
}

/// Fields written when a user registers.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub role: Role,
    pub zone: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub registered_modules: &'a [String],
}

/// Self-service profile fields; `None` leaves the column unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub zone: Option<String>,
    pub branch: Option<String>,
    pub registered_modules: Option<Vec<String>>,
}
