use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

pub use crate::auth::repo_types::User;
use crate::auth::repo_types::{NewUser, ProfileUpdate};
use crate::auth::role::Role;

const USER_COLUMNS: &str = "id, username, email, password_hash, name, display_name, role, \
                            zone, branch, registered_modules, created_at";

impl User {
    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    /// Emails are stored lowercased; `email` must already be normalized.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Create a new user. Duplicate username or email fails with a unique violation.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, name, display_name, role,
                               zone, branch, registered_modules)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.name)
        .bind(new.display_name)
        .bind(new.role.as_str())
        .bind(new.zone)
        .bind(new.branch)
        .bind(new.registered_modules)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   display_name = COALESCE($3, display_name),
                   zone = COALESCE($4, zone),
                   branch = COALESCE($5, branch),
                   registered_modules = COALESCE($6, registered_modules)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.display_name.as_deref())
        .bind(update.zone.as_deref())
        .bind(update.branch.as_deref())
        .bind(update.registered_modules.as_deref())
        .fetch_optional(db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    pub async fn set_role(db: &PgPool, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(db)
        .await
        .context("set user role")?;
        Ok(user)
    }
}
