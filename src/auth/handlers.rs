use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest, SetRoleRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
        repo_types::{NewUser, ProfileUpdate},
        role::{Capability, Role},
    },
    db::is_unique_violation,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/users/:id/role", put(set_role))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// How a login string addresses an account. Usernames cannot contain `@`,
/// so anything with one is an email.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoginKey {
    Username(String),
    Email(String),
}

pub(crate) fn login_key(login: &str) -> Option<LoginKey> {
    let login = login.trim();
    if login.is_empty() {
        None
    } else if login.contains('@') {
        Some(LoginKey::Email(login.to_lowercase()))
    } else {
        Some(LoginKey::Username(login.to_string()))
    }
}

fn token_pair(
    state: &AppState,
    user: User,
) -> Result<AuthResponse, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id, user.role()).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        warn!("empty username");
        return Err((StatusCode::BAD_REQUEST, "Username is required".into()));
    }

    if payload.username.contains('@') {
        warn!(username = %payload.username, "username contains @");
        return Err((StatusCode::BAD_REQUEST, "Username must not contain @".into()));
    }

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let role = if state.config.admin_email.as_deref() == Some(payload.email.as_str()) {
        Role::Admin
    } else {
        Role::User
    };

    let new_user = NewUser {
        username: &payload.username,
        email: &payload.email,
        password_hash: &hash,
        name: payload.name.as_deref(),
        display_name: payload.display_name.as_deref(),
        role,
        zone: payload.zone.as_deref(),
        branch: payload.branch.as_deref(),
        registered_modules: &payload.registered_modules,
    };

    let user = match User::create(&state.db, &new_user).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(username = %payload.username, email = %payload.email, "username or email taken");
            return Err((
                StatusCode::CONFLICT,
                "Username or email already registered".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user.id, username = %user.username, role = %role, "user registered");
    Ok((StatusCode::CREATED, Json(token_pair(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let key = login_key(&payload.login)
        .ok_or((StatusCode::BAD_REQUEST, "Login is required".to_string()))?;

    let found = match &key {
        LoginKey::Username(username) => User::find_by_username(&state.db, username).await,
        LoginKey::Email(email) => User::find_by_email(&state.db, email).await,
    };

    let user = match found {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(login = ?key, "login unknown user");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "login lookup failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(token_pair(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, format!("{}", e)))?;

    let user = match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => {
            error!(error = %e, "find_by_id failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    Ok(Json(token_pair(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match User::find_by_id(&state.db, auth.id).await {
        Ok(Some(user)) => Ok(Json(user.into())),
        Ok(None) => {
            error!(user_id = %auth.id, "user not found");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
        Err(e) => {
            error!(error = %e, user_id = %auth.id, "find_by_id failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match User::update_profile(&state.db, auth.id, &payload).await {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "profile updated");
            Ok(Json(user.into()))
        }
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %auth.id, "update_profile failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[instrument(skip(state))]
pub async fn set_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    auth.require(Capability::ManageUsers)?;

    match User::set_role(&state.db, id, payload.role).await {
        Ok(Some(user)) => {
            info!(admin_id = %auth.id, user_id = %user.id, role = %payload.role, "role changed");
            Ok(Json(user.into()))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %id, "set_role failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("clerk@cantonment.gov"));
        assert!(!is_valid_email("clerk"));
        assert!(!is_valid_email("clerk@host"));
        assert!(!is_valid_email("a b@c.d"));
    }

    #[test]
    fn login_key_branches_on_at_sign() {
        assert_eq!(login_key("  "), None);
        assert_eq!(
            login_key(" Bob@Ex.com "),
            Some(LoginKey::Email("bob@ex.com".into()))
        );
        assert_eq!(
            login_key("Clerk_01"),
            Some(LoginKey::Username("Clerk_01".into()))
        );
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "clerk".into(),
            email: "clerk@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            name: None,
            display_name: Some("Clerk".into()),
            role: Some("Admin".into()),
            zone: Some("North".into()),
            branch: None,
            registered_modules: vec!["Licenses".into()],
            created_at: time::OffsetDateTime::now_utc(),
        };

        let public: PublicUser = user.into();
        assert_eq!(public.role, Some(Role::Admin));

        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("clerk@example.com"));
        assert!(json.contains("\"role\":\"Admin\""));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn unknown_stored_role_is_dropped() {
        let user = User {
            id: Uuid::new_v4(),
            username: "x".into(),
            email: "x@example.com".into(),
            password_hash: String::new(),
            name: None,
            display_name: None,
            role: Some("Superuser".into()),
            zone: None,
            branch: None,
            registered_modules: vec![],
            created_at: time::OffsetDateTime::now_utc(),
        };
        assert_eq!(user.role(), None);
    }
}
