use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument};

use super::dto::{normalize_name, CreateLocationRequest};
use super::repo::{self, Location};
use crate::{auth::AuthUser, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/:name", get(get_location))
}

#[instrument(skip(state))]
pub async fn list_locations(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Location>>, (StatusCode, String)> {
    let rows = repo::list(&state.db).await.map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn create_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), (StatusCode, String)> {
    let name = normalize_name(&body.name)
        .ok_or((StatusCode::BAD_REQUEST, "Location name is required".to_string()))?;

    let (loc, created) = repo::get_or_create(&state.db, name).await.map_err(internal)?;
    if created {
        info!(location_id = %loc.id, name = %loc.name, user_id = %auth.id, "location created");
        Ok((StatusCode::CREATED, Json(loc)))
    } else {
        Ok((StatusCode::OK, Json(loc)))
    }
}

#[instrument(skip(state))]
pub async fn get_location(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Location>, (StatusCode, String)> {
    match repo::find_by_name(&state.db, name.trim()).await {
        Ok(Some(loc)) => Ok(Json(loc)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Location not found".into())),
        Err(e) => Err(internal(e)),
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "location query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
