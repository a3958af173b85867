use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AvatarRequest, RegisterRequest, UserList},
    model::{User, UserPatch},
};
use crate::{auth::AuthUser, error::IdentityError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/avatar", put(update_avatar))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<User>), IdentityError> {
    let user = state
        .identity
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/users/{}", user.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(user)))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<UserList>, IdentityError> {
    let users = state.identity.list_users().await?;
    Ok(Json(UserList {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, IdentityError> {
    Ok(Json(state.identity.get_user(id).await?))
}

#[instrument(skip(state, patch))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, IdentityError> {
    Ok(Json(state.identity.update_profile(id, patch).await?))
}

#[instrument(skip(state, body))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AvatarRequest>,
) -> Result<Json<User>, IdentityError> {
    Ok(Json(state.identity.update_avatar(id, &body.avatar_url).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, IdentityError> {
    state.identity.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
