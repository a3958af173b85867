use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{dto::LoginRequest, extractors::AuthUser};
use crate::{error::IdentityError, identity::Session, state::AppState, users::User};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Session>, IdentityError> {
    let session = state
        .identity
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(session))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, IdentityError> {
    let user = state.identity.get_user(user_id).await?;
    Ok(Json(user))
}
