use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{SetPasswordRequest, UserView},
    services,
};
use crate::{
    auth::extractors::{AuthUser, MaybeUser},
    error::ApiError,
    extract::{Json, Path, Query},
    pagination::{Page, PageQuery},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<UserView>>, ApiError> {
    let window = q.resolve(state.config.page_size);
    Ok(Json(services::list_users(&state, viewer, window).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(services::get_user(&state, viewer, id).await?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserView>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    Ok(Json(services::view(user, false)))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    services::set_password(
        &state,
        user_id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    info!(%user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
