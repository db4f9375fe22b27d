use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::instrument;

use super::{dto::RecipeRead, filters::RecipeQuery, form::RecipeForm, services};
use crate::{
    auth::extractors::{AuthUser, MaybeUser},
    error::ApiError,
    extract::{Json, MultiQuery, Path},
    pagination::Page,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    MultiQuery(q): MultiQuery<RecipeQuery>,
) -> Result<Json<Page<RecipeRead>>, ApiError> {
    Ok(Json(services::list_recipes(&state, viewer, q).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeRead>, ApiError> {
    Ok(Json(services::get_recipe(&state, viewer, id).await?))
}

#[instrument(skip(state, form))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    form: RecipeForm,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = services::create_recipe(&state, user_id, form).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/recipes/{}", recipe.id))],
        Json(recipe),
    ))
}

#[instrument(skip(state, form))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    form: RecipeForm,
) -> Result<Json<RecipeRead>, ApiError> {
    Ok(Json(services::update_recipe(&state, user_id, id, form).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete_recipe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
