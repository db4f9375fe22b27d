use axum::{
    extract::State,
    routing::get,
    Router,
};
use tracing::instrument;

use super::{
    dto::IngredientQuery,
    repo_types::{Ingredient, Tag},
};
use crate::{
    error::ApiError,
    extract::{Json, Path, Query},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/tags/:id", get(get_tag))
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.catalog.list_tags().await?))
}

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state
        .catalog
        .get_tag(id)
        .await?
        .ok_or_else(|| ApiError::not_found("tag"))?;
    Ok(Json(tag))
}

/// `?name=` narrows to ingredients whose name contains it, case-insensitively.
#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    Ok(Json(state.catalog.search_ingredients(q.name.as_deref()).await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>, ApiError> {
    let ingredient = state
        .catalog
        .get_ingredient(id)
        .await?
        .ok_or_else(|| ApiError::not_found("ingredient"))?;
    Ok(Json(ingredient))
}
