use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{RecipesLimit, SubscriptionQuery, SubscriptionView},
    repo::RecipeList,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    extract::{Json, Path, Query},
    pagination::Page,
    recipes::dto::RecipeShort,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/:id/favorite", post(add_favorite).delete(remove_favorite))
        .route("/recipes/:id/shopping_cart", post(add_to_cart).delete(remove_from_cart))
        .route("/users/subscriptions", get(subscriptions))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

async fn add(
    state: &AppState,
    list: RecipeList,
    user_id: Uuid,
    id: i64,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let short = services::add_recipe(state, list, user_id, id).await?;
    Ok((StatusCode::CREATED, Json(short)))
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    add(&state, RecipeList::Favorites, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::remove_recipe(&state, RecipeList::Favorites, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    add(&state, RecipeList::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::remove_recipe(&state, RecipeList::ShoppingCart, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SubscriptionQuery>,
) -> Result<Json<Page<SubscriptionView>>, ApiError> {
    let window = q.page_query().resolve(state.config.page_size);
    Ok(Json(
        services::subscriptions(&state, user_id, window, q.recipes_limit).await?,
    ))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<RecipesLimit>,
) -> Result<(StatusCode, Json<SubscriptionView>), ApiError> {
    let view = services::subscribe(&state, user_id, id, q.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::unsubscribe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
