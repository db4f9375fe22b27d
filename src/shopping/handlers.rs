use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{info, instrument};

use super::services;
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let items = services::shopping_list(&state, user_id).await?;
    info!(%user_id, lines = items.len(), "shopping list rendered");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", services::FILE_NAME),
            ),
        ],
        services::render(&items),
    ))
}
