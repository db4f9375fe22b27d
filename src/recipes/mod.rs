pub mod dto;
pub mod filters;
pub mod form;
mod handlers;
pub mod image;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
