use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        claims::TokenKind,
        jwt::JwtKeys,
        password::{
            hash_password, is_valid_email, is_valid_person_name, is_valid_username,
            verify_password, MIN_PASSWORD_LEN,
        },
    },
    error::ApiError,
    extract::Json,
    state::AppState,
    users::{repo_types::NewUser, services::view},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn issue_pair(state: &AppState, user_id: Uuid) -> Result<(String, String), ApiError> {
    let pair = JwtKeys::from_ref(state).pair(user_id).map_err(|e| {
        error!(error = %e, %user_id, "token signing failed");
        ApiError::Internal(e)
    })?;
    Ok((pair.access, pair.refresh))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    payload.first_name = payload.first_name.trim().to_string();
    payload.last_name = payload.last_name.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("email", "Invalid email"));
    }
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::validation("username", "Invalid username"));
    }
    for (field, value) in [("first_name", &payload.first_name), ("last_name", &payload.last_name)] {
        if !is_valid_person_name(value) {
            warn!(field, "name too long");
            return Err(ApiError::validation(field, "at most 150 characters"));
        }
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::validation("password", "Password too short"));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .create(&NewUser {
            email: payload.email,
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash,
        })
        .await?;

    let (access_token, refresh_token) = issue_pair(&state, user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            refresh_token,
            user: view(user, false),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let Some(user) = state.users.find_by_email(&payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let (access_token, refresh_token) = issue_pair(&state, user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: view(user, false),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let claims = JwtKeys::from_ref(&state)
        .verify_as(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            ApiError::Unauthorized("Invalid or expired refresh token".into())
        })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let (access_token, refresh_token) = issue_pair(&state, user.id)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: view(user, false),
    }))
}
