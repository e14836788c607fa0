use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            UpdateProfileRequest,
        },
        extractors::AuthUser,
        jwt::{JwtKeys, TokenKind},
        password::{hash_password, verify_password},
        repo_types::User,
        services::{is_valid_email, normalize_email, validate_profile_update, validate_registration},
    },
    error::ApiError,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

fn issue(state: &AppState, user: User) -> Result<Json<AuthResponse>, ApiError> {
    let (access_token, refresh_token) = JwtKeys::from_ref(state).sign_pair(user.id)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

fn email_taken(email: &str) -> ApiError {
    warn!(%email, "email already registered");
    ApiError::Conflict("Email already registered".into())
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Invalid credentials".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let new_user = validate_registration(&payload).map_err(|e| {
        warn!(error = %e, "registration rejected");
        e
    })?;

    if User::find_by_email(&state.db, &new_user.email).await?.is_some() {
        return Err(email_taken(&new_user.email));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &new_user.email,
        &new_user.name,
        &new_user.timezone,
        &hash,
    )
    .await?
    // a concurrent registration can win between the lookup and the insert
    .ok_or_else(|| email_taken(&new_user.email))?;

    info!(user_id = %user.id, email = %user.email, timezone = %user.timezone, "user registered");
    Ok((StatusCode::CREATED, issue(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::InvalidInput("Invalid email".into()));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    issue(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let claims = JwtKeys::from_ref(&state)
        .verify_kind(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            ApiError::Unauthenticated("invalid refresh token".into())
        })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;
    issue(&state, user)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;
    Ok(Json(user.into()))
}

/// Changing the timezone only affects how future civil input is read;
/// stored instants stay as they are.
#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let (name, timezone) = validate_profile_update(&payload)?;
    let user = User::update_profile(&state.db, user_id, name.as_deref(), timezone.as_deref())
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;
    info!(%user_id, timezone = %user.timezone, "profile updated");
    Ok(Json(user.into()))
}
