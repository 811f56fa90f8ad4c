use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::utils::auth::{create_jwt, make_refresh_token};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const REFRESH_TOKEN_TTL_DAYS: i64 = 60;

#[derive(Deserialize, Validate, ToSchema)]
pub struct AuthRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = AuthRequest,
    responses(
        (status = 201, description = "User registered successfully"),
        (status = 400, description = "Invalid email/password or email already taken")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<AuthRequest>,
) -> Result<(StatusCode, Json<users::Model>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    let now = Utc::now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(payload.email),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let user = user
        .insert(&state.db)
        .await
        .map_err(|_e| AppError::BadRequest("Email already registered".to_string()))?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = Users::find()
        .filter(users::Column::Email.eq(payload.email))
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let argon2 = Argon2::default();
    let parsed_hash = argon2::PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = create_jwt(&user.id, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // Opaque refresh token, tracked in the DB for rotation/revocation
    let refresh_token = make_refresh_token();
    let now = Utc::now();

    let token_model = refresh_tokens::ActiveModel {
        token: Set(refresh_token.clone()),
        user_id: Set(user.id),
        expires_at: Set(now + Duration::days(REFRESH_TOKEN_TTL_DAYS)),
        revoked_at: Set(None),
        created_at: Set(now),
    };

    token_model.insert(&state.db).await?;

    Ok(Json(AuthResponse {
        token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing, expired, or revoked refresh token")
    ),
    security(
        ("refresh_token" = [])
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, AppError> {
    let refresh_token = bearer_token(&headers)?;

    let stored = RefreshTokens::find_by_id(refresh_token)
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if stored.revoked_at.is_some() || stored.expires_at < Utc::now() {
        return Err(AppError::Unauthorized(
            "Refresh token expired or revoked".to_string(),
        ));
    }

    let token = create_jwt(&stored.user_id, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(RefreshResponse { token }))
}

#[utoipa::path(
    post,
    path = "/revoke",
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Missing or unknown refresh token")
    ),
    security(
        ("refresh_token" = [])
    ),
    tag = "auth"
)]
pub async fn revoke(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let refresh_token = bearer_token(&headers)?;

    let stored = RefreshTokens::find_by_id(refresh_token)
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized("Invalid refresh token".to_string()))?;

    let mut active: refresh_tokens::ActiveModel = stored.into();
    active.revoked_at = Set(Some(Utc::now()));
    active.update(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .ok_or(AppError::Unauthorized(
            "Missing bearer token".to_string(),
        ))
}
