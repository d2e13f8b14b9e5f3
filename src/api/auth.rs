use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation::validate_email;
use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::token::issue_token;
use crate::db::{User, DEFAULT_ROLE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifiedResponse {
    pub message: String,
    /// Fresh token reflecting the updated verification status
    pub access_token: String,
}

/// Hash on a blocking thread; argon2 is deliberately expensive and must not
/// stall the runtime
async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| ApiError::internal("Hashing task failed"))?
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ApiError::internal("Failed to process password")
        })
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|_| ApiError::internal("Hashing task failed"))
}

fn issue_for(state: &AppState, user_id: &str, role: &str, verified: bool) -> Result<String, ApiError> {
    issue_token(
        &state.config.auth.jwt_secret,
        user_id,
        role,
        verified,
        state.config.auth.token_ttl_seconds,
    )
    .map_err(|e| {
        tracing::error!("Token issuance failed: {}", e);
        ApiError::internal("Token generation failed")
    })
}

async fn find_user_by_email(state: &AppState, email: &str) -> Result<Option<User>, ApiError> {
    // Email column is COLLATE NOCASE, so lookup is case-insensitive
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&state.db)
        .await?;
    Ok(user)
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Some(e) = validate_password_strength(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    if find_user_by_email(&state, &request.email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password_blocking(request.password).await?;
    let user_id = Uuid::new_v4().to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_active, is_email_verified)
        VALUES (?, ?, ?, ?, 1, 0)
        "#,
    )
    .bind(&user_id)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(DEFAULT_ROLE)
    .execute(&state.db)
    .await;

    // Two near-simultaneous registrations can pass the pre-check; the
    // unique index decides the winner
    if let Err(sqlx::Error::Database(db_err)) = &inserted {
        if db_err.message().contains("UNIQUE constraint failed") {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
    }
    inserted?;

    tracing::info!("Registered user {}", user_id);

    let access_token = issue_for(&state, &user_id, DEFAULT_ROLE, false)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { access_token })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    // Same failure for a missing account and a wrong password
    let user = find_user_by_email(&state, &request.email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password_blocking(request.password, user.password_hash.clone()).await? {
        return Err(ApiError::invalid_credentials());
    }

    let access_token = issue_for(&state, &user.id, &user.role, user.is_email_verified)?;
    Ok(Json(TokenResponse { access_token }))
}

/// POST /auth/send-otp
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_email(&request.email).map_err(|e| ApiError::validation_field("email", e))?;

    let code = state.otp_store.issue(&request.email);

    // The code stays stored on delivery failure; the caller may retry
    // without invalidating it
    if let Err(e) = state.mailer.send_otp(&request.email, &code).await {
        tracing::error!("OTP delivery to {} failed: {}", request.email, e);
        return Err(ApiError::upstream("Failed to send verification code")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    Ok(Json(MessageResponse {
        message: "Verification code sent".to_string(),
    }))
}

/// POST /auth/verify-otp (authenticated): confirms the caller's email
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<VerifiedResponse>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !state.otp_store.verify(&user.email, &request.otp) {
        return Err(ApiError::bad_request("Invalid or expired code"));
    }

    sqlx::query("UPDATE users SET is_email_verified = 1 WHERE id = ?")
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Email verified for user {}", user.id);

    let access_token = issue_for(&state, &user.id, &user.role, true)?;
    Ok(Json(VerifiedResponse {
        message: "Email verified".to_string(),
        access_token,
    }))
}

/// POST /auth/update-password: recovery path, no session required.
/// Identity is proven solely by possession of the code.
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Some(e) = validate_password_strength(&request.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    if !state.otp_store.verify(&request.email, &request.otp) {
        return Err(ApiError::bad_request("Invalid or expired code"));
    }

    let user = find_user_by_email(&state, &request.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let password_hash = hash_password_blocking(request.new_password).await?;

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Password updated for user {}", user.id);

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}
