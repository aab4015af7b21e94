use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::dtos::{
    AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, TokenResponse,
};
use crate::middleware::AuthUser;
use crate::models::{normalize_email, User};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString, ValidatedJson};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&req.email);
    tracing::info!(email = %email, "Registration attempt");

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Email already registered")));
    }

    let password_hash = hash_password(&Password::new(req.password))?;
    let user = User::new(req.name.trim().to_string(), &email, password_hash.into_string());

    // The unique index still catches a concurrent registration.
    state.users.insert(&user).await?;

    let token = state.tokens.issue(&user.id, user.role, user.suspended)?;

    tracing::info!(user_id = %user.id, "User registered");
    metrics::counter!("auth_register_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.sanitized(),
            token,
            expires_in: state.tokens.expires_in_seconds(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&req.email);

    let invalid = || AppError::AuthError(anyhow::anyhow!("Invalid credentials"));

    let user = match state.users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            tracing::warn!(email = %email, "Login failed: unknown email");
            metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
            return Err(invalid());
        }
    };

    let password = Password::new(req.password);
    let hash = PasswordHashString::new(user.password_hash.clone());
    if verify_password(&password, &hash).is_err() {
        tracing::warn!(user_id = %user.id, "Login failed: wrong password");
        metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
        return Err(invalid());
    }

    let token = state.tokens.issue(&user.id, user.role, user.suspended)?;

    tracing::info!(user_id = %user.id, suspended = user.suspended, "User logged in");
    metrics::counter!("auth_login_total", "outcome" => "success").increment(1);

    Ok(Json(AuthResponse {
        user: user.sanitized(),
        token,
        expires_in: state.tokens.expires_in_seconds(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_by_id(&ctx.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitized()))
}

/// Trade a still-valid token for one with a fresh expiry.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.tokens.refresh(&req.token)?;

    Ok(Json(TokenResponse {
        token,
        expires_in: state.tokens.expires_in_seconds(),
    }))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout(AuthUser(ctx): AuthUser) -> impl IntoResponse {
    tracing::info!(user_id = %ctx.user_id, "User logged out");
    Json(MessageResponse::new("Logged out successfully"))
}
