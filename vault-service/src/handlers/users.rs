use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::{
    ChangePasswordRequest, MessageResponse, ProfileResponse, SettingsResponse,
    UpdateProfileRequest, UpdateSettingsRequest,
};
use crate::middleware::AuthUser;
use crate::models::{normalize_email, User};
use crate::services::accounts;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString, ValidatedJson};
use crate::AppState;

async fn current_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))
}

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&state, &ctx.user_id).await?;
    Ok(Json(user.sanitized()))
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = current_user(&state, &ctx.user_id).await?;

    if let Some(name) = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        user.name = name.to_string();
    }

    if let Some(email) = req.email.as_deref().map(normalize_email) {
        if email != user.email {
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict(anyhow::anyhow!("Email already registered")));
            }
            user.email = email;
        }
    }

    user.updated_at = Utc::now();
    if !state.users.update(&user).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(ProfileResponse {
        message: "User profile updated successfully".to_string(),
        user: user.sanitized(),
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = current_user(&state, &ctx.user_id).await?;

    let current = Password::new(req.current_password);
    if verify_password(&current, &PasswordHashString::new(user.password_hash.clone())).is_err() {
        tracing::warn!(user_id = %user.id, "Password change rejected: wrong current password");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Current password is incorrect"
        )));
    }

    user.password_hash = hash_password(&Password::new(req.new_password))?.into_string();
    user.updated_at = Utc::now();
    if !state.users.update(&user).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = current_user(&state, &ctx.user_id).await?;

    req.apply(&mut user.settings);
    user.updated_at = Utc::now();
    if !state.users.update(&user).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    Ok(Json(SettingsResponse {
        message: "Settings updated successfully".to_string(),
        settings: user.settings,
    }))
}

pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    current_user(&state, &ctx.user_id).await?;

    let summary = accounts::purge_account(
        state.users.as_ref(),
        state.files.as_ref(),
        state.objects.as_ref(),
        &ctx.user_id,
    )
    .await?;

    tracing::info!(
        user_id = %ctx.user_id,
        files_removed = summary.files_removed,
        "Account self-deleted"
    );

    Ok(Json(MessageResponse::new("Account deleted successfully")))
}
