use axum::{extract::State, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::AppState;

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.users.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(json!({
        "status": "ok",
        "service": "vault-service",
        "version": env!("CARGO_PKG_VERSION")
    })))
}
