use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::utils::signature::verify_object_url;

use crate::dtos::SignedObjectParams;
use crate::services::storage::validate_key;
use crate::AppState;

/// Serve an object from a URL issued by the local or in-memory backend.
///
/// No bearer token is needed; the signature and expiry are the authorization.
pub async fn serve_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SignedObjectParams>,
) -> Result<Response, AppError> {
    validate_key(&key)?;
    verify_object_url(
        state.config.storage.signing_secret.expose_secret(),
        &key,
        params.expires,
        &params.signature,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(storage_key = %key, "Rejected signed object request");
        e
    })?;

    let data = state.objects.get(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, data.len().to_string()),
        ],
        Body::from(data),
    )
        .into_response())
}
