use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use sha2::{Digest, Sha256};

use crate::dtos::{
    DownloadResponse, FileDetailsResponse, FileListResponse, FileResponse, MessageResponse,
    OwnerSummary, ShareResponse, UpdateFileRequest, UpdateFileResponse,
};
use crate::middleware::{authorize_owned, AuthContext, AuthUser};
use crate::models::FileRecord;
use crate::services::{accounts, storage::object_key};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Load a file and check the caller may act on it. Runs before any side effect.
async fn load_authorized(
    state: &AppState,
    ctx: &AuthContext,
    id: &str,
) -> Result<FileRecord, AppError> {
    let file = state
        .files
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("File not found")))?;

    authorize_owned(ctx, &file, state.users.as_ref()).await?;
    Ok(file)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the upload size limit".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart body: {}", e))
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "unnamed".to_string());
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?.to_vec();

        upload = Some((name, content_type, data));
        break;
    }

    let (name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    if data.len() > state.config.limits.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the upload size limit of {} bytes",
            state.config.limits.max_upload_bytes
        )));
    }

    let size = data.len() as i64;
    let checksum = hex::encode(Sha256::digest(&data));
    let storage_key = object_key(&ctx.user_id, &name);

    tracing::info!(
        user_id = %ctx.user_id,
        file_name = %name,
        content_type = %content_type,
        size,
        "Uploading file"
    );

    state
        .objects
        .put(&storage_key, data, &content_type)
        .await
        .map_err(|e| {
            tracing::error!(storage_key = %storage_key, error = %e, "Object upload failed");
            e
        })?;

    let file = FileRecord::new(
        ctx.user_id.clone(),
        name,
        content_type,
        size,
        storage_key,
        Some(checksum),
    );

    if let Err(e) = state.files.insert(&file).await {
        tracing::error!(
            file_id = %file.id,
            error = %e,
            "File record insert failed; removing object"
        );
        if let Err(cleanup) = state.objects.delete(&file.storage_key).await {
            tracing::error!(
                storage_key = %file.storage_key,
                error = %cleanup,
                "Failed to remove orphaned object"
            );
        }
        return Err(e);
    }

    metrics::counter!("files_uploaded_total").increment(1);
    metrics::counter!("files_uploaded_bytes_total").increment(size as u64);

    Ok((StatusCode::CREATED, Json(FileResponse::from(file))))
}

/// The caller's files, newest first. An empty list is not an error.
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let files = state.files.list_by_owner(&ctx.user_id).await?;
    let total = files.len();

    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
        total,
    }))
}

pub async fn get_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = load_authorized(&state, &ctx, &id).await?;

    let owner = state
        .users
        .find_by_id(&file.owner_id)
        .await?
        .map(|u| OwnerSummary {
            id: u.id,
            name: u.name,
            email: u.email,
        });

    Ok(Json(FileDetailsResponse {
        file: FileResponse::from(file),
        owner,
    }))
}

pub async fn update_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut file = load_authorized(&state, &ctx, &id).await?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Name must not be blank")));
    }
    file.name = name.to_string();
    file.updated_at = Utc::now();

    if !state.files.update(&file).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("File not found")));
    }

    tracing::info!(user_id = %ctx.user_id, file_id = %file.id, "File metadata updated");

    Ok(Json(UpdateFileResponse {
        message: "File metadata updated successfully".to_string(),
        file: FileResponse::from(file),
    }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = load_authorized(&state, &ctx, &id).await?;

    accounts::remove_file(state.files.as_ref(), state.objects.as_ref(), &file).await?;

    tracing::info!(
        user_id = %ctx.user_id,
        file_id = %file.id,
        owner_id = %file.owner_id,
        "File deleted"
    );

    Ok(Json(MessageResponse::new("File deleted successfully")))
}

pub async fn download_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = load_authorized(&state, &ctx, &id).await?;
    let ttl = state.config.storage.download_url_ttl_seconds;

    state.files.increment_downloads(&file.id).await?;
    let download_url = state.objects.signed_get_url(&file.storage_key, ttl).await?;

    tracing::info!(user_id = %ctx.user_id, file_id = %file.id, "Download URL issued");

    Ok(Json(DownloadResponse {
        download_url,
        expires_in: ttl,
    }))
}

pub async fn share_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = load_authorized(&state, &ctx, &id).await?;

    let link = format!(
        "{}/api/files/{}/download",
        state.config.storage.public_url, file.id
    );

    Ok(Json(ShareResponse { link }))
}
