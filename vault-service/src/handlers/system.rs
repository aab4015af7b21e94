use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::path::PathBuf;

use crate::dtos::FileResponse;
use crate::middleware::AdminUser;
use crate::models::SanitizedUser;
use crate::AppState;

const DEFAULT_LOG_LINES: usize = 500;
const MAX_LOG_LINES: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct SystemInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub platform: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub uptime_seconds: u64,
    pub storage_backend: &'static str,
    pub environment: String,
}

pub async fn info(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Ok(Json(SystemInfoResponse {
        service: "vault-service",
        version: env!("CARGO_PKG_VERSION"),
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        cpus,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        storage_backend: state.objects.backend(),
        environment: format!("{:?}", state.config.common.environment).to_lowercase(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_result(result: Result<(), AppError>) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy",
                error: None,
            },
            Err(e) => Self {
                status: "unhealthy",
                error: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct SystemHealthResponse {
    pub status: &'static str,
    pub database: ComponentHealth,
    pub object_store: ComponentHealth,
    pub uptime_seconds: u64,
}

/// Per-dependency health. Responds 503 when any dependency is down.
pub async fn health(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> impl IntoResponse {
    let database = ComponentHealth::from_result(state.users.health_check().await);
    let object_store = ComponentHealth::from_result(state.objects.health_check().await);

    let healthy = database.is_healthy() && object_store.is_healthy();
    if !healthy {
        tracing::warn!("System health check reports degraded dependencies");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(SystemHealthResponse {
            status: if healthy { "healthy" } else { "degraded" },
            database,
            object_store,
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct BackupDocument {
    created_at: chrono::DateTime<Utc>,
    users: Vec<SanitizedUser>,
    files: Vec<FileResponse>,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub message: String,
    pub backup_file: String,
    pub users: usize,
    pub files: usize,
}

/// Export account and file metadata as JSON into the backup directory.
pub async fn backup(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let users: Vec<SanitizedUser> = state
        .users
        .all()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let files: Vec<FileResponse> = state
        .files
        .all()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let now = Utc::now();
    let document = BackupDocument {
        created_at: now,
        users,
        files,
    };
    let body = serde_json::to_vec_pretty(&document).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Failed to serialize backup: {}", e))
    })?;

    let dir = PathBuf::from(&state.config.system.backup_dir);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("backup-{}.json", now.format("%Y%m%dT%H%M%S%.3fZ")));
    tokio::fs::write(&path, body).await?;

    tracing::info!(
        admin_id = %admin.user_id,
        path = %path.display(),
        users = document.users.len(),
        files = document.files.len(),
        "Backup written"
    );

    Ok(Json(BackupResponse {
        message: "Backup created successfully".to_string(),
        backup_file: path.display().to_string(),
        users: document.users.len(),
        files: document.files.len(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub path: String,
    pub lines: usize,
    pub logs: String,
}

/// Tail of the configured log file.
pub async fn logs(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<LogParams>,
) -> Result<impl IntoResponse, AppError> {
    let path = &state.config.system.log_file_path;
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(anyhow::anyhow!("Log file not found")));
        }
        Err(e) => return Err(AppError::from(e)),
    };

    let wanted = params
        .lines
        .unwrap_or(DEFAULT_LOG_LINES)
        .clamp(1, MAX_LOG_LINES);
    let all: Vec<&str> = contents.lines().collect();
    let tail = &all[all.len().saturating_sub(wanted)..];

    Ok(Json(LogsResponse {
        path: path.clone(),
        lines: tail.len(),
        logs: tail.join("\n"),
    }))
}
