use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::{StorageBackend, VaultConfig};
use crate::services::{
    FileStore, InMemoryFileStore, InMemoryStorage, InMemoryUserStore, LocalStorage,
    LocalUrlSigner, MongoDb, MongoFileStore, MongoUserStore, ObjectStore, S3Storage, UserStore,
};
use crate::{build_router, AppState};

type Stores = (Arc<dyn UserStore>, Arc<dyn FileStore>, Arc<dyn ObjectStore>);

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

/// Wire the configured backends.
///
/// `memory` keeps everything in process (no MongoDB); `local` and `s3` persist
/// metadata in MongoDB.
async fn build_stores(config: &VaultConfig) -> Result<Stores, AppError> {
    let signer = LocalUrlSigner::new(
        &config.storage.public_url,
        config.storage.signing_secret.expose_secret(),
    );

    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("Using in-memory stores; data is lost on restart");
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let files: Arc<dyn FileStore> = Arc::new(InMemoryFileStore::new());
        let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryStorage::new(signer));
        return Ok((users, files, objects));
    }

    let db = MongoDb::connect(config.mongodb.uri.expose_secret(), &config.mongodb.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            e
        })?;
    db.initialize_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize database indexes: {}", e);
        e
    })?;

    let objects: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::S3 => {
            let bucket = config.storage.s3_bucket.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("STORAGE_S3_BUCKET is not set"))
            })?;
            Arc::new(S3Storage::from_env(bucket, config.storage.s3_region.clone()).await)
        }
        _ => Arc::new(
            LocalStorage::new(&config.storage.local_path, signer)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    e
                })?,
        ),
    };

    let users: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(db.clone()));
    let files: Arc<dyn FileStore> = Arc::new(MongoFileStore::new(&db));
    Ok((users, files, objects))
}

impl Application {
    pub async fn build(config: VaultConfig) -> Result<Self, AppError> {
        let (users, files, objects) = build_stores(&config).await?;
        let port = config.common.port;
        let state = AppState::new(config, users, files, objects)?;
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
