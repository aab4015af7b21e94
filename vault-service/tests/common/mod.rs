#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::config::{Config, Environment};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;
use vault_service::{
    build_router,
    config::VaultConfig,
    models::{FileRecord, Role, User},
    services::{
        FileStore, InMemoryFileStore, InMemoryStorage, InMemoryUserStore, LocalUrlSigner,
        ObjectStore, UserStore,
    },
    utils::{hash_password, Password},
    AppState,
};

pub const SIGNING_SECRET: &str = "test-storage-signing-secret";
pub const PUBLIC_URL: &str = "http://vault.test";
pub const PASSWORD: &str = "correct-horse-battery";
const BOUNDARY: &str = "vault-test-boundary";

/// Argon2 is slow in debug builds; hash the shared test password once.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        hash_password(&Password::new(PASSWORD.to_string()))
            .expect("Failed to hash password")
            .into_string()
    })
    .clone()
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<InMemoryUserStore>,
    pub files: Arc<InMemoryFileStore>,
    pub objects: Arc<InMemoryStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    pub fn with_env(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("STORAGE_BACKEND".to_string(), "memory".to_string()),
            ("JWT_SECRET".to_string(), "integration-test-jwt-secret".to_string()),
            ("STORAGE_SIGNING_SECRET".to_string(), SIGNING_SECRET.to_string()),
            ("PUBLIC_URL".to_string(), PUBLIC_URL.to_string()),
            ("MAX_UPLOAD_BYTES".to_string(), "1024".to_string()),
        ]);
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }

        let common = Config {
            port: 0,
            environment: Environment::Dev,
            log_level: "error".to_string(),
        };
        let config = VaultConfig::from_lookup(common, |k| vars.get(k).cloned())
            .expect("Failed to build test config");

        let users = Arc::new(InMemoryUserStore::new());
        let files = Arc::new(InMemoryFileStore::new());
        let objects = Arc::new(InMemoryStorage::new(LocalUrlSigner::new(
            PUBLIC_URL,
            SIGNING_SECRET,
        )));

        let state = AppState::new(
            config,
            users.clone() as Arc<dyn UserStore>,
            files.clone() as Arc<dyn FileStore>,
            objects.clone() as Arc<dyn ObjectStore>,
        )
        .expect("Failed to build app state");

        Self {
            router: build_router(state.clone()),
            state,
            users,
            files,
            objects,
        }
    }

    /// Insert an account directly and return it with a fresh token.
    pub async fn create_user(&self, name: &str, email: &str, role: Role) -> (User, String) {
        let mut user = User::new(name.to_string(), email, password_hash());
        user.role = role;
        self.users.insert(&user).await.expect("Failed to insert user");

        let token = self
            .state
            .tokens
            .issue(&user.id, user.role, user.suspended)
            .expect("Failed to issue token");
        (user, token)
    }

    pub async fn set_suspended(&self, user: &User, suspended: bool) {
        let mut stored = self.users.find_by_id(&user.id).await.unwrap().unwrap();
        stored.suspended = suspended;
        self.users.update(&stored).await.unwrap();
    }

    /// Store an object and its record, bypassing the HTTP layer.
    pub async fn seed_file(
        &self,
        owner: &User,
        name: &str,
        content_type: &str,
        size: i64,
    ) -> FileRecord {
        let key = format!("{}/{}", owner.id, name);
        self.objects
            .put(&key, vec![0u8; size as usize], content_type)
            .await
            .unwrap();
        let record = FileRecord::new(
            owner.id.clone(),
            name.to_string(),
            content_type.to_string(),
            size,
            key,
            None,
        );
        self.files.insert(&record).await.unwrap();
        record
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
                 Content-Type: {c}\r\n\r\n",
                b = BOUNDARY,
                f = file_name,
                c = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/files/upload")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
