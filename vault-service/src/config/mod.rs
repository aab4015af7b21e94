use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub auth: AuthPolicyConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
    pub system: SystemConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC key for access tokens. Rotating it invalidates every outstanding token.
    pub secret: Secret<String>,
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AuthPolicyConfig {
    /// Re-read account state on every authenticated route, not only admin-gated ones.
    pub live_check_all_routes: bool,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Key for signing local-backend download URLs.
    pub signing_secret: Secret<String>,
    pub download_url_ttl_seconds: u64,
    /// Externally reachable base URL, used for share links and local signed URLs.
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
    Memory,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    /// Reported quota for storage statistics.
    pub storage_limit_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub backup_dir: String,
    pub log_file_path: String,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl VaultConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Every value has a development default. In production the database URI and both
    /// secrets must be provided; everything else keeps its default.
    pub fn from_lookup<F>(mut common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOG_LEVEL").filter(|v| !v.is_empty()) {
            common.log_level = level;
        }
        if lookup("ENVIRONMENT").is_some_and(|v| v.eq_ignore_ascii_case("prod")) {
            common.environment = core_config::Environment::Prod;
        }
        let is_prod = common.environment.is_prod();
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str, dev_default: &str| {
            get_value(&lookup, key, dev_default, is_prod)
        };

        let port = common.port;
        let backend = get("STORAGE_BACKEND", "local")
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let s3_bucket = lookup("STORAGE_S3_BUCKET");
        if backend == StorageBackend::S3 && s3_bucket.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORAGE_S3_BUCKET is required when STORAGE_BACKEND=s3"
            )));
        }

        let default_public_url = format!("http://localhost:{}", port);

        Ok(VaultConfig {
            mongodb: MongoConfig {
                uri: Secret::new(required("MONGODB_URI", "mongodb://localhost:27017")?),
                database: get("MONGODB_DATABASE", "vault_db"),
            },
            jwt: JwtConfig {
                secret: Secret::new(required("JWT_SECRET", "dev-only-jwt-secret-change-me")?),
                expiry_minutes: parse_value(
                    &get("JWT_EXPIRY_MINUTES", "60"),
                    "JWT_EXPIRY_MINUTES",
                )?,
            },
            auth: AuthPolicyConfig {
                live_check_all_routes: parse_value(
                    &get("AUTH_LIVE_CHECK_ALL_ROUTES", "false"),
                    "AUTH_LIVE_CHECK_ALL_ROUTES",
                )?,
            },
            storage: StorageConfig {
                backend,
                local_path: get("STORAGE_LOCAL_PATH", "storage"),
                s3_bucket,
                s3_region: lookup("STORAGE_S3_REGION"),
                signing_secret: Secret::new(required(
                    "STORAGE_SIGNING_SECRET",
                    "dev-only-storage-secret-change-me",
                )?),
                download_url_ttl_seconds: parse_value(
                    &get("DOWNLOAD_URL_TTL_SECONDS", "300"),
                    "DOWNLOAD_URL_TTL_SECONDS",
                )?,
                public_url: lookup("PUBLIC_URL")
                    .unwrap_or(default_public_url)
                    .trim_end_matches('/')
                    .to_string(),
            },
            limits: LimitsConfig {
                max_upload_bytes: parse_value(
                    &get("MAX_UPLOAD_BYTES", "104857600"),
                    "MAX_UPLOAD_BYTES",
                )?,
                storage_limit_bytes: parse_value(
                    &get("STORAGE_LIMIT_BYTES", "1073741824"),
                    "STORAGE_LIMIT_BYTES",
                )?,
            },
            rate_limit: RateLimitConfig {
                requests: parse_value(
                    &get("RATE_LIMIT_REQUESTS", "100"),
                    "RATE_LIMIT_REQUESTS",
                )?,
                window_seconds: parse_value(
                    &get("RATE_LIMIT_WINDOW_SECONDS", "900"),
                    "RATE_LIMIT_WINDOW_SECONDS",
                )?,
            },
            system: SystemConfig {
                backup_dir: get("BACKUP_DIR", "backups"),
                log_file_path: get("LOG_FILE_PATH", "logs/system.log"),
            },
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            common,
        })
    }
}

/// A value that must be set in production and falls back to `dev_default` elsewhere.
fn get_value<F>(
    lookup: &F,
    key: &str,
    dev_default: &str,
    is_prod: bool,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        None => Ok(dev_default.to_string()),
    }
}

fn parse_value<T>(raw: &str, key: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn common(environment: core_config::Environment) -> core_config::Config {
        core_config::Config {
            port: 3000,
            environment,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_dev_defaults() {
        let config =
            VaultConfig::from_lookup(common(core_config::Environment::Dev), |_| None).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.jwt.expiry_minutes, 60);
        assert_eq!(config.storage.download_url_ttl_seconds, 300);
        assert_eq!(config.storage.public_url, "http://localhost:3000");
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window_seconds, 900);
        assert_eq!(config.limits.storage_limit_bytes, 1_073_741_824);
        assert!(!config.auth.live_check_all_routes);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_prod_requires_secrets() {
        let err = VaultConfig::from_lookup(common(core_config::Environment::Prod), |_| None)
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_prod_with_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MONGODB_URI", "mongodb://db:27017"),
            ("JWT_SECRET", "a-very-long-production-secret-value"),
            ("STORAGE_SIGNING_SECRET", "another-production-secret"),
            ("STORAGE_BACKEND", "s3"),
            ("STORAGE_S3_BUCKET", "vault-bucket"),
            ("PUBLIC_URL", "https://vault.example.com/"),
            ("AUTH_LIVE_CHECK_ALL_ROUTES", "true"),
        ]);
        let config = VaultConfig::from_lookup(common(core_config::Environment::Prod), |k| {
            vars.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3_bucket.as_deref(), Some("vault-bucket"));
        assert_eq!(config.storage.public_url, "https://vault.example.com");
        assert_eq!(config.mongodb.uri.expose_secret(), "mongodb://db:27017");
        assert!(config.auth.live_check_all_routes);
    }

    #[test]
    fn test_prod_needs_only_secrets() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MONGODB_URI", "mongodb://db:27017"),
            ("JWT_SECRET", "a-very-long-production-secret-value"),
            ("STORAGE_SIGNING_SECRET", "another-production-secret"),
        ]);
        let config = VaultConfig::from_lookup(common(core_config::Environment::Prod), |k| {
            vars.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.mongodb.database, "vault_db");
        assert_eq!(config.jwt.expiry_minutes, 60);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.download_url_ttl_seconds, 300);
        assert_eq!(config.system.log_file_path, "logs/system.log");

        for missing in ["MONGODB_URI", "JWT_SECRET", "STORAGE_SIGNING_SECRET"] {
            let err = VaultConfig::from_lookup(common(core_config::Environment::Prod), |k| {
                vars.get(k).filter(|_| k != missing).map(|v| v.to_string())
            })
            .unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)), "{} not required", missing);
        }
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let err = VaultConfig::from_lookup(common(core_config::Environment::Dev), |k| {
            (k == "STORAGE_BACKEND").then(|| "s3".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = VaultConfig::from_lookup(common(core_config::Environment::Dev), |k| {
            (k == "JWT_EXPIRY_MINUTES").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_plain_env_overrides_common_block() {
        let config = VaultConfig::from_lookup(common(core_config::Environment::Dev), |k| {
            (k == "LOG_LEVEL").then(|| "debug".to_string())
        })
        .unwrap();
        assert_eq!(config.common.log_level, "debug");

        let err = VaultConfig::from_lookup(common(core_config::Environment::Dev), |k| {
            (k == "ENVIRONMENT").then(|| "prod".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
