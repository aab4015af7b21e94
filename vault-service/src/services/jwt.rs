use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::Role;

/// Claims carried by an access token.
///
/// `role` and `suspended` are a snapshot taken at issuance. They are informational
/// only: privilege decisions re-read the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    pub suspended: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token ID
    pub jti: String,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        let secret = config.secret.expose_secret();
        if secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT secret must not be empty"
            )));
        }
        if config.expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT expiry must be positive"
            )));
        }

        tracing::info!(
            expiry_minutes = config.expiry_minutes,
            "Token codec initialized with HS256"
        );

        Ok(Self::from_secret(
            secret.as_bytes(),
            Duration::minutes(config.expiry_minutes),
        ))
    }

    pub fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a token with the configured lifetime.
    pub fn issue(&self, user_id: &str, role: Role, suspended: bool) -> Result<String, AppError> {
        self.issue_with_ttl(user_id, role, suspended, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        user_id: &str,
        role: Role,
        suspended: bool,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            suspended,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to encode access token: {}", e))
        })
    }

    /// Verify signature, structure and expiry.
    ///
    /// A token is expired once `now >= exp`; no leeway is granted.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)?.claims;

        if Utc::now().timestamp() >= claims.exp {
            return Err(AppError::InvalidToken(ErrorKind::ExpiredSignature.into()));
        }

        Ok(claims)
    }

    /// Re-verify `token` and issue a new one with a fresh expiry.
    ///
    /// The identity id and the role/suspended snapshot are carried over unchanged.
    pub fn refresh(&self, token: &str) -> Result<String, AppError> {
        let claims = self.verify(token)?;
        self.issue(&claims.sub, claims.role, claims.suspended)
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}
