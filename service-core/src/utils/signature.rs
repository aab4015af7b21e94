//! HMAC-signed, expiring URLs for object downloads.
//!
//! A signed URL carries `expires` (unix seconds) and `signature` query parameters where
//! `signature = hex(HMAC-SHA256(secret, "GET|<key>|<expires>"))`.

use crate::error::AppError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature for `key` valid until `expires`.
pub fn sign_object_url(secret: &str, key: &str, expires: i64) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid signing key: {}", e)))?;

    mac.update(format!("GET|{}|{}", key, expires).as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature produced by [`sign_object_url`].
///
/// Fails with `Forbidden` once `now >= expires` or when the signature does not match.
pub fn verify_object_url(
    secret: &str,
    key: &str,
    expires: i64,
    signature: &str,
    now: i64,
) -> Result<(), AppError> {
    if now >= expires {
        return Err(AppError::Forbidden(anyhow::anyhow!("Download link has expired")));
    }

    let expected = sign_object_url(secret, key, expires)?;
    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len()
        || !bool::from(expected_bytes.ct_eq(signature_bytes))
    {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Invalid download signature"
        )));
    }

    Ok(())
}
