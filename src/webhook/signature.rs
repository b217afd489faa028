use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature was rejected. Every variant means "invalid"; a comparison
/// error is never treated as valid.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature is not valid hex: {0}")]
    MalformedSignature(#[from] hex::FromHexError),

    #[error("HMAC computation failed: {0}")]
    Hmac(String),

    #[error("signature mismatch")]
    Mismatch,
}

/// Verify an HMAC-SHA256 signature over the exact raw request bytes.
///
/// The signature is hex-encoded in the `X-Signature` header; comparison is
/// constant-time via `Mac::verify_slice`.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the rejection. Pure function, no
/// side effects.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> Result<(), SignatureError> {
    let supplied = hex::decode(signature.trim())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::Hmac(e.to_string()))?;
    mac.update(payload);

    mac.verify_slice(&supplied).map_err(|_| SignatureError::Mismatch)
}

/// Compute the hex HMAC-SHA256 signature a well-behaved provider would send.
///
/// # Errors
///
/// Only if HMAC key setup fails, which cannot happen for SHA-256.
pub fn sign(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::Hmac(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
