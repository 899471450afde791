//! Shared-secret request signatures for outgoing-webhook connectors.
//!
//! The connector sends `authorization: <scheme> <base64(HMAC-SHA256(key, raw body))>`.
//! The MAC always covers the raw request bytes; re-serializing a parsed body changes
//! them and breaks verification.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_SCHEME: &str = "HMAC";

/// Verifier holding the decoded shared key.
#[derive(Clone)]
pub struct HmacVerifier {
    key: Vec<u8>,
}

impl fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacVerifier")
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl HmacVerifier {
    pub fn from_base64(secret: &str) -> anyhow::Result<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(anyhow::anyhow!("hmac secret is required"));
        }
        let key = STANDARD
            .decode(secret)
            .map_err(|e| anyhow::anyhow!("hmac secret is not valid base64: {e}"))?;
        if key.is_empty() {
            return Err(anyhow::anyhow!("hmac secret decodes to an empty key"));
        }
        Ok(Self { key })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(body_len = body.len()))]
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(received) = received_signature(headers) else {
            tracing::debug!("authorization header missing or malformed");
            return false;
        };
        let Ok(received) = STANDARD.decode(received) else {
            tracing::debug!("authorization token is not valid base64");
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&received).is_ok()
    }

    pub fn sign(&self, body: &[u8]) -> anyhow::Result<String> {
        sign_body(&self.key, body).map_err(|e| anyhow::anyhow!("hmac init failed: {e}"))
    }

    /// Full `authorization` header value for `body`.
    pub fn authorization_header(&self, body: &[u8]) -> anyhow::Result<String> {
        Ok(format!("{SIGNATURE_SCHEME} {}", self.sign(body)?))
    }
}

/// Stateless form: decodes `secret_key_b64` on every call. Any malformed input yields `false`.
pub fn verify(headers: &HeaderMap, body: &[u8], secret_key_b64: &str) -> bool {
    match HmacVerifier::from_base64(secret_key_b64) {
        Ok(verifier) => verifier.verify(headers, body),
        Err(error) => {
            tracing::warn!(%error, "cannot verify request signature");
            false
        }
    }
}

/// Base64-encoded HMAC-SHA256 of `body` under `key`.
pub fn sign_body(key: &[u8], body: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn received_signature(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = raw.split_whitespace();
    let _scheme = parts.next()?;
    parts.next()
}
