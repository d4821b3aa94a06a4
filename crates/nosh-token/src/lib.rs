//! Identity token minting and verification.
//!
//! # Purpose
//! Signs and verifies the opaque tokens that assert a user id on inbound
//! requests. Tokens are HS256 JWTs over a server-held secret; there is no
//! server-side session state, so a token is valid exactly as long as its
//! signature (and optional expiry) checks out.
//!
//! # Notes
//! Expiry is an opt-in policy: [`TokenCodec::new`] mints tokens without an
//! `exp` claim and skips expiry validation, [`TokenCodec::with_ttl`] embeds
//! and enforces one. Either way a bad token is just [`TokenError::Invalid`];
//! callers are not told why verification failed.
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("token signing failed")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by an identity token. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Signs and verifies identity tokens with a shared secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
}

impl TokenCodec {
    /// Codec without expiry: tokens live until the secret rotates.
    pub fn new(secret: &str) -> Self {
        Self::build(secret, None)
    }

    /// Codec that embeds an `exp` claim and rejects expired tokens.
    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self::build(secret, Some(ttl))
    }

    fn build(secret: &str, ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional on the wire; whether it is enforced is a codec
        // configuration decision, not a per-token one.
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = ttl.is_some();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Mint a token asserting `subject_id`.
    pub fn sign(&self, subject_id: i64) -> Result<String> {
        let now = now_epoch_seconds();
        let claims = IdentityClaims {
            sub: subject_id,
            iat: now,
            exp: self.ttl.map(|ttl| now + ttl.as_secs() as i64),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Sign)
    }

    /// Verify a token and return its claims.
    ///
    /// Signature mismatch, malformed payload, decoding errors, and (when a
    /// TTL is configured) expiry all collapse into [`TokenError::Invalid`].
    pub fn verify(&self, token: &str) -> Result<IdentityClaims> {
        jsonwebtoken::decode::<IdentityClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

fn now_epoch_seconds() -> i64 {
    // If the clock is skewed backwards, clamp to zero to avoid panics.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
