//! HS256 access tokens.
//!
//! Every token carries a unique `jti` so a single token can be revoked by
//! adding it to the blacklist.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    pub user_id: Uuid,
    /// Unique token identifier (UUID v4).
    pub jti: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

pub fn generate_access_token(
    user_id: Uuid,
    secret: &str,
    expiry_mins: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id,
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + expiry_mins * 60,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Check the signature and expiry of a token and return its claims.
///
/// Expiry is checked without leeway. Blacklist rows are purged once
/// `expires_at` passes, so a revoked token must never outlive its `exp`.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}
