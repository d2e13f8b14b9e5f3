//! Access token issuance and validation.
//!
//! Tokens are stateless HS256 JWTs carrying identity and entitlement claims.
//! Validity is bound entirely by signature and expiry; there is no refresh
//! mechanism, clients re-authenticate after expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    pub email_verified: bool,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Sign an access token for a user
pub fn issue_token(
    secret: &str,
    user_id: &str,
    role: &str,
    email_verified: bool,
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        user_id: user_id.to_string(),
        role: role.to_string(),
        email_verified,
        exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry, returning the claims.
/// Any failure mode (expired, malformed, bad signature) is a single error.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
