use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use std::sync::Arc;

use crate::auth::token::decode_token;
use crate::AppState;

/// The authenticated caller, decoded from the Bearer token.
/// Handlers take this as an extractor; requests without a valid token are
/// rejected before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: String,
    pub email_verified: bool,
}

/// Extract the token from request headers
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let claims = decode_token(&state.config.auth.jwt_secret, token)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        Ok(AuthUser {
            user_id: claims.user_id,
            role: claims.role,
            email_verified: claims.email_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_extract_token_missing_or_malformed() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Token abc123"));
        assert_eq!(extract_token(&headers), None);
    }
}
