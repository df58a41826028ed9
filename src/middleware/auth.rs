//! Bearer-token authentication for merchant-facing routes.
//!
//! The webhook route does not pass through here; it authenticates with the
//! provider's callback token instead.

use crate::error::{AppError, AppErrorKind, AuthError};
use crate::middleware::error::get_request_id_from_headers;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// JWT claims issued to POS operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    #[serde(default)]
    pub role: Option<String>,
}

/// Identity attached to the request extensions once the token is accepted
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidBearerToken {
                reason: e.to_string(),
            })
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Rejects requests without a valid `Authorization: Bearer <jwt>` header
pub async fn require_bearer(
    State(verifier): State<Arc<JwtVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = get_request_id_from_headers(request.headers());
    let with_request_id = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    let token = bearer_token(&request).ok_or_else(|| {
        with_request_id(AppError::new(AppErrorKind::Auth(
            AuthError::MissingBearerToken,
        )))
    })?;

    let claims = verifier.verify(token).map_err(|e| {
        warn!(path = %request.uri().path(), "Rejected bearer token");
        with_request_id(AppError::new(AppErrorKind::Auth(e)))
    })?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "cashier-1".to_string(),
            exp,
            role: Some("cashier".to_string()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let verifier = JwtVerifier::new("secret");
        let exp = chrono::Utc::now().timestamp() + 3600;
        let claims = verifier.verify(&token("secret", exp)).unwrap();
        assert_eq!(claims.sub, "cashier-1");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let verifier = JwtVerifier::new("secret");
        let exp = chrono::Utc::now().timestamp() + 3600;
        assert!(verifier.verify(&token("other", exp)).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = JwtVerifier::new("secret");
        let exp = chrono::Utc::now().timestamp() - 3600;
        assert!(verifier.verify(&token("secret", exp)).is_err());
    }
}
