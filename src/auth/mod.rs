//! Bearer-token authentication.
//!
//! Users are managed elsewhere; this crate only needs a stable user id, which
//! it takes from the `sub` claim of an HS256 JWT.

use crate::{config::AppConfig, errors::ServiceError, AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub jti: String, // JWT ID
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Issues and validates access tokens
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    issuer: String,
    audience: String,
    expiration_secs: i64,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiration_secs: config.jwt_expiration as i64,
        }
    }

    /// Signs an access token for `user_id`.
    pub fn issue_token(&self, user_id: &str) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            nbf: now,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {}", e)))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid token".to_string()),
        })?
        .claims;

        if claims.sub.trim().is_empty() {
            return Err(ServiceError::Unauthorized(
                "Token has no subject".to_string(),
            ));
        }
        Ok(claims)
    }
}

/// Authenticated caller extracted from the `Authorization: Bearer` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub token_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?
            .to_str()
            .map_err(|_| ServiceError::Unauthorized("Malformed authorization header".to_string()))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.auth.validate_token(token)?;
        debug!(user_id = %claims.sub, "authenticated request");

        Ok(AuthUser {
            user_id: claims.sub,
            token_id: claims.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str =
        "k9Qw2Ez7Rt5Yu1Io3Pa8Sd6Fg4Hj0Kl9Zx2Cv7Bn5Mq1Wn3Er8Ty6Ui4Op0As9Df2Gh7Jk5Lz1Xc";

    fn service() -> AuthService {
        let config = AppConfig::new(
            "sqlite::memory:".into(),
            SECRET.into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        AuthService::new(&config)
    }

    #[test]
    fn issued_token_round_trips_subject() {
        let auth = service();
        let token = auth.issue_token("user-42").unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.iss, "mealkit-auth");
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let auth = service();
        let other = AuthService {
            audience: "someone-else".into(),
            ..auth.clone()
        };
        let token = other.issue_token("user-42").unwrap();
        assert_matches!(
            auth.validate_token(&token),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthService {
            expiration_secs: -3600,
            ..service()
        };
        let token = auth.issue_token("user-42").unwrap();
        assert_matches!(
            auth.validate_token(&token),
            Err(ServiceError::Unauthorized(msg)) if msg == "Token expired"
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!(
            service().validate_token("not.a.jwt"),
            Err(ServiceError::Unauthorized(_))
        );
    }
}
