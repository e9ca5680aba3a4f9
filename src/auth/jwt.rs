use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

pub type TokenResult<T> = Result<T, TokenError>;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
    reset_audience: String,
    reset_expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
            reset_audience: config.reset_token_audience.clone(),
            reset_expiry: Duration::hours(config.reset_token_expiry_hours),
        }
    }

    /// Session token lifetime in seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.expiry.num_seconds()
    }

    pub fn reset_expiry(&self) -> Duration {
        self.reset_expiry
    }

    pub fn generate_token(&self, user_id: Uuid, role: &str) -> TokenResult<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> TokenResult<Claims> {
        let validation = self.validation(&self.audience);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidToken)
    }

    pub fn generate_reset_token(&self, user_id: Uuid) -> TokenResult<String> {
        let now = Utc::now();
        let exp = now + self.reset_expiry;
        let claims = ResetClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            aud: self.reset_audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_reset_token(&self, token: &str) -> TokenResult<ResetClaims> {
        let validation = self.validation(&self.reset_audience);
        decode::<ResetClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidToken)
    }

    fn validation(&self, audience: &str) -> Validation {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    fn config(expiry_minutes: i64) -> AppConfig {
        AppConfig {
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_max_pool_size: 1,
            store_timeout_secs: 5,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "unit-test-secret".to_string(),
            jwt_issuer: "taskboard".to_string(),
            jwt_audience: "taskboard-clients".to_string(),
            jwt_expiry_minutes: expiry_minutes,
            reset_token_audience: "taskboard-password-reset".to_string(),
            reset_token_expiry_hours: 24,
            expose_reset_tokens: false,
            cors_allowed_origin: None,
        }
    }

    #[test]
    fn session_token_roundtrip_keeps_subject_and_role() {
        let jwt = JwtService::from_config(&config(60));
        let user_id = Uuid::new_v4();
        let token = jwt.generate_token(user_id, "MEMBER").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "MEMBER");
        assert_eq!(jwt.expires_in(), 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtService::from_config(&config(-5));
        let token = jwt.generate_token(Uuid::new_v4(), "MEMBER").unwrap();
        assert!(matches!(
            jwt.verify_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let jwt = JwtService::from_config(&config(60));
        let mut other_config = config(60);
        other_config.jwt_secret = "someone-else".to_string();
        let other = JwtService::from_config(&other_config);

        let token = other.generate_token(Uuid::new_v4(), "MEMBER").unwrap();
        assert!(matches!(
            jwt.verify_token(&token),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            jwt.verify_token("not-a-jwt"),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn reset_and_session_tokens_are_not_interchangeable() {
        let jwt = JwtService::from_config(&config(60));
        let user_id = Uuid::new_v4();

        let reset = jwt.generate_reset_token(user_id).unwrap();
        assert!(jwt.verify_token(&reset).is_err());
        let claims = jwt.verify_reset_token(&reset).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);

        let session = jwt.generate_token(user_id, "MEMBER").unwrap();
        assert!(jwt.verify_reset_token(&session).is_err());
    }

    #[test]
    fn reset_tokens_are_unique_per_issuance() {
        let jwt = JwtService::from_config(&config(60));
        let user_id = Uuid::new_v4();
        let first = jwt.generate_reset_token(user_id).unwrap();
        let second = jwt.generate_reset_token(user_id).unwrap();
        assert_ne!(first, second);
    }
}
