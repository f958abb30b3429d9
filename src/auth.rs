// Admin/guest access control
// Admin password check (PBKDF2-SHA256) plus signed session tokens

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Extension;
use chrono::{Duration, Utc};
use hmac::Hmac;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Derived key length for the admin password hash (bytes)
const DERIVED_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guest,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Check a password against the configured admin credentials.
///
/// Hash and salt take precedence; the plaintext password is consulted only
/// when either is missing. Malformed configuration never grants access.
pub fn verify_admin_password(config: &Config, password: &str) -> bool {
    if let (Some(hash_hex), Some(salt_hex)) = (&config.admin_password_hash, &config.admin_password_salt) {
        let salt = match hex::decode(salt_hex) {
            Ok(salt) => salt,
            Err(e) => {
                tracing::warn!("ADMIN_PASSWORD_SALT is not valid hex: {}", e);
                return false;
            }
        };

        let mut derived = [0u8; DERIVED_KEY_LEN];
        if let Err(e) = pbkdf2::pbkdf2::<Hmac<Sha256>>(
            password.as_bytes(),
            &salt,
            config.admin_password_iterations,
            &mut derived,
        ) {
            tracing::warn!("Password derivation failed: {}", e);
            return false;
        }

        let derived_hex = hex::encode(derived);
        return constant_time_eq(derived_hex.as_bytes(), hash_hex.to_lowercase().as_bytes());
    }

    match &config.admin_password {
        Some(plain) => constant_time_eq(password.as_bytes(), plain.as_bytes()),
        None => false,
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issued session token
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub role: Role,
    pub expires_at: i64,
}

/// Issues and verifies HS256 session tokens
pub struct SessionAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionAuth {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    /// Uses SESSION_SECRET, or a random per-process secret when unset
    pub fn from_config(config: &Config) -> Self {
        let secret = config.session_secret.clone().unwrap_or_else(|| {
            format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )
        });
        Self::new(&secret, config.session_ttl_hours)
    }

    pub fn issue(&self, role: Role) -> Result<SessionToken> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: uuid::Uuid::new_v4().to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Unauthorized(format!("Failed to sign session: {}", e)))?;

        Ok(SessionToken {
            token,
            role,
            expires_at: claims.exp,
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid session: {}", e)))
    }
}

/// Layer making the session verifier available to extractors
pub fn session_extension(auth: Arc<SessionAuth>) -> Extension<Arc<SessionAuth>> {
    Extension(auth)
}

fn claims_from_parts(parts: &Parts) -> Result<SessionClaims> {
    let auth = parts
        .extensions
        .get::<Arc<SessionAuth>>()
        .ok_or_else(|| AppError::Unauthorized("Session verifier not configured".to_string()))?;

    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))?;

    auth.verify(token)
}

/// Any signed-in session, admin or guest
#[derive(Debug, Clone)]
pub struct Viewer {
    pub role: Role,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let claims = claims_from_parts(parts)?;
        Ok(Viewer { role: claims.role })
    }
}

/// Session allowed to change data
#[derive(Debug, Clone)]
pub struct AdminUser;

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let claims = claims_from_parts(parts)?;
        if !claims.role.is_admin() {
            tracing::warn!("Guest session attempted a write: {} {}", parts.method, parts.uri.path());
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashed_config() -> Config {
        // PBKDF2-HMAC-SHA256("passwd", "salt", 1)
        Config {
            admin_password_hash: Some(
                "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc".to_string(),
            ),
            admin_password_salt: Some(hex::encode("salt")),
            admin_password_iterations: 1,
            ..Config::default()
        }
    }

    #[test]
    fn test_hashed_password_verification() {
        let config = hashed_config();
        assert!(verify_admin_password(&config, "passwd"));
        assert!(!verify_admin_password(&config, "password"));
        assert!(!verify_admin_password(&config, ""));
    }

    #[test]
    fn test_hash_takes_precedence_over_plaintext() {
        let config = Config {
            admin_password: Some("letmein".to_string()),
            ..hashed_config()
        };
        assert!(!verify_admin_password(&config, "letmein"));
        assert!(verify_admin_password(&config, "passwd"));
    }

    #[test]
    fn test_plaintext_fallback() {
        let config = Config {
            admin_password: Some("letmein".to_string()),
            ..Config::default()
        };
        assert!(verify_admin_password(&config, "letmein"));
        assert!(!verify_admin_password(&config, "letmein "));

        assert!(!verify_admin_password(&Config::default(), ""));
    }

    #[test]
    fn test_malformed_salt_denies_access() {
        let config = Config {
            admin_password_salt: Some("not-hex".to_string()),
            ..hashed_config()
        };
        assert!(!verify_admin_password(&config, "passwd"));
    }

    #[test]
    fn test_session_round_trip_keeps_role() {
        let auth = SessionAuth::new("test-secret", 1);

        let admin = auth.issue(Role::Admin).unwrap();
        assert_eq!(auth.verify(&admin.token).unwrap().role, Role::Admin);

        let guest = auth.issue(Role::Guest).unwrap();
        let claims = auth.verify(&guest.token).unwrap();
        assert_eq!(claims.role, Role::Guest);
        assert_eq!(claims.exp, guest.expires_at);
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let auth = SessionAuth::new("test-secret", 1);
        let other = SessionAuth::new("other-secret", 1);

        let token = other.issue(Role::Admin).unwrap().token;
        assert!(matches!(auth.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(auth.verify("garbage").is_err());

        let past = Utc::now() - Duration::hours(3);
        let expired = SessionClaims {
            sub: "s".to_string(),
            role: Role::Admin,
            iat: past.timestamp(),
            exp: (past + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &expired,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(auth.verify(&token).is_err());
    }
}
