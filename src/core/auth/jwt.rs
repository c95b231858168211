//! JWT issuance and validation
//!
//! Tokens are HS256-signed with the process [`SigningKey`]. Access tokens carry the
//! identity (user id, email, role) and live 24 hours; refresh tokens carry only
//! their timestamps and live 7 days.
//!
//! The library's own clock checks are turned off: the signature is verified first,
//! then `exp` is compared against an explicit `now`, which keeps validation a pure
//! function of (key, token, time).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::auth::key::SigningKey;
use crate::core::auth::role::Role;

/// Default access token expiration time (24 hours)
pub const DEFAULT_ACCESS_TOKEN_EXPIRATION_HOURS: i64 = 24;

/// Default refresh token expiration time (7 days)
pub const DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// Token lifetime configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Access token expiration in hours
    pub access_token_expiration_hours: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_token_expiration_hours: DEFAULT_ACCESS_TOKEN_EXPIRATION_HOURS,
            refresh_token_expiration_days: DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS,
        }
    }
}

impl JwtConfig {
    /// Set access token expiration
    pub fn access_token_expiration(mut self, hours: i64) -> Self {
        self.access_token_expiration_hours = hours;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }
}

/// JWT errors
///
/// The distinctions are for logs only; HTTP responses collapse them into one
/// unauthorized outcome.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token signing failed: {0}")]
    SigningFailure(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                JwtError::SignatureMismatch
            }
            _ => JwtError::MalformedToken,
        }
    }
}

/// Claims of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub user_id: String,
    /// User email
    pub email: String,
    /// User role
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Claims of a refresh token. Carries no identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (24h)
    pub access_token: String,
    /// Refresh token (7d)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

/// Mints signed token pairs
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: Arc<SigningKey>,
    config: JwtConfig,
}

impl TokenIssuer {
    /// Create an issuer bound to the process key
    pub fn new(key: Arc<SigningKey>, config: JwtConfig) -> Self {
        Self { key, config }
    }

    /// Issue an access/refresh pair for an authenticated identity
    pub fn issue(&self, user_id: &str, email: &str, role: Role) -> Result<TokenPair, JwtError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    /// Issue a pair as if the current time were `now`
    pub fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, JwtError> {
        let access_exp = Duration::try_hours(self.config.access_token_expiration_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                JwtError::SigningFailure("access token lifetime out of range".to_string())
            })?;
        let refresh_exp = Duration::try_days(self.config.refresh_token_expiration_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                JwtError::SigningFailure("refresh token lifetime out of range".to_string())
            })?;

        let access_claims = AccessClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
        };

        let refresh_claims = RefreshClaims {
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
        };

        Ok(TokenPair {
            access_token: self.sign(&access_claims)?,
            refresh_token: self.sign(&refresh_claims)?,
            access_expires_at: access_claims.exp,
            refresh_expires_at: refresh_claims.exp,
            token_type: "Bearer".to_string(),
        })
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.key.expose()),
        )
        .map_err(|e| JwtError::SigningFailure(e.to_string()))
    }
}

/// Verifies access tokens
#[derive(Debug, Clone)]
pub struct TokenValidator {
    key: Arc<SigningKey>,
    validation: Validation,
}

impl TokenValidator {
    /// Create a validator bound to the process key
    pub fn new(key: Arc<SigningKey>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `validate_at`
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self { key, validation }
    }

    /// Validate an access token against the wall clock
    pub fn validate(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate an access token as if the current time were `now`.
    ///
    /// Structure is parsed first, then the signature is verified, and only then
    /// are the claims deserialized and `exp` checked.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, JwtError> {
        let token_data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.key.expose()),
            &self.validation,
        )?;

        let claims = token_data.claims;
        if now.timestamp() > claims.exp {
            return Err(JwtError::ExpiredToken);
        }

        Ok(claims)
    }
}
