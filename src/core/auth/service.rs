//! Authentication service
//!
//! Provides the business logic for signup, login and user reads. Coordinates the
//! identity store, the password hasher and the token issuer. Every store call is
//! bounded by the configured store timeout.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::auth::gate::{require_role, require_self_or_admin};
use crate::core::auth::jwt::{AccessClaims, JwtError, TokenIssuer};
use crate::core::auth::password::{MAX_PASSWORD_BYTES, PasswordError, PasswordHasher};
use crate::core::auth::role::Role;
use crate::core::db::models::{User, UserResponse};
use crate::core::db::store::{StoreError, UserStore};

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 100;
const MIN_PASSWORD_CHARS: usize = 6;

/// Hashed once at startup and verified against when a login email is unknown
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

/// Authentication service error types
///
/// Variants are distinguished for logging. The HTTP layer collapses them into a
/// few uniform responses.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("Not the resource owner")]
    NotResourceOwner,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password mismatch")]
    PasswordMismatch,

    #[error("Email or phone already exists")]
    DuplicateIdentity,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Token signing failed: {0}")]
    SigningFailure(String),

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Store call timed out")]
    StoreTimeout,

    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::MalformedToken => AuthError::MalformedToken,
            JwtError::SignatureMismatch => AuthError::SignatureMismatch,
            JwtError::ExpiredToken => AuthError::ExpiredToken,
            JwtError::SigningFailure(e) => AuthError::SigningFailure(e),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => {
                AuthError::Validation(format!("Password must be at most {} bytes", MAX_PASSWORD_BYTES))
            }
            other => AuthError::HashingError(other.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::DuplicateIdentity,
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Backend(e) => AuthError::StoreError(e),
        }
    }
}

/// Signup request data
#[derive(Clone, serde::Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: Role,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("phone", &self.phone)
            .field("role", &self.role)
            .finish()
    }
}

/// Login request data
#[derive(Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Signup response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: String,
}

/// Login response with user data and tokens
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
    /// Always `"Bearer"`
    pub token_type: String,
    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,
    /// Refresh token expiry (Unix timestamp)
    pub refresh_expires_at: i64,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    store_timeout: Duration,
    decoy_hash: Arc<str>,
}

impl AuthService {
    /// Create a new authentication service.
    ///
    /// Hashes the login decoy at the hasher's cost, so this blocks for one bcrypt round.
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: PasswordHasher,
        issuer: TokenIssuer,
        store_timeout: Duration,
    ) -> Result<Self, PasswordError> {
        let decoy_hash = hasher.hash_blocking(DECOY_PASSWORD)?.into();

        Ok(Self {
            store,
            hasher,
            issuer,
            store_timeout,
            decoy_hash,
        })
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        let invalid = || AuthError::Validation("Invalid email format".to_string());

        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(invalid());
        }

        // something@something.something
        if !domain.contains('.') || domain.split('.').any(|p| p.is_empty()) {
            return Err(invalid());
        }

        if email.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(())
    }

    fn validate_name(field: &str, value: &str) -> Result<(), AuthError> {
        let len = value.trim().chars().count();
        if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
            return Err(AuthError::Validation(format!(
                "{} must be between {} and {} characters",
                field, MIN_NAME_CHARS, MAX_NAME_CHARS
            )));
        }

        Ok(())
    }

    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Validation(format!(
                "Password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        Ok(())
    }

    fn validate_phone(phone: &str) -> Result<(), AuthError> {
        if phone.trim().is_empty() {
            return Err(AuthError::Validation("Phone is required".to_string()));
        }

        Ok(())
    }

    fn validate_signup(request: &SignupRequest) -> Result<(), AuthError> {
        Self::validate_name("First name", &request.first_name)?;
        Self::validate_name("Last name", &request.last_name)?;
        Self::validate_email(&request.email)?;
        Self::validate_password(&request.password)?;
        Self::validate_phone(&request.phone)?;
        Ok(())
    }

    /// Run a store call under the store timeout
    async fn with_timeout<T, F>(&self, operation: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                tracing::error!(
                    "Store call {} exceeded {:?}",
                    operation,
                    self.store_timeout
                );
                Err(AuthError::StoreTimeout)
            }
        }
    }

    /// Register a new identity
    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, AuthError> {
        Self::validate_signup(&request)?;

        let existing = self
            .with_timeout(
                "count_by_email_or_phone",
                self.store
                    .count_by_email_or_phone(&request.email, &request.phone),
            )
            .await?;
        if existing > 0 {
            tracing::info!("Signup rejected: email or phone already registered");
            return Err(AuthError::DuplicateIdentity);
        }

        let password_hash = self.hasher.hash(request.password).await?;

        let now = Utc::now();
        let user_id = Uuid::new_v4().to_string();
        let tokens = self
            .issuer
            .issue_at(&user_id, &request.email, request.role, now)?;

        let user = User {
            user_id,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            password_hash,
            role: request.role,
            token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            created_at: now,
            updated_at: now,
        };

        // A concurrent signup may win between the count and the insert
        self.with_timeout("persist_identity", self.store.persist_identity(&user))
            .await?;

        tracing::info!(user_id = %user.user_id, role = %user.role, "User registered");

        Ok(SignupResponse {
            message: "User created successfully".to_string(),
            user_id: user.user_id,
        })
    }

    /// Authenticate by email and password and issue a fresh token pair
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let Some(user) = self
            .with_timeout("lookup_credential", self.store.lookup_credential(&request.email))
            .await?
        else {
            // Same bcrypt work as a wrong password
            let _ = self
                .hasher
                .verify(self.decoy_hash.to_string(), request.password)
                .await;
            tracing::info!("Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify(user.password_hash.clone(), request.password)
            .await
        {
            tracing::info!(user_id = %user.user_id, "Login failed: password mismatch");
            return Err(AuthError::PasswordMismatch);
        }

        let tokens = self.issuer.issue(&user.user_id, &user.email, user.role)?;

        self.with_timeout(
            "update_tokens",
            self.store
                .update_tokens(&user.user_id, &tokens.access_token, &tokens.refresh_token),
        )
        .await?;

        tracing::info!(user_id = %user.user_id, "User logged in");

        Ok(LoginResponse {
            user: user.into(),
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })
    }

    /// Read one identity. Allowed for the owner and for admins.
    pub async fn get_user(
        &self,
        caller: &AccessClaims,
        user_id: &str,
    ) -> Result<UserResponse, AuthError> {
        require_self_or_admin(caller, user_id)?;

        self.with_timeout("find_by_id", self.store.find_by_id(user_id))
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::UserNotFound)
    }

    /// List all identities. Admin only.
    pub async fn list_users(&self, caller: &AccessClaims) -> Result<Vec<UserResponse>, AuthError> {
        require_role(caller, Role::Admin)?;

        let users = self.with_timeout("list", self.store.list()).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Probe the identity store
    pub async fn store_health(&self) -> Result<(), AuthError> {
        self.with_timeout("health_check", self.store.health_check())
            .await
    }
}
