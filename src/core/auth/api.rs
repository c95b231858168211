//! Auth API endpoints
//!
//! Public:
//! - POST /signup - Register a new identity
//! - POST /login - Login and get tokens
//! - GET /health - Liveness and store reachability
//!
//! Behind the bearer gate:
//! - GET /users - List identities (ADMIN only)
//! - GET /users/{id} - Read one identity (owner or ADMIN)

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::gate::{CurrentUser, GateState, require_bearer};
use crate::core::auth::jwt::{TokenIssuer, TokenValidator};
use crate::core::auth::key::SigningKey;
use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::auth::service::{
    AuthError, AuthService, LoginRequest, LoginResponse, SignupRequest, SignupResponse,
};
use crate::core::config::Config;
use crate::core::db::models::UserResponse;
use crate::core::db::store::UserStore;

/// Auth API state containing the auth service and the gate
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
    pub gate: GateState,
}

impl AuthApiState {
    /// Wire the service and gate around one process key
    pub fn new(
        config: &Config,
        key: Arc<SigningKey>,
        store: Arc<dyn UserStore>,
    ) -> Result<Self, PasswordError> {
        let hasher = PasswordHasher::new(config.bcrypt_cost, config.hash_workers)?;
        let issuer = TokenIssuer::new(key.clone(), config.jwt_config());
        let validator = Arc::new(TokenValidator::new(key));

        Ok(Self {
            auth_service: AuthService::new(store, hasher, issuer, config.store_timeout())?,
            gate: GateState::new(validator),
        })
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Convert AuthError to API response.
///
/// Token failures share one body, as do policy failures and credential
/// failures. Internal faults are logged and answered generically.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AuthError::MissingCredential
            | AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::SignatureMismatch => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("Unauthorized", "UNAUTHORIZED"),
            ),
            AuthError::InsufficientRole | AuthError::NotResourceOwner => (
                StatusCode::FORBIDDEN,
                ApiError::new("Forbidden", "FORBIDDEN"),
            ),
            AuthError::InvalidCredentials | AuthError::PasswordMismatch => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("Invalid email or password", "INVALID_CREDENTIALS"),
            ),
            AuthError::DuplicateIdentity => (
                StatusCode::BAD_REQUEST,
                ApiError::new(self.to_string(), "DUPLICATE_IDENTITY"),
            ),
            AuthError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ApiError::new(self.to_string(), "VALIDATION_ERROR"),
            ),
            AuthError::UserNotFound => (
                StatusCode::NOT_FOUND,
                ApiError::new(self.to_string(), "USER_NOT_FOUND"),
            ),
            AuthError::SigningFailure(_)
            | AuthError::HashingError(_)
            | AuthError::StoreTimeout
            | AuthError::StoreError(_) => {
                tracing::error!("Request failed with internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("Internal server error", "INTERNAL_ERROR"),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let gate = state.gate.clone();
    let state = Arc::new(state);

    let protected = Router::new()
        .route("/users", get(list_users_handler))
        .route("/users/{id}", get(get_user_handler))
        .route_layer(middleware::from_fn_with_state(gate, require_bearer));

    Router::new()
        .route("/health", get(health_handler))
        .route("/signup", post(signup_handler))
        .route("/login", post(login_handler))
        .merge(protected)
        .with_state(state)
}

fn bad_request(rejection: JsonRejection) -> AuthError {
    AuthError::Validation(rejection.body_text())
}

/// POST /signup
async fn signup_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, AuthError> {
    let Json(request) = payload.map_err(bad_request)?;

    tracing::info!("Signup attempt for email: {}", request.email);

    let response = state.auth_service.signup(request).await?;

    Ok(Json(response))
}

/// POST /login
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(request) = payload.map_err(bad_request)?;

    tracing::info!("Login attempt for email: {}", request.email);

    let response = state.auth_service.login(request).await?;

    Ok(Json(response))
}

/// GET /users
async fn list_users_handler(
    State(state): State<Arc<AuthApiState>>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, AuthError> {
    let users = state.auth_service.list_users(&claims).await?;
    Ok(Json(users))
}

/// GET /users/{id}
async fn get_user_handler(
    State(state): State<Arc<AuthApiState>>,
    CurrentUser(claims): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth_service.get_user(&claims, &user_id).await?;
    Ok(Json(user))
}

/// GET /health
async fn health_handler(State(state): State<Arc<AuthApiState>>) -> Response {
    match state.auth_service.store_health().await {
        Ok(()) => Json(HealthResponse { status: "ok" }).into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "unavailable" }),
            )
                .into_response()
        }
    }
}
