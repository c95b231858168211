//! Request authorization gate
//!
//! Protected routes sit behind [`require_bearer`]. It reads the
//! `Authorization: Bearer <token>` header, validates the token and stores the
//! resulting [`AccessClaims`] in the request extensions. Handlers read them back
//! with the [`CurrentUser`] extractor and apply [`require_role`] or
//! [`require_self_or_admin`] for their resource.
//!
//! Per request: no token -> rejected (401); invalid token -> rejected (401);
//! valid token -> authorized, then the handler's policy allows or forbids (403).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::auth::jwt::{AccessClaims, JwtError, TokenValidator};
use crate::core::auth::role::Role;
use crate::core::auth::service::AuthError;

/// Authorization scheme accepted by the gate (matched case-insensitively)
pub const BEARER_SCHEME: &str = "Bearer";

/// State for the gate middleware
#[derive(Debug, Clone)]
pub struct GateState {
    pub validator: Arc<TokenValidator>,
}

impl GateState {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }
}

/// Extract the bearer token from the Authorization header.
///
/// The scheme and surrounding whitespace are stripped.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let value = value.to_str().map_err(|_| AuthError::MalformedToken)?;
    let value = value.trim();

    let (scheme, token) = value
        .split_once(|c: char| c.is_ascii_whitespace())
        .ok_or(AuthError::MalformedToken)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::MalformedToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedToken);
    }

    Ok(token)
}

/// Authenticate a request's headers as of `now`
pub fn authenticate(
    headers: &HeaderMap,
    validator: &TokenValidator,
    now: DateTime<Utc>,
) -> Result<AccessClaims, AuthError> {
    let token = extract_bearer_token(headers)?;

    validator.validate_at(token, now).map_err(|e| {
        match &e {
            JwtError::ExpiredToken => tracing::debug!("Rejected bearer token: {}", e),
            _ => tracing::warn!("Rejected bearer token: {}", e),
        }
        AuthError::from(e)
    })
}

/// Middleware guarding protected routes.
///
/// The inner handler only runs when the token validates.
pub async fn require_bearer(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = authenticate(request.headers(), &gate.validator, Utc::now())?;

    tracing::debug!(
        user_id = %claims.user_id,
        role = %claims.role,
        "Request authorized"
    );

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Claims of the authenticated caller, as attached by [`require_bearer`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AccessClaims);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent only when a route was mounted outside the gate
        parts
            .extensions
            .get::<AccessClaims>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingCredential)
    }
}

/// Allow only callers holding exactly `required`
pub fn require_role(claims: &AccessClaims, required: Role) -> Result<(), AuthError> {
    if claims.role != required {
        tracing::info!(
            user_id = %claims.user_id,
            role = %claims.role,
            required = %required,
            "Forbidden: insufficient role"
        );
        return Err(AuthError::InsufficientRole);
    }

    Ok(())
}

/// Allow the resource owner, or any admin
pub fn require_self_or_admin(claims: &AccessClaims, owner_id: &str) -> Result<(), AuthError> {
    if claims.user_id == owner_id || claims.role.is_admin() {
        return Ok(());
    }

    tracing::info!(
        user_id = %claims.user_id,
        owner_id = %owner_id,
        "Forbidden: not resource owner"
    );
    Err(AuthError::NotResourceOwner)
}
