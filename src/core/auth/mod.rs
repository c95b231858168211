//! Authentication module
//!
//! - Process signing key and HS256 token issuance/validation
//! - bcrypt password hashing on a bounded blocking pool
//! - Bearer gate with role and ownership policies
//! - Signup, login and user-read endpoints

pub mod api;
pub mod gate;
pub mod jwt;
pub mod key;
pub mod password;
pub mod role;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use gate::{CurrentUser, GateState, require_bearer, require_role, require_self_or_admin};
pub use jwt::{AccessClaims, JwtConfig, JwtError, TokenIssuer, TokenPair, TokenValidator};
pub use key::{KeyError, SigningKey};
pub use password::{PasswordError, PasswordHasher};
pub use role::Role;
pub use service::{
    AuthError, AuthService, LoginRequest, LoginResponse, SignupRequest, SignupResponse,
};
