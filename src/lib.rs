//! authgate - JWT/bcrypt authentication service
//!
//! Issues and validates HS256 access tokens signed with a key generated at
//! startup, hashes passwords with bcrypt, and gates HTTP routes by role and
//! resource ownership.

pub mod core;
