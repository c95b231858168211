//! SQL-backed store implementations

pub mod user;

pub use user::PgUserStore;
