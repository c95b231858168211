//! Identity storage
//!
//! The [`UserStore`] trait is the seam between the auth service and storage.
//! PostgreSQL backs it when `DATABASE_URL` is set, a DashMap otherwise.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use memory::InMemoryUserStore;
pub use models::{User, UserResponse};
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations};
pub use repositories::PgUserStore;
pub use store::{StoreError, UserStore};
