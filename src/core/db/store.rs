//! Identity store contract
//!
//! The auth service only talks to this trait. Implementations: an in-memory
//! store (`memory`) and PostgreSQL (`repositories::user`).

use async_trait::async_trait;

use crate::core::db::models::User;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email or phone already exists")]
    Conflict,

    #[error("User not found")]
    NotFound,

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Persistence for identities
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the identity registered under `email`
    async fn lookup_credential(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new identity. Fails with `Conflict` if the email or phone is taken.
    async fn persist_identity(&self, user: &User) -> Result<(), StoreError>;

    /// Record the last issued token pair for `user_id`
    async fn update_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError>;

    /// Count identities holding `email` or `phone`
    async fn count_by_email_or_phone(&self, email: &str, phone: &str) -> Result<u64, StoreError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// All identities, oldest first
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Whether the backend is reachable
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            format!("{}", StoreError::Conflict),
            "Email or phone already exists"
        );
        assert_eq!(format!("{}", StoreError::NotFound), "User not found");
        assert!(
            format!("{}", StoreError::Backend("connection reset".to_string()))
                .contains("connection reset")
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_other_sqlx_errors_map_to_backend() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
