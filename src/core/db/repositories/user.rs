//! PostgreSQL identity store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::core::auth::role::Role;
use crate::core::db::models::User;
use crate::core::db::pool;
use crate::core::db::store::{StoreError, UserStore};

const USER_COLUMNS: &str = "user_id, first_name, last_name, email, phone, password_hash, role, \
     token, refresh_token, created_at, updated_at";

/// Row as stored; `role` is checked when converted into a [`User`]
#[derive(Debug, FromRow)]
struct UserRow {
    user_id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    password_hash: String,
    role: String,
    token: Option<String>,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| StoreError::Backend(format!("user {}: {}", self.user_id, e)))?;

        Ok(User {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            role,
            token: self.token,
            refresh_token: self.refresh_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// [`UserStore`] over a PostgreSQL pool
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete an identity by ID
    #[cfg(test)]
    async fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn lookup_credential(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn persist_identity(&self, user: &User) -> Result<(), StoreError> {
        // Unique constraints on email and phone turn a lost race into Conflict
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, phone, password_hash,
                               role, token, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.token)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET token = $2, refresh_token = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn count_by_email_or_phone(&self, email: &str, phone: &str) -> Result<u64, StoreError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1 OR phone = $2")
                .bind(email)
                .bind(phone)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0.max(0) as u64)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        pool::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            user_id: "u1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone: "555-0100".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: role.to_string(),
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ========================================================================
    // Row Conversion Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_row_conversion() {
        let user = sample_row("ADMIN").into_user().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email, "grace@example.com");

        let user = sample_row("USER").into_user().unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_row_with_unknown_role_is_rejected() {
        let result = sample_row("SUPERUSER").into_user();
        assert!(matches!(result, Err(StoreError::Backend(msg)) if msg.contains("SUPERUSER")));
    }

    #[test]
    fn test_user_columns_cover_row() {
        for column in [
            "user_id",
            "first_name",
            "last_name",
            "email",
            "phone",
            "password_hash",
            "role",
            "token",
            "refresh_token",
            "created_at",
            "updated_at",
        ] {
            assert!(USER_COLUMNS.contains(column), "missing {}", column);
        }
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    fn new_user(tag: &str) -> User {
        let now = Utc::now();
        let unique = Uuid::new_v4().to_string();
        User {
            user_id: unique.clone(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{}_{}@example.com", tag, &unique[..8]),
            phone: format!("{}-{}", tag, &unique[..8]),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_persist_and_lookup() {
        let store = PgUserStore::new(create_test_pool().await);
        let user = new_user("persist");

        store.persist_identity(&user).await.unwrap();

        let found = store.lookup_credential(&user.email).await.unwrap().unwrap();
        assert_eq!(found.user_id, user.user_id);
        assert_eq!(found.role, Role::User);

        // Cleanup
        store.delete(&user.user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_persist_duplicate_email() {
        let store = PgUserStore::new(create_test_pool().await);
        let user = new_user("dup");
        store.persist_identity(&user).await.unwrap();

        let mut other = new_user("dup_other");
        other.email = user.email.clone();
        let result = store.persist_identity(&other).await;

        assert!(matches!(result, Err(StoreError::Conflict)));

        // Cleanup
        store.delete(&user.user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_tokens_and_count() {
        let store = PgUserStore::new(create_test_pool().await);
        let user = new_user("tokens");
        store.persist_identity(&user).await.unwrap();

        store
            .update_tokens(&user.user_id, "access", "refresh")
            .await
            .unwrap();
        let found = store.find_by_id(&user.user_id).await.unwrap().unwrap();
        assert_eq!(found.token.as_deref(), Some("access"));

        let count = store
            .count_by_email_or_phone(&user.email, "no-such-phone")
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Cleanup
        store.delete(&user.user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_tokens_missing_user() {
        let store = PgUserStore::new(create_test_pool().await);
        let result = store.update_tokens("missing", "a", "r").await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    // Helper function to create test pool
    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool_with_migrations};

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
        create_pool_with_migrations(&DbConfig::new(url))
            .await
            .expect("Failed to create test pool")
    }
}
