//! In-memory identity store
//!
//! Used when no `DATABASE_URL` is configured, and by the test suites. Contents
//! are lost on restart, which matches the lifetime of the signing key anyway.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::core::db::models::User;
use crate::core::db::store::{StoreError, UserStore};

/// DashMap-backed [`UserStore`]
///
/// Lock order is email index, then phone index, then users.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    /// Identities keyed by user id
    users: DashMap<String, User>,
    /// email -> user id
    by_email: DashMap<String, String>,
    /// phone -> user id
    by_phone: DashMap<String, String>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn lookup_credential(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(user_id) = self.by_email.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };

        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn persist_identity(&self, user: &User) -> Result<(), StoreError> {
        let email_slot = match self.by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => slot,
        };
        let phone_slot = match self.by_phone.entry(user.phone.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => slot,
        };

        if self.users.contains_key(&user.user_id) {
            return Err(StoreError::Conflict);
        }

        self.users.insert(user.user_id.clone(), user.clone());
        phone_slot.insert(user.user_id.clone());
        email_slot.insert(user.user_id.clone());

        Ok(())
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(user_id).ok_or(StoreError::NotFound)?;

        user.token = Some(access_token.to_string());
        user.refresh_token = Some(refresh_token.to_string());
        user.updated_at = Utc::now();

        Ok(())
    }

    async fn count_by_email_or_phone(&self, email: &str, phone: &str) -> Result<u64, StoreError> {
        let count = self
            .users
            .iter()
            .filter(|u| u.email == email || u.phone == phone)
            .count();

        Ok(count as u64)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }
}
