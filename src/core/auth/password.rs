//! Password hashing with bcrypt
//!
//! Hash records are standard `$2b$` strings with the salt and cost embedded, so
//! verification needs nothing but the record. Hashing is CPU-bound; the async
//! entry points run it on tokio's blocking pool behind a semaphore so a burst of
//! logins cannot starve request handling.

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default bcrypt cost factor
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Smallest cost bcrypt accepts
pub const MIN_BCRYPT_COST: u32 = 4;

/// Largest cost bcrypt accepts
pub const MAX_BCRYPT_COST: u32 = 31;

/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing errors
///
/// Messages never include the password itself.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Invalid bcrypt cost {0} (allowed 4..=31)")]
    InvalidCost(u32),

    #[error("Password exceeds 72 bytes")]
    TooLong,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Hashing worker unavailable: {0}")]
    WorkerError(String),
}

/// Salted one-way password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .field("available_workers", &self.permits.available_permits())
            .finish()
    }
}

impl PasswordHasher {
    /// Create a hasher with the given cost and at most `max_concurrent` hashing jobs
    pub fn new(cost: u32, max_concurrent: usize) -> Result<Self, PasswordError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }

        Ok(Self {
            cost,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// Get the configured cost factor
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password on the current thread
    pub fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }

        bcrypt::hash(password, self.cost).map_err(|e| PasswordError::HashingError(e.to_string()))
    }

    /// Verify a password against a hash record on the current thread.
    ///
    /// Malformed records and over-long passwords verify as `false`.
    pub fn verify_blocking(hash: &str, password: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return false;
        }

        match bcrypt::verify(password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Rejecting malformed password hash record: {}", e);
                false
            }
        }
    }

    /// Hash a password on the blocking pool
    pub async fn hash(&self, password: String) -> Result<String, PasswordError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PasswordError::WorkerError(e.to_string()))?;

        // The permit is held until the job ends, even if the caller goes away
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hasher.hash_blocking(&password)
        })
        .await
            .map_err(|e| PasswordError::WorkerError(e.to_string()))?
    }

    /// Verify a password on the blocking pool.
    ///
    /// Any failure to run the check counts as a mismatch.
    pub async fn verify(&self, hash: String, password: String) -> bool {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!("Hashing worker pool closed: {}", e);
                return false;
            }
        };

        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            Self::verify_blocking(&hash, &password)
        });

        match job.await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }
}
