//! Process signing key
//!
//! One HMAC secret is generated when the process starts and lives until it exits.
//! It is never persisted, never read from configuration and never logged, so a
//! restart invalidates every token issued before it.

use rand::{RngCore, rngs::OsRng};

/// Length of the signing key in bytes (256 bits)
pub const SIGNING_KEY_LEN: usize = 32;

/// Key generation errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Failed to generate signing key: {0}")]
    GenerationFailure(String),
}

/// Immutable HMAC secret shared by the token issuer and validator.
///
/// Deliberately not `Clone`: callers share it through an `Arc`.
pub struct SigningKey {
    bytes: [u8; SIGNING_KEY_LEN],
}

impl SigningKey {
    /// Generate a fresh key from the operating system's CSPRNG.
    ///
    /// An error here must stop startup: nothing can be signed or verified without a key.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; SIGNING_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| KeyError::GenerationFailure(e.to_string()))?;

        Ok(Self { bytes })
    }

    /// Build a key from known bytes (tests and fixtures)
    pub fn from_bytes(bytes: [u8; SIGNING_KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
