//! Key-encrypting-key providers.
//!
//! A provider hands out fresh data keys together with their wrapped form, and
//! recovers the plaintext key from the wrapped form later. Two backends exist:
//!
//! - [`LocalAeadKeyProvider`]: wraps with a master key held in process memory.
//! - [`RemoteKmsKeyProvider`]: delegates generation and unwrapping to AWS KMS.
//!
//! # Security invariants
//!
//! - Plaintext data keys are never persisted, logged, or included in traces.
//!   They live in a [`PlaintextKey`] that is zeroed on drop.
//! - A wrapped key only unwraps under the same encryption context it was
//!   produced with.

pub mod kms;
pub mod local;

pub use kms::{KmsClient, RemoteKmsKeyProvider};
pub use local::LocalAeadKeyProvider;

use std::fmt;

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::context::EncryptionContext;
use crate::error::Error;

/// Stable identifier of the key-encrypting key behind a provider.
///
/// Two providers built from the same key material (or KMS key) have equal ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KekId(String);

impl KekId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plaintext data-key bytes.
///
/// Zeroed on drop and redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PlaintextKey(Vec<u8>);

impl PlaintextKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PlaintextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("PlaintextKey([REDACTED])")
    }
}

/// A freshly generated data key and its wrapped form.
#[derive(Debug, Clone)]
pub struct DataKey {
    /// Used once for the data-layer cipher, then dropped.
    pub plaintext: PlaintextKey,
    /// Opaque wrapped form stored inside the envelope.
    pub wrapped: Vec<u8>,
}

/// Capability contract for key-encrypting-key backends.
///
/// Implementations are immutable after construction and must be safe to share
/// across concurrent encrypt/decrypt calls.
#[async_trait]
pub trait KekProvider: Send + Sync {
    /// Identity of the key-encrypting key.
    fn id(&self) -> &KekId;

    /// Generate a new data key, binding `context` into the wrapping step.
    async fn request_data_key(&self, context: Option<&EncryptionContext>)
        -> Result<DataKey, Error>;

    /// Recover the plaintext key from `wrapped`.
    ///
    /// Fails if `context` differs from the one used at wrap time or if
    /// `wrapped` was altered.
    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        context: Option<&EncryptionContext>,
    ) -> Result<PlaintextKey, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_key_redacted_in_debug() {
        let key = PlaintextKey::new(vec![0xFF; 32]);
        let shown = format!("{key:?}");
        assert!(shown.contains("REDACTED"));
        assert!(!shown.contains("255"));
    }

    #[test]
    fn kek_id_display() {
        let id = KekId::new("arn:aws:kms:us-east-2:111122223333:key/abc");
        assert_eq!(id.to_string(), id.as_str());
    }
}
