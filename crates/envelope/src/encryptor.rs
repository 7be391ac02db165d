//! [`Encryptor`]: provider + cipher + codec.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{Envelope, Version};
use crate::context::EncryptionContext;
use crate::crypto::{cipher, KEY_LEN};
use crate::error::Error;
use crate::kek::{KekId, KekProvider, PlaintextKey};

/// Encrypts values into envelope tokens and back.
///
/// Cheap to clone; the provider is shared. Each call makes exactly one
/// provider request and keeps no state between calls.
#[derive(Clone)]
pub struct Encryptor {
    provider: Arc<dyn KekProvider>,
    accept_legacy: bool,
}

impl Encryptor {
    pub fn new(provider: impl KekProvider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn KekProvider>) -> Self {
        Self {
            provider,
            accept_legacy: false,
        }
    }

    /// Also decrypt tokens in the unversioned legacy layout (version 0).
    pub fn accept_legacy(mut self, accept: bool) -> Self {
        self.accept_legacy = accept;
        self
    }

    /// Identity of the key-encrypting key behind this encryptor.
    pub fn kek_id(&self) -> &KekId {
        self.provider.id()
    }

    /// Encrypt `plaintext` under a fresh data key bound to `context`.
    ///
    /// The returned token always starts with the current version character.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the data key cannot be obtained, and
    /// [`Error::InvalidKeyLength`] if the provider hands back a key of the
    /// wrong size.
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        context: Option<&EncryptionContext>,
    ) -> Result<String, Error> {
        let data_key = self.provider.request_data_key(context).await?;
        let sealed = cipher::seal(plaintext, data_key.plaintext.as_bytes())?;

        let envelope = Envelope {
            version: Version::CURRENT,
            nonce: sealed.nonce,
            tag: sealed.tag,
            wrapped_key: data_key.wrapped,
            ciphertext: sealed.ciphertext,
        };
        debug!(kek_id = %self.provider.id(), version = Version::CURRENT.number(), "value encrypted");
        envelope.encode()
    }

    /// Decrypt a token produced by [`Encryptor::encrypt`].
    ///
    /// The version is checked before the provider is called.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedVersion`] / [`Error::MalformedEnvelope`] for a
    ///   foreign or corrupted token.
    /// - [`Error::Authentication`] for a context mismatch, a different key, or
    ///   tampering.
    /// - [`Error::Provider`] if the provider call fails.
    pub async fn decrypt(
        &self,
        token: &str,
        context: Option<&EncryptionContext>,
    ) -> Result<Vec<u8>, Error> {
        let envelope = Envelope::decode_with(token, self.accept_legacy)?;
        let key: PlaintextKey = self
            .provider
            .decrypt_data_key(&envelope.wrapped_key, context)
            .await?;
        if key.len() != KEY_LEN {
            return Err(Error::InvalidKeyLength {
                expected: KEY_LEN,
                got: key.len(),
            });
        }

        let plaintext = cipher::open(
            key.as_bytes(),
            &envelope.nonce,
            &envelope.tag,
            &envelope.ciphertext,
        )?;
        debug!(kek_id = %self.provider.id(), version = envelope.version.number(), "value decrypted");
        Ok(plaintext)
    }

    /// [`Encryptor::encrypt`] for string values.
    pub async fn encrypt_str(
        &self,
        value: &str,
        context: Option<&EncryptionContext>,
    ) -> Result<String, Error> {
        self.encrypt(value.as_bytes(), context).await
    }

    /// [`Encryptor::decrypt`] for values that were strings.
    ///
    /// # Errors
    ///
    /// As [`Encryptor::decrypt`], plus [`Error::InvalidUtf8`].
    pub async fn decrypt_str(
        &self,
        token: &str,
        context: Option<&EncryptionContext>,
    ) -> Result<String, Error> {
        let bytes = self.decrypt(token, context).await?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Encrypt a stored field value. `None` and `""` pass through untouched
    /// and the provider is not called.
    pub async fn encrypt_field(
        &self,
        value: Option<&str>,
        context: Option<&EncryptionContext>,
    ) -> Result<Option<String>, Error> {
        match value {
            None => Ok(None),
            Some("") => Ok(Some(String::new())),
            Some(v) => self.encrypt_str(v, context).await.map(Some),
        }
    }

    /// Decrypt a stored field value. `None` and `""` pass through untouched
    /// and the provider is not called.
    pub async fn decrypt_field(
        &self,
        token: Option<&str>,
        context: Option<&EncryptionContext>,
    ) -> Result<Option<String>, Error> {
        match token {
            None => Ok(None),
            Some("") => Ok(Some(String::new())),
            Some(t) => self.decrypt_str(t, context).await.map(Some),
        }
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("kek_id", self.provider.id())
            .field("accept_legacy", &self.accept_legacy)
            .finish()
    }
}
