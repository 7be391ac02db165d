//! [`LocalAeadKeyProvider`]: data keys wrapped under an in-memory master key.
//!
//! Wrapping uses AES-256-GCM with a random 96-bit nonce and the
//! MessagePack-encoded encryption context as associated data. The wrapped
//! form is a MessagePack map `{"iv", "tag", "key"}`.
//!
//! A present context is always authenticated, even when empty (`{}` packs
//! to `0x80`); only an absent context means empty associated data.
//!
//! Nonces are random, not counted. Rotate the master key well before 2^32
//! wraps.

use std::fmt;

use aes_gcm::{
    aead::{rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use super::{DataKey, KekId, KekProvider, PlaintextKey};
use crate::codec::{bin, from_map};
use crate::context::{aad_for, EncryptionContext};
use crate::crypto::KEY_LEN;
use crate::error::Error;

/// Byte length of the wrapping nonce.
const WRAP_NONCE_LEN: usize = 12;

/// Byte length of the wrapping tag.
const WRAP_TAG_LEN: usize = 16;

#[derive(Serialize, Deserialize)]
struct WrappedBundle {
    #[serde(with = "bin")]
    iv: Vec<u8>,
    #[serde(with = "bin")]
    tag: Vec<u8>,
    #[serde(with = "bin")]
    key: Vec<u8>,
}

/// Key-encrypting-key provider backed by a caller-supplied 256-bit master key.
pub struct LocalAeadKeyProvider {
    master: Zeroizing<Vec<u8>>,
    id: KekId,
}

impl LocalAeadKeyProvider {
    /// Build a provider from raw master key bytes.
    ///
    /// The id is the hex SHA-256 digest of the key, so it is stable across
    /// restarts and needs no network call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyLength`] if `master_key` is not [`KEY_LEN`] bytes.
    pub fn new(master_key: &[u8]) -> Result<Self, Error> {
        if master_key.len() != KEY_LEN {
            return Err(Error::InvalidKeyLength {
                expected: KEY_LEN,
                got: master_key.len(),
            });
        }
        let digest = Sha256::digest(master_key);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Ok(Self {
            master: Zeroizing::new(master_key.to_vec()),
            id: KekId::new(format!("sha256:{hex}")),
        })
    }

    fn cipher(&self) -> Result<Aes256Gcm, Error> {
        Aes256Gcm::new_from_slice(&self.master).map_err(|_| Error::InvalidKeyLength {
            expected: KEY_LEN,
            got: self.master.len(),
        })
    }
}

impl fmt::Debug for LocalAeadKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAeadKeyProvider")
            .field("id", &self.id)
            .field("master", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl KekProvider for LocalAeadKeyProvider {
    fn id(&self) -> &KekId {
        &self.id
    }

    async fn request_data_key(
        &self,
        context: Option<&EncryptionContext>,
    ) -> Result<DataKey, Error> {
        let cipher = self.cipher()?;
        let aad = aad_for(context)?;

        let mut data_key = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut data_key);
        let mut iv = [0u8; WRAP_NONCE_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut wrapped_key = data_key.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), &aad, &mut wrapped_key)
            .map_err(|_| Error::Authentication)?;

        let wrapped = rmp_serde::to_vec_named(&WrappedBundle {
            iv: iv.to_vec(),
            tag: tag.to_vec(),
            key: wrapped_key,
        })
        .map_err(|e| Error::malformed(format!("failed to pack wrapped key: {e}")))?;

        debug!(kek_id = %self.id, "local data key generated");
        Ok(DataKey {
            plaintext: PlaintextKey::new(data_key.to_vec()),
            wrapped,
        })
    }

    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        context: Option<&EncryptionContext>,
    ) -> Result<PlaintextKey, Error> {
        let bundle: WrappedBundle = from_map(wrapped)?;
        if bundle.iv.len() != WRAP_NONCE_LEN || bundle.tag.len() != WRAP_TAG_LEN {
            return Err(Error::malformed("invalid wrapped key: bad nonce or tag length"));
        }

        let cipher = self.cipher()?;
        let aad = aad_for(context)?;
        let mut key = bundle.key;
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&bundle.iv),
                &aad,
                &mut key,
                Tag::from_slice(&bundle.tag),
            )
            .map_err(|_| Error::Authentication)?;

        Ok(PlaintextKey::new(key))
    }
}

/// Random master key for tests across the crate.
#[cfg(test)]
pub(crate) fn random_master_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalAeadKeyProvider {
        LocalAeadKeyProvider::new(&random_master_key()).unwrap()
    }

    fn context() -> EncryptionContext {
        EncryptionContext::from([("foo", "bar"), ("baz", "boo")])
    }

    #[test]
    fn same_key_same_id() {
        let key = random_master_key();
        let a = LocalAeadKeyProvider::new(&key).unwrap();
        let b = LocalAeadKeyProvider::new(&key).unwrap();
        assert_eq!(a.id(), b.id());
        assert!(a.id().as_str().starts_with("sha256:"));
    }

    #[test]
    fn different_keys_different_ids() {
        assert_ne!(provider().id(), provider().id());
    }

    #[test]
    fn rejects_short_master_key() {
        let err = LocalAeadKeyProvider::new(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyLength { got: 16, .. }));
    }

    #[test]
    fn debug_redacts_master_key() {
        let shown = format!("{:?}", provider());
        assert!(shown.contains("REDACTED"));
    }

    #[tokio::test]
    async fn round_trips_without_context() {
        let kek = provider();
        let data_key = kek.request_data_key(None).await.unwrap();
        assert_eq!(data_key.plaintext.len(), KEY_LEN);
        let recovered = kek.decrypt_data_key(&data_key.wrapped, None).await.unwrap();
        assert_eq!(recovered, data_key.plaintext);
    }

    #[tokio::test]
    async fn round_trips_with_context() {
        let kek = provider();
        let ctx = context();
        let data_key = kek.request_data_key(Some(&ctx)).await.unwrap();
        let recovered = kek
            .decrypt_data_key(&data_key.wrapped, Some(&ctx))
            .await
            .unwrap();
        assert_eq!(recovered, data_key.plaintext);
    }

    #[tokio::test]
    async fn fresh_key_per_request() {
        let kek = provider();
        let a = kek.request_data_key(None).await.unwrap();
        let b = kek.request_data_key(None).await.unwrap();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.wrapped, b.wrapped);
    }

    #[tokio::test]
    async fn mismatched_context_fails_authentication() {
        let kek = provider();
        let data_key = kek.request_data_key(Some(&context())).await.unwrap();
        let other = EncryptionContext::from([("something", "different")]);
        let err = kek
            .decrypt_data_key(&data_key.wrapped, Some(&other))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));

        let err = kek.decrypt_data_key(&data_key.wrapped, None).await.unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    #[tokio::test]
    async fn other_master_key_fails_authentication() {
        let data_key = provider().request_data_key(None).await.unwrap();
        let err = provider()
            .decrypt_data_key(&data_key.wrapped, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    #[tokio::test]
    async fn munged_wrapped_key_fails() {
        let kek = provider();
        let data_key = kek.request_data_key(None).await.unwrap();

        let mut munged = data_key.wrapped.clone();
        let last = munged.len() - 1;
        munged[last] ^= 0x01;
        let err = kek.decrypt_data_key(&munged, None).await.unwrap_err();
        assert!(matches!(err, Error::Authentication));

        let err = kek.decrypt_data_key(b"garbage", None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope(_)));
    }

    #[tokio::test]
    async fn empty_context_is_bound() {
        let kek = provider();
        let empty = EncryptionContext::new();
        let data_key = kek.request_data_key(Some(&empty)).await.unwrap();
        let recovered = kek
            .decrypt_data_key(&data_key.wrapped, Some(&empty))
            .await
            .unwrap();
        assert_eq!(recovered, data_key.plaintext);

        let err = kek.decrypt_data_key(&data_key.wrapped, None).await.unwrap_err();
        assert!(matches!(err, Error::Authentication));

        let data_key = kek.request_data_key(None).await.unwrap();
        let err = kek
            .decrypt_data_key(&data_key.wrapped, Some(&empty))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    // AES-256-GCM bundles built outside this crate: key 00..1f,
    // iv a0..ab, data key 0x42 * 32.
    const FIXED_MASTER: [u8; 32] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
        0x1e, 0x1f,
    ];
    const BUNDLE_FOO_BAR: &str = "83a26976c40ca0a1a2a3a4a5a6a7a8a9aaaba3746167c410c1f35818718cec5766cf84f613fc446fa36b6579c420a45a3e6f078940fd2027c5914538829c32ee1b52d0f5002ede4c64c43de93743";
    const BUNDLE_EMPTY_MAP: &str = "83a26976c40ca0a1a2a3a4a5a6a7a8a9aaaba3746167c41030c2ce55b5771bebcd79b350ef947f47a36b6579c420a45a3e6f078940fd2027c5914538829c32ee1b52d0f5002ede4c64c43de93743";
    const BUNDLE_NO_CONTEXT: &str = "83a26976c40ca0a1a2a3a4a5a6a7a8a9aaaba3746167c4103ffbf972844845eddd347c14b51cd467a36b6579c420a45a3e6f078940fd2027c5914538829c32ee1b52d0f5002ede4c64c43de93743";

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn unwraps_fixed_gcm_bundles() {
        let kek = LocalAeadKeyProvider::new(&FIXED_MASTER).unwrap();
        let expected = PlaintextKey::new(vec![0x42; KEY_LEN]);
        let foo_bar = EncryptionContext::from([("foo", "bar")]);
        let empty = EncryptionContext::new();

        let cases = [
            (BUNDLE_FOO_BAR, Some(&foo_bar)),
            (BUNDLE_EMPTY_MAP, Some(&empty)),
            (BUNDLE_NO_CONTEXT, None),
        ];
        for (bundle, context) in cases {
            let key = kek.decrypt_data_key(&unhex(bundle), context).await.unwrap();
            assert_eq!(key, expected);
        }

        let err = kek
            .decrypt_data_key(&unhex(BUNDLE_FOO_BAR), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    #[tokio::test]
    async fn positional_bundle_is_malformed() {
        let packed = rmp_serde::to_vec(&WrappedBundle {
            iv: vec![0; WRAP_NONCE_LEN],
            tag: vec![0; WRAP_TAG_LEN],
            key: vec![0; KEY_LEN],
        })
        .unwrap();
        let err = provider().decrypt_data_key(&packed, None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope(_)));
    }
}
