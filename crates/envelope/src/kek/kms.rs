//! [`RemoteKmsKeyProvider`]: data keys generated and unwrapped by AWS KMS.
//!
//! The provider is a request/response adapter. It performs no local
//! cryptography: KMS generates the data key, wraps it, and unwraps it. The
//! encryption context is forwarded as the KMS `EncryptionContext` parameter
//! when present and omitted from the request entirely when absent.
//!
//! [`KmsClient`] is the seam between the provider and the SDK so the request
//! shapes can be verified without a network.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_sdk_kms::{operation::decrypt::DecryptError, primitives::Blob, types::DataKeySpec};
use tracing::{debug, info};

use super::{DataKey, KekId, KekProvider, PlaintextKey};
use crate::context::{effective, EncryptionContext};
use crate::error::{Error, ProviderError};

/// Key specification requested from KMS for every data key.
pub const KEY_SPEC: &str = "AES_256";

/// Parameters of a KMS `GenerateDataKey` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateDataKeyRequest {
    pub key_id: String,
    pub key_spec: &'static str,
    /// `None` means the parameter is left out of the request.
    pub encryption_context: Option<HashMap<String, String>>,
}

/// Parameters of a KMS `Decrypt` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    pub ciphertext_blob: Vec<u8>,
    /// `None` means the parameter is left out of the request.
    pub encryption_context: Option<HashMap<String, String>>,
}

/// The subset of the KMS API the provider consumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// `GenerateDataKey`: returns the plaintext key and its ciphertext blob.
    async fn generate_data_key(
        &self,
        request: GenerateDataKeyRequest,
    ) -> Result<DataKey, ProviderError>;

    /// `Decrypt`: returns the plaintext key for a ciphertext blob.
    ///
    /// A blob KMS refuses to unwrap (wrong context, wrong key, altered
    /// bytes) is reported as [`ProviderError::Rejected`].
    async fn decrypt(&self, request: DecryptRequest) -> Result<PlaintextKey, ProviderError>;

    /// `DescribeKey`: returns the canonical ARN for a key id, ARN or alias.
    async fn describe_key(&self, key_id: &str) -> Result<String, ProviderError>;
}

#[async_trait]
impl KmsClient for aws_sdk_kms::Client {
    async fn generate_data_key(
        &self,
        request: GenerateDataKeyRequest,
    ) -> Result<DataKey, ProviderError> {
        const OP: &str = "generate_data_key";
        let out = aws_sdk_kms::Client::generate_data_key(self)
            .key_id(request.key_id)
            .key_spec(DataKeySpec::from(request.key_spec))
            .set_encryption_context(request.encryption_context)
            .send()
            .await
            .map_err(|e| ProviderError::call(OP, e))?;

        let plaintext = out.plaintext().ok_or(ProviderError::MissingField {
            operation: OP,
            field: "plaintext",
        })?;
        let ciphertext_blob = out.ciphertext_blob().ok_or(ProviderError::MissingField {
            operation: OP,
            field: "ciphertext_blob",
        })?;

        Ok(DataKey {
            plaintext: PlaintextKey::new(plaintext.as_ref().to_vec()),
            wrapped: ciphertext_blob.as_ref().to_vec(),
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<PlaintextKey, ProviderError> {
        const OP: &str = "decrypt";
        let out = aws_sdk_kms::Client::decrypt(self)
            .ciphertext_blob(Blob::new(request.ciphertext_blob))
            .set_encryption_context(request.encryption_context)
            .send()
            .await
            .map_err(|e| {
                let rejected = matches!(
                    e.as_service_error(),
                    Some(
                        DecryptError::InvalidCiphertextException(_)
                            | DecryptError::IncorrectKeyException(_)
                    )
                );
                if rejected {
                    ProviderError::rejected(OP, e)
                } else {
                    ProviderError::call(OP, e)
                }
            })?;

        let plaintext = out.plaintext().ok_or(ProviderError::MissingField {
            operation: OP,
            field: "plaintext",
        })?;
        Ok(PlaintextKey::new(plaintext.as_ref().to_vec()))
    }

    async fn describe_key(&self, key_id: &str) -> Result<String, ProviderError> {
        const OP: &str = "describe_key";
        let out = aws_sdk_kms::Client::describe_key(self)
            .key_id(key_id)
            .send()
            .await
            .map_err(|e| ProviderError::call(OP, e))?;

        out.key_metadata()
            .and_then(|m| m.arn())
            .map(str::to_owned)
            .ok_or(ProviderError::MissingField {
                operation: OP,
                field: "key_metadata.arn",
            })
    }
}

/// Key-encrypting-key provider backed by a KMS key.
pub struct RemoteKmsKeyProvider<C = aws_sdk_kms::Client> {
    client: C,
    key_id: String,
    id: KekId,
}

impl<C: KmsClient> RemoteKmsKeyProvider<C> {
    /// Build a provider for `key_id` (a key id, ARN or alias).
    ///
    /// Calls `DescribeKey` once so that the provider id is the canonical key
    /// ARN: aliases of the same key yield equal ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the describe call fails.
    pub async fn new(client: C, key_id: impl Into<String>) -> Result<Self, Error> {
        let key_id = key_id.into();
        let arn = client.describe_key(&key_id).await?;
        info!(key_id = %key_id, kek_id = %arn, "kms key resolved");
        Ok(Self {
            client,
            key_id,
            id: KekId::new(arn),
        })
    }

    /// The key handle requests are made with, as supplied by the caller.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl<C> fmt::Debug for RemoteKmsKeyProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKmsKeyProvider")
            .field("key_id", &self.key_id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

fn kms_context(context: Option<&EncryptionContext>) -> Option<HashMap<String, String>> {
    effective(context).map(EncryptionContext::to_hash_map)
}

#[async_trait]
impl<C: KmsClient> KekProvider for RemoteKmsKeyProvider<C> {
    fn id(&self) -> &KekId {
        &self.id
    }

    async fn request_data_key(
        &self,
        context: Option<&EncryptionContext>,
    ) -> Result<DataKey, Error> {
        let data_key = self
            .client
            .generate_data_key(GenerateDataKeyRequest {
                key_id: self.key_id.clone(),
                key_spec: KEY_SPEC,
                encryption_context: kms_context(context),
            })
            .await?;
        debug!(kek_id = %self.id, "kms data key generated");
        Ok(data_key)
    }

    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        context: Option<&EncryptionContext>,
    ) -> Result<PlaintextKey, Error> {
        let result = self
            .client
            .decrypt(DecryptRequest {
                ciphertext_blob: wrapped.to_vec(),
                encryption_context: kms_context(context),
            })
            .await;
        match result {
            Ok(plaintext) => Ok(plaintext),
            Err(ProviderError::Rejected { .. }) => Err(Error::Authentication),
            Err(e) => Err(e.into()),
        }
    }
}
