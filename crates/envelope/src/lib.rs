//! Field-level envelope encryption.
//!
//! Every value is encrypted under a fresh 256-bit data key with AES-256-GCM.
//! The data key is wrapped by a [`KekProvider`] (a local master key or a
//! remote KMS) and the wrapped key travels with the ciphertext in a single
//! versioned token: a version character followed by base64 of a MessagePack
//! map.
//!
//! An optional [`EncryptionContext`] is bound to the wrapped key as
//! associated data; decrypting with a different context fails authentication.

pub mod attribute;
pub mod codec;
pub mod context;
pub mod crypto;
pub mod encryptor;
pub mod error;
pub mod kek;

pub use attribute::{AttributeBuilder, EncryptedAttribute};
pub use codec::{Envelope, Version};
pub use context::EncryptionContext;
pub use encryptor::Encryptor;
pub use error::{Error, ErrorKind, ProviderError};
pub use kek::{
    DataKey, KekId, KekProvider, KmsClient, LocalAeadKeyProvider, PlaintextKey,
    RemoteKmsKeyProvider,
};
