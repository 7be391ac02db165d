//! Error types produced by the envelope engine.

use thiserror::Error;

/// Boxed error from an underlying key-management client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of an [`Error`], used by callers that map failures
/// onto their own surface (HTTP status codes, metrics labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Corrupted or foreign token. Not retryable.
    Format,
    /// Tag verification failed at the data or key-unwrapping layer. Not retryable.
    Authentication,
    /// The key-management service call failed.
    Provider,
    /// The engine or a provider was constructed with invalid inputs.
    Configuration,
}

/// Errors produced while encrypting or decrypting an envelope.
#[derive(Debug, Error)]
pub enum Error {
    /// The first character of the token is not a recognised envelope version.
    #[error("unrecognized envelope version {0:?}")]
    UnsupportedVersion(char),

    /// The token (or a wrapped key inside it) is structurally invalid.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// AEAD tag verification failed.
    #[error("authentication failed")]
    Authentication,

    /// The key-encrypting-key provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Key material has the wrong length for the cipher.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Decrypted plaintext was requested as a string but is not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,

    /// An encrypted attribute was built without a key-encrypting-key provider.
    #[error("no key encryption key provider configured")]
    NoProvider,
}

impl Error {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedVersion(_) | Error::MalformedEnvelope(_) | Error::InvalidUtf8 => {
                ErrorKind::Format
            }
            Error::Authentication | Error::Provider(ProviderError::Rejected { .. }) => {
                ErrorKind::Authentication
            }
            Error::Provider(_) => ErrorKind::Provider,
            Error::InvalidKeyLength { .. } | Error::NoProvider => ErrorKind::Configuration,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedEnvelope(msg.into())
    }
}

/// Failure surfaced by a remote key-management service.
///
/// The SDK error is kept as the source so callers can inspect it; the engine
/// never retries.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The service call itself failed (authorization, network, throttling, not found).
    #[error("kms {operation} failed")]
    Call {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The service refused the ciphertext: a different encryption context, a
    /// different key, or an altered blob.
    #[error("kms {operation} rejected the ciphertext")]
    Rejected {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The service answered without a field the provider needs.
    #[error("kms {operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl ProviderError {
    /// Wrap an SDK error for `operation`.
    pub fn call(operation: &'static str, source: impl Into<BoxError>) -> Self {
        ProviderError::Call {
            operation,
            source: source.into(),
        }
    }

    /// Wrap an SDK error that means the ciphertext did not authenticate.
    pub fn rejected(operation: &'static str, source: impl Into<BoxError>) -> Self {
        ProviderError::Rejected {
            operation,
            source: source.into(),
        }
    }
}
