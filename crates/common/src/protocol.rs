//! Request and response bodies of the envelope HTTP API.
//!
//! All bodies are JSON. A `null` or missing `value` is passed through
//! untouched, as is an empty string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Encryption context as carried on the wire.
pub type Context = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Encrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Plaintext to encrypt.
    #[serde(default)]
    pub value: Option<String>,
    /// Optional encryption context bound to the token.
    #[serde(default)]
    pub context: Option<Context>,
}

/// Successful response body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Envelope token, or the pass-through input.
    pub value: Option<String>,
}

// ---------------------------------------------------------------------------
// Decrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Envelope token to decrypt.
    #[serde(default)]
    pub value: Option<String>,
    /// The context the token was encrypted with, if any.
    #[serde(default)]
    pub context: Option<Context>,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Recovered plaintext, or the pass-through input.
    pub value: Option<String>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status, always `"ok"` once the server is listening.
    pub status: String,
    /// Identity of the key-encrypting key in use.
    pub kek_id: String,
}
