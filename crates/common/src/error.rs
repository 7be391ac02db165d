//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::AuthenticationFailed`] → 422
/// - [`ServiceError::Provider`] → 502
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The token is malformed or carries an unknown version, or the plaintext
    /// is not valid UTF-8.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The token did not authenticate under the supplied context.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The key management service rejected or failed the call.
    #[error("key provider error: {0}")]
    Provider(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::AuthenticationFailed => 422,
            ServiceError::Provider(_) => 502,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::AuthenticationFailed => "authentication_failed",
            ServiceError::Provider(_) => "provider_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
