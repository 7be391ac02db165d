//! Shared application state injected into every Axum handler.

use envelope::Encryptor;

/// Application state shared across all request handlers.
///
/// Cloned per request; the encryptor shares its provider behind an `Arc`.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Engine configured with the service's key-encrypting key.
    pub encryptor: Encryptor,
}

impl AppState {
    pub fn new(encryptor: Encryptor) -> Self {
        Self { encryptor }
    }
}
