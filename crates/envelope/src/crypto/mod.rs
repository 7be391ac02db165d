//! AEAD primitives used by the envelope engine.
//!
//! This module is intentionally free of AWS and serialization dependencies.
//! It provides the low-level seal/open operations for payloads encrypted
//! under a one-time data key.

pub mod cipher;

pub use cipher::{KEY_LEN, NONCE_LEN, TAG_LEN};
