//! AES-256-GCM encryption of a single payload under a one-time data key.
//!
//! **Algorithm choice:** AES-256-GCM with a random 96-bit nonce and a detached
//! 128-bit tag. The data key is used for exactly one encryption, so a random
//! nonce can never repeat under the same key.
//!
//! Associated data is always empty at this layer. The encryption context is
//! bound when the data key is wrapped, not here.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};

use crate::error::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of an AES-GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Output of [`seal`]: the three values stored in an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw authentication tag bytes.
    pub tag: [u8; TAG_LEN],
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`Error::Authentication`] on an internal AEAD error (unreachable
/// with a valid key and nonce).
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Sealed, Error> {
    let cipher = build_cipher(key)?;

    use aes_gcm::aead::rand_core::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
        .map_err(|_| Error::Authentication)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(Sealed {
        nonce,
        tag: tag_bytes,
        ciphertext,
    })
}

/// Decrypt and verify a payload produced by [`seal`].
///
/// Nothing is returned unless the tag verifies.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`Error::Authentication`] on a wrong key or tampered nonce, tag or ciphertext.
pub fn open(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let cipher = build_cipher(key)?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| Error::Authentication)?;
    Ok(buffer)
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, Error> {
    if key.len() != KEY_LEN {
        return Err(Error::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::InvalidKeyLength {
        expected: KEY_LEN,
        got: key.len(),
    })
}
