//! Versioned envelope wire format.
//!
//! # Token format
//!
//! ```text
//! token := version_char || base64(msgpack_map)
//! v1 map: "v" -> nonce, "t" -> tag, "k" -> wrapped key, "p" -> ciphertext
//! v0 map: "v" -> nonce, "t" -> tag, "key" -> wrapped key, "p" -> ciphertext  (no version char)
//! ```
//!
//! ASCII digits are reserved as version characters. The version is checked
//! before anything else is parsed. Map values must be MessagePack `bin`;
//! unknown map keys are ignored so later versions can add fields.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::{NONCE_LEN, TAG_LEN};
use crate::error::Error;

/// Envelope layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Unversioned layout written by older releases.
    Legacy,
    /// Current layout.
    V1,
}

impl Version {
    /// Version written by [`Envelope::encode`] for new data.
    pub const CURRENT: Version = Version::V1;

    /// Leading character of a token, `None` for the unprefixed legacy layout.
    pub fn prefix(self) -> Option<char> {
        match self {
            Version::Legacy => None,
            Version::V1 => Some('1'),
        }
    }

    /// Numeric version, `0` for the legacy layout.
    pub fn number(self) -> u8 {
        match self {
            Version::Legacy => 0,
            Version::V1 => 1,
        }
    }
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: Version,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    /// Data key as wrapped by the key-encrypting-key provider.
    pub wrapped_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PackedV1 {
    #[serde(rename = "v", with = "bin")]
    nonce: Vec<u8>,
    #[serde(rename = "t", with = "bin")]
    tag: Vec<u8>,
    #[serde(rename = "k", with = "bin")]
    wrapped_key: Vec<u8>,
    #[serde(rename = "p", with = "bin")]
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PackedLegacy {
    #[serde(rename = "v", with = "bin")]
    nonce: Vec<u8>,
    #[serde(rename = "t", with = "bin")]
    tag: Vec<u8>,
    #[serde(rename = "key", with = "bin")]
    wrapped_key: Vec<u8>,
    #[serde(rename = "p", with = "bin")]
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode to a text token in this envelope's layout.
    pub fn encode(&self) -> Result<String, Error> {
        let nonce = self.nonce.to_vec();
        let tag = self.tag.to_vec();
        let wrapped_key = self.wrapped_key.clone();
        let ciphertext = self.ciphertext.clone();
        let packed = match self.version {
            Version::V1 => rmp_serde::to_vec_named(&PackedV1 {
                nonce,
                tag,
                wrapped_key,
                ciphertext,
            }),
            Version::Legacy => rmp_serde::to_vec_named(&PackedLegacy {
                nonce,
                tag,
                wrapped_key,
                ciphertext,
            }),
        }
        .map_err(|e| Error::malformed(format!("failed to pack envelope: {e}")))?;

        let mut token = String::with_capacity(1 + packed.len().div_ceil(3) * 4);
        if let Some(prefix) = self.version.prefix() {
            token.push(prefix);
        }
        STANDARD.encode_string(&packed, &mut token);
        Ok(token)
    }

    /// Decode a token, accepting only the current layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] for any leading character other
    /// than `1`, and [`Error::MalformedEnvelope`] for bad base64, bad
    /// MessagePack, missing fields or wrong nonce/tag lengths.
    pub fn decode(token: &str) -> Result<Self, Error> {
        Self::decode_with(token, false)
    }

    /// Decode a token, optionally accepting the unprefixed legacy layout.
    ///
    /// With `accept_legacy`, a token whose first character is not an ASCII
    /// digit is read as version 0. Digits other than `1` are rejected either way.
    pub fn decode_with(token: &str, accept_legacy: bool) -> Result<Self, Error> {
        let first = token
            .chars()
            .next()
            .ok_or_else(|| Error::malformed("empty token"))?;

        match first {
            '1' => {
                let p: PackedV1 = unpack(&token[1..])?;
                Self::from_parts(Version::V1, p.nonce, p.tag, p.wrapped_key, p.ciphertext)
            }
            c if accept_legacy && !c.is_ascii_digit() => {
                let p: PackedLegacy = unpack(token)?;
                Self::from_parts(Version::Legacy, p.nonce, p.tag, p.wrapped_key, p.ciphertext)
            }
            c => Err(Error::UnsupportedVersion(c)),
        }
    }

    fn from_parts(
        version: Version,
        nonce: Vec<u8>,
        tag: Vec<u8>,
        wrapped_key: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<Self, Error> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|v: Vec<u8>| Error::malformed(format!("nonce is {} bytes", v.len())))?;
        let tag: [u8; TAG_LEN] = tag
            .try_into()
            .map_err(|v: Vec<u8>| Error::malformed(format!("tag is {} bytes", v.len())))?;
        if wrapped_key.is_empty() {
            return Err(Error::malformed("wrapped key is empty"));
        }
        Ok(Self {
            version,
            nonce,
            tag,
            wrapped_key,
            ciphertext,
        })
    }
}

fn unpack<T: serde::de::DeserializeOwned>(encoded: &str) -> Result<T, Error> {
    let packed = STANDARD
        .decode(encoded)
        .map_err(|e| Error::malformed(format!("invalid base64: {e}")))?;
    from_map(&packed)
}

/// Deserialize a MessagePack map that fills `packed` exactly.
///
/// Positional (array) encodings and trailing bytes are rejected.
pub(crate) fn from_map<T: serde::de::DeserializeOwned>(packed: &[u8]) -> Result<T, Error> {
    match packed.first() {
        Some(0x80..=0x8f | 0xde | 0xdf) => {}
        _ => return Err(Error::malformed("expected a map")),
    }
    let mut reader = Cursor::new(packed);
    let value = rmp_serde::from_read(&mut reader)
        .map_err(|e| Error::malformed(format!("invalid map: {e}")))?;
    if reader.position() != packed.len() as u64 {
        return Err(Error::malformed("trailing bytes after map"));
    }
    Ok(value)
}

/// Serde adapter that writes MessagePack `bin` and accepts only `bin` back.
pub(crate) mod bin {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BinVisitor)
    }

    struct BinVisitor;

    impl<'de> de::Visitor<'de> for BinVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a binary value")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }
    }
}
