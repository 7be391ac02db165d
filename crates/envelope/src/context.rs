//! [`EncryptionContext`]: authenticated, unencrypted key/value metadata.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// String-to-string map bound into the key-wrapping step as associated data.
///
/// Backed by a `BTreeMap` so the serialized form is independent of insertion
/// order. An empty context is still a context for local key wrapping; KMS
/// requests omit it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionContext(BTreeMap<String, String>);

impl EncryptionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy into the map type the KMS SDK expects.
    pub fn to_hash_map(&self) -> HashMap<String, String> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// MessagePack encoding of the sorted map, used as AEAD associated data.
    pub(crate) fn to_aad(&self) -> Result<Vec<u8>, Error> {
        rmp_serde::to_vec(&self.0)
            .map_err(|e| Error::malformed(format!("unencodable encryption context: {e}")))
    }
}

/// Collapses an empty context into `None`, for services that treat the two alike.
pub(crate) fn effective(context: Option<&EncryptionContext>) -> Option<&EncryptionContext> {
    context.filter(|c| !c.is_empty())
}

/// Associated data for `context`; empty only when there is no context. An
/// empty context still packs to a zero-entry map.
pub(crate) fn aad_for(context: Option<&EncryptionContext>) -> Result<Vec<u8>, Error> {
    match context {
        Some(ctx) => ctx.to_aad(),
        None => Ok(Vec::new()),
    }
}

impl From<BTreeMap<String, String>> for EncryptionContext {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for EncryptionContext {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EncryptionContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for EncryptionContext {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
