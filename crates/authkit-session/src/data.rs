//! Session data and snapshots.
//!
//! [`SessionData`] is the opaque key/value map an authenticator hands back
//! (tokens, expiry, user id, ...). The session never interprets it.
//!
//! [`SessionSnapshot`] is what everybody outside the session sees: an
//! immutable copy of the data plus the name of the authenticator that owns
//! it. Authorizers and the request interceptor read snapshots; only the
//! [`Session`](crate::Session) produces new ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// SessionData
// ---------------------------------------------------------------------------

/// A flat map from string keys to JSON values.
///
/// Serializes as a plain JSON object, which is also the layout stores
/// persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(Map<String, Value>);

impl SessionData {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value stored under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Merges `other` into `self`. Keys present in both take `other`'s value.
    pub fn merge(&mut self, other: SessionData) {
        self.0.extend(other.0);
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the stored entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Consumes the data, returning the underlying JSON map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SessionData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// The session as it was at one instant.
///
/// Cloning is cheap enough for per-request use: the interceptor takes one
/// snapshot per outgoing request so the authorizer sees a consistent view
/// even if an `authenticate` settles in the middle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Data produced by the current authenticator.
    pub data: SessionData,

    /// Registry name of the authenticator that owns `data`.
    pub authenticator: Option<String>,
}

impl SessionSnapshot {
    /// A snapshot is authenticated iff it carries data AND an authenticator.
    pub fn is_authenticated(&self) -> bool {
        !self.data.is_empty() && self.authenticator.is_some()
    }

    /// Shorthand for `self.data.get(key)`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
