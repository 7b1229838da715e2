//! Store contract and the in-memory backend.
//!
//! A [`Store`] persists the last known session data so it survives a
//! restart. The session treats it as a write-through cache of its own
//! state: every transition writes the whole map, startup reads it back.
//!
//! Stores write and read the map as a unit, never key by key. A `persist`
//! followed by a `restore` must observe either the old or the new map in
//! full.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{SessionData, StoreError};

/// Persistence backend for session data.
///
/// The contract is small: whole-map replace, whole-map read,
/// remove. Anything that can keep one JSON object around fits, for example
/// a file, a keychain entry or a row in a local database.
///
/// A backend reports its failures and leaves the decision to the session,
/// which keeps working in memory and emits
/// [`SessionEvent::PersistenceDegraded`](crate::SessionEvent::PersistenceDegraded).
/// A store failure never makes a login fail. At worst the user logs in
/// again after a restart.
///
/// # Example
///
/// ```rust
/// use authkit_session::{MemoryStore, SessionData, Store};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let data: SessionData = [("token", json!("abc"))].into_iter().collect();
///
/// store.persist(&data).await.unwrap();
/// assert_eq!(store.restore().await.unwrap(), Some(data));
///
/// store.clear().await.unwrap();
/// assert_eq!(store.restore().await.unwrap(), None);
/// # }
/// ```
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Replaces the persisted map with `data`.
    async fn persist(&self, data: &SessionData) -> Result<(), StoreError>;

    /// Reads the persisted map. `Ok(None)` means nothing was persisted.
    async fn restore(&self) -> Result<Option<SessionData>, StoreError>;

    /// Removes the persisted map.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Ephemeral store. Data lives as long as the store instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<SessionData>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        *self.data.lock().await = Some(data.clone());
        Ok(())
    }

    async fn restore(&self) -> Result<Option<SessionData>, StoreError> {
        Ok(self.data.lock().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.data.lock().await.take();
        Ok(())
    }
}
