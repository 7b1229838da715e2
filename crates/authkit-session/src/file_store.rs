//! Durable store backed by a JSON document on disk.
//!
//! The document is a JSON object that may hold unrelated top-level keys
//! (the file plays the role browser local storage plays for a web app).
//! Session data lives under one namespace key:
//!
//! ```json
//! {
//!   "authkit:session": { "authenticator": "oauth2", "access_token": "..." },
//!   "unrelated": 42
//! }
//! ```
//!
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target. Rename is atomic on the same filesystem, so a
//! concurrent `restore` sees either the old document or the new one.
//!
//! A document that does not parse (hand-edited, truncated by another
//! program) is reported by `restore` as an error. `persist` and `clear`
//! replace it with a fresh document, since nothing in it can be kept;
//! otherwise one bad file would disable persistence for good.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};

use crate::{SessionData, Store, StoreError};

/// Default namespace key inside the document.
pub const DEFAULT_NAMESPACE: &str = "authkit:session";

/// A [`Store`] that persists to a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    namespace: String,
}

impl FileStore {
    /// Creates a store for `path` using [`DEFAULT_NAMESPACE`].
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Overrides the namespace key.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Namespace key the session data is stored under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reads the whole document. A missing file is an empty document.
    async fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Corrupt(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Reads the document as the starting point of a write.
    ///
    /// An unreadable document becomes an empty one. The flag is `true` when
    /// that happened, so the caller writes even if it changes nothing else.
    async fn read_document_for_write(
        &self,
    ) -> Result<(Map<String, Value>, bool), StoreError> {
        match self.read_document().await {
            Ok(document) => Ok((document, false)),
            Err(e) if e.is_corrupt() => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "replacing unreadable session document"
                );
                Ok((Map::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Atomically replaces the document.
    async fn write_document(
        &self,
        document: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Sibling temp file, unique per write so overlapping writers never
    /// share one.
    fn temp_path(&self) -> PathBuf {
        let suffix: u64 = rand::rng().random();
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());
        self.path
            .with_file_name(format!(".{file_name}.{suffix:016x}.tmp"))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        let (mut document, _) = self.read_document_for_write().await?;
        document.insert(self.namespace.clone(), serde_json::to_value(data)?);
        self.write_document(&document).await?;
        tracing::trace!(path = %self.path.display(), keys = data.len(), "session persisted");
        Ok(())
    }

    async fn restore(&self) -> Result<Option<SessionData>, StoreError> {
        let document = self.read_document().await?;
        match document.get(&self.namespace) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(SessionData::from(map.clone()))),
            Some(other) => Err(StoreError::Corrupt(format!(
                "namespace {:?} holds {}, expected an object",
                self.namespace,
                json_kind(other)
            ))),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let (mut document, reset) = self.read_document_for_write().await?;
        if document.remove(&self.namespace).is_some() || reset {
            self.write_document(&document).await?;
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
