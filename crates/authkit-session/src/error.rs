//! Error types for the session layer.

/// Errors that can occur during session management.
///
/// Authenticators report their failures through the first three variants;
/// the session decides which of them reach the caller. Only
/// [`AuthenticationFailed`](Self::AuthenticationFailed) is ever surfaced
/// from [`Session::authenticate`](crate::Session::authenticate) unchanged.
/// Restore and invalidation failures are absorbed and logged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The authenticator rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Persisted data was invalid or expired.
    #[error("restore failed: {0}")]
    RestoreFailed(String),

    /// The authenticator could not perform its remote cleanup
    /// (e.g. revoking a token).
    #[error("invalidation failed: {0}")]
    InvalidationFailed(String),

    /// No authenticator is registered under this name.
    #[error("unknown authenticator: {0}")]
    UnknownAuthenticator(String),

    /// The operation requires an authenticated session.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// A later `authenticate` or `invalidate` was issued while this
    /// operation was in flight, so its result was discarded.
    #[error("operation superseded by a later session operation")]
    Superseded,
}

/// Errors raised by [`Store`](crate::Store) backends.
///
/// These never reach a [`Session`](crate::Session) caller. The session
/// keeps its in-memory state and reports the failure as
/// [`SessionEvent::PersistenceDegraded`](crate::SessionEvent::PersistenceDegraded).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted document could not be (de)serialized.
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted document has an unexpected shape.
    #[error("corrupt store contents: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` if the persisted contents are unreadable, as opposed
    /// to the medium being unavailable.
    ///
    /// Unreadable contents will not get better on a retry, so backends
    /// overwrite them on the next write.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Corrupt(_))
    }
}
