//! Notifications emitted by the session.

/// Something happened to the session.
///
/// Broadcast to every [`Session::subscribe`](crate::Session::subscribe)
/// receiver. The application shell typically navigates on
/// [`Authenticated`](Self::Authenticated) and
/// [`Invalidated`](Self::Invalidated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `authenticate` succeeded; the session is now authenticated.
    Authenticated { authenticator: String },

    /// `authenticate` was rejected by the authenticator.
    AuthenticationFailed { reason: String },

    /// `restore` brought back a persisted session.
    Restored { authenticator: String },

    /// `update_data` merged new data into an authenticated session.
    DataUpdated,

    /// The session was terminated.
    Invalidated,

    /// The authenticator's remote cleanup failed. Local state was
    /// cleared anyway.
    InvalidationFailed { reason: String },

    /// The store could not be written or cleared. The in-memory
    /// transition still happened, but it will not survive a restart.
    PersistenceDegraded { reason: String },
}
