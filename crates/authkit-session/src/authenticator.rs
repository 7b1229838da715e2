//! Authenticator contract and registry.
//!
//! authkit never checks credentials itself. An [`Authenticator`] does the
//! actual handshake (submitting a password to a token endpoint, validating
//! a persisted token, ...) and hands the resulting [`SessionData`] to the
//! session.
//!
//! Authenticators are registered by name in an [`AuthenticatorRegistry`].
//! The name is persisted alongside the session data so that a restart can
//! find the authenticator able to restore it.
//!
//! # Why a registry?
//!
//! An application often supports more than one way in: a password form,
//! a "sign in with ..." button, a device code flow. Each one is its own
//! [`Authenticator`]. The session does not care which one ran. It only
//! needs to ask the *same* one again on the next start, when the persisted
//! data has to be checked, and on logout, when a token may have to be
//! revoked. A name is the one thing that survives a restart, so that is
//! what the registry is keyed by:
//!
//! ```text
//! authenticate("oauth2", creds) ──→ registry["oauth2"].authenticate()
//!                                          │
//!                              persisted: { "authenticator": "oauth2", ... }
//!                                          │
//! (restart) restore() ──────────→ registry["oauth2"].restore(data)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{SessionData, SessionError};

/// Performs the authentication handshake for a session.
///
/// Three moments in a session's life call into the authenticator:
/// - `authenticate`: the user submitted credentials. Return the data the
///   session should hold (tokens, user id, expiry) or a reason for refusing.
/// - `restore`: the application started and found persisted data. Return
///   the data to keep (possibly refreshed) or refuse if it expired.
/// - `invalidate`: the user logged out. Clean up remotely if needed. The
///   local session is cleared whatever this returns.
///
/// # Trait bounds
///
/// - `Send + Sync`: one authenticator is shared by every task that touches
///   the session, and Tokio may poll those tasks on different threads.
/// - `'static`: it lives in the registry for as long as the session does,
///   so it cannot borrow anything shorter-lived.
///
/// `#[async_trait]` is used instead of a plain `async fn` so the trait
/// stays object safe: the registry stores `Arc<dyn Authenticator>` and
/// picks one at runtime by name.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use authkit_session::{Authenticator, SessionData, SessionError};
/// use serde_json::{json, Value};
///
/// /// Accepts a fixed password. Development only.
/// struct StaticPassword(&'static str);
///
/// #[async_trait]
/// impl Authenticator for StaticPassword {
///     async fn authenticate(
///         &self,
///         credentials: &Value,
///     ) -> Result<SessionData, SessionError> {
///         if credentials["password"] != self.0 {
///             return Err(SessionError::AuthenticationFailed(
///                 "invalid credentials".into(),
///             ));
///         }
///         Ok([("token", json!("dev-token"))].into_iter().collect())
///     }
///
///     async fn restore(
///         &self,
///         data: &SessionData,
///     ) -> Result<SessionData, SessionError> {
///         Ok(data.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Exchanges credentials for session data.
    ///
    /// # Errors
    /// [`SessionError::AuthenticationFailed`] when the credentials are
    /// rejected. The error reaches the caller of
    /// [`Session::authenticate`](crate::Session::authenticate) unchanged.
    async fn authenticate(
        &self,
        credentials: &Value,
    ) -> Result<SessionData, SessionError>;

    /// Validates previously persisted data, possibly refreshing it.
    ///
    /// # Errors
    /// [`SessionError::RestoreFailed`] when the data is invalid or expired.
    /// The session treats this as "no prior session".
    async fn restore(
        &self,
        data: &SessionData,
    ) -> Result<SessionData, SessionError>;

    /// Performs remote cleanup for a session that is being terminated.
    ///
    /// Best effort: the session clears its local state whether or not
    /// this succeeds.
    async fn invalidate(&self, _data: &SessionData) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Named authenticators available to a session.
#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
}

impl AuthenticatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticator under `name`, replacing any previous one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        authenticator: impl Authenticator,
    ) -> &mut Self {
        self.register_arc(name, Arc::new(authenticator))
    }

    /// Registers an already shared authenticator.
    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
    ) -> &mut Self {
        let name = name.into();
        if self.authenticators.insert(name.clone(), authenticator).is_some() {
            tracing::debug!(authenticator = %name, "replaced registered authenticator");
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        name: impl Into<String>,
        authenticator: impl Authenticator,
    ) -> Self {
        self.register(name, authenticator);
        self
    }

    /// Looks up an authenticator by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Authenticator>> {
        self.authenticators.get(name).cloned()
    }

    /// Looks up an authenticator, failing with
    /// [`SessionError::UnknownAuthenticator`].
    pub fn resolve(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Authenticator>, SessionError> {
        self.get(name)
            .ok_or_else(|| SessionError::UnknownAuthenticator(name.to_string()))
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.authenticators.contains_key(name)
    }

    /// Number of registered authenticators.
    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }
}

impl fmt::Debug for AuthenticatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.authenticators.keys().collect();
        names.sort();
        f.debug_struct("AuthenticatorRegistry")
            .field("authenticators", &names)
            .finish()
    }
}
