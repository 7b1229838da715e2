//! The session state machine.
//!
//! ```text
//!                  authenticate() / restore() succeeds
//!   Unauthenticated ───────────────────────────────────→ Authenticated
//!         ↑                                                   │
//!         └──────────────────── invalidate() ─────────────────┘
//! ```
//!
//! There is no "authenticating" state. An authentication attempt in flight
//! either settles into a transition or changes nothing.
//!
//! # Ordering
//!
//! Every mutating operation holds `op_lock` (a FIFO `tokio::sync::Mutex`)
//! for its whole duration, so two overlapping calls never interleave their
//! writes to the data or the store.
//!
//! On top of that, `generation` is bumped whenever an `authenticate` or
//! `invalidate` is *issued*. An `authenticate`/`restore` compares the
//! generation after its authenticator call settles with the one it started
//! with; if something newer was issued meanwhile its result is discarded.
//! This is what makes `authenticate(A); authenticate(B)` end in B's state
//! even when B was issued before A resolved.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};

use crate::{
    AUTHENTICATOR_KEY, AuthenticatorRegistry, SessionData, SessionError,
    SessionEvent, SessionSnapshot, Store,
};

/// Capacity of the event channel. Slow subscribers lag rather than block
/// the session.
const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The two states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

impl SessionState {
    fn of(snapshot: &SessionSnapshot) -> Self {
        if snapshot.is_authenticated() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authentication state of one application instance.
///
/// Created once at setup and shared as `Arc<Session>`. Only the methods on
/// this type change the session data; everybody else reads snapshots.
///
/// ## Who talks to the session
///
/// ```text
///  login form ── authenticate() ──┐
///  app start ──── restore() ──────┤            ┌─→ Store (persist/clear)
///  logout button ─ invalidate() ──┼─→ Session ─┼─→ watch: SessionSnapshot
///  token refresh ─ update_data() ─┘            └─→ broadcast: SessionEvent
///                                                   │
///                      request interceptor, navigation, UI
/// ```
///
/// Readers never wait on the operations: [`snapshot`](Self::snapshot),
/// [`get`](Self::get) and [`is_authenticated`](Self::is_authenticated)
/// read the latest published snapshot even while an `authenticate` is
/// stuck on a slow token endpoint.
pub struct Session {
    /// The current snapshot.
    ///
    /// A `watch` channel keeps exactly one value, the latest. Readers call
    /// `borrow()` without awaiting anything, and subscribers from
    /// [`watch`](Self::watch) wake up when it changes. Data and
    /// authenticator name live in one value so nobody can observe one
    /// updated without the other.
    state: watch::Sender<SessionSnapshot>,

    /// Transition notifications (authenticated, invalidated, ...).
    ///
    /// Unlike `state`, every event is delivered to every subscriber, in
    /// order, up to `EVENT_CAPACITY` behind.
    events: broadcast::Sender<SessionEvent>,

    /// Where the data goes so it survives a restart.
    store: Arc<dyn Store>,

    /// Authenticators by name.
    authenticators: AuthenticatorRegistry,

    /// Serializes authenticate/invalidate/restore/update_data.
    ///
    /// Tokio's mutex hands the lock out in request order, so operations run
    /// in the order they were called even though each one awaits an
    /// authenticator or the store while holding it.
    op_lock: Mutex<()>,

    /// Bumped when an authenticate or invalidate is issued.
    ///
    /// The lock alone keeps writes apart but cannot tell a finished
    /// `authenticate` that the user has since moved on. Comparing this
    /// counter before and after the authenticator call can.
    generation: AtomicU64,
}

impl Session {
    /// Creates an unauthenticated session.
    ///
    /// Call [`restore`](Self::restore) afterwards to pick up a persisted
    /// session.
    pub fn new(store: Arc<dyn Store>, authenticators: AuthenticatorRegistry) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            events,
            store,
            authenticators,
            op_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    // -- Accessors ---------------------------------------------------------

    /// Returns `true` iff the session holds data from a known authenticator.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        SessionState::of(&self.state.borrow())
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().data.get(key).cloned()
    }

    /// Returns a consistent copy of the whole session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Name of the authenticator that owns the current data.
    pub fn authenticator_name(&self) -> Option<String> {
        self.state.borrow().authenticator.clone()
    }

    /// Observes snapshot changes.
    ///
    /// `watch::Receiver::changed` resolves after every transition; use
    /// `borrow().is_authenticated()` for a reactive `is_authenticated`.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Receives [`SessionEvent`]s emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The registry this session resolves authenticators from.
    pub fn authenticators(&self) -> &AuthenticatorRegistry {
        &self.authenticators
    }

    // -- Operations --------------------------------------------------------

    /// Restores a persisted session.
    ///
    /// Reads the store, finds the authenticator recorded with the data and
    /// asks it to validate (and possibly refresh) the data. Never fails:
    /// missing, corrupt, unknown or rejected data all mean "no session".
    /// Rejected data is removed from the store.
    pub async fn restore(&self) -> SessionState {
        let ticket = self.generation.load(Ordering::SeqCst);
        let _guard = self.op_lock.lock().await;

        let mut data = match self.store.restore().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!("no persisted session");
                return self.state();
            }
            Err(e) if e.is_corrupt() => {
                tracing::warn!(error = %e, "persisted session is unreadable, discarding");
                self.discard_persisted().await;
                return self.state();
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted session");
                return self.state();
            }
        };

        let name = match data.remove(AUTHENTICATOR_KEY) {
            Some(Value::String(name)) => name,
            _ => {
                tracing::debug!("persisted session has no authenticator, discarding");
                self.discard_persisted().await;
                return self.state();
            }
        };

        let Some(authenticator) = self.authenticators.get(&name) else {
            tracing::warn!(authenticator = %name, "persisted session names an unknown authenticator, discarding");
            self.discard_persisted().await;
            return self.state();
        };

        if data.is_empty() {
            self.discard_persisted().await;
            return self.state();
        }

        let result = authenticator.restore(&data).await;

        if self.is_stale(ticket) {
            tracing::debug!(authenticator = %name, "restore superseded, discarding result");
            return self.state();
        }

        let restored = match result.map(strip_reserved) {
            Ok(restored) if !restored.is_empty() => restored,
            Ok(_) => {
                tracing::info!(authenticator = %name, "persisted session restored to empty data, discarding");
                self.discard_persisted().await;
                return self.state();
            }
            Err(e) => {
                tracing::info!(authenticator = %name, error = %e, "persisted session rejected");
                self.discard_persisted().await;
                return self.state();
            }
        };

        self.state.send_replace(SessionSnapshot {
            data: restored,
            authenticator: Some(name.clone()),
        });
        self.persist_current().await;

        tracing::info!(authenticator = %name, "session restored");
        self.emit(SessionEvent::Restored { authenticator: name });
        SessionState::Authenticated
    }

    /// Authenticates with the authenticator registered as `authenticator`.
    ///
    /// On success the returned data is merged into the session data, the
    /// authenticator becomes the current one and the result is persisted.
    ///
    /// # Errors
    /// - [`SessionError::UnknownAuthenticator`]: nothing registered under
    ///   that name
    /// - whatever the authenticator rejected with (normally
    ///   [`SessionError::AuthenticationFailed`]); the session is unchanged
    ///   and the store is not written
    /// - [`SessionError::Superseded`]: a later `authenticate` or
    ///   `invalidate` was issued before this one settled
    pub async fn authenticate(
        &self,
        authenticator: &str,
        credentials: &Value,
    ) -> Result<(), SessionError> {
        let handler = self.authenticators.resolve(authenticator)?;
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.op_lock.lock().await;

        if self.is_stale(ticket) {
            tracing::debug!(authenticator, "authenticate superseded before it started");
            return Err(SessionError::Superseded);
        }

        let result = handler.authenticate(credentials).await;

        if self.is_stale(ticket) {
            tracing::debug!(authenticator, "authenticate superseded, discarding result");
            return Err(SessionError::Superseded);
        }

        let data = match result.map(strip_reserved) {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                let err = SessionError::AuthenticationFailed(
                    "authenticator returned no session data".into(),
                );
                self.authentication_failed(authenticator, &err);
                return Err(err);
            }
            Err(e) => {
                self.authentication_failed(authenticator, &e);
                return Err(e);
            }
        };

        self.state.send_modify(|snapshot| {
            snapshot.data.merge(data);
            snapshot.authenticator = Some(authenticator.to_string());
        });
        self.persist_current().await;

        tracing::info!(authenticator, "session authenticated");
        self.emit(SessionEvent::Authenticated {
            authenticator: authenticator.to_string(),
        });
        Ok(())
    }

    /// Terminates the session.
    ///
    /// If authenticated, the current authenticator gets a chance to clean
    /// up remotely. Its failure is logged and reported as
    /// [`SessionEvent::InvalidationFailed`], but local state and the store
    /// are cleared regardless. Any `authenticate` still in flight is
    /// superseded.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _guard = self.op_lock.lock().await;

        let snapshot = self.snapshot();
        let was_authenticated = snapshot.is_authenticated();

        if was_authenticated {
            if let Some(name) = snapshot.authenticator.as_deref() {
                match self.authenticators.get(name) {
                    Some(authenticator) => {
                        if let Err(e) = authenticator.invalidate(&snapshot.data).await {
                            tracing::warn!(authenticator = %name, error = %e, "remote invalidation failed, clearing local session anyway");
                            self.emit(SessionEvent::InvalidationFailed {
                                reason: e.to_string(),
                            });
                        }
                    }
                    None => {
                        tracing::warn!(authenticator = %name, "current authenticator is not registered, skipping remote invalidation");
                    }
                }
            }
        }

        self.state.send_replace(SessionSnapshot::default());

        if let Err(e) = self.store.clear().await {
            self.persistence_degraded(&e);
        }

        if was_authenticated {
            tracing::info!("session invalidated");
            self.emit(SessionEvent::Invalidated);
        }
    }

    /// Merges `partial` into the data of an authenticated session.
    ///
    /// Used by authenticators that refresh tokens in the background. The
    /// state does not change.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] if the session is not
    /// authenticated.
    pub async fn update_data(&self, partial: SessionData) -> Result<(), SessionError> {
        let _guard = self.op_lock.lock().await;

        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let partial = strip_reserved(partial);
        self.state.send_modify(|snapshot| snapshot.data.merge(partial));
        self.persist_current().await;

        tracing::debug!("session data updated");
        self.emit(SessionEvent::DataUpdated);
        Ok(())
    }

    // -- Internals ---------------------------------------------------------

    fn is_stale(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != ticket
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn authentication_failed(&self, authenticator: &str, error: &SessionError) {
        tracing::info!(authenticator, error = %error, "authentication failed");
        self.emit(SessionEvent::AuthenticationFailed {
            reason: error.to_string(),
        });
    }

    fn persistence_degraded(&self, error: &crate::StoreError) {
        tracing::warn!(error = %error, "session store failed, session will not survive a restart");
        self.emit(SessionEvent::PersistenceDegraded {
            reason: error.to_string(),
        });
    }

    /// Writes the current snapshot in the persisted layout: the data keys
    /// plus the authenticator name under [`AUTHENTICATOR_KEY`].
    async fn persist_current(&self) {
        let persisted = {
            let snapshot = self.state.borrow();
            let mut persisted = snapshot.data.clone();
            if let Some(name) = &snapshot.authenticator {
                persisted.insert(AUTHENTICATOR_KEY, name.clone());
            }
            persisted
        };
        if let Err(e) = self.store.persist(&persisted).await {
            self.persistence_degraded(&e);
        }
    }

    /// Drops rejected persisted data, unless a live session owns the store.
    async fn discard_persisted(&self) {
        if self.is_authenticated() {
            return;
        }
        if let Err(e) = self.store.clear().await {
            self.persistence_degraded(&e);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.state.borrow();
        f.debug_struct("Session")
            .field("state", &SessionState::of(&snapshot))
            .field("authenticator", &snapshot.authenticator)
            .field("authenticators", &self.authenticators)
            .finish_non_exhaustive()
    }
}

/// Removes the reserved persisted-layout key from authenticator output.
fn strip_reserved(mut data: SessionData) -> SessionData {
    if data.remove(AUTHENTICATOR_KEY).is_some() {
        tracing::warn!(key = AUTHENTICATOR_KEY, "dropping reserved key from session data");
    }
    data
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the state machine. Ordering and persistence scenarios
    //! live in `tests/session_lifecycle.rs`.

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{Authenticator, MemoryStore};

    /// Accepts `{"password": "secret"}` and returns `{"token": <user>}`.
    struct PasswordAuth;

    #[async_trait]
    impl Authenticator for PasswordAuth {
        async fn authenticate(
            &self,
            credentials: &Value,
        ) -> Result<SessionData, SessionError> {
            if credentials["password"] != "secret" {
                return Err(SessionError::AuthenticationFailed(
                    "invalid credentials".into(),
                ));
            }
            Ok([("token", credentials["user"].clone())].into_iter().collect())
        }

        async fn restore(
            &self,
            data: &SessionData,
        ) -> Result<SessionData, SessionError> {
            Ok(data.clone())
        }
    }

    fn session() -> Session {
        Session::new(
            Arc::new(MemoryStore::new()),
            AuthenticatorRegistry::new().with("password", PasswordAuth),
        )
    }

    fn creds(user: &str, password: &str) -> Value {
        json!({ "user": user, "password": password })
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = session();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(!session.is_authenticated());
        assert!(session.authenticator_name().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_valid_credentials_becomes_authenticated() {
        let session = session();

        session
            .authenticate("password", &creds("alice", "secret"))
            .await
            .expect("should authenticate");

        assert!(session.is_authenticated());
        assert_eq!(session.get("token"), Some(json!("alice")));
        assert_eq!(session.authenticator_name().as_deref(), Some("password"));
    }

    #[tokio::test]
    async fn test_authenticate_rejected_keeps_state_and_returns_reason() {
        let session = session();

        let result = session.authenticate("password", &creds("a", "b")).await;

        assert!(
            matches!(result, Err(SessionError::AuthenticationFailed(ref r)) if r == "invalid credentials")
        );
        assert!(!session.is_authenticated());
        assert!(session.snapshot().data.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_unknown_authenticator_returns_error() {
        let session = session();

        let result = session.authenticate("oauth2", &json!({})).await;

        assert!(matches!(result, Err(SessionError::UnknownAuthenticator(_))));
    }

    #[tokio::test]
    async fn test_authenticate_twice_merges_data() {
        let session = session();
        session
            .authenticate("password", &creds("alice", "secret"))
            .await
            .unwrap();
        session.update_data([("scope", json!("read"))].into_iter().collect()).await.unwrap();

        session
            .authenticate("password", &creds("bob", "secret"))
            .await
            .unwrap();

        assert_eq!(session.get("token"), Some(json!("bob")));
        assert_eq!(session.get("scope"), Some(json!("read")));
    }

    #[tokio::test]
    async fn test_invalidate_clears_data_and_authenticator() {
        let session = session();
        session
            .authenticate("password", &creds("alice", "secret"))
            .await
            .unwrap();

        session.invalidate().await;

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.snapshot().data.is_empty());
        assert!(session.authenticator_name().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_unauthenticated_emits_nothing() {
        let session = session();
        let mut events = session.subscribe();

        session.invalidate().await;

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_data_unauthenticated_returns_error() {
        let session = session();

        let result = session
            .update_data([("token", json!("x"))].into_iter().collect())
            .await;

        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
        assert!(session.get("token").is_none());
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let session = session();
        let mut events = session.subscribe();

        let _ = session.authenticate("password", &creds("a", "wrong")).await;
        session
            .authenticate("password", &creds("a", "secret"))
            .await
            .unwrap();
        session.invalidate().await;

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AuthenticationFailed {
                reason: "authentication failed: invalid credentials".into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Authenticated {
                authenticator: "password".into()
            }
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Invalidated);
    }

    #[tokio::test]
    async fn test_watch_observes_authentication() {
        let session = session();
        let mut watcher = session.watch();
        assert!(!watcher.borrow().is_authenticated());

        session
            .authenticate("password", &creds("alice", "secret"))
            .await
            .unwrap();

        assert!(watcher.has_changed().unwrap());
        assert!(watcher.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_reserved_key_is_stripped_from_data() {
        let session = session();
        session
            .authenticate("password", &creds("alice", "secret"))
            .await
            .unwrap();

        session
            .update_data(
                [(AUTHENTICATOR_KEY, json!("evil")), ("scope", json!("x"))]
                    .into_iter()
                    .collect(),
            )
            .await
            .unwrap();

        assert!(session.get(AUTHENTICATOR_KEY).is_none());
        assert_eq!(session.authenticator_name().as_deref(), Some("password"));
    }
}
