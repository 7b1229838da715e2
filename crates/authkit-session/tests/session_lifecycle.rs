//! Integration tests for the session lifecycle: persistence, restore,
//! invalidation and ordering of overlapping operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use authkit_session::{
    AUTHENTICATOR_KEY, Authenticator, AuthenticatorRegistry, MemoryStore,
    Session, SessionData, SessionError, SessionEvent, SessionState, Store,
    StoreError,
};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

// =========================================================================
// Mocks
// =========================================================================

/// Store that records every call and can be told to fail.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    persisted: Mutex<Vec<SessionData>>,
    clears: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingStore {
    fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    async fn persist_calls(&self) -> Vec<SessionData> {
        self.persisted.lock().await.clone()
    }

    fn fail_if_asked(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        self.persisted.lock().await.push(data.clone());
        self.fail_if_asked()?;
        self.inner.persist(data).await
    }

    async fn restore(&self) -> Result<Option<SessionData>, StoreError> {
        self.fail_if_asked()?;
        self.inner.restore().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.fail_if_asked()?;
        self.inner.clear().await
    }
}

/// Returns fixed data, or rejects everything.
struct FixedAuth {
    data: Option<SessionData>,
    accept_restore: bool,
    invalidate_fails: bool,
}

impl FixedAuth {
    fn token(token: &str) -> Self {
        Self {
            data: Some([("token", json!(token))].into_iter().collect()),
            accept_restore: true,
            invalidate_fails: false,
        }
    }

    fn rejecting() -> Self {
        Self {
            data: None,
            accept_restore: false,
            invalidate_fails: false,
        }
    }
}

#[async_trait]
impl Authenticator for FixedAuth {
    async fn authenticate(
        &self,
        _credentials: &Value,
    ) -> Result<SessionData, SessionError> {
        self.data
            .clone()
            .ok_or_else(|| SessionError::AuthenticationFailed("rejected".into()))
    }

    async fn restore(
        &self,
        data: &SessionData,
    ) -> Result<SessionData, SessionError> {
        if self.accept_restore {
            Ok(data.clone())
        } else {
            Err(SessionError::RestoreFailed("token expired".into()))
        }
    }

    async fn invalidate(&self, _data: &SessionData) -> Result<(), SessionError> {
        if self.invalidate_fails {
            Err(SessionError::InvalidationFailed("revocation endpoint down".into()))
        } else {
            Ok(())
        }
    }
}

/// Blocks inside `authenticate` until released.
struct GatedAuth {
    token: &'static str,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Authenticator for GatedAuth {
    async fn authenticate(
        &self,
        _credentials: &Value,
    ) -> Result<SessionData, SessionError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok([("token", json!(self.token))].into_iter().collect())
    }

    async fn restore(
        &self,
        data: &SessionData,
    ) -> Result<SessionData, SessionError> {
        Ok(data.clone())
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn registry() -> AuthenticatorRegistry {
    AuthenticatorRegistry::new()
        .with("token", FixedAuth::token("T"))
        .with("reject", FixedAuth::rejecting())
}

fn session_with(store: Arc<RecordingStore>, registry: AuthenticatorRegistry) -> Session {
    Session::new(store, registry)
}

fn creds() -> Value {
    json!({ "user": "a", "pass": "b" })
}

/// Lets spawned tasks on the current-thread runtime run until they block.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// authenticate()
// =========================================================================

#[tokio::test]
async fn test_authenticate_success_persists_token_and_authenticator() {
    let store = Arc::new(RecordingStore::default());
    let session = session_with(Arc::clone(&store), registry());

    session.authenticate("token", &creds()).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.get("token"), Some(json!("T")));

    let calls = store.persist_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("token"), Some(&json!("T")));
    assert_eq!(calls[0].get_str(AUTHENTICATOR_KEY), Some("token"));
}

#[tokio::test]
async fn test_authenticate_rejected_does_not_write_store() {
    let store = Arc::new(RecordingStore::default());
    let session = session_with(Arc::clone(&store), registry());

    let err = session.authenticate("reject", &creds()).await.unwrap_err();

    assert!(matches!(err, SessionError::AuthenticationFailed(ref r) if r == "rejected"));
    assert!(!session.is_authenticated());
    assert!(store.persist_calls().await.is_empty());
    assert_eq!(store.clears.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_authenticate_with_failing_store_still_authenticates() {
    let store = Arc::new(RecordingStore::failing());
    let session = session_with(Arc::clone(&store), registry());
    let mut events = session.subscribe();

    session.authenticate("token", &creds()).await.unwrap();

    assert!(session.is_authenticated());
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::PersistenceDegraded { .. }
    ));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Authenticated { authenticator: "token".into() }
    );
}

// =========================================================================
// restore()
// =========================================================================

#[tokio::test]
async fn test_restore_valid_persisted_session_authenticates() {
    let store = Arc::new(RecordingStore::default());
    store
        .inner
        .persist(
            &[("token", json!("T")), (AUTHENTICATOR_KEY, json!("token"))]
                .into_iter()
                .collect(),
        )
        .await
        .unwrap();
    let session = session_with(Arc::clone(&store), registry());

    let state = session.restore().await;

    assert_eq!(state, SessionState::Authenticated);
    assert_eq!(session.get("token"), Some(json!("T")));
    assert!(session.get(AUTHENTICATOR_KEY).is_none());
    assert_eq!(session.authenticator_name().as_deref(), Some("token"));
}

#[tokio::test]
async fn test_restore_empty_store_stays_unauthenticated() {
    let store = Arc::new(RecordingStore::default());
    let session = session_with(store, registry());

    assert_eq!(session.restore().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_restore_store_failure_stays_unauthenticated() {
    let store = Arc::new(RecordingStore::failing());
    let session = session_with(store, registry());

    assert_eq!(session.restore().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_restore_rejected_data_clears_store() {
    let store = Arc::new(RecordingStore::default());
    store
        .inner
        .persist(
            &[("token", json!("old")), (AUTHENTICATOR_KEY, json!("reject"))]
                .into_iter()
                .collect(),
        )
        .await
        .unwrap();
    let session = session_with(Arc::clone(&store), registry());

    let state = session.restore().await;

    assert_eq!(state, SessionState::Unauthenticated);
    assert!(store.inner.restore().await.unwrap().is_none());
}

#[tokio::test]
async fn test_restore_unknown_authenticator_clears_store() {
    let store = Arc::new(RecordingStore::default());
    store
        .inner
        .persist(
            &[("token", json!("T")), (AUTHENTICATOR_KEY, json!("gone"))]
                .into_iter()
                .collect(),
        )
        .await
        .unwrap();
    let session = session_with(Arc::clone(&store), registry());

    assert_eq!(session.restore().await, SessionState::Unauthenticated);
    assert!(store.inner.restore().await.unwrap().is_none());
}

#[tokio::test]
async fn test_restore_then_invalidate_always_ends_cleared() {
    // Once with data that restores, once with data that is rejected.
    for authenticator in ["token", "reject"] {
        let store = Arc::new(RecordingStore::default());
        store
            .inner
            .persist(
                &[("token", json!("T")), (AUTHENTICATOR_KEY, json!(authenticator))]
                    .into_iter()
                    .collect(),
            )
            .await
            .unwrap();
        let session = session_with(Arc::clone(&store), registry());

        session.restore().await;
        session.invalidate().await;

        assert_eq!(session.state(), SessionState::Unauthenticated, "{authenticator}");
        assert!(store.inner.restore().await.unwrap().is_none(), "{authenticator}");
    }
}

// =========================================================================
// invalidate()
// =========================================================================

#[tokio::test]
async fn test_invalidate_remote_failure_still_clears_local_state() {
    let store = Arc::new(RecordingStore::default());
    let registry = AuthenticatorRegistry::new().with(
        "flaky",
        FixedAuth {
            invalidate_fails: true,
            ..FixedAuth::token("T")
        },
    );
    let session = session_with(Arc::clone(&store), registry);
    session.authenticate("flaky", &creds()).await.unwrap();
    let mut events = session.subscribe();

    session.invalidate().await;

    assert!(!session.is_authenticated());
    assert!(store.inner.restore().await.unwrap().is_none());
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::InvalidationFailed { .. }
    ));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Invalidated);
}

#[tokio::test]
async fn test_invalidate_with_failing_store_still_unauthenticates() {
    let store = Arc::new(RecordingStore::default());
    let session = session_with(Arc::clone(&store), registry());
    session.authenticate("token", &creds()).await.unwrap();
    store.failing.store(true, Ordering::SeqCst);

    session.invalidate().await;

    assert_eq!(session.state(), SessionState::Unauthenticated);
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test]
async fn test_authenticate_superseded_by_later_authenticate() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let registry = AuthenticatorRegistry::new()
        .with(
            "slow",
            GatedAuth {
                token: "A",
                started: Arc::clone(&started),
                release: Arc::clone(&release),
            },
        )
        .with("fast", FixedAuth::token("B"));
    let store = Arc::new(RecordingStore::default());
    let session = Arc::new(session_with(Arc::clone(&store), registry));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.authenticate("slow", &creds()).await })
    };
    started.notified().await;

    // B is issued while A is still pending.
    let second = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.authenticate("fast", &creds()).await })
    };
    settle().await;
    release.notify_one();

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(matches!(first, Err(SessionError::Superseded)));
    assert!(second.is_ok());
    assert_eq!(session.get("token"), Some(json!("B")));
    assert_eq!(session.authenticator_name().as_deref(), Some("fast"));

    let calls = store.persist_calls().await;
    assert_eq!(calls.len(), 1, "stale result must not reach the store");
    assert_eq!(calls[0].get_str("token"), Some("B"));
}

#[tokio::test]
async fn test_invalidate_during_pending_authenticate_wins() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let registry = AuthenticatorRegistry::new().with(
        "slow",
        GatedAuth {
            token: "A",
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        },
    );
    let store = Arc::new(RecordingStore::default());
    let session = Arc::new(session_with(Arc::clone(&store), registry));

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.authenticate("slow", &creds()).await })
    };
    started.notified().await;

    let invalidation = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.invalidate().await })
    };
    settle().await;
    release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(SessionError::Superseded)));
    invalidation.await.unwrap();

    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(store.persist_calls().await.is_empty());
}

#[tokio::test]
async fn test_sequential_operations_track_latest_settled_transition() {
    let session = session_with(Arc::new(RecordingStore::default()), registry());

    let steps: [(&str, bool); 6] = [
        ("token", true),
        ("invalidate", false),
        ("reject", false),
        ("token", true),
        ("reject", true),
        ("invalidate", false),
    ];

    for (step, expected) in steps {
        if step == "invalidate" {
            session.invalidate().await;
        } else {
            let _ = session.authenticate(step, &creds()).await;
        }
        assert_eq!(session.is_authenticated(), expected, "after {step}");
    }
}
