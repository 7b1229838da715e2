//! Client-side session management for authkit.
//!
//! This crate owns the authentication state of an application instance:
//!
//! 1. **Authentication**: delegating credential checks to pluggable
//!    [`Authenticator`]s, looked up by name in an [`AuthenticatorRegistry`]
//! 2. **Session tracking**: the [`Session`] state machine
//!    (unauthenticated ⇄ authenticated) and its [`SessionData`]
//! 3. **Persistence**: write-through to a pluggable [`Store`] so the
//!    session survives a restart ([`MemoryStore`], [`FileStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Application shell (above)  ← reacts to SessionEvents (navigation)
//!     ↕
//! Authorize layer (beside)   ← reads SessionSnapshots to decorate requests
//!     ↕
//! Session layer (this crate) ← owns session data, talks to authenticators/stores
//! ```

mod authenticator;
mod data;
mod error;
mod event;
#[cfg(feature = "file-store")]
mod file_store;
mod session;
mod store;

pub use authenticator::{Authenticator, AuthenticatorRegistry};
pub use data::{SessionData, SessionSnapshot};
pub use error::{SessionError, StoreError};
pub use event::SessionEvent;
#[cfg(feature = "file-store")]
pub use file_store::{DEFAULT_NAMESPACE, FileStore};
pub use session::{Session, SessionState};
pub use store::{MemoryStore, Store};

/// Reserved key under which the authenticator's registry name is persisted
/// next to the session data.
pub const AUTHENTICATOR_KEY: &str = "authenticator";
