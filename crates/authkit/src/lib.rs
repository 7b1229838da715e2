//! # authkit
//!
//! Client-side authentication sessions for applications that talk to HTTP
//! backends.
//!
//! authkit tracks whether the user is authenticated, persists the session
//! across restarts, delegates credential checks to pluggable
//! authenticators and authorizes outgoing requests, but only those going
//! to the application's own origin or to a whitelisted one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authkit::prelude::*;
//!
//! # async fn run(my_authenticator: impl Authenticator) -> Result<(), AuthKitError> {
//! let kit = AuthKit::builder()
//!     .document_url("https://app.example.com")
//!     .cross_origin_whitelist(["https://api.example.com"])
//!     .authenticator("oauth2", my_authenticator)
//!     .authorizer(BearerAuthorizer::new())
//!     .store(MemoryStore::new())
//!     .build()?;
//!
//! kit.restore().await;
//! kit.session()
//!     .authenticate("oauth2", &serde_json::json!({ "username": "u", "password": "p" }))
//!     .await?;
//!
//! let mut request = OutgoingRequest::get("https://api.example.com/me");
//! kit.interceptor().intercept(&mut request);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod navigation;
mod setup;

pub use config::Configuration;
pub use error::AuthKitError;
pub use navigation::{Navigator, route_for, spawn_navigation};
pub use setup::{AuthKit, AuthKitBuilder};

pub use authkit_authorize as authorize;
pub use authkit_session as session;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{
        AuthKit, AuthKitBuilder, AuthKitError, Configuration, Navigator,
        spawn_navigation,
    };
    pub use authkit_authorize::{
        Authorizer, BaseAuthorizer, BearerAuthorizer, Origin, OriginPolicy,
        OutgoingRequest, RequestInterceptor,
    };
    #[cfg(feature = "file-store")]
    pub use authkit_session::FileStore;
    pub use authkit_session::{
        Authenticator, AuthenticatorRegistry, MemoryStore, Session,
        SessionData, SessionError, SessionEvent, SessionSnapshot,
        SessionState, Store, StoreError,
    };
}
