//! Authorizer contract and the built-in authorizers.
//!
//! An authorizer attaches whatever the backend needs to identify the user
//! (a header, a query parameter, ...) using data the authenticator put into
//! the session. Authorizers and authenticators therefore come in matching
//! pairs: a bearer authorizer only makes sense with an authenticator that
//! stores an access token.

use authkit_session::SessionSnapshot;

use crate::OutgoingRequest;

/// Decorates outgoing requests with authorization data.
///
/// Only called for requests the [`OriginPolicy`](crate::OriginPolicy)
/// permits. Implementations must leave the request untouched when
/// `session` is not authenticated.
pub trait Authorizer: Send + Sync + 'static {
    /// Adds authorization data to `request`.
    fn authorize(&self, request: &mut OutgoingRequest, session: &SessionSnapshot);
}

/// Does nothing. The default when no authorizer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseAuthorizer;

impl Authorizer for BaseAuthorizer {
    fn authorize(&self, _request: &mut OutgoingRequest, _session: &SessionSnapshot) {}
}

/// Sends the session's access token as `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerAuthorizer {
    token_key: String,
}

impl BearerAuthorizer {
    /// Session data key read by default (what OAuth 2.0 token endpoints
    /// return).
    pub const DEFAULT_TOKEN_KEY: &'static str = "access_token";

    /// Reads the token from [`DEFAULT_TOKEN_KEY`](Self::DEFAULT_TOKEN_KEY).
    pub fn new() -> Self {
        Self::with_token_key(Self::DEFAULT_TOKEN_KEY)
    }

    /// Reads the token from a custom session data key.
    pub fn with_token_key(token_key: impl Into<String>) -> Self {
        Self {
            token_key: token_key.into(),
        }
    }

    /// The session data key holding the token.
    pub fn token_key(&self) -> &str {
        &self.token_key
    }
}

impl Default for BearerAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Authorizer for BearerAuthorizer {
    fn authorize(&self, request: &mut OutgoingRequest, session: &SessionSnapshot) {
        if !session.is_authenticated() {
            return;
        }
        match session.data.get_str(&self.token_key) {
            Some(token) if !token.is_empty() => {
                request.set_header("Authorization", format!("Bearer {token}"));
            }
            _ => {
                tracing::debug!(key = %self.token_key, "session has no bearer token, request left unauthorized");
            }
        }
    }
}
