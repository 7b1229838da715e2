//! The per-request authorization stage.

use std::fmt;
use std::sync::Arc;

use authkit_session::Session;

use crate::{Authorizer, OriginPolicy, OutgoingRequest};

/// Runs the origin policy and the authorizer for every outgoing request.
///
/// Cheap to clone; hand one to each HTTP client middleware that needs it.
/// `intercept` is synchronous and never waits on session operations in
/// flight: it authorizes against whatever the session looks like right
/// now.
#[derive(Clone)]
pub struct RequestInterceptor {
    policy: Arc<OriginPolicy>,
    authorizer: Arc<dyn Authorizer>,
    session: Arc<Session>,
}

impl RequestInterceptor {
    /// Wires a policy, an authorizer and the session together.
    pub fn new(
        policy: Arc<OriginPolicy>,
        authorizer: Arc<dyn Authorizer>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            policy,
            authorizer,
            session,
        }
    }

    /// Returns `true` if requests to `url` may carry authorization data.
    pub fn should_authorize(&self, url: &str) -> bool {
        self.policy.should_authorize(url)
    }

    /// Authorizes `request` if its origin is permitted and the session is
    /// authenticated.
    ///
    /// Returns whether the authorizer ran.
    pub fn intercept(&self, request: &mut OutgoingRequest) -> bool {
        if !self.policy.should_authorize(&request.url) {
            tracing::debug!(url = %request.url, "cross-origin request, not authorizing");
            return false;
        }
        let snapshot = self.session.snapshot();
        if !snapshot.is_authenticated() {
            tracing::trace!(url = %request.url, "session not authenticated, not authorizing");
            return false;
        }
        self.authorizer.authorize(request, &snapshot);
        true
    }

    /// The policy this interceptor applies.
    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    /// The session this interceptor reads.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("policy", &self.policy)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
