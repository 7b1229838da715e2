//! Routing glue between session events and the application shell.
//!
//! The session knows nothing about routes. This module listens for
//! [`SessionEvent`]s and tells a [`Navigator`] where to go:
//!
//! | event | route |
//! |---|---|
//! | `Authenticated` | `route_after_authentication` |
//! | `Invalidated` | `authentication_route` |

use std::sync::Arc;

use authkit_session::{Session, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::Configuration;

/// Something that can switch the application to a named route.
///
/// Implemented for any `Fn(&str)` closure.
pub trait Navigator: Send + Sync + 'static {
    /// Switches to `route`.
    fn transition_to(&self, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn transition_to(&self, route: &str) {
        self(route)
    }
}

/// The route an event should lead to, if any.
pub fn route_for<'a>(event: &SessionEvent, config: &'a Configuration) -> Option<&'a str> {
    match event {
        SessionEvent::Authenticated { .. } => Some(config.route_after_authentication.as_str()),
        SessionEvent::Invalidated => Some(config.authentication_route.as_str()),
        _ => None,
    }
}

/// Spawns a task that navigates on session events.
///
/// Subscribes before returning, so no event emitted after this call is
/// missed. The task ends once the session is dropped.
pub fn spawn_navigation(
    session: &Session,
    config: Arc<Configuration>,
    navigator: impl Navigator,
) -> JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(route) = route_for(&event, &config) {
                        tracing::debug!(?event, route, "navigating");
                        navigator.transition_to(route);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "navigation fell behind session events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
