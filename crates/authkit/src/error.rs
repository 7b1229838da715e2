//! Unified error type for authkit.

use authkit_authorize::OriginError;
use authkit_session::SessionError;

/// Top-level error that wraps the layer errors.
///
/// The `#[from]` variants let `?` convert session and origin errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthKitError {
    /// A session-level error (authentication, unknown authenticator, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An origin could not be computed (document URL or whitelist entry).
    #[error(transparent)]
    Origin(#[from] OriginError),

    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configuration document is not valid JSON for [`Configuration`](crate::Configuration).
    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
