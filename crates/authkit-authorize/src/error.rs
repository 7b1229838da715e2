//! Error types for the authorize layer.

/// Errors raised while computing an origin.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    /// The string is not a URL, even relative to the base.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL has no host (`mailto:`, `data:`, `file:///...`), so it has
    /// no origin that could be compared.
    #[error("URL {0:?} has no host")]
    MissingHost(String),
}
