//! Origins and the same-origin/whitelist policy.
//!
//! An origin is the (scheme, host, port) triple of a URL. Environments
//! disagree on whether a default port is reported (`http://a.com` vs
//! `http://a.com:80`), so origins are canonicalized: `http` always carries
//! port 80 and `https` port 443 unless another port is given. Other schemes
//! keep whatever port the URL names, or none.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use url::Url;

use crate::OriginError;

/// Per-URL origin cache entries kept before the cache is reset.
const CACHE_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// A canonical origin.
///
/// Renders as `scheme://host[:port]`. Parsing a rendered origin yields the
/// same origin again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Computes the origin of an absolute URL.
    pub fn parse(input: &str) -> Result<Self, OriginError> {
        Self::parse_with_base(input, None)
    }

    /// Computes the origin of `input`, resolving relative URLs against
    /// `base`.
    pub fn parse_with_base(
        input: &str,
        base: Option<&Url>,
    ) -> Result<Self, OriginError> {
        let invalid = |source| OriginError::InvalidUrl {
            url: input.to_string(),
            source,
        };
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match base {
                Some(base) => base.join(input).map_err(invalid)?,
                None => return Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
            },
            Err(e) => return Err(invalid(e)),
        };
        Self::from_url(&url)
    }

    /// Computes the origin of a parsed URL.
    pub fn from_url(url: &Url) -> Result<Self, OriginError> {
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(OriginError::MissingHost(url.to_string())),
        };
        let scheme = url.scheme().to_string();
        // `Url::port` hides the scheme's default port, so put it back for
        // http/https.
        let port = match scheme.as_str() {
            "http" => Some(url.port().unwrap_or(80)),
            "https" => Some(url.port().unwrap_or(443)),
            _ => url.port(),
        };
        Ok(Self { scheme, host, port })
    }

    /// Lowercase scheme, without `://`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name or IP literal (IPv6 in brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, defaulted for `http`/`https`.
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// OriginPolicy
// ---------------------------------------------------------------------------

/// Decides which request URLs may receive authorization data.
///
/// A URL qualifies iff its origin equals the document origin or is in the
/// whitelist. URLs whose origin cannot be computed never qualify.
#[derive(Debug)]
pub struct OriginPolicy {
    base: Url,
    document_origin: Origin,
    whitelist: HashSet<Origin>,
    /// Origin per raw URL string. `None` caches "no origin".
    cache: Mutex<HashMap<String, Option<Origin>>>,
}

impl OriginPolicy {
    /// Creates a policy for an application loaded from `document`.
    ///
    /// The document origin comes from `document` alone. Relative request
    /// URLs resolve against `document` too until
    /// [`with_base`](Self::with_base) says otherwise. The whitelist starts
    /// empty.
    pub fn new(document: Url) -> Result<Self, OriginError> {
        let document_origin = Origin::from_url(&document)?;
        Ok(Self {
            base: document,
            document_origin,
            whitelist: HashSet::new(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves relative request URLs against `base` instead of the
    /// document URL.
    ///
    /// The document origin is unaffected. A relative URL that resolves to
    /// another origin is judged by that origin like any absolute URL.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self
    }

    /// Adds a whitelisted origin.
    pub fn allow(mut self, origin: Origin) -> Self {
        self.whitelist.insert(origin);
        self
    }

    /// Adds whitelisted origins given as URL strings, canonicalizing each.
    pub fn allow_all<I, S>(mut self, origins: I) -> Result<Self, OriginError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for origin in origins {
            self.whitelist.insert(Origin::parse(origin.as_ref())?);
        }
        Ok(self)
    }

    /// The origin the application was loaded from.
    pub fn document_origin(&self) -> &Origin {
        &self.document_origin
    }

    /// Base URL for relative request URLs.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Whitelisted origins.
    pub fn whitelist(&self) -> &HashSet<Origin> {
        &self.whitelist
    }

    /// Returns the (cached) origin of a request URL.
    pub fn origin_of(&self, url: &str) -> Option<Origin> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(url) {
            return cached.clone();
        }
        let origin = match Origin::parse_with_base(url, Some(&self.base)) {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::debug!(error = %e, "request URL has no origin");
                None
            }
        };
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(url.to_string(), origin.clone());
        origin
    }

    /// Returns `true` if `origin` may receive authorization data.
    pub fn permits(&self, origin: &Origin) -> bool {
        *origin == self.document_origin || self.whitelist.contains(origin)
    }

    /// Returns `true` if a request to `url` may receive authorization data.
    pub fn should_authorize(&self, url: &str) -> bool {
        self.origin_of(url)
            .is_some_and(|origin| self.permits(&origin))
    }
}
