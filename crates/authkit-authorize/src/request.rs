//! The request shape authorizers decorate.

use url::form_urlencoded;

/// An outgoing HTTP request, as seen before it is sent.
///
/// Deliberately minimal: just what an authorizer needs to read and
/// decorate. Host HTTP clients convert to and from their own request type
/// around [`RequestInterceptor::intercept`](crate::RequestInterceptor::intercept).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Absolute or application-relative URL.
    pub url: String,
    /// Header name/value pairs in insertion order.
    pub headers: Vec<(String, String)>,
}

impl OutgoingRequest {
    /// Creates a request without headers.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Returns the first value of a header (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing every existing value of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Appends a form-encoded `key=value` pair to the URL's query string,
    /// keeping any fragment at the end.
    pub fn append_query_pair(&mut self, key: &str, value: &str) {
        let (base, fragment) = match self.url.find('#') {
            Some(idx) => self.url.split_at(idx),
            None => (self.url.as_str(), ""),
        };
        let separator = if !base.contains('?') {
            "?"
        } else if base.ends_with('?') || base.ends_with('&') {
            ""
        } else {
            "&"
        };
        let pair: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(key, value)
            .finish();
        self.url = format!("{base}{separator}{pair}{fragment}");
    }
}
