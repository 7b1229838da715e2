//! Application-wide configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use authkit_authorize::Origin;

use crate::AuthKitError;

/// Settings fixed at setup time.
///
/// Built once, then shared read-only as `Arc<Configuration>` by everything
/// that needs it. Every field has a default, so a JSON document only needs
/// the fields it overrides:
///
/// ```rust
/// use authkit::Configuration;
///
/// let config = Configuration::from_json_str(
///     r#"{ "authentication_route": "sign-in" }"#,
/// ).unwrap();
/// assert_eq!(config.authentication_route, "sign-in");
/// assert_eq!(config.route_after_authentication, "index");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Route to send the user to for authentication, and after the
    /// session is invalidated.
    pub authentication_route: String,

    /// Route to send the user to after a successful authentication.
    pub route_after_authentication: String,

    /// Path the application is mounted under, relative to `document_url`.
    /// Relative request URLs resolve against `document_url` joined with
    /// this. An absolute value must stay on the document origin.
    pub application_root_url: String,

    /// URL the application was loaded from. Its origin is the document
    /// origin, which is always allowed to receive authorization data.
    pub document_url: String,

    /// Additional origins allowed to receive authorization data, e.g.
    /// `"https://api.example.com"`. The port may be left out when it is
    /// the scheme's default.
    pub cross_origin_whitelist: Vec<String>,

    /// File used by the default durable store.
    pub store_path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            authentication_route: "login".to_string(),
            route_after_authentication: "index".to_string(),
            application_root_url: "/".to_string(),
            document_url: "http://localhost".to_string(),
            cross_origin_whitelist: Vec::new(),
            store_path: PathBuf::from("authkit-session.json"),
        }
    }
}

impl Configuration {
    /// Parses a JSON document, filling missing fields with defaults.
    ///
    /// # Errors
    /// [`AuthKitError::ConfigParse`] for malformed JSON,
    /// [`AuthKitError::Config`] / [`AuthKitError::Origin`] when
    /// [`validate`](Self::validate) fails.
    pub fn from_json_str(json: &str) -> Result<Self, AuthKitError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the URLs can be turned into origins.
    pub fn validate(&self) -> Result<(), AuthKitError> {
        if self.authentication_route.is_empty() {
            return Err(AuthKitError::Config("authentication_route is empty".into()));
        }
        if self.route_after_authentication.is_empty() {
            return Err(AuthKitError::Config(
                "route_after_authentication is empty".into(),
            ));
        }
        self.base_url()?;
        self.whitelisted_origins()?;
        Ok(())
    }

    /// `document_url`, parsed. Its origin is the document origin.
    pub fn parse_document_url(&self) -> Result<Url, AuthKitError> {
        Url::parse(&self.document_url).map_err(|e| {
            AuthKitError::Config(format!("document_url {:?}: {e}", self.document_url))
        })
    }

    /// `document_url` joined with `application_root_url`, the base for
    /// relative request URLs.
    ///
    /// `Url::join` takes the scheme and host from an absolute
    /// (`https://x/`) or protocol-relative (`//x/`) root, so such a root
    /// is rejected unless it names the document origin.
    pub fn base_url(&self) -> Result<Url, AuthKitError> {
        let document = self.parse_document_url()?;
        let base = document.join(&self.application_root_url).map_err(|e| {
            AuthKitError::Config(format!(
                "application_root_url {:?}: {e}",
                self.application_root_url
            ))
        })?;
        let document_origin = Origin::from_url(&document)?;
        let base_origin = Origin::from_url(&base)?;
        if base_origin != document_origin {
            return Err(AuthKitError::Config(format!(
                "application_root_url {:?} leaves the document origin {document_origin} for {base_origin}",
                self.application_root_url
            )));
        }
        Ok(base)
    }

    /// The whitelist, canonicalized.
    pub fn whitelisted_origins(&self) -> Result<Vec<Origin>, AuthKitError> {
        self.cross_origin_whitelist
            .iter()
            .map(|entry| Origin::parse(entry).map_err(AuthKitError::from))
            .collect()
    }
}
