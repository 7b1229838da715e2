//! `AuthKit` builder: one-time wiring of store, session, authorizer and
//! interceptor.
//!
//! Nothing is looked up ambiently. The builder constructs every component
//! and passes each one the collaborators it needs; the resulting
//! [`AuthKit`] hands out shared references.

use std::fmt;
use std::sync::Arc;

use authkit_authorize::{Authorizer, BaseAuthorizer, OriginPolicy, RequestInterceptor};
use authkit_session::{
    Authenticator, AuthenticatorRegistry, Session, SessionState, Store,
};
use tokio::task::JoinHandle;

use crate::navigation::{Navigator, spawn_navigation};
use crate::{AuthKitError, Configuration};

type AuthorizerFactory = Box<dyn FnOnce(&Configuration) -> Arc<dyn Authorizer> + Send>;
type StoreFactory = Box<dyn FnOnce(&Configuration) -> Arc<dyn Store> + Send>;

/// Builder for an [`AuthKit`].
///
/// # Example
///
/// ```rust,ignore
/// let kit = AuthKit::builder()
///     .document_url("http://localhost:4200")
///     .authenticator("oauth2", PasswordGrant::new(token_endpoint))
///     .authorizer(BearerAuthorizer::new())
///     .build()?;
/// ```
pub struct AuthKitBuilder {
    config: Configuration,
    authenticators: AuthenticatorRegistry,
    authorizer: Option<AuthorizerFactory>,
    store: Option<StoreFactory>,
}

impl AuthKitBuilder {
    /// Creates a builder with default configuration, no authenticators,
    /// the no-op authorizer and the default durable store.
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
            authenticators: AuthenticatorRegistry::new(),
            authorizer: None,
            store: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// Route for authentication. Default: `"login"`.
    pub fn authentication_route(mut self, route: impl Into<String>) -> Self {
        self.config.authentication_route = route.into();
        self
    }

    /// Route after authentication. Default: `"index"`.
    pub fn route_after_authentication(mut self, route: impl Into<String>) -> Self {
        self.config.route_after_authentication = route.into();
        self
    }

    /// URL the application was loaded from.
    pub fn document_url(mut self, url: impl Into<String>) -> Self {
        self.config.document_url = url.into();
        self
    }

    /// Path the application is mounted under. Default: `"/"`.
    pub fn application_root_url(mut self, url: impl Into<String>) -> Self {
        self.config.application_root_url = url.into();
        self
    }

    /// Origins besides the document origin that may receive authorization
    /// data.
    pub fn cross_origin_whitelist<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cross_origin_whitelist = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Registers an authenticator under `name`.
    pub fn authenticator(mut self, name: impl Into<String>, authenticator: impl Authenticator) -> Self {
        self.authenticators.register(name, authenticator);
        self
    }

    /// Uses a prebuilt authorizer.
    pub fn authorizer(self, authorizer: impl Authorizer) -> Self {
        let authorizer: Arc<dyn Authorizer> = Arc::new(authorizer);
        self.authorizer_factory(move |_| authorizer)
    }

    /// Builds the authorizer from the final configuration.
    pub fn authorizer_factory(
        mut self,
        factory: impl FnOnce(&Configuration) -> Arc<dyn Authorizer> + Send + 'static,
    ) -> Self {
        self.authorizer = Some(Box::new(factory));
        self
    }

    /// Uses a prebuilt store.
    pub fn store(self, store: impl Store) -> Self {
        let store: Arc<dyn Store> = Arc::new(store);
        self.store_factory(move |_| store)
    }

    /// Builds the store from the final configuration.
    pub fn store_factory(
        mut self,
        factory: impl FnOnce(&Configuration) -> Arc<dyn Store> + Send + 'static,
    ) -> Self {
        self.store = Some(Box::new(factory));
        self
    }

    /// Validates the configuration and wires everything together.
    ///
    /// The session starts unauthenticated; call [`AuthKit::restore`] to
    /// pick up a persisted session.
    ///
    /// # Errors
    /// [`AuthKitError::Config`] or [`AuthKitError::Origin`] if the
    /// document URL, root URL or a whitelist entry is invalid.
    pub fn build(self) -> Result<AuthKit, AuthKitError> {
        let config = self.config;
        config.validate()?;

        let policy = OriginPolicy::new(config.parse_document_url()?)?
            .with_base(config.base_url()?)
            .allow_all(&config.cross_origin_whitelist)?;

        let store = match self.store {
            Some(factory) => factory(&config),
            None => default_store(&config),
        };
        let authorizer = match self.authorizer {
            Some(factory) => factory(&config),
            None => Arc::new(BaseAuthorizer),
        };

        let session = Arc::new(Session::new(store, self.authenticators));
        let interceptor =
            RequestInterceptor::new(Arc::new(policy), authorizer, Arc::clone(&session));

        tracing::info!(
            document_origin = %interceptor.policy().document_origin(),
            whitelisted = interceptor.policy().whitelist().len(),
            authenticators = session.authenticators().len(),
            "authkit configured"
        );

        Ok(AuthKit {
            config: Arc::new(config),
            session,
            interceptor,
        })
    }
}

impl Default for AuthKitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthKitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKitBuilder")
            .field("config", &self.config)
            .field("authenticators", &self.authenticators)
            .field("custom_authorizer", &self.authorizer.is_some())
            .field("custom_store", &self.store.is_some())
            .finish()
    }
}

#[cfg(feature = "file-store")]
fn default_store(config: &Configuration) -> Arc<dyn Store> {
    Arc::new(authkit_session::FileStore::new(&config.store_path))
}

#[cfg(not(feature = "file-store"))]
fn default_store(_config: &Configuration) -> Arc<dyn Store> {
    tracing::warn!("built without file-store, sessions will not survive a restart");
    Arc::new(authkit_session::MemoryStore::new())
}

/// The wired-up components.
#[derive(Debug, Clone)]
pub struct AuthKit {
    config: Arc<Configuration>,
    session: Arc<Session>,
    interceptor: RequestInterceptor,
}

impl AuthKit {
    /// Creates a builder.
    pub fn builder() -> AuthKitBuilder {
        AuthKitBuilder::new()
    }

    /// The configuration, read-only.
    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// The session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The request interceptor. Clone it into the HTTP client's middleware.
    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }

    /// Restores a persisted session, if any.
    pub async fn restore(&self) -> SessionState {
        self.session.restore().await
    }

    /// Starts routing on session events; see [`spawn_navigation`].
    pub fn spawn_navigation(&self, navigator: impl Navigator) -> JoinHandle<()> {
        spawn_navigation(&self.session, Arc::clone(&self.config), navigator)
    }
}
