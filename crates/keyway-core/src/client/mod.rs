//! Clients
//!
//! A [`Client`] wires one extractor, one authenticator, one profile creator,
//! an ordered chain of authorization generators and, for indirect clients,
//! redirection and logout action builders.
//!
//! Direct and indirect clients share this single type; [`ClientKind`] only
//! changes how credentials errors are recovered and whether redirection is
//! possible.
//!
//! # Lifecycle
//!
//! The wiring is assembled lazily on first use. Initialization runs under an
//! init lock and publishes an immutable [`ClientConfig`] snapshot; each
//! pipeline call takes one snapshot at its start, so a forced re-init never
//! exposes a half-built configuration to calls in flight.
//!
//! ```rust,ignore
//! let client = ClientBuilder::direct("basic")
//!     .extractor(BasicAuthExtractor::default())
//!     .authenticator(authenticator)
//!     .build();
//!
//! match client.authenticate(&ctx, &session).await? {
//!     Outcome::Continue(Some(profile)) => { /* authenticated */ }
//!     Outcome::Continue(None) => { /* anonymous */ }
//!     Outcome::Action(action) => action.apply(&mut ctx),
//! }
//! ```

mod builder;
mod callback;

pub use builder::{
    CallbackRedirectionActionBuilder, LogoutActionBuilder, RedirectLogoutActionBuilder,
    RedirectionActionBuilder,
};
pub use callback::{CallbackUrlResolver, CLIENT_NAME_PARAMETER};

use crate::action::HttpAction;
use crate::authenticator::Authenticator;
use crate::context::{is_ajax, SessionStore, WebContext};
use crate::creator::{AuthenticatorProfileCreator, ProfileCreator};
use crate::credentials::Credentials;
use crate::error::{AuthError, AuthResult};
use crate::extractor::CredentialsExtractor;
use crate::generator::AuthorizationGenerator;
use crate::profile::UserProfile;
use crate::util::assert_not_blank;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session key suffix of the "authentication attempted" flag.
pub const ATTEMPTED_AUTHENTICATION_SUFFIX: &str = "$attemptedAuthentication";

/// Session key suffix of the per-client CSRF state.
pub const STATE_SESSION_SUFFIX: &str = "$stateSessionParameter";

/// Behavioral variant of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Stateless, per-request authentication; never redirects
    Direct,
    /// Redirect round trip through an external login endpoint
    Indirect,
}

/// Result of a pipeline step that may interrupt normal processing.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Processing continues with this value
    Continue(T),
    /// The caller must stop and perform this action
    Action(HttpAction),
}

impl<T> Outcome<T> {
    /// Split into the value or the action.
    pub fn into_result(self) -> Result<T, HttpAction> {
        match self {
            Outcome::Continue(value) => Ok(value),
            Outcome::Action(action) => Err(action),
        }
    }

    /// The action, if processing was interrupted.
    pub fn action(&self) -> Option<&HttpAction> {
        match self {
            Outcome::Continue(_) => None,
            Outcome::Action(action) => Some(action),
        }
    }

    /// Check if processing was interrupted.
    pub fn is_action(&self) -> bool {
        matches!(self, Outcome::Action(_))
    }

    /// Transform the continuation value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Continue(value) => Outcome::Continue(f(value)),
            Outcome::Action(action) => Outcome::Action(action),
        }
    }
}

/// Wiring of a client.
///
/// Presets fill it in through [`ClientSetup`] using the `set_*_if_undefined`
/// methods so that anything the caller configured explicitly wins.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Credentials extractor
    pub extractor: Option<Arc<dyn CredentialsExtractor>>,
    /// Authenticator
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Profile creator, [`AuthenticatorProfileCreator`] when unset
    pub profile_creator: Option<Arc<dyn ProfileCreator>>,
    /// Generators run in this order
    pub authorization_generators: Vec<Arc<dyn AuthorizationGenerator>>,
    /// Indirect clients only
    pub redirection_action_builder: Option<Arc<dyn RedirectionActionBuilder>>,
    /// Provider logout
    pub logout_action_builder: Option<Arc<dyn LogoutActionBuilder>>,
    /// Callback URL, absolute or relative to the request base URL
    pub callback_url: Option<String>,
    /// Encoding of the client name into the callback URL
    pub callback_url_resolver: CallbackUrlResolver,
    /// Headers sent with the 401 an indirect client answers credentials
    /// errors with
    pub challenge_headers: Vec<(String, String)>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("extractor", &self.extractor.is_some())
            .field("authenticator", &self.authenticator.is_some())
            .field("profile_creator", &self.profile_creator.is_some())
            .field("authorization_generators", &self.authorization_generators.len())
            .field(
                "redirection_action_builder",
                &self.redirection_action_builder.is_some(),
            )
            .field("logout_action_builder", &self.logout_action_builder.is_some())
            .field("callback_url", &self.callback_url)
            .field("callback_url_resolver", &self.callback_url_resolver)
            .field("challenge_headers", &self.challenge_headers)
            .finish()
    }
}

impl ClientConfig {
    /// Set the extractor unless one is configured.
    pub fn set_extractor_if_undefined(&mut self, extractor: impl CredentialsExtractor + 'static) {
        if self.extractor.is_none() {
            self.extractor = Some(Arc::new(extractor));
        }
    }

    /// Set the authenticator unless one is configured.
    pub fn set_authenticator_if_undefined(&mut self, authenticator: impl Authenticator + 'static) {
        if self.authenticator.is_none() {
            self.authenticator = Some(Arc::new(authenticator));
        }
    }

    /// Set the profile creator unless one is configured.
    pub fn set_profile_creator_if_undefined(&mut self, creator: impl ProfileCreator + 'static) {
        if self.profile_creator.is_none() {
            self.profile_creator = Some(Arc::new(creator));
        }
    }

    /// Set the redirection action builder unless one is configured.
    pub fn set_redirection_action_builder_if_undefined(
        &mut self,
        builder: impl RedirectionActionBuilder + 'static,
    ) {
        if self.redirection_action_builder.is_none() {
            self.redirection_action_builder = Some(Arc::new(builder));
        }
    }

    /// Set the logout action builder unless one is configured.
    pub fn set_logout_action_builder_if_undefined(
        &mut self,
        builder: impl LogoutActionBuilder + 'static,
    ) {
        if self.logout_action_builder.is_none() {
            self.logout_action_builder = Some(Arc::new(builder));
        }
    }

    /// Append an authorization generator.
    pub fn add_authorization_generator(&mut self, generator: impl AuthorizationGenerator + 'static) {
        self.authorization_generators.push(Arc::new(generator));
    }
}

/// Protocol-specific initialization of a preset.
///
/// Runs on every (re-)initialization against a fresh copy of the caller's
/// configuration.
pub trait ClientSetup: Send + Sync {
    /// Validate parameters and fill in the default wiring.
    fn configure(&self, client_name: &str, config: &mut ClientConfig) -> AuthResult<()>;
}

impl<F> ClientSetup for F
where
    F: Fn(&str, &mut ClientConfig) -> AuthResult<()> + Send + Sync,
{
    fn configure(&self, client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        self(client_name, config)
    }
}

/// Read-only view of an initialized client handed to action builders.
#[derive(Debug, Clone, Copy)]
pub struct ClientView<'a> {
    name: &'a str,
    kind: ClientKind,
    config: &'a ClientConfig,
}

impl<'a> ClientView<'a> {
    /// Client name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Client variant.
    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    /// Initialized configuration.
    pub fn config(&self) -> &'a ClientConfig {
        self.config
    }

    /// Callback URL of this client for the current request, with the client
    /// name encoded by the configured resolver.
    pub fn compute_callback_url(&self, ctx: &dyn WebContext) -> AuthResult<String> {
        let url = self
            .config
            .callback_url
            .as_deref()
            .ok_or_else(|| AuthError::missing("callback_url"))?;
        Ok(self
            .config
            .callback_url_resolver
            .compute(url, self.name, ctx))
    }

    /// Session key of the CSRF state.
    pub fn state_session_key(&self) -> String {
        format!("{}{STATE_SESSION_SUFFIX}", self.name)
    }

    /// Session key of the "authentication attempted" flag.
    pub fn attempted_session_key(&self) -> String {
        format!("{}{ATTEMPTED_AUTHENTICATION_SUFFIX}", self.name)
    }
}

/// An authentication client.
///
/// Clients are long-lived and shared across requests; per-request state only
/// lives in the context, session and values passed through each call.
pub struct Client {
    name: String,
    kind: ClientKind,
    setup: Option<Arc<dyn ClientSetup>>,
    pending: Mutex<ClientConfig>,
    ready: RwLock<Option<Arc<ClientConfig>>>,
    init_lock: Mutex<()>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client name, unique within a [`Clients`](crate::registry::Clients)
    /// group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client variant.
    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    /// Check if this is a direct client.
    pub fn is_direct(&self) -> bool {
        self.kind == ClientKind::Direct
    }

    /// Check if the client reached the ready state.
    pub fn is_initialized(&self) -> bool {
        self.ready.read().is_some()
    }

    /// Callback URL configured for the next initialization.
    pub fn callback_url(&self) -> Option<String> {
        self.pending.lock().callback_url.clone()
    }

    /// Change the configuration.
    ///
    /// Changes apply at the first initialization, or at the next forced
    /// re-initialization of an already ready client.
    pub fn reconfigure(&self, f: impl FnOnce(&mut ClientConfig)) {
        f(&mut self.pending.lock());
    }

    /// Initialize the client.
    ///
    /// Without `force`, an initialized client is left alone and concurrent
    /// callers wait for a single initialization run. With `force`, the wiring
    /// is rebuilt from the current configuration and swapped in atomically.
    pub fn init(&self, force: bool) -> AuthResult<()> {
        self.init_config(force).map(|_| ())
    }

    fn init_config(&self, force: bool) -> AuthResult<Arc<ClientConfig>> {
        if !force {
            let snapshot = self.ready.read().clone();
            if let Some(config) = snapshot {
                return Ok(config);
            }
        }

        let _guard = self.init_lock.lock();
        if !force {
            let snapshot = self.ready.read().clone();
            if let Some(config) = snapshot {
                return Ok(config);
            }
        }

        assert_not_blank("name", Some(&self.name))?;
        let mut config = self.pending.lock().clone();
        if let Some(setup) = &self.setup {
            setup.configure(&self.name, &mut config)?;
        }
        config.set_profile_creator_if_undefined(AuthenticatorProfileCreator);
        if self.kind == ClientKind::Indirect {
            assert_not_blank("callback_url", config.callback_url.as_deref())?;
            if config.redirection_action_builder.is_none() {
                return Err(AuthError::missing("redirection_action_builder"));
            }
        }

        let config = Arc::new(config);
        *self.ready.write() = Some(config.clone());
        info!(client = %self.name, kind = ?self.kind, force, "Client initialized");
        Ok(config)
    }

    fn view<'a>(&'a self, config: &'a ClientConfig) -> ClientView<'a> {
        ClientView {
            name: &self.name,
            kind: self.kind,
            config,
        }
    }

    fn unauthorized(config: &ClientConfig) -> HttpAction {
        HttpAction::Unauthorized {
            headers: config.challenge_headers.clone(),
        }
    }

    /// Extract and validate the credentials of the current request.
    ///
    /// - Direct: a `Credentials` error degrades to `Continue(None)`.
    /// - Indirect: a `Credentials` error becomes a 401 action carrying the
    ///   configured challenge headers.
    ///
    /// Every other error propagates.
    pub async fn get_credentials(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Outcome<Option<Credentials>>> {
        let config = self.init_config(false)?;
        let extractor = config
            .extractor
            .as_ref()
            .ok_or_else(|| AuthError::missing("credentials_extractor"))?;
        let authenticator = config
            .authenticator
            .as_ref()
            .ok_or_else(|| AuthError::missing("authenticator"))?;

        let result = retrieve_credentials(extractor.as_ref(), authenticator.as_ref(), ctx, session).await;

        match self.kind {
            ClientKind::Direct => match result {
                Ok(credentials) => Ok(Outcome::Continue(credentials)),
                Err(e) if e.is_credentials_error() => {
                    debug!(client = %self.name, error = %e, "Credentials rejected, continuing anonymously");
                    Ok(Outcome::Continue(None))
                }
                Err(e) => Err(e),
            },
            ClientKind::Indirect => {
                let view = self.view(&config);
                match result {
                    Ok(Some(credentials)) => {
                        session.set(ctx, &view.attempted_session_key(), None);
                        Ok(Outcome::Continue(Some(credentials)))
                    }
                    Ok(None) => {
                        session.set(
                            ctx,
                            &view.attempted_session_key(),
                            Some(serde_json::Value::from("true")),
                        );
                        Ok(Outcome::Continue(None))
                    }
                    Err(e) if e.is_credentials_error() => {
                        info!(client = %self.name, error = %e, "Credentials rejected, sending challenge");
                        Ok(Outcome::Action(Self::unauthorized(&config)))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Create the profile of validated credentials and run the authorization
    /// generators over it, in registration order.
    pub async fn get_user_profile(
        &self,
        credentials: &Credentials,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<UserProfile>> {
        let config = self.init_config(false)?;
        let creator = config
            .profile_creator
            .as_ref()
            .ok_or_else(|| AuthError::missing("profile_creator"))?;

        let Some(mut profile) = creator.create(credentials, ctx, session).await? else {
            debug!(client = %self.name, "No profile created");
            return Ok(None);
        };
        if profile.client_name().is_none() {
            profile.set_client_name(self.name.as_str());
        }
        for generator in &config.authorization_generators {
            generator.generate(ctx, session, &mut profile)?;
        }

        debug!(client = %self.name, id = %profile.id(), "Profile created");
        Ok(Some(profile))
    }

    /// Run [`get_credentials`](Self::get_credentials) then
    /// [`get_user_profile`](Self::get_user_profile).
    pub async fn authenticate(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Outcome<Option<UserProfile>>> {
        let credentials = match self.get_credentials(ctx, session).await? {
            Outcome::Continue(Some(credentials)) => credentials,
            Outcome::Continue(None) => return Ok(Outcome::Continue(None)),
            Outcome::Action(action) => return Ok(Outcome::Action(action)),
        };
        let profile = self.get_user_profile(&credentials, ctx, session).await?;
        Ok(Outcome::Continue(profile))
    }

    /// Build the action starting the redirect round trip.
    ///
    /// AJAX requests, and requests following an attempt that brought back no
    /// credentials, get a 401 instead of a redirect.
    ///
    /// # Errors
    ///
    /// `Unsupported` for direct clients.
    pub fn get_redirection_action(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>> {
        if self.kind == ClientKind::Direct {
            return Err(AuthError::Unsupported(format!(
                "Direct client {} does not redirect",
                self.name
            )));
        }
        let config = self.init_config(false)?;
        let view = self.view(&config);

        if is_ajax(ctx) {
            info!(client = %self.name, "AJAX request, sending 401 instead of redirect");
            return Ok(Some(Self::unauthorized(&config)));
        }

        let attempted_key = view.attempted_session_key();
        if session.get(ctx, &attempted_key).is_some() {
            warn!(client = %self.name, "Authentication already attempted, sending 401");
            session.set(ctx, &attempted_key, None);
            return Ok(Some(Self::unauthorized(&config)));
        }

        let builder = config
            .redirection_action_builder
            .as_ref()
            .ok_or_else(|| AuthError::missing("redirection_action_builder"))?;
        let action = builder.redirection_action(&view, ctx, session)?;
        if let Some(action) = &action {
            debug!(client = %self.name, action = %action, "Redirection action built");
        }
        Ok(action)
    }

    /// Build the provider-side logout action. `None` means local-only logout.
    pub fn get_logout_action(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
        profile: &UserProfile,
        target_url: Option<&str>,
    ) -> AuthResult<Option<HttpAction>> {
        let config = self.init_config(false)?;
        match &config.logout_action_builder {
            Some(builder) => builder.logout_action(&self.view(&config), ctx, session, profile, target_url),
            None => Ok(None),
        }
    }

    /// Final callback URL of this client for the current request.
    pub fn compute_callback_url(&self, ctx: &dyn WebContext) -> AuthResult<String> {
        let config = self.init_config(false)?;
        self.view(&config).compute_callback_url(ctx)
    }

    /// Check if the request is a callback addressed to this client.
    ///
    /// Reads the same initialized configuration as
    /// [`compute_callback_url`](Self::compute_callback_url). A client that
    /// fails to initialize matches nothing.
    pub fn matches_callback(&self, ctx: &dyn WebContext) -> bool {
        match self.init_config(false) {
            Ok(config) => config.callback_url_resolver.matches(&self.name, ctx),
            Err(e) => {
                debug!(client = %self.name, error = %e, "Client not initialized, no callback match");
                false
            }
        }
    }
}

async fn retrieve_credentials(
    extractor: &dyn CredentialsExtractor,
    authenticator: &dyn Authenticator,
    ctx: &dyn WebContext,
    session: &dyn SessionStore,
) -> AuthResult<Option<Credentials>> {
    let Some(mut credentials) = extractor.extract(ctx, session)? else {
        return Ok(None);
    };
    authenticator.validate(&mut credentials, ctx, session).await?;
    Ok(Some(credentials))
}

/// Builder of [`Client`].
pub struct ClientBuilder {
    name: String,
    kind: ClientKind,
    setup: Option<Arc<dyn ClientSetup>>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Start a client of the given variant.
    pub fn new(name: impl Into<String>, kind: ClientKind) -> Self {
        Self {
            name: name.into(),
            kind,
            setup: None,
            config: ClientConfig::default(),
        }
    }

    /// Start a direct client.
    pub fn direct(name: impl Into<String>) -> Self {
        Self::new(name, ClientKind::Direct)
    }

    /// Start an indirect client.
    pub fn indirect(name: impl Into<String>) -> Self {
        Self::new(name, ClientKind::Indirect)
    }

    /// Preset initialization run on every (re-)initialization.
    pub fn setup(mut self, setup: impl ClientSetup + 'static) -> Self {
        self.setup = Some(Arc::new(setup));
        self
    }

    /// Set the extractor.
    pub fn extractor(mut self, extractor: impl CredentialsExtractor + 'static) -> Self {
        self.config.extractor = Some(Arc::new(extractor));
        self
    }

    /// Set the authenticator.
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.config.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Set a shared authenticator.
    pub fn shared_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.config.authenticator = Some(authenticator);
        self
    }

    /// Set the profile creator.
    pub fn profile_creator(mut self, creator: impl ProfileCreator + 'static) -> Self {
        self.config.profile_creator = Some(Arc::new(creator));
        self
    }

    /// Append an authorization generator.
    pub fn authorization_generator(mut self, generator: impl AuthorizationGenerator + 'static) -> Self {
        self.config.add_authorization_generator(generator);
        self
    }

    /// Set the redirection action builder.
    pub fn redirection_action_builder(mut self, builder: impl RedirectionActionBuilder + 'static) -> Self {
        self.config.redirection_action_builder = Some(Arc::new(builder));
        self
    }

    /// Set the logout action builder.
    pub fn logout_action_builder(mut self, builder: impl LogoutActionBuilder + 'static) -> Self {
        self.config.logout_action_builder = Some(Arc::new(builder));
        self
    }

    /// Set the callback URL.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.config.callback_url = Some(url.into());
        self
    }

    /// Set the callback URL resolver.
    pub fn callback_url_resolver(mut self, resolver: CallbackUrlResolver) -> Self {
        self.config.callback_url_resolver = resolver;
        self
    }

    /// Add a challenge header to the 401 sent on credentials errors.
    pub fn challenge_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.challenge_headers.push((name.into(), value.into()));
        self
    }

    /// Build the client. Initialization is deferred to first use.
    pub fn build(self) -> Client {
        Client {
            name: self.name,
            kind: self.kind,
            setup: self.setup,
            pending: Mutex::new(self.config),
            ready: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AUTHENTICATE_HEADER;
    use crate::extractor::{BasicAuthExtractor, CookieExtractor};
    use crate::mock::{MockSessionStore, MockWebContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AcceptAll;

    #[async_trait]
    impl Authenticator for AcceptAll {
        async fn validate(
            &self,
            credentials: &mut Credentials,
            _ctx: &dyn WebContext,
            _session: &dyn SessionStore,
        ) -> AuthResult<()> {
            let id = credentials
                .token_value()
                .or(credentials.username())
                .unwrap_or_default()
                .to_string();
            credentials.attach_profile(UserProfile::new(id));
            Ok(())
        }
    }

    struct Reject(AuthError);

    #[async_trait]
    impl Authenticator for Reject {
        async fn validate(
            &self,
            _credentials: &mut Credentials,
            _ctx: &dyn WebContext,
            _session: &dyn SessionStore,
        ) -> AuthResult<()> {
            Err(self.0.clone())
        }
    }

    fn basic(user: &str, password: &str) -> String {
        use base64::Engine;
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"))
        )
    }

    fn indirect(authenticator: impl Authenticator + 'static) -> Client {
        ClientBuilder::indirect("form")
            .extractor(BasicAuthExtractor::default())
            .authenticator(authenticator)
            .callback_url("/callback")
            .redirection_action_builder(CallbackRedirectionActionBuilder)
            .challenge_header(AUTHENTICATE_HEADER, "Basic realm=\"test\"")
            .build()
    }

    #[tokio::test]
    async fn test_missing_authenticator() {
        let client = ClientBuilder::direct("cookie")
            .extractor(CookieExtractor::new("SESSIONID"))
            .build();
        let result = client
            .get_credentials(&MockWebContext::new(), &MockSessionStore::new())
            .await;
        assert_eq!(
            result.unwrap_err(),
            AuthError::Configuration("authenticator cannot be null".to_string())
        );
    }

    #[tokio::test]
    async fn test_direct_degrades_credentials_error() {
        let client = ClientBuilder::direct("basic")
            .extractor(BasicAuthExtractor::default())
            .authenticator(Reject(AuthError::Credentials("bad token".to_string())))
            .build();
        let ctx = MockWebContext::new().with_header("Authorization", basic("a", "b"));

        let outcome = client.get_credentials(&ctx, &MockSessionStore::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Continue(None));
    }

    #[tokio::test]
    async fn test_direct_propagates_account_errors() {
        let client = ClientBuilder::direct("basic")
            .extractor(BasicAuthExtractor::default())
            .authenticator(Reject(AuthError::BadCredentials("Bad credentials for: a".to_string())))
            .build();
        let ctx = MockWebContext::new().with_header("Authorization", basic("a", "b"));

        let result = client.get_credentials(&ctx, &MockSessionStore::new()).await;
        assert!(matches!(result, Err(AuthError::BadCredentials(_))));
    }

    #[tokio::test]
    async fn test_indirect_challenge_on_credentials_error() {
        let client = indirect(AcceptAll);
        let ctx = MockWebContext::new().with_header("Authorization", "Basic ###");

        let outcome = client.authenticate(&ctx, &MockSessionStore::new()).await.unwrap();
        let action = outcome.action().unwrap();
        assert_eq!(action.code(), 401);
        assert_eq!(
            action.headers(),
            vec![(AUTHENTICATE_HEADER.to_string(), "Basic realm=\"test\"".to_string())]
        );
    }

    #[tokio::test]
    async fn test_attempted_authentication_returns_401() {
        let client = indirect(AcceptAll);
        let ctx = MockWebContext::new().with_method("GET");
        let session = MockSessionStore::new();

        let first = client.get_redirection_action(&ctx, &session).unwrap().unwrap();
        assert_eq!(
            first,
            HttpAction::Found {
                location: "http://localhost:8080/callback?client_name=form".to_string()
            }
        );

        // Callback came back empty
        let outcome = client.get_credentials(&ctx, &session).await.unwrap();
        assert_eq!(outcome, Outcome::Continue(None));
        assert!(session.get(&ctx, "form$attemptedAuthentication").is_some());

        let second = client.get_redirection_action(&ctx, &session).unwrap().unwrap();
        assert_eq!(second.code(), 401);
        assert!(session.get(&ctx, "form$attemptedAuthentication").is_none());
    }

    #[tokio::test]
    async fn test_ajax_gets_401() {
        let client = indirect(AcceptAll);
        let ctx = MockWebContext::new().with_header("X-Requested-With", "XMLHttpRequest");
        let action = client
            .get_redirection_action(&ctx, &MockSessionStore::new())
            .unwrap()
            .unwrap();
        assert_eq!(action.code(), 401);
    }

    #[test]
    fn test_direct_does_not_redirect() {
        let client = ClientBuilder::direct("basic").build();
        let result = client.get_redirection_action(&MockWebContext::new(), &MockSessionStore::new());
        assert!(matches!(result, Err(AuthError::Unsupported(_))));
    }

    #[test]
    fn test_indirect_requires_callback_url() {
        let client = ClientBuilder::indirect("form")
            .redirection_action_builder(CallbackRedirectionActionBuilder)
            .build();
        assert_eq!(
            client.init(false).unwrap_err(),
            AuthError::Configuration("callback_url cannot be blank".to_string())
        );
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_generators_run_in_order() {
        let client = ClientBuilder::direct("cookie")
            .extractor(CookieExtractor::new("SESSIONID"))
            .authenticator(AcceptAll)
            .authorization_generator(
                |_: &dyn WebContext, _: &dyn SessionStore, p: &mut UserProfile| -> AuthResult<()> {
                    p.add_role("A");
                    Ok(())
                },
            )
            .authorization_generator(
                |_: &dyn WebContext, _: &dyn SessionStore, p: &mut UserProfile| -> AuthResult<()> {
                    assert!(p.has_role("A"));
                    p.add_role("B");
                    Ok(())
                },
            )
            .build();
        let ctx = MockWebContext::new().with_cookie("SESSIONID", "xyz");

        let profile = client
            .authenticate(&ctx, &MockSessionStore::new())
            .await
            .unwrap()
            .into_result()
            .unwrap()
            .unwrap();
        assert_eq!(profile.id(), "xyz");
        assert_eq!(profile.client_name(), Some("cookie"));
        assert_eq!(profile.roles().iter().cloned().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_generator_error_stops_chain() {
        let client = ClientBuilder::direct("cookie")
            .extractor(CookieExtractor::new("SESSIONID"))
            .authenticator(AcceptAll)
            .authorization_generator(
                |_: &dyn WebContext, _: &dyn SessionStore, _: &mut UserProfile| -> AuthResult<()> {
                    Err(AuthError::Technical("directory down".to_string()))
                },
            )
            .build();
        let ctx = MockWebContext::new().with_cookie("SESSIONID", "xyz");

        let result = client.authenticate(&ctx, &MockSessionStore::new()).await;
        assert!(matches!(result, Err(AuthError::Technical(_))));
    }

    #[test]
    fn test_forced_reinit_swaps_configuration() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let client = ClientBuilder::direct("basic")
            .setup(move |_: &str, config: &mut ClientConfig| -> AuthResult<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                config.set_extractor_if_undefined(BasicAuthExtractor::default());
                Ok(())
            })
            .build();

        client.init(false).unwrap();
        client.init(false).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        client.reconfigure(|config| config.callback_url = Some("/cb".to_string()));
        assert_eq!(
            client.compute_callback_url(&MockWebContext::new()).unwrap_err(),
            AuthError::Configuration("callback_url cannot be null".to_string())
        );

        client.init(true).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(
            client.compute_callback_url(&MockWebContext::new()).unwrap(),
            "http://localhost:8080/cb?client_name=basic"
        );
    }

    #[test]
    fn test_callback_matching_follows_initialized_configuration() {
        let client = indirect(AcceptAll);
        let issued = client.compute_callback_url(&MockWebContext::new()).unwrap();
        assert_eq!(issued, "http://localhost:8080/callback?client_name=form");

        // Not applied until the next forced init
        client.reconfigure(|config| config.callback_url_resolver = CallbackUrlResolver::PathParameter);
        let query_callback = MockWebContext::new()
            .with_path("/callback")
            .with_parameter("client_name", "form");
        assert!(client.matches_callback(&query_callback));
        assert_eq!(
            client.compute_callback_url(&MockWebContext::new()).unwrap(),
            issued
        );

        client.init(true).unwrap();
        assert!(!client.matches_callback(&query_callback));
        assert!(client.matches_callback(&MockWebContext::new().with_path("/callback/form")));
        assert_eq!(
            client.compute_callback_url(&MockWebContext::new()).unwrap(),
            "http://localhost:8080/callback/form"
        );
    }

    #[test]
    fn test_misconfigured_client_matches_no_callback() {
        let client = ClientBuilder::indirect("form")
            .redirection_action_builder(CallbackRedirectionActionBuilder)
            .build();
        let ctx = MockWebContext::new().with_parameter("client_name", "form");
        assert!(!client.matches_callback(&ctx));
    }

    #[tokio::test]
    async fn test_logout_action() {
        let client = ClientBuilder::direct("basic").build();
        let ctx = MockWebContext::new();
        let session = MockSessionStore::new();
        let profile = UserProfile::new("jle");
        assert!(client
            .get_logout_action(&ctx, &session, &profile, None)
            .unwrap()
            .is_none());

        client.reconfigure(|config| {
            config.set_logout_action_builder_if_undefined(
                RedirectLogoutActionBuilder::new("https://idp/logout").target_parameter("service"),
            )
        });
        client.init(true).unwrap();
        let action = client
            .get_logout_action(&ctx, &session, &profile, Some("https://app/bye"))
            .unwrap()
            .unwrap();
        assert_eq!(
            action.location(),
            Some("https://idp/logout?service=https%3A%2F%2Fapp%2Fbye")
        );
    }
}
