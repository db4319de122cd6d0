//! OpenID Connect client
//!
//! Same redirect round trip as the OAuth 2.0 client, plus a nonce bound to
//! the ID token. Token exchange and ID token validation are delegated to an
//! [`OidcProviderClient`].

use crate::provider::{OAuthTokens, ACCESS_TOKEN, REFRESH_TOKEN};
use crate::state::{login_cancelled, verify_state, AuthorizationRequest, OAuthState};
use async_trait::async_trait;
use keyway_core::client::STATE_SESSION_SUFFIX;
use keyway_core::profile::{DISPLAY_NAME, USERNAME};
use keyway_core::util::{add_parameter, assert_not_blank};
use keyway_core::{
    AuthError, AuthResult, Authenticator, Client, ClientBuilder, ClientConfig, ClientSetup,
    ClientView, Credentials, CredentialsExtractor, CredentialsKind, HttpAction,
    LogoutActionBuilder, RedirectionActionBuilder, SessionStore, UserProfile, WebContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Profile attribute holding the raw ID token.
pub const ID_TOKEN: &str = "id_token";

/// OpenID Connect relying party configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Authorization endpoint
    pub authorization_endpoint: String,

    /// Token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// RP-initiated logout endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Requested scopes
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Verify the returned `state` against the stored one
    #[serde(default = "default_true")]
    pub with_state: bool,

    /// Bind the ID token to a nonce
    #[serde(default = "default_true")]
    pub use_nonce: bool,

    /// Send a PKCE (S256) challenge
    #[serde(default)]
    pub use_pkce: bool,

    /// Extra authorization request parameters
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email"].map(String::from).to_vec()
}

fn default_true() -> bool {
    true
}

impl OidcConfig {
    /// Configuration with default scopes, state and nonce checks.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: None,
            end_session_endpoint: None,
            scopes: default_scopes(),
            with_state: true,
            use_nonce: true,
            use_pkce: false,
            extra_params: BTreeMap::new(),
        }
    }

    /// Set the token endpoint.
    pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = Some(url.into());
        self
    }

    /// Set the logout endpoint.
    pub fn end_session_endpoint(mut self, url: impl Into<String>) -> Self {
        self.end_session_endpoint = Some(url.into());
        self
    }
}

/// Provider SDK boundary of the OpenID Connect client.
#[async_trait]
pub trait OidcProviderClient: Send + Sync {
    /// Exchange an authorization code at the token endpoint.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> AuthResult<OAuthTokens>;

    /// Verify an ID token (signature, issuer, audience, expiry, nonce) and
    /// return its claims.
    async fn validate_id_token(&self, id_token: &str, nonce: Option<&str>)
        -> AuthResult<Map<String, Value>>;

    /// Claims of the userinfo endpoint, merged under the ID token claims.
    async fn user_info(&self, _access_token: &str) -> AuthResult<Option<Map<String, Value>>> {
        Ok(None)
    }
}

/// Redirects to the authorization endpoint with state, nonce and PKCE
/// challenge.
#[derive(Debug, Clone)]
pub struct OidcRedirectionActionBuilder {
    config: OidcConfig,
}

impl OidcRedirectionActionBuilder {
    /// Create a builder for `config`.
    pub fn new(config: OidcConfig) -> Self {
        Self { config }
    }
}

impl RedirectionActionBuilder for OidcRedirectionActionBuilder {
    fn redirection_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>> {
        let mut state = if self.config.use_pkce {
            OAuthState::with_pkce()
        } else {
            OAuthState::new()
        }
        .callback_url(client.compute_callback_url(ctx)?);
        if self.config.use_nonce {
            state = state.with_nonce();
        }

        let url = AuthorizationRequest {
            client_id: &self.config.client_id,
            auth_url: &self.config.authorization_endpoint,
            scopes: &self.config.scopes,
            extra_params: &self.config.extra_params,
        }
        .url(&state)?;

        state.save(ctx, session, &client.state_session_key())?;
        debug!(client = %client.name(), "Redirecting to OpenID provider");
        Ok(Some(HttpAction::redirect(ctx, url)))
    }
}

/// Reads an authentication response: a code, an ID token and an access
/// token, any of which may be absent depending on the flow.
#[derive(Debug, Clone)]
pub struct OidcExtractor {
    state_key: String,
    with_state: bool,
}

impl OidcExtractor {
    /// Check the state stored under `state_key` when `with_state` is set.
    pub fn new(state_key: impl Into<String>, with_state: bool) -> Self {
        Self {
            state_key: state_key.into(),
            with_state,
        }
    }
}

impl CredentialsExtractor for OidcExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        if login_cancelled(ctx)? {
            debug!("Login cancelled at the provider");
            return Ok(None);
        }
        let parameter = |name: &str| ctx.request_parameter(name).filter(|v| !v.is_empty());
        let code = parameter("code");
        let id_token = parameter("id_token");
        let access_token = parameter("access_token");
        if code.is_none() && id_token.is_none() && access_token.is_none() {
            return Err(AuthError::Credentials(
                "No authentication response parameter".to_string(),
            ));
        }
        if self.with_state {
            verify_state(ctx, session, &self.state_key)?;
        }

        Ok(Some(Credentials::new(CredentialsKind::Oidc {
            code,
            id_token,
            access_token,
        })))
    }
}

/// Completes the authentication response and builds the profile from the ID
/// token claims.
///
/// `sub` becomes the profile id. `name` and `preferred_username` also fill
/// the display name and username.
///
/// With `use_nonce`, the ID token must carry the nonce stored with the state
/// of the login it answers. A response with no stored nonce is rejected.
pub struct OidcAuthenticator {
    state_key: String,
    use_nonce: bool,
    provider: Arc<dyn OidcProviderClient>,
}

impl std::fmt::Debug for OidcAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcAuthenticator")
            .field("state_key", &self.state_key)
            .field("use_nonce", &self.use_nonce)
            .finish_non_exhaustive()
    }
}

impl OidcAuthenticator {
    /// Consume the state stored under `state_key` and call `provider`.
    pub fn new(
        state_key: impl Into<String>,
        use_nonce: bool,
        provider: Arc<dyn OidcProviderClient>,
    ) -> Self {
        Self {
            state_key: state_key.into(),
            use_nonce,
            provider,
        }
    }
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let CredentialsKind::Oidc {
            code,
            id_token,
            access_token,
        } = credentials.kind().clone()
        else {
            return Err(AuthError::Credentials("Unsupported credentials type".to_string()));
        };
        let state = OAuthState::take(ctx, session, &self.state_key);
        let state = state.as_ref();
        let nonce = if self.use_nonce {
            let nonce = state.and_then(|s| s.nonce.as_deref()).ok_or_else(|| {
                AuthError::Credentials("No nonce stored for this login".to_string())
            })?;
            Some(nonce)
        } else {
            None
        };

        let mut id_token = id_token;
        let mut access_token = access_token;
        let mut refresh_token = None;
        if let Some(code) = code {
            let tokens = self
                .provider
                .exchange_code(
                    &code,
                    state.and_then(|s| s.code_verifier.as_deref()),
                    state.and_then(|s| s.callback_url.as_deref()),
                )
                .await?;
            id_token = tokens.id_token.or(id_token);
            access_token = Some(tokens.access_token);
            refresh_token = tokens.refresh_token;
        }

        let id_token =
            id_token.ok_or_else(|| AuthError::Credentials("No ID token".to_string()))?;
        let claims = self.provider.validate_id_token(&id_token, nonce).await?;
        if let Some(expected) = nonce {
            if claims.get("nonce").and_then(Value::as_str) != Some(expected) {
                return Err(AuthError::Credentials("ID token nonce mismatch".to_string()));
            }
        }

        let mut profile = profile_from_claims(claims)?;
        if let Some(access_token) = &access_token {
            if let Some(extra) = self.provider.user_info(access_token).await? {
                for (name, value) in extra {
                    if name != "sub" && profile.attribute(&name).is_none() {
                        profile.add_attribute(name, value);
                    }
                }
            }
            profile.add_attribute(ACCESS_TOKEN, access_token.as_str());
        }
        if let Some(refresh_token) = refresh_token {
            profile.add_attribute(REFRESH_TOKEN, refresh_token);
        }
        profile.add_attribute(ID_TOKEN, id_token);

        info!(id = %profile.id(), "OpenID Connect login");
        credentials.attach_profile(profile);
        Ok(())
    }
}

fn profile_from_claims(mut claims: Map<String, Value>) -> AuthResult<UserProfile> {
    let subject = match claims.remove("sub") {
        Some(Value::String(sub)) if !sub.is_empty() => sub,
        _ => return Err(AuthError::Technical("ID token has no subject".to_string())),
    };
    let mut profile = UserProfile::new(subject);
    if let Some(name) = claims.get("name").and_then(Value::as_str) {
        profile.add_attribute(DISPLAY_NAME, name);
    }
    if let Some(username) = claims.get("preferred_username").and_then(Value::as_str) {
        profile.add_attribute(USERNAME, username);
    }
    for (name, value) in claims {
        profile.add_attribute(name, value);
    }
    Ok(profile)
}

/// RP-initiated logout at the provider's end session endpoint.
#[derive(Debug, Clone)]
pub struct OidcLogoutActionBuilder {
    end_session_endpoint: String,
}

impl OidcLogoutActionBuilder {
    /// Redirect to `end_session_endpoint`.
    pub fn new(end_session_endpoint: impl Into<String>) -> Self {
        Self {
            end_session_endpoint: end_session_endpoint.into(),
        }
    }
}

impl LogoutActionBuilder for OidcLogoutActionBuilder {
    fn logout_action(
        &self,
        _client: &ClientView<'_>,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
        profile: &UserProfile,
        target_url: Option<&str>,
    ) -> AuthResult<Option<HttpAction>> {
        let mut location = self.end_session_endpoint.clone();
        if let Some(id_token) = profile.attribute(ID_TOKEN).and_then(Value::as_str) {
            location = add_parameter(&location, "id_token_hint", id_token);
        }
        if let Some(target) = target_url {
            location = add_parameter(&location, "post_logout_redirect_uri", target);
        }
        Ok(Some(HttpAction::redirect(ctx, location)))
    }
}

/// OpenID Connect client preset.
#[derive(Clone)]
pub struct OidcClient {
    name: String,
    config: OidcConfig,
    callback_url: Option<String>,
    provider: Arc<dyn OidcProviderClient>,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("name", &self.name)
            .field("client_id", &self.config.client_id)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Client named `OidcClient`.
    pub fn new(config: OidcConfig, provider: Arc<dyn OidcProviderClient>) -> Self {
        Self {
            name: "OidcClient".to_string(),
            config,
            callback_url: None,
            provider,
        }
    }

    /// Rename the client.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the callback URL.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        let mut builder = ClientBuilder::indirect(self.name.clone());
        if let Some(url) = &self.callback_url {
            builder = builder.callback_url(url.as_str());
        }
        builder.setup(self)
    }

    /// Build the client.
    pub fn build(self) -> Client {
        self.builder().build()
    }
}

impl ClientSetup for OidcClient {
    fn configure(&self, client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("client_id", Some(&self.config.client_id))?;
        assert_not_blank(
            "authorization_endpoint",
            Some(&self.config.authorization_endpoint),
        )?;

        let state_key = format!("{client_name}{STATE_SESSION_SUFFIX}");
        config.set_extractor_if_undefined(OidcExtractor::new(state_key.as_str(), self.config.with_state));
        config.set_authenticator_if_undefined(OidcAuthenticator::new(
            state_key,
            self.config.use_nonce,
            self.provider.clone(),
        ));
        config.set_redirection_action_builder_if_undefined(OidcRedirectionActionBuilder::new(
            self.config.clone(),
        ));
        if let Some(endpoint) = &self.config.end_session_endpoint {
            config.set_logout_action_builder_if_undefined(OidcLogoutActionBuilder::new(endpoint.as_str()));
        }
        Ok(())
    }
}
