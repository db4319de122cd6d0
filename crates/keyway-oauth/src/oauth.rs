//! OAuth 2.0 authorization code client
//!
//! The redirect stores an [`OAuthState`] under the client's state session
//! key; the callback checks it, then the [`OAuthProviderClient`] exchanges
//! the code and fetches the user info the profile is built from.

use crate::provider::{OAuthConfig, OAuthProviderClient, ACCESS_TOKEN, REFRESH_TOKEN};
use crate::state::{login_cancelled, verify_state, AuthorizationRequest, OAuthState};
use async_trait::async_trait;
use keyway_core::client::STATE_SESSION_SUFFIX;
use keyway_core::util::assert_not_blank;
use keyway_core::{
    AuthError, AuthResult, Authenticator, Client, ClientBuilder, ClientConfig, ClientSetup,
    ClientView, Credentials, CredentialsExtractor, CredentialsKind, HttpAction,
    RedirectLogoutActionBuilder, RedirectionActionBuilder, SessionStore, WebContext,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Redirects to the provider's authorization endpoint.
#[derive(Debug, Clone)]
pub struct OAuthRedirectionActionBuilder {
    config: OAuthConfig,
}

impl OAuthRedirectionActionBuilder {
    /// Create a builder for `config`.
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }
}

impl RedirectionActionBuilder for OAuthRedirectionActionBuilder {
    fn redirection_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>> {
        let state = if self.config.use_pkce {
            OAuthState::with_pkce()
        } else {
            OAuthState::new()
        }
        .callback_url(client.compute_callback_url(ctx)?);

        let auth_url = self.config.get_auth_url()?;
        let url = AuthorizationRequest {
            client_id: &self.config.client_id,
            auth_url: &auth_url,
            scopes: &self.config.scopes,
            extra_params: &self.config.extra_params,
        }
        .url(&state)?;

        state.save(ctx, session, &client.state_session_key())?;
        debug!(client = %client.name(), "Redirecting to authorization endpoint");
        Ok(Some(HttpAction::redirect(ctx, url)))
    }
}

/// Reads the authorization code returned on the callback.
///
/// A login cancelled at the provider brings back no credentials. A missing
/// code, or a state that does not match the stored one, is a credentials
/// error.
#[derive(Debug, Clone)]
pub struct OAuthCallbackExtractor {
    state_key: String,
}

impl OAuthCallbackExtractor {
    /// Check the state stored under `state_key`.
    pub fn new(state_key: impl Into<String>) -> Self {
        Self {
            state_key: state_key.into(),
        }
    }
}

impl CredentialsExtractor for OAuthCallbackExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        if login_cancelled(ctx)? {
            debug!("Login cancelled at the provider");
            return Ok(None);
        }
        let code = ctx
            .request_parameter("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Credentials("No authorization code".to_string()))?;
        let state = verify_state(ctx, session, &self.state_key)?;

        Ok(Some(Credentials::new(CredentialsKind::OAuth {
            code,
            state: Some(state.state),
        })))
    }
}

/// Exchanges the authorization code and builds the profile from the user
/// info.
pub struct OAuthAuthenticator {
    state_key: String,
    provider: Arc<dyn OAuthProviderClient>,
}

impl std::fmt::Debug for OAuthAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAuthenticator")
            .field("state_key", &self.state_key)
            .finish_non_exhaustive()
    }
}

impl OAuthAuthenticator {
    /// Consume the state stored under `state_key` and call `provider`.
    pub fn new(state_key: impl Into<String>, provider: Arc<dyn OAuthProviderClient>) -> Self {
        Self {
            state_key: state_key.into(),
            provider,
        }
    }
}

#[async_trait]
impl Authenticator for OAuthAuthenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let CredentialsKind::OAuth { code, .. } = credentials.kind() else {
            return Err(AuthError::Credentials("Unsupported credentials type".to_string()));
        };
        let code = code.clone();

        // The state is single use
        let state = OAuthState::take(ctx, session, &self.state_key)
            .ok_or_else(|| AuthError::Credentials("No state in session".to_string()))?;

        let tokens = self.provider.exchange_code(&code, &state).await?;
        let user_info = self.provider.get_user_info(&tokens.access_token).await?;

        let mut profile = user_info.to_profile()?;
        profile.add_attribute(ACCESS_TOKEN, tokens.access_token.as_str());
        if let Some(refresh_token) = &tokens.refresh_token {
            profile.add_attribute(REFRESH_TOKEN, refresh_token.as_str());
        }
        info!(id = %profile.id(), "OAuth login");
        credentials.attach_profile(profile);
        Ok(())
    }
}

/// OAuth 2.0 authorization code client preset.
///
/// ```rust,ignore
/// let client = OAuth20Client::new(
///     OAuthConfig::new(OAuthProvider::GitHub, "id", "secret"),
///     Arc::new(github_sdk),
/// )
/// .callback_url("https://app.example.com/callback")
/// .build();
/// ```
#[derive(Clone)]
pub struct OAuth20Client {
    name: String,
    config: OAuthConfig,
    callback_url: Option<String>,
    logout_url: Option<String>,
    provider: Arc<dyn OAuthProviderClient>,
}

impl std::fmt::Debug for OAuth20Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth20Client")
            .field("name", &self.name)
            .field("provider", &self.config.provider)
            .field("client_id", &self.config.client_id)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

impl OAuth20Client {
    /// Client named after the provider.
    pub fn new(config: OAuthConfig, provider: Arc<dyn OAuthProviderClient>) -> Self {
        Self {
            name: config.provider.as_str().to_string(),
            config,
            callback_url: None,
            logout_url: None,
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

    /// Redirect to the provider's logout URL on logout.
    pub fn logout_url(mut self, url: impl Into<String>) -> Self {
        self.logout_url = Some(url.into());
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

impl ClientSetup for OAuth20Client {
    fn configure(&self, client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("client_id", Some(&self.config.client_id))?;
        assert_not_blank("client_secret", Some(&self.config.client_secret))?;
        self.config.get_auth_url()?;

        let state_key = format!("{client_name}{STATE_SESSION_SUFFIX}");
        config.set_extractor_if_undefined(OAuthCallbackExtractor::new(state_key.as_str()));
        config.set_authenticator_if_undefined(OAuthAuthenticator::new(state_key, self.provider.clone()));
        config.set_redirection_action_builder_if_undefined(OAuthRedirectionActionBuilder::new(
            self.config.clone(),
        ));
        if let Some(logout_url) = &self.logout_url {
            config.set_logout_action_builder_if_undefined(
                RedirectLogoutActionBuilder::new(logout_url.as_str()).target_parameter("redirect_uri"),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{OAuthProvider, OAuthTokens, OAuthUserInfo};
    use keyway_core::mock::{MockSessionStore, MockWebContext};
    use keyway_core::{Outcome, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeGitHub {
        exchanges: AtomicUsize,
    }

    #[async_trait]
    impl OAuthProviderClient for FakeGitHub {
        async fn exchange_code(&self, code: &str, state: &OAuthState) -> AuthResult<OAuthTokens> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if code != "good-code" {
                return Err(AuthError::Credentials("bad_verification_code".to_string()));
            }
            assert!(state.callback_url.is_some());
            Ok(OAuthTokens::bearer("gho_token"))
        }

        async fn get_user_info(&self, access_token: &str) -> AuthResult<OAuthUserInfo> {
            assert_eq!(access_token, "gho_token");
            Ok(OAuthUserInfo {
                provider_id: "583231".to_string(),
                email: Some("octocat@github.com".to_string()),
                name: Some("The Octocat".to_string()),
                ..Default::default()
            })
        }
    }

    fn client(provider: Arc<FakeGitHub>) -> Client {
        OAuth20Client::new(
            OAuthConfig::new(OAuthProvider::GitHub, "my-app", "my-secret").with_pkce(),
            provider,
        )
        .callback_url("https://app.example.com/callback")
        .logout_url("https://github.com/logout")
        .build()
    }

    fn start(client: &Client, session: &MockSessionStore) -> OAuthState {
        let ctx = MockWebContext::new().with_method("GET");
        let action = client.get_redirection_action(&ctx, session).unwrap().unwrap();
        let location = action.location().unwrap().to_string();
        assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(location.contains("code_challenge="));

        let state = OAuthState::load(&ctx, session, "github$stateSessionParameter").unwrap();
        assert!(location.contains(&format!("state={}", state.state)));
        assert_eq!(
            state.callback_url.as_deref(),
            Some("https://app.example.com/callback?client_name=github")
        );
        state
    }

    #[tokio::test]
    async fn test_round_trip() {
        let provider = Arc::new(FakeGitHub::default());
        let client = client(provider.clone());
        let session = MockSessionStore::new();
        let state = start(&client, &session);

        let callback = MockWebContext::new()
            .with_method("GET")
            .with_parameter("code", "good-code")
            .with_parameter("state", state.state.as_str());
        let outcome = client.authenticate(&callback, &session).await.unwrap();
        let Outcome::Continue(Some(profile)) = outcome else {
            panic!("expected a profile");
        };
        assert_eq!(profile.id(), "583231");
        assert_eq!(profile.email(), Some("octocat@github.com"));
        assert_eq!(profile.client_name(), Some("github"));
        assert_eq!(profile.attribute(ACCESS_TOKEN), Some(&serde_json::json!("gho_token")));

        // Replaying the callback finds no state
        let outcome = client.get_credentials(&callback, &session).await.unwrap();
        assert!(outcome.is_action());
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_mismatch_is_challenged() {
        let provider = Arc::new(FakeGitHub::default());
        let client = client(provider.clone());
        let session = MockSessionStore::new();
        start(&client, &session);

        let callback = MockWebContext::new()
            .with_parameter("code", "good-code")
            .with_parameter("state", "forged");
        let outcome = client.get_credentials(&callback, &session).await.unwrap();
        assert_eq!(outcome, Outcome::Action(HttpAction::unauthorized()));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_login_then_401() {
        let client = client(Arc::new(FakeGitHub::default()));
        let session = MockSessionStore::new();
        start(&client, &session);

        let callback = MockWebContext::new().with_parameter("error", "access_denied");
        let outcome = client.get_credentials(&callback, &session).await.unwrap();
        assert_eq!(outcome, Outcome::Continue(None));

        // No redirect loop after a cancelled attempt
        let ctx = MockWebContext::new().with_method("GET");
        let action = client.get_redirection_action(&ctx, &session).unwrap().unwrap();
        assert_eq!(action.code(), 401);
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let client = client(Arc::new(FakeGitHub::default()));
        let session = MockSessionStore::new();
        let state = start(&client, &session);

        let callback = MockWebContext::new()
            .with_parameter("code", "expired-code")
            .with_parameter("state", state.state.as_str());
        let outcome = client.get_credentials(&callback, &session).await.unwrap();
        assert!(outcome.is_action());
    }

    #[test]
    fn test_logout_redirect() {
        let client = client(Arc::new(FakeGitHub::default()));
        let action = client
            .get_logout_action(
                &MockWebContext::new().with_method("GET"),
                &MockSessionStore::new(),
                &UserProfile::new("583231"),
                Some("https://app.example.com/"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            action.location(),
            Some("https://github.com/logout?redirect_uri=https%3A%2F%2Fapp.example.com%2F")
        );
    }

    #[test]
    fn test_custom_provider_requires_endpoint() {
        let client = OAuth20Client::new(
            OAuthConfig::new(OAuthProvider::Custom, "my-app", "my-secret"),
            Arc::new(FakeGitHub::default()),
        )
        .callback_url("/callback")
        .build();
        assert_eq!(
            client.init(false).unwrap_err(),
            AuthError::Configuration("auth_url cannot be blank".to_string())
        );
    }
}
