//! Per-round-trip state kept in the session between the redirect to the
//! provider and the callback.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use keyway_core::util::random_string;
use keyway_core::{AuthError, AuthResult, SessionStore, WebContext};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Lifetime of a stored state.
pub const STATE_TTL_SECS: i64 = 600;

/// CSRF state, PKCE verifier and nonce of one authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    /// Random state echoed by the provider
    pub state: String,

    /// PKCE code verifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,

    /// Callback URL sent as `redirect_uri`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,

    /// OpenID Connect nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Default for OAuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthState {
    /// Fresh state with a 32-character random value.
    pub fn new() -> Self {
        Self {
            state: random_string(32),
            code_verifier: None,
            callback_url: None,
            nonce: None,
            created_at: Utc::now(),
        }
    }

    /// Fresh state carrying a 64-character PKCE verifier.
    pub fn with_pkce() -> Self {
        Self {
            code_verifier: Some(random_string(64)),
            ..Self::new()
        }
    }

    /// Set the callback URL.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Add a random nonce.
    pub fn with_nonce(mut self) -> Self {
        self.nonce = Some(random_string(32));
        self
    }

    /// S256 PKCE challenge of the verifier.
    pub fn code_challenge(&self) -> Option<String> {
        self.code_verifier.as_ref().map(|verifier| {
            let hash = Sha256::digest(verifier.as_bytes());
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
        })
    }

    /// Check if the state is older than [`STATE_TTL_SECS`].
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::seconds(STATE_TTL_SECS)
    }

    /// Store the state under `key`.
    pub fn save(&self, ctx: &dyn WebContext, session: &dyn SessionStore, key: &str) -> AuthResult<()> {
        let value = serde_json::to_value(self)
            .map_err(|e| AuthError::Technical(format!("Cannot serialize state: {e}")))?;
        session.set(ctx, key, Some(value));
        Ok(())
    }

    /// Read the state stored under `key`. A corrupt value reads as absent.
    pub fn load(ctx: &dyn WebContext, session: &dyn SessionStore, key: &str) -> Option<Self> {
        session
            .get(ctx, key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Read and remove the state stored under `key`.
    pub fn take(ctx: &dyn WebContext, session: &dyn SessionStore, key: &str) -> Option<Self> {
        let state = Self::load(ctx, session, key);
        session.set(ctx, key, None);
        state
    }
}

/// Callback parameter carrying the provider error code.
pub const ERROR_PARAMETER: &str = "error";

/// Provider error code of a login cancelled by the user.
pub const ACCESS_DENIED: &str = "access_denied";

/// Inspect the `error` parameter of a callback.
///
/// `Ok(true)` when the user cancelled at the provider, which is not a
/// failure; any other provider error is a credentials error.
pub(crate) fn login_cancelled(ctx: &dyn WebContext) -> AuthResult<bool> {
    match ctx.request_parameter(ERROR_PARAMETER) {
        None => Ok(false),
        Some(error) if error == ACCESS_DENIED => Ok(true),
        Some(error) => {
            let description = ctx
                .request_parameter("error_description")
                .map(|d| format!(": {d}"))
                .unwrap_or_default();
            Err(AuthError::Credentials(format!(
                "Provider returned error {error}{description}"
            )))
        }
    }
}

/// Check the `state` parameter of a callback against the one stored under
/// `key`.
pub(crate) fn verify_state(
    ctx: &dyn WebContext,
    session: &dyn SessionStore,
    key: &str,
) -> AuthResult<OAuthState> {
    let stored = OAuthState::load(ctx, session, key)
        .ok_or_else(|| AuthError::Credentials("No state in session".to_string()))?;
    match ctx.request_parameter("state") {
        Some(returned) if returned == stored.state => {}
        _ => return Err(AuthError::Credentials("State parameter mismatch".to_string())),
    }
    if stored.is_expired() {
        return Err(AuthError::Credentials("State has expired".to_string()));
    }
    Ok(stored)
}

/// Parameters of an authorization code request.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    /// Client ID
    pub client_id: &'a str,
    /// Authorization endpoint
    pub auth_url: &'a str,
    /// Requested scopes
    pub scopes: &'a [String],
    /// Extra query parameters
    pub extra_params: &'a BTreeMap<String, String>,
}

impl AuthorizationRequest<'_> {
    /// Provider URL the browser is redirected to for `state`.
    ///
    /// Carries the state, the callback URL as `redirect_uri`, the S256 PKCE
    /// challenge and the nonce when `state` holds them.
    pub fn url(&self, state: &OAuthState) -> AuthResult<String> {
        let auth_url = AuthUrl::new(self.auth_url.to_string())
            .map_err(|e| AuthError::Configuration(format!("Invalid auth_url: {e}")))?;
        let mut client = BasicClient::new(ClientId::new(self.client_id.to_string()), None, auth_url, None);
        if let Some(callback_url) = &state.callback_url {
            let redirect_url = RedirectUrl::new(callback_url.clone())
                .map_err(|e| AuthError::Configuration(format!("Invalid callback_url: {e}")))?;
            client = client.set_redirect_uri(redirect_url);
        }

        let csrf = state.state.clone();
        let mut request = client.authorize_url(move || CsrfToken::new(csrf));
        for scope in self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        if let Some(challenge) = state.code_challenge() {
            request = request
                .add_extra_param("code_challenge", challenge)
                .add_extra_param("code_challenge_method", "S256");
        }
        if let Some(nonce) = &state.nonce {
            request = request.add_extra_param("nonce", nonce.as_str());
        }
        for (name, value) in self.extra_params {
            request = request.add_extra_param(name.as_str(), value.as_str());
        }

        let (url, _) = request.url();
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::mock::{MockSessionStore, MockWebContext};
    use oauth2::{PkceCodeChallenge, PkceCodeVerifier};

    #[test]
    fn test_code_challenge_is_s256() {
        let state = OAuthState::with_pkce();
        let verifier = state.code_verifier.clone().unwrap();
        assert_eq!(verifier.len(), 64);

        let expected = PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(verifier));
        assert_eq!(state.code_challenge().as_deref(), Some(expected.as_str()));
        assert!(OAuthState::new().code_challenge().is_none());
    }

    #[test]
    fn test_expiry() {
        let mut state = OAuthState::new();
        assert!(!state.is_expired());
        state.created_at = Utc::now() - Duration::seconds(STATE_TTL_SECS + 1);
        assert!(state.is_expired());
    }

    #[test]
    fn test_session_storage() {
        let ctx = MockWebContext::new();
        let session = MockSessionStore::new();
        let state = OAuthState::new().with_nonce();

        state.save(&ctx, &session, "github$stateSessionParameter").unwrap();
        assert_eq!(OAuthState::load(&ctx, &session, "github$stateSessionParameter"), Some(state.clone()));
        assert_eq!(OAuthState::take(&ctx, &session, "github$stateSessionParameter"), Some(state));
        assert!(OAuthState::load(&ctx, &session, "github$stateSessionParameter").is_none());

        session.set(&ctx, "corrupt", Some(serde_json::json!(42)));
        assert!(OAuthState::load(&ctx, &session, "corrupt").is_none());
    }

    #[test]
    fn test_login_cancelled() {
        assert!(!login_cancelled(&MockWebContext::new()).unwrap());
        assert!(login_cancelled(&MockWebContext::new().with_parameter("error", "access_denied")).unwrap());

        let ctx = MockWebContext::new()
            .with_parameter("error", "server_error")
            .with_parameter("error_description", "down");
        assert_eq!(
            login_cancelled(&ctx).unwrap_err(),
            AuthError::Credentials("Provider returned error server_error: down".to_string())
        );
    }

    #[test]
    fn test_verify_state() {
        let session = MockSessionStore::new();
        let state = OAuthState::new();
        let key = "idp$stateSessionParameter";

        let ctx = MockWebContext::new().with_parameter("state", state.state.as_str());
        assert!(matches!(verify_state(&ctx, &session, key), Err(AuthError::Credentials(_))));

        state.save(&ctx, &session, key).unwrap();
        assert_eq!(verify_state(&ctx, &session, key).unwrap(), state);

        let forged = MockWebContext::new().with_parameter("state", "forged");
        assert_eq!(
            verify_state(&forged, &session, key).unwrap_err(),
            AuthError::Credentials("State parameter mismatch".to_string())
        );

        let mut old = state.clone();
        old.created_at = Utc::now() - Duration::seconds(STATE_TTL_SECS + 60);
        old.save(&ctx, &session, key).unwrap();
        assert_eq!(
            verify_state(&ctx, &session, key).unwrap_err(),
            AuthError::Credentials("State has expired".to_string())
        );
    }

    #[test]
    fn test_authorization_url() {
        let scopes = vec!["openid".to_string(), "email".to_string()];
        let mut extra = BTreeMap::new();
        extra.insert("prompt".to_string(), "login".to_string());
        let request = AuthorizationRequest {
            client_id: "my-app",
            auth_url: "https://idp.example.com/authorize",
            scopes: &scopes,
            extra_params: &extra,
        };
        let state = OAuthState::with_pkce()
            .callback_url("https://app.example.com/callback?client_name=idp")
            .with_nonce();

        let url = request.url(&state).unwrap();
        assert!(url.starts_with("https://idp.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=my-app"));
        assert!(url.contains(&format!("state={}", state.state)));
        assert!(url.contains("scope=openid+email"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback%3Fclient_name%3Didp"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("nonce={}", state.nonce.unwrap())));
        assert!(url.contains("prompt=login"));
    }

    #[test]
    fn test_invalid_auth_url() {
        let request = AuthorizationRequest {
            client_id: "my-app",
            auth_url: "not a url",
            scopes: &[],
            extra_params: &BTreeMap::new(),
        };
        assert!(matches!(
            request.url(&OAuthState::new()),
            Err(AuthError::Configuration(_))
        ));
    }
}
