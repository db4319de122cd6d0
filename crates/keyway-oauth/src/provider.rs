//! OAuth 2.0 providers and the SDK boundary
//!
//! Token exchange and user info retrieval are delegated to an
//! [`OAuthProviderClient`] implementation; this crate only drives the
//! redirect round trip and turns the result into a profile.

use crate::state::OAuthState;
use async_trait::async_trait;
use keyway_core::profile::{DISPLAY_NAME, EMAIL};
use keyway_core::{AuthError, AuthResult, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Profile attribute holding the access token.
pub const ACCESS_TOKEN: &str = "access_token";

/// Profile attribute holding the refresh token.
pub const REFRESH_TOKEN: &str = "refresh_token";

/// Well-known OAuth providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    /// Google
    Google,
    /// GitHub
    GitHub,
    /// Microsoft identity platform
    Microsoft,
    /// Any other provider; endpoints must be configured
    Custom,
}

impl OAuthProvider {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
            OAuthProvider::Microsoft => "microsoft",
            OAuthProvider::Custom => "custom",
        }
    }

    /// Parse a provider name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::GitHub),
            "microsoft" | "azure" | "azuread" => Some(OAuthProvider::Microsoft),
            "custom" => Some(OAuthProvider::Custom),
            _ => None,
        }
    }

    /// Default authorization endpoint.
    pub fn auth_url(&self) -> Option<&'static str> {
        match self {
            OAuthProvider::Google => Some("https://accounts.google.com/o/oauth2/v2/auth"),
            OAuthProvider::GitHub => Some("https://github.com/login/oauth/authorize"),
            OAuthProvider::Microsoft => {
                Some("https://login.microsoftonline.com/common/oauth2/v2.0/authorize")
            }
            OAuthProvider::Custom => None,
        }
    }

    /// Default token endpoint.
    pub fn token_url(&self) -> Option<&'static str> {
        match self {
            OAuthProvider::Google => Some("https://oauth2.googleapis.com/token"),
            OAuthProvider::GitHub => Some("https://github.com/login/oauth/access_token"),
            OAuthProvider::Microsoft => {
                Some("https://login.microsoftonline.com/common/oauth2/v2.0/token")
            }
            OAuthProvider::Custom => None,
        }
    }

    /// Default scopes.
    pub fn default_scopes(&self) -> Vec<&'static str> {
        match self {
            OAuthProvider::Google => vec!["openid", "email", "profile"],
            OAuthProvider::GitHub => vec!["user:email", "read:user"],
            OAuthProvider::Microsoft => vec!["openid", "email", "profile", "User.Read"],
            OAuthProvider::Custom => vec![],
        }
    }
}

/// OAuth 2.0 client registration at a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Provider type
    pub provider: OAuthProvider,

    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Authorization endpoint (defaults to the provider's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Token endpoint (defaults to the provider's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// Scopes to request
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Extra authorization request parameters
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,

    /// Send a PKCE (S256) challenge
    #[serde(default)]
    pub use_pkce: bool,
}

impl OAuthConfig {
    /// Register `client_id` at `provider` with its default scopes.
    pub fn new(
        provider: OAuthProvider,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: None,
            token_url: None,
            scopes: provider
                .default_scopes()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_params: BTreeMap::new(),
            use_pkce: false,
        }
    }

    /// Send a PKCE challenge.
    pub fn with_pkce(mut self) -> Self {
        self.use_pkce = true;
        self
    }

    /// Authorization endpoint.
    pub fn get_auth_url(&self) -> AuthResult<String> {
        self.auth_url
            .clone()
            .or_else(|| self.provider.auth_url().map(String::from))
            .ok_or_else(|| AuthError::Configuration("auth_url cannot be blank".to_string()))
    }

    /// Token endpoint.
    pub fn get_token_url(&self) -> AuthResult<String> {
        self.token_url
            .clone()
            .or_else(|| self.provider.token_url().map(String::from))
            .ok_or_else(|| AuthError::Configuration("token_url cannot be blank".to_string()))
    }
}

/// User information returned by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    /// Provider-specific user ID
    pub provider_id: String,

    /// Email address
    pub email: Option<String>,

    /// Whether the email is verified
    #[serde(default)]
    pub email_verified: bool,

    /// Display name
    pub name: Option<String>,

    /// First name
    pub given_name: Option<String>,

    /// Last name
    pub family_name: Option<String>,

    /// Profile picture URL
    pub picture: Option<String>,

    /// Locale
    pub locale: Option<String>,

    /// Raw provider response
    #[serde(default)]
    pub raw: HashMap<String, serde_json::Value>,
}

impl OAuthUserInfo {
    /// Build the profile; the provider ID is the profile id.
    pub fn to_profile(&self) -> AuthResult<UserProfile> {
        if self.provider_id.is_empty() {
            return Err(AuthError::Technical("User info has no identifier".to_string()));
        }
        let mut profile = UserProfile::new(self.provider_id.as_str());
        for (name, value) in &self.raw {
            profile.add_attribute(name.as_str(), value.clone());
        }
        let known = [
            (EMAIL, &self.email),
            (DISPLAY_NAME, &self.name),
            ("given_name", &self.given_name),
            ("family_name", &self.family_name),
            ("picture", &self.picture),
            ("locale", &self.locale),
        ];
        for (name, value) in known {
            if let Some(value) = value {
                profile.add_attribute(name, value.as_str());
            }
        }
        if self.email.is_some() {
            profile.add_attribute("email_verified", self.email_verified);
        }
        Ok(profile)
    }
}

/// Token response of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Expires in seconds
    pub expires_in: Option<i64>,

    /// Refresh token
    pub refresh_token: Option<String>,

    /// ID token (OpenID Connect)
    pub id_token: Option<String>,

    /// Granted scopes
    pub scope: Option<String>,
}

impl OAuthTokens {
    /// Bearer token response carrying only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_in: None,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }
}

/// Provider SDK boundary of the OAuth 2.0 client.
#[async_trait]
pub trait OAuthProviderClient: Send + Sync {
    /// Exchange an authorization code for tokens.
    ///
    /// `state` is the one stored when the redirect started; it carries the
    /// PKCE verifier and the callback URL sent as `redirect_uri`.
    async fn exchange_code(&self, code: &str, state: &OAuthState) -> AuthResult<OAuthTokens>;

    /// Get user info with an access token.
    async fn get_user_info(&self, access_token: &str) -> AuthResult<OAuthUserInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(OAuthProvider::parse("GitHub"), Some(OAuthProvider::GitHub));
        assert_eq!(OAuthProvider::parse("azure"), Some(OAuthProvider::Microsoft));
        assert_eq!(OAuthProvider::parse("invalid"), None);
    }

    #[test]
    fn test_custom_provider_needs_endpoints() {
        let config = OAuthConfig::new(OAuthProvider::Custom, "id", "secret");
        assert!(config.scopes.is_empty());
        assert_eq!(
            config.get_auth_url().unwrap_err(),
            AuthError::Configuration("auth_url cannot be blank".to_string())
        );

        let google = OAuthConfig::new(OAuthProvider::Google, "id", "secret");
        assert!(google.get_token_url().is_ok());
    }

    #[test]
    fn test_user_info_to_profile() {
        let mut info = OAuthUserInfo {
            provider_id: "1234".to_string(),
            email: Some("jle@example.com".to_string()),
            email_verified: true,
            name: Some("J. Le".to_string()),
            ..Default::default()
        };
        info.raw.insert("login".to_string(), serde_json::json!("jle"));

        let profile = info.to_profile().unwrap();
        assert_eq!(profile.id(), "1234");
        assert_eq!(profile.email(), Some("jle@example.com"));
        assert_eq!(profile.display_name(), Some("J. Le"));
        assert_eq!(profile.attribute("login"), Some(&serde_json::json!("jle")));

        assert!(OAuthUserInfo::default().to_profile().is_err());
    }
}
