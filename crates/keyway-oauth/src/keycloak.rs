//! Keycloak preset
//!
//! A Keycloak realm is an OpenID provider whose endpoints derive from the
//! server URL and the realm name. Roles are carried in the access token.

use crate::oidc::{OidcClient, OidcConfig, OidcProviderClient};
use crate::provider::ACCESS_TOKEN;
use base64::Engine;
use keyway_core::{
    AuthResult, AuthorizationGenerator, Client, ClientBuilder, SessionStore, UserProfile,
    WebContext,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Keycloak realm and client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Server URL, e.g. `https://sso.example.com`
    pub base_uri: String,
    /// Realm name
    pub realm: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl KeycloakConfig {
    /// Describe `client_id` in `realm` of the server at `base_uri`.
    pub fn new(
        base_uri: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_uri: base_uri.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{name}",
            self.base_uri.trim_end_matches('/'),
            self.realm
        )
    }

    /// OpenID Connect configuration of the realm.
    pub fn to_oidc_config(&self) -> OidcConfig {
        OidcConfig::new(
            self.client_id.as_str(),
            self.client_secret.as_str(),
            self.endpoint("auth"),
        )
        .token_endpoint(self.endpoint("token"))
        .end_session_endpoint(self.endpoint("logout"))
    }
}

/// Adds the realm roles and the client roles found in the access token.
///
/// Reads `realm_access.roles` and `resource_access.<client_id>.roles` from
/// the unverified payload of the `access_token` attribute. The token was
/// obtained from the token endpoint over the back channel.
#[derive(Debug, Clone)]
pub struct KeycloakRolesAuthorizationGenerator {
    client_id: String,
}

impl KeycloakRolesAuthorizationGenerator {
    /// Read client roles of `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

fn token_payload(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn roles_in(access: Option<&Value>) -> impl Iterator<Item = &str> {
    access
        .and_then(|access| access.get("roles"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

impl AuthorizationGenerator for KeycloakRolesAuthorizationGenerator {
    fn generate(
        &self,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
        profile: &mut UserProfile,
    ) -> AuthResult<()> {
        let Some(token) = profile.attribute(ACCESS_TOKEN).and_then(Value::as_str) else {
            debug!(id = %profile.id(), "No access token, no Keycloak roles");
            return Ok(());
        };
        let Some(payload) = token_payload(token) else {
            warn!(id = %profile.id(), "Cannot decode access token, no Keycloak roles");
            return Ok(());
        };

        let client_access = payload
            .get("resource_access")
            .and_then(|resources| resources.get(self.client_id.as_str()));
        let roles: Vec<String> = roles_in(payload.get("realm_access"))
            .chain(roles_in(client_access))
            .map(String::from)
            .collect();
        profile.add_roles(roles);
        Ok(())
    }
}

/// Keycloak client preset: an OpenID Connect client of the realm plus the
/// role generator.
#[derive(Clone)]
pub struct KeycloakClient {
    name: String,
    config: KeycloakConfig,
    callback_url: Option<String>,
    provider: Arc<dyn OidcProviderClient>,
}

impl std::fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("name", &self.name)
            .field("realm", &self.config.realm)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

impl KeycloakClient {
    /// Client named `KeycloakClient`.
    pub fn new(config: KeycloakConfig, provider: Arc<dyn OidcProviderClient>) -> Self {
        Self {
            name: "KeycloakClient".to_string(),
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

    /// Start a client builder with the realm's OpenID Connect preset and the
    /// role generator installed.
    pub fn builder(self) -> ClientBuilder {
        let mut oidc = OidcClient::new(self.config.to_oidc_config(), self.provider).named(self.name);
        if let Some(url) = self.callback_url {
            oidc = oidc.callback_url(url);
        }
        oidc.builder()
            .authorization_generator(KeycloakRolesAuthorizationGenerator::new(self.config.client_id))
    }

    /// Build the client.
    pub fn build(self) -> Client {
        self.builder().build()
    }
}
