//! Indirect HTTP basic auth
//!
//! The browser is redirected to the callback URL, which answers with a
//! `WWW-Authenticate` challenge until valid basic credentials come back.

use keyway_core::action::AUTHENTICATE_HEADER;
use keyway_core::util::assert_not_blank;
use keyway_core::{
    AuthError, AuthResult, Authenticator, BasicAuthExtractor, CallbackRedirectionActionBuilder,
    Client, ClientBuilder, ClientConfig, ClientSetup, Credentials, CredentialsExtractor,
    SessionStore, WebContext,
};
use serde::{Deserialize, Serialize};

/// Default realm of the challenge.
pub const DEFAULT_REALM: &str = "authentication required";

/// Basic auth behind a redirect to the callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectBasicAuthClient {
    /// Client name
    pub name: String,
    /// Realm announced in the challenge
    #[serde(default = "default_realm")]
    pub realm_name: String,
    /// Callback URL, shared from the client group when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

fn default_realm() -> String {
    DEFAULT_REALM.to_string()
}

impl Default for IndirectBasicAuthClient {
    fn default() -> Self {
        Self {
            name: "IndirectBasicAuthClient".to_string(),
            realm_name: default_realm(),
            callback_url: None,
        }
    }
}

impl IndirectBasicAuthClient {
    /// Set the realm.
    pub fn realm(mut self, realm_name: impl Into<String>) -> Self {
        self.realm_name = realm_name.into();
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

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for IndirectBasicAuthClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("realm_name", Some(&self.realm_name))?;
        config.set_extractor_if_undefined(ChallengingExtractor(BasicAuthExtractor::default()));
        config.set_redirection_action_builder_if_undefined(CallbackRedirectionActionBuilder);
        if config.challenge_headers.is_empty() {
            config.challenge_headers.push((
                AUTHENTICATE_HEADER.to_string(),
                format!("Basic realm=\"{}\"", self.realm_name),
            ));
        }
        Ok(())
    }
}

/// Missing credentials on the callback are a credentials error, which the
/// indirect client answers with the challenge.
struct ChallengingExtractor(BasicAuthExtractor);

impl CredentialsExtractor for ChallengingExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        match self.0.extract(ctx, session)? {
            Some(credentials) => Ok(Some(credentials)),
            None => Err(AuthError::Credentials(
                "No basic auth credentials".to_string(),
            )),
        }
    }
}
