//! Direct HTTP clients
//!
//! Each preset is a configuration struct. It acts as the [`ClientSetup`] of
//! the client it builds, so its extractor is installed on every
//! (re-)initialization unless the caller configured another one.

use keyway_core::context::{AUTHORIZATION_HEADER, BASIC_HEADER_PREFIX, BEARER_HEADER_PREFIX};
use keyway_core::util::assert_not_blank;
use keyway_core::{
    AuthError, AuthResult, Authenticator, BasicAuthExtractor, Client, ClientBuilder, ClientConfig,
    ClientSetup, CookieExtractor, HeaderExtractor, ParameterExtractor,
};
use serde::{Deserialize, Serialize};

/// HTTP basic auth on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectBasicAuthClient {
    /// Client name
    pub name: String,
    /// Header carrying the credentials
    pub header_name: String,
    /// Scheme prefix of the header value
    pub prefix_header: String,
}

impl Default for DirectBasicAuthClient {
    fn default() -> Self {
        Self {
            name: "DirectBasicAuthClient".to_string(),
            header_name: AUTHORIZATION_HEADER.to_string(),
            prefix_header: BASIC_HEADER_PREFIX.to_string(),
        }
    }
}

impl DirectBasicAuthClient {
    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for DirectBasicAuthClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("header_name", Some(&self.header_name))?;
        assert_not_blank("prefix_header", Some(&self.prefix_header))?;
        config.set_extractor_if_undefined(BasicAuthExtractor::new(
            self.header_name.as_str(),
            self.prefix_header.as_str(),
        ));
        Ok(())
    }
}

/// `Authorization: Bearer <token>` on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectBearerAuthClient {
    /// Client name
    pub name: String,
}

impl Default for DirectBearerAuthClient {
    fn default() -> Self {
        Self {
            name: "DirectBearerAuthClient".to_string(),
        }
    }
}

impl DirectBearerAuthClient {
    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for DirectBearerAuthClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        config.set_extractor_if_undefined(
            HeaderExtractor::new(AUTHORIZATION_HEADER, BEARER_HEADER_PREFIX).trim_value(true),
        );
        Ok(())
    }
}

/// Token read from an arbitrary header, e.g. `X-API-Key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderClient {
    /// Client name
    pub name: String,
    /// Header carrying the token
    pub header_name: String,
    /// Prefix stripped from the value, may be empty
    #[serde(default)]
    pub prefix_header: String,
}

impl HeaderClient {
    /// Read the token from `header_name` after `prefix_header`.
    pub fn new(header_name: impl Into<String>, prefix_header: impl Into<String>) -> Self {
        Self {
            name: "HeaderClient".to_string(),
            header_name: header_name.into(),
            prefix_header: prefix_header.into(),
        }
    }

    /// Rename the client.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for HeaderClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("header_name", Some(&self.header_name))?;
        config.set_extractor_if_undefined(HeaderExtractor::new(
            self.header_name.as_str(),
            self.prefix_header.as_str(),
        ));
        Ok(())
    }
}

/// Token read from a request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterClient {
    /// Client name
    pub name: String,
    /// Parameter carrying the token
    pub parameter_name: String,
    /// Accept GET requests
    #[serde(default)]
    pub support_get_request: bool,
    /// Accept POST requests
    #[serde(default = "default_true")]
    pub support_post_request: bool,
}

fn default_true() -> bool {
    true
}

impl ParameterClient {
    /// Read the token from `parameter_name`, POST only.
    pub fn new(parameter_name: impl Into<String>) -> Self {
        Self {
            name: "ParameterClient".to_string(),
            parameter_name: parameter_name.into(),
            support_get_request: false,
            support_post_request: true,
        }
    }

    /// Rename the client.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Accept or refuse GET requests.
    pub fn support_get_request(mut self, support: bool) -> Self {
        self.support_get_request = support;
        self
    }

    /// Accept or refuse POST requests.
    pub fn support_post_request(mut self, support: bool) -> Self {
        self.support_post_request = support;
        self
    }

    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for ParameterClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("parameter_name", Some(&self.parameter_name))?;
        if !self.support_get_request && !self.support_post_request {
            return Err(AuthError::Configuration(
                "parameter client must support GET or POST".to_string(),
            ));
        }
        config.set_extractor_if_undefined(
            ParameterExtractor::new(self.parameter_name.as_str())
                .support_get_request(self.support_get_request)
                .support_post_request(self.support_post_request),
        );
        Ok(())
    }
}

/// Token read from a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieClient {
    /// Client name
    pub name: String,
    /// Cookie carrying the token
    pub cookie_name: String,
}

impl CookieClient {
    /// Read the token from `cookie_name`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            name: "CookieClient".to_string(),
            cookie_name: cookie_name.into(),
        }
    }

    /// Rename the client.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client around `authenticator`.
    pub fn build(self, authenticator: impl Authenticator + 'static) -> Client {
        self.builder().authenticator(authenticator).build()
    }
}

impl ClientSetup for CookieClient {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        assert_not_blank("cookie_name", Some(&self.cookie_name))?;
        config.set_extractor_if_undefined(CookieExtractor::new(self.cookie_name.as_str()));
        Ok(())
    }
}
