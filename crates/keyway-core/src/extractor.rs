//! Credentials extractors
//!
//! An extractor pulls raw credentials out of a request. Absence of
//! credentials is `Ok(None)`, never an error; syntactically broken material
//! is an [`AuthError::Credentials`]. Extractors never write to the response.

use crate::context::{SessionStore, WebContext, AUTHORIZATION_HEADER, BASIC_HEADER_PREFIX};
use crate::credentials::Credentials;
use crate::error::{AuthError, AuthResult};
use base64::Engine;
use std::sync::Arc;
use tracing::debug;

/// Pulls credentials out of a request.
pub trait CredentialsExtractor: Send + Sync {
    /// Extract credentials, or `None` when the request carries none.
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>>;
}

impl<F> CredentialsExtractor for F
where
    F: Fn(&dyn WebContext, &dyn SessionStore) -> AuthResult<Option<Credentials>> + Send + Sync,
{
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        self(ctx, session)
    }
}

/// Reads a `<prefix><token>` header value.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    header_name: String,
    prefix_header: String,
    trim_value: bool,
}

impl HeaderExtractor {
    /// Extract the value of `header_name` after `prefix_header`.
    ///
    /// The prefix comparison ignores ASCII case; an empty prefix accepts any
    /// value.
    pub fn new(header_name: impl Into<String>, prefix_header: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            prefix_header: prefix_header.into(),
            trim_value: false,
        }
    }

    /// Trim whitespace around the extracted token.
    pub fn trim_value(mut self, trim: bool) -> Self {
        self.trim_value = trim;
        self
    }

    /// Name of the header read.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl CredentialsExtractor for HeaderExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        let Some(header) = ctx.request_header(&self.header_name) else {
            return Ok(None);
        };

        let prefix_len = self.prefix_header.len();
        let matches_prefix = header
            .get(..prefix_len)
            .is_some_and(|p| p.eq_ignore_ascii_case(&self.prefix_header));
        if !matches_prefix {
            debug!(header = %self.header_name, "Wrong prefix for header");
            return Ok(None);
        }

        let token = &header[prefix_len..];
        let token = if self.trim_value { token.trim() } else { token };
        Ok(Some(Credentials::token(token)))
    }
}

/// Decodes an HTTP basic `Authorization` header into username/password.
#[derive(Debug, Clone)]
pub struct BasicAuthExtractor {
    extractor: HeaderExtractor,
}

impl Default for BasicAuthExtractor {
    fn default() -> Self {
        Self::new(AUTHORIZATION_HEADER, BASIC_HEADER_PREFIX)
    }
}

impl BasicAuthExtractor {
    /// Read basic credentials from a custom header and prefix.
    pub fn new(header_name: impl Into<String>, prefix_header: impl Into<String>) -> Self {
        Self {
            extractor: HeaderExtractor::new(header_name, prefix_header),
        }
    }
}

impl CredentialsExtractor for BasicAuthExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        let Some(credentials) = self.extractor.extract(ctx, session)? else {
            return Ok(None);
        };
        let encoded = credentials.token_value().unwrap_or_default();

        let bad_format = || AuthError::Credentials("Bad format of the basic auth header".to_string());
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| bad_format())?;
        let token = String::from_utf8(decoded).map_err(|_| bad_format())?;

        let (username, password) = token.split_once(':').ok_or_else(bad_format)?;
        Ok(Some(Credentials::username_password(username, password)))
    }
}

/// Reads a token from a query or form parameter.
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    parameter_name: String,
    support_get_request: bool,
    support_post_request: bool,
}

impl ParameterExtractor {
    /// Read `parameter_name` from POST requests only.
    pub fn new(parameter_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            support_get_request: false,
            support_post_request: true,
        }
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
}

impl CredentialsExtractor for ParameterExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        let method = ctx.request_method();
        let refused = (method.eq_ignore_ascii_case("GET") && !self.support_get_request)
            || (method.eq_ignore_ascii_case("POST") && !self.support_post_request);
        if refused {
            debug!(method = %method, parameter = %self.parameter_name, "Request method not supported");
            return Ok(None);
        }

        Ok(ctx
            .request_parameter(&self.parameter_name)
            .map(Credentials::token))
    }
}

/// Reads a token from the first cookie with a given name.
#[derive(Debug, Clone)]
pub struct CookieExtractor {
    cookie_name: String,
}

impl CookieExtractor {
    /// Read the cookie `cookie_name`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl CredentialsExtractor for CookieExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        Ok(ctx
            .request_cookies()
            .into_iter()
            .find(|c| c.name == self.cookie_name)
            .map(|c| Credentials::token(c.value)))
    }
}

/// Takes the first TLS client certificate of the request.
#[derive(Debug, Clone, Default)]
pub struct X509CertificateExtractor;

impl CredentialsExtractor for X509CertificateExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        let certificate = ctx.client_certificates().into_iter().next();
        if let Some(certificate) = &certificate {
            debug!(subject = %certificate.subject_dn, "Client certificate found");
        }
        Ok(certificate.map(Credentials::x509))
    }
}

/// Tries several extractors in registration order; the first hit wins.
#[derive(Clone, Default)]
pub struct CompositeExtractor {
    extractors: Vec<Arc<dyn CredentialsExtractor>>,
}

impl CompositeExtractor {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor.
    pub fn with(mut self, extractor: impl CredentialsExtractor + 'static) -> Self {
        self.extractors.push(Arc::new(extractor));
        self
    }

    /// Append a shared extractor.
    pub fn with_shared(mut self, extractor: Arc<dyn CredentialsExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Number of extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Check if no extractor is registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl std::fmt::Debug for CompositeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeExtractor")
            .field("extractors", &self.extractors.len())
            .finish()
    }
}

impl CredentialsExtractor for CompositeExtractor {
    fn extract(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<Credentials>> {
        for extractor in &self.extractors {
            if let Some(credentials) = extractor.extract(ctx, session)? {
                return Ok(Some(credentials));
            }
        }
        Ok(None)
    }
}
