//! Request and session capabilities
//!
//! The pipeline never owns a request or a session. Callers hand in a
//! [`WebContext`] (request reads, response writes) and a [`SessionStore`]
//! (key/value scoped to the caller's session) on every call.

use crate::credentials::X509Certificate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `Authorization` request header.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Prefix of basic authorization header values.
pub const BASIC_HEADER_PREFIX: &str = "Basic ";

/// Prefix of bearer authorization header values.
pub const BEARER_HEADER_PREFIX: &str = "Bearer ";

/// Header set by browsers' XHR helpers.
pub const AJAX_HEADER_NAME: &str = "X-Requested-With";

/// Value of [`AJAX_HEADER_NAME`] for AJAX requests.
pub const AJAX_HEADER_VALUE: &str = "XMLHttpRequest";

/// A request cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly flag
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// Create a cookie with only a name and a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }
}

/// Per-request capability surface.
///
/// Implemented by web-framework adapters. Header lookups are expected to be
/// case-insensitive on the header name.
pub trait WebContext: Send + Sync {
    /// Value of a request header.
    fn request_header(&self, name: &str) -> Option<String>;

    /// All request cookies, in request order.
    fn request_cookies(&self) -> Vec<Cookie>;

    /// First value of a query or form parameter.
    fn request_parameter(&self, name: &str) -> Option<String>;

    /// All query and form parameters.
    fn request_parameters(&self) -> HashMap<String, Vec<String>>;

    /// HTTP method in upper case (`GET`, `POST`, ...).
    fn request_method(&self) -> String;

    /// Request path without query string.
    fn path(&self) -> String;

    /// Scheme, host and port of the server, e.g. `https://app.example.com`.
    fn base_url(&self) -> String;

    /// Full request URL including the query string.
    fn full_request_url(&self) -> String;

    /// Check if the request came over TLS.
    fn is_secure(&self) -> bool {
        self.base_url().starts_with("https://")
    }

    /// Client certificates presented during the TLS handshake.
    fn client_certificates(&self) -> Vec<X509Certificate> {
        Vec::new()
    }

    /// Set a response header.
    fn set_response_header(&mut self, name: &str, value: &str);

    /// Set the response status.
    fn set_response_status(&mut self, code: u16);

    /// Set the response body.
    fn set_response_body(&mut self, body: &str);
}

/// Check if `ctx` is an AJAX request.
pub fn is_ajax(ctx: &dyn WebContext) -> bool {
    ctx.request_header(AJAX_HEADER_NAME)
        .is_some_and(|v| v.eq_ignore_ascii_case(AJAX_HEADER_VALUE))
}

/// Session key/value capability.
///
/// Owned by the caller; the pipeline only borrows it for the duration of a
/// call. Values are JSON so any serializable state fits.
pub trait SessionStore: Send + Sync {
    /// Identifier of the current session, creating one if asked to.
    fn session_id(&self, ctx: &dyn WebContext, create: bool) -> Option<String>;

    /// Read a session attribute.
    fn get(&self, ctx: &dyn WebContext, key: &str) -> Option<serde_json::Value>;

    /// Write a session attribute; `None` removes it.
    fn set(&self, ctx: &dyn WebContext, key: &str, value: Option<serde_json::Value>);

    /// Destroy the session. Returns false if there was nothing to destroy.
    fn destroy_session(&self, ctx: &dyn WebContext) -> bool;

    /// Move the attributes to a new session identifier.
    fn renew_session(&self, ctx: &dyn WebContext) -> bool;
}
