//! HTTP actions
//!
//! An [`HttpAction`] is a terminal instruction for the transport layer: stop
//! normal processing and emit this response. It is produced only by clients
//! and their action builders and is handed back untouched.

use crate::context::WebContext;

/// `Location` response header.
pub const LOCATION_HEADER: &str = "Location";

/// `WWW-Authenticate` response header.
pub const AUTHENTICATE_HEADER: &str = "WWW-Authenticate";

/// A transport-level action the caller must perform instead of continuing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAction {
    /// 200 with a body
    Ok {
        /// Response body
        body: String,
    },
    /// 204
    NoContent,
    /// 302 redirect
    Found {
        /// Redirect target
        location: String,
    },
    /// 303 redirect (used after a POST)
    SeeOther {
        /// Redirect target
        location: String,
    },
    /// 400
    BadRequest,
    /// 401 with challenge headers
    Unauthorized {
        /// Challenge headers, e.g. `WWW-Authenticate`
        headers: Vec<(String, String)>,
    },
    /// 403
    Forbidden,
    /// Any other status without body
    Status {
        /// HTTP status code
        code: u16,
    },
}

impl HttpAction {
    /// Build a redirect to `location`: 303 for POST requests, 302 otherwise.
    pub fn redirect(ctx: &dyn WebContext, location: impl Into<String>) -> Self {
        let location = location.into();
        if ctx.request_method().eq_ignore_ascii_case("POST") {
            HttpAction::SeeOther { location }
        } else {
            HttpAction::Found { location }
        }
    }

    /// 401 without a challenge.
    pub fn unauthorized() -> Self {
        HttpAction::Unauthorized { headers: Vec::new() }
    }

    /// 401 carrying a single challenge header.
    pub fn challenge(name: impl Into<String>, value: impl Into<String>) -> Self {
        HttpAction::Unauthorized {
            headers: vec![(name.into(), value.into())],
        }
    }

    /// 200 with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        HttpAction::Ok { body: body.into() }
    }

    /// Numeric status code.
    pub fn code(&self) -> u16 {
        match self {
            HttpAction::Ok { .. } => 200,
            HttpAction::NoContent => 204,
            HttpAction::Found { .. } => 302,
            HttpAction::SeeOther { .. } => 303,
            HttpAction::BadRequest => 400,
            HttpAction::Unauthorized { .. } => 401,
            HttpAction::Forbidden => 403,
            HttpAction::Status { code } => *code,
        }
    }

    /// Response body, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            HttpAction::Ok { body } => Some(body),
            _ => None,
        }
    }

    /// Response headers implied by the action.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            HttpAction::Found { location } | HttpAction::SeeOther { location } => {
                vec![(LOCATION_HEADER.to_string(), location.clone())]
            }
            HttpAction::Unauthorized { headers } => headers.clone(),
            _ => Vec::new(),
        }
    }

    /// Redirect target, if this is a redirect.
    pub fn location(&self) -> Option<&str> {
        match self {
            HttpAction::Found { location } | HttpAction::SeeOther { location } => Some(location),
            _ => None,
        }
    }

    /// Check if this action is a redirect.
    pub fn is_redirect(&self) -> bool {
        self.location().is_some()
    }

    /// Write the action onto the response of `ctx`.
    pub fn apply(&self, ctx: &mut dyn WebContext) {
        ctx.set_response_status(self.code());
        for (name, value) in self.headers() {
            ctx.set_response_header(&name, &value);
        }
        if let Some(body) = self.body() {
            ctx.set_response_body(body);
        }
    }
}

impl std::fmt::Display for HttpAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location() {
            Some(location) => write!(f, "HTTP {} -> {}", self.code(), location),
            None => write!(f, "HTTP {}", self.code()),
        }
    }
}
