//! In-memory request and session doubles for tests.

use crate::context::{Cookie, SessionStore, WebContext};
use crate::credentials::X509Certificate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// A [`WebContext`] backed by plain maps.
#[derive(Debug, Clone)]
pub struct MockWebContext {
    request_headers: HashMap<String, String>,
    request_cookies: Vec<Cookie>,
    request_parameters: BTreeMap<String, Vec<String>>,
    request_method: String,
    base_url: String,
    path: String,
    certificates: Vec<X509Certificate>,
    response_headers: HashMap<String, String>,
    response_status: Option<u16>,
    response_body: Option<String>,
}

impl Default for MockWebContext {
    fn default() -> Self {
        Self {
            request_headers: HashMap::new(),
            request_cookies: Vec::new(),
            request_parameters: BTreeMap::new(),
            request_method: "POST".to_string(),
            base_url: "http://localhost:8080".to_string(),
            path: "/".to_string(),
            certificates: Vec::new(),
            response_headers: HashMap::new(),
            response_status: None,
            response_body: None,
        }
    }
}

impl MockWebContext {
    /// Create an empty POST request to `http://localhost:8080/`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request_headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add a request cookie.
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.request_cookies.push(Cookie::new(name, value));
        self
    }

    /// Add a request parameter value.
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request_parameters
            .entry(name.to_string())
            .or_default()
            .push(value.into());
        self
    }

    /// Set the request method.
    pub fn with_method(mut self, method: &str) -> Self {
        self.request_method = method.to_ascii_uppercase();
        self
    }

    /// Set the request path.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Set the server base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Attach a client certificate.
    pub fn with_certificate(mut self, certificate: X509Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    /// Status written to the response.
    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    /// Header written to the response.
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.response_headers.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Body written to the response.
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }
}

impl WebContext for MockWebContext {
    fn request_header(&self, name: &str) -> Option<String> {
        self.request_headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn request_cookies(&self) -> Vec<Cookie> {
        self.request_cookies.clone()
    }

    fn request_parameter(&self, name: &str) -> Option<String> {
        self.request_parameters
            .get(name)
            .and_then(|values| values.first().cloned())
    }

    fn request_parameters(&self) -> HashMap<String, Vec<String>> {
        self.request_parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn request_method(&self) -> String {
        self.request_method.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn full_request_url(&self) -> String {
        let query: Vec<String> = self
            .request_parameters
            .iter()
            .flat_map(|(k, values)| {
                values
                    .iter()
                    .map(move |v| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            })
            .collect();
        if query.is_empty() {
            format!("{}{}", self.base_url, self.path)
        } else {
            format!("{}{}?{}", self.base_url, self.path, query.join("&"))
        }
    }

    fn client_certificates(&self) -> Vec<X509Certificate> {
        self.certificates.clone()
    }

    fn set_response_header(&mut self, name: &str, value: &str) {
        self.response_headers
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    fn set_response_status(&mut self, code: u16) {
        self.response_status = Some(code);
    }

    fn set_response_body(&mut self, body: &str) {
        self.response_body = Some(body.to_string());
    }
}

/// A single-session [`SessionStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MockSessionStore {
    id: Mutex<Option<String>>,
    attributes: Mutex<HashMap<String, serde_json::Value>>,
}

impl MockSessionStore {
    /// Create a store with no session yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_id(&self) -> String {
        self.id
            .lock()
            .get_or_insert_with(|| uuid::Uuid::now_v7().to_string())
            .clone()
    }
}

impl SessionStore for MockSessionStore {
    fn session_id(&self, _ctx: &dyn WebContext, create: bool) -> Option<String> {
        if create {
            Some(self.ensure_id())
        } else {
            self.id.lock().clone()
        }
    }

    fn get(&self, _ctx: &dyn WebContext, key: &str) -> Option<serde_json::Value> {
        self.attributes.lock().get(key).cloned()
    }

    fn set(&self, _ctx: &dyn WebContext, key: &str, value: Option<serde_json::Value>) {
        self.ensure_id();
        let mut attributes = self.attributes.lock();
        match value {
            Some(value) => {
                attributes.insert(key.to_string(), value);
            }
            None => {
                attributes.remove(key);
            }
        }
    }

    fn destroy_session(&self, _ctx: &dyn WebContext) -> bool {
        let existed = self.id.lock().take().is_some();
        self.attributes.lock().clear();
        existed
    }

    fn renew_session(&self, _ctx: &dyn WebContext) -> bool {
        let mut id = self.id.lock();
        if id.is_none() {
            return false;
        }
        *id = Some(uuid::Uuid::now_v7().to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = MockWebContext::new().with_header("Authorization", "Bearer x");
        assert_eq!(ctx.request_header("authorization").as_deref(), Some("Bearer x"));
    }

    #[test]
    fn test_full_request_url() {
        let ctx = MockWebContext::new()
            .with_path("/callback")
            .with_parameter("code", "a b");
        assert_eq!(
            ctx.full_request_url(),
            "http://localhost:8080/callback?code=a%20b"
        );
    }

    #[test]
    fn test_session_renew_keeps_attributes() {
        let ctx = MockWebContext::new();
        let store = MockSessionStore::new();
        assert!(store.session_id(&ctx, false).is_none());

        store.set(&ctx, "k", Some(serde_json::json!("v")));
        let before = store.session_id(&ctx, false).unwrap();
        assert!(store.renew_session(&ctx));
        assert_ne!(store.session_id(&ctx, false).unwrap(), before);
        assert_eq!(store.get(&ctx, "k"), Some(serde_json::json!("v")));

        assert!(store.destroy_session(&ctx));
        assert!(store.get(&ctx, "k").is_none());
    }
}
