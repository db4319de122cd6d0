//! Client configuration and registry
//!
//! Clients are described by data ([`ClientDefinition`]) and turned into
//! [`Client`]s by a [`ClientRegistry`] mapping type tags to factory
//! functions. The registry is populated at start-up and passed by reference.
//!
//! ```rust,ignore
//! let mut registry = ClientRegistry::new();
//! keyway_http::register_clients(&mut registry);
//! registry.register_authenticator("users", Arc::new(authenticator));
//!
//! let config = ClientsConfig::from_json(r#"{
//!     "callback_url": "/callback",
//!     "clients": [{ "type": "direct_basic_auth", "name": "basic", "authenticator": "users" }]
//! }"#)?;
//! let clients = registry.build_all(&config)?;
//! ```

use crate::authenticator::Authenticator;
use crate::client::{Client, ClientKind};
use crate::context::WebContext;
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Environment variable holding the shared callback URL.
pub const CALLBACK_URL_ENV: &str = "KEYWAY_CALLBACK_URL";

/// Environment variable holding the JSON array of client definitions.
pub const CLIENTS_ENV: &str = "KEYWAY_CLIENTS";

/// Data description of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDefinition {
    /// Registry type tag
    #[serde(rename = "type")]
    pub client_type: String,
    /// Client name
    pub name: String,
    /// Name of a registered authenticator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator: Option<String>,
    /// Type-specific settings
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ClientDefinition {
    /// Describe a client of type `client_type` named `name`.
    pub fn new(client_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_type: client_type.into(),
            name: name.into(),
            authenticator: None,
            properties: HashMap::new(),
        }
    }

    /// Use the authenticator registered under `name`.
    pub fn with_authenticator(mut self, name: impl Into<String>) -> Self {
        self.authenticator = Some(name.into());
        self
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Non-blank property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Non-blank property value, or a configuration error.
    pub fn required_property(&self, key: &str) -> AuthResult<&str> {
        self.property(key)
            .ok_or_else(|| AuthError::Configuration(format!("{key} cannot be blank")))
    }

    /// Boolean property; `true`/`1` are true, anything else false.
    pub fn bool_property(&self, key: &str) -> Option<bool> {
        self.property(key).map(|v| v == "true" || v == "1")
    }
}

/// Configuration of a group of clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsConfig {
    /// Callback URL shared by indirect clients that have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Client definitions
    #[serde(default)]
    pub clients: Vec<ClientDefinition>,
}

impl ClientsConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| AuthError::Configuration(format!("Invalid clients configuration: {e}")))
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KEYWAY_CALLBACK_URL`: shared callback URL
    /// - `KEYWAY_CLIENTS`: JSON array of client definitions (default: none)
    pub fn from_env() -> AuthResult<Self> {
        let clients = match std::env::var(CLIENTS_ENV) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                AuthError::Configuration(format!("Invalid {CLIENTS_ENV}: {e}"))
            })?,
            Err(_) => Vec::new(),
        };
        Ok(Self {
            callback_url: std::env::var(CALLBACK_URL_ENV).ok().filter(|v| !v.is_empty()),
            clients,
        })
    }
}

/// Factory turning a definition into a client.
pub type ClientFactory =
    Arc<dyn Fn(&ClientDefinition, &ClientRegistry) -> AuthResult<Client> + Send + Sync>;

/// Type tag to factory mapping, plus named authenticators shared by
/// definitions.
#[derive(Default)]
pub struct ClientRegistry {
    factories: HashMap<String, ClientFactory>,
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.factories.keys().collect();
        types.sort();
        let mut authenticators: Vec<&String> = self.authenticators.keys().collect();
        authenticators.sort();
        f.debug_struct("ClientRegistry")
            .field("types", &types)
            .field("authenticators", &authenticators)
            .finish()
    }
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `client_type`, replacing any previous one.
    pub fn register_factory<F>(&mut self, client_type: impl Into<String>, factory: F)
    where
        F: Fn(&ClientDefinition, &ClientRegistry) -> AuthResult<Client> + Send + Sync + 'static,
    {
        self.factories.insert(client_type.into(), Arc::new(factory));
    }

    /// Register an authenticator definitions can refer to by `name`.
    pub fn register_authenticator(&mut self, name: impl Into<String>, authenticator: Arc<dyn Authenticator>) {
        self.authenticators.insert(name.into(), authenticator);
    }

    /// Check if a factory is registered for `client_type`.
    pub fn has_type(&self, client_type: &str) -> bool {
        self.factories.contains_key(client_type)
    }

    /// Authenticator registered under `name`.
    pub fn authenticator(&self, name: &str) -> AuthResult<Arc<dyn Authenticator>> {
        self.authenticators
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::Configuration(format!("Unknown authenticator: {name}")))
    }

    /// Authenticator named by `definition`, if it names one.
    pub fn definition_authenticator(
        &self,
        definition: &ClientDefinition,
    ) -> AuthResult<Option<Arc<dyn Authenticator>>> {
        definition
            .authenticator
            .as_deref()
            .map(|name| self.authenticator(name))
            .transpose()
    }

    /// Build one client.
    pub fn build(&self, definition: &ClientDefinition) -> AuthResult<Client> {
        let factory = self.factories.get(&definition.client_type).ok_or_else(|| {
            AuthError::Configuration(format!("Unknown client type: {}", definition.client_type))
        })?;
        let client = factory(definition, self)?;
        debug!(client = %client.name(), client_type = %definition.client_type, "Client built");
        Ok(client)
    }

    /// Build every client of `config` into a group.
    pub fn build_all(&self, config: &ClientsConfig) -> AuthResult<Clients> {
        let mut clients = Clients::new(config.callback_url.clone());
        for definition in &config.clients {
            clients.add(self.build(definition)?)?;
        }
        Ok(clients)
    }
}

/// A group of named clients.
#[derive(Debug, Default)]
pub struct Clients {
    callback_url: Option<String>,
    clients: Vec<Arc<Client>>,
}

impl Clients {
    /// Create an empty group sharing `callback_url` with its indirect
    /// clients.
    pub fn new(callback_url: Option<String>) -> Self {
        Self {
            callback_url,
            clients: Vec::new(),
        }
    }

    /// Shared callback URL.
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    /// Add a client.
    ///
    /// An indirect client without a callback URL receives the shared one.
    /// Names are unique, ignoring case.
    pub fn add(&mut self, client: Client) -> AuthResult<Arc<Client>> {
        if self.find(client.name()).is_some() {
            return Err(AuthError::Configuration(format!(
                "Duplicate name in clients: {}",
                client.name()
            )));
        }
        if client.kind() == ClientKind::Indirect && client.callback_url().is_none() {
            if let Some(url) = &self.callback_url {
                client.reconfigure(|config| config.callback_url = Some(url.clone()));
            }
        }
        let client = Arc::new(client);
        self.clients.push(client.clone());
        Ok(client)
    }

    /// Find a client by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<Arc<Client>> {
        self.clients
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Find the client a callback request is addressed to.
    pub fn find_from_callback(&self, ctx: &dyn WebContext) -> Option<Arc<Client>> {
        self.clients
            .iter()
            .filter(|c| c.kind() == ClientKind::Indirect)
            .find(|c| c.matches_callback(ctx))
            .cloned()
    }

    /// All clients in registration order.
    pub fn all(&self) -> &[Arc<Client>] {
        &self.clients
    }

    /// Number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Initialize every client.
    pub fn init(&self) -> AuthResult<()> {
        self.clients.iter().try_for_each(|c| c.init(false))
    }
}
