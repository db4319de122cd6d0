//! User profile model
//!
//! A [`UserProfile`] is the normalized, verified identity produced by the
//! pipeline. Roles and permissions can only be added, never removed, so the
//! authorization generator chain is append-only by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Attribute holding the username.
pub const USERNAME: &str = "username";

/// Attribute holding the email address.
pub const EMAIL: &str = "email";

/// Attribute holding the display name.
pub const DISPLAY_NAME: &str = "display_name";

/// Verified identity record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    linked_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_name: Option<String>,

    #[serde(default)]
    attributes: HashMap<String, Value>,

    #[serde(default)]
    roles: BTreeSet<String>,

    #[serde(default)]
    permissions: BTreeSet<String>,

    #[serde(default)]
    remembered: bool,
}

impl UserProfile {
    /// Create a profile with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the linked account, if any.
    pub fn linked_id(&self) -> Option<&str> {
        self.linked_id.as_deref()
    }

    /// Link this profile to another account.
    pub fn set_linked_id(&mut self, linked_id: Option<String>) {
        self.linked_id = linked_id;
    }

    /// Name of the client that authenticated this profile.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Record the client that authenticated this profile.
    pub fn set_client_name(&mut self, client_name: impl Into<String>) {
        self.client_name = Some(client_name.into());
    }

    /// Single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// All attributes.
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Add an attribute. Null values are ignored.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        if !value.is_null() {
            self.attributes.insert(name.into(), value);
        }
    }

    /// Builder form of [`add_attribute`](Self::add_attribute).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_attribute(name, value);
        self
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Username attribute as a string.
    pub fn username(&self) -> Option<&str> {
        self.attribute(USERNAME).and_then(Value::as_str)
    }

    /// Email attribute as a string.
    pub fn email(&self) -> Option<&str> {
        self.attribute(EMAIL).and_then(Value::as_str)
    }

    /// Display name attribute as a string.
    pub fn display_name(&self) -> Option<&str> {
        self.attribute(DISPLAY_NAME).and_then(Value::as_str)
    }

    /// Granted roles.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Check if a role is granted.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Grant a role.
    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    /// Grant several roles.
    pub fn add_roles<I, S>(&mut self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
    }

    /// Granted permissions.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Check if a permission is granted.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Grant a permission.
    pub fn add_permission(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
    }

    /// Grant several permissions.
    pub fn add_permissions<I, S>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
    }

    /// Check if the profile came from a "remember me" authentication.
    pub fn is_remembered(&self) -> bool {
        self.remembered
    }

    /// Mark the profile as remembered.
    pub fn set_remembered(&mut self, remembered: bool) {
        self.remembered = remembered;
    }
}
