//! Authorization generators
//!
//! Generators run after profile creation, in registration order, each one
//! seeing the changes of the previous ones. They can add roles and
//! permissions; [`UserProfile`] offers no way to remove them.

use crate::context::{SessionStore, WebContext};
use crate::error::AuthResult;
use crate::profile::UserProfile;
use serde_json::Value;

/// Post-authentication enrichment step.
pub trait AuthorizationGenerator: Send + Sync {
    /// Enrich `profile`. An error stops the chain and is propagated.
    fn generate(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
        profile: &mut UserProfile,
    ) -> AuthResult<()>;
}

impl<F> AuthorizationGenerator for F
where
    F: Fn(&dyn WebContext, &dyn SessionStore, &mut UserProfile) -> AuthResult<()> + Send + Sync,
{
    fn generate(
        &self,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
        profile: &mut UserProfile,
    ) -> AuthResult<()> {
        self(ctx, session, profile)
    }
}

/// Grants a fixed set of roles and permissions.
#[derive(Debug, Clone, Default)]
pub struct DefaultRolesAuthorizationGenerator {
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl DefaultRolesAuthorizationGenerator {
    /// Grant `roles` to every profile.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: Vec::new(),
        }
    }

    /// Also grant `permissions` to every profile.
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

impl AuthorizationGenerator for DefaultRolesAuthorizationGenerator {
    fn generate(
        &self,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
        profile: &mut UserProfile,
    ) -> AuthResult<()> {
        profile.add_roles(self.roles.iter().cloned());
        profile.add_permissions(self.permissions.iter().cloned());
        Ok(())
    }
}

/// Reads roles and permissions from profile attributes.
///
/// String attributes are split on the separator; array attributes contribute
/// each string element.
#[derive(Debug, Clone)]
pub struct FromAttributesAuthorizationGenerator {
    role_attributes: Vec<String>,
    permission_attributes: Vec<String>,
    separator: char,
}

impl FromAttributesAuthorizationGenerator {
    /// Read roles from `role_attributes` and permissions from
    /// `permission_attributes`.
    pub fn new<R, P>(role_attributes: R, permission_attributes: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            role_attributes: role_attributes.into_iter().map(Into::into).collect(),
            permission_attributes: permission_attributes.into_iter().map(Into::into).collect(),
            separator: ',',
        }
    }

    /// Use another separator for string attributes.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    fn values(&self, profile: &UserProfile, attribute: &str) -> Vec<String> {
        match profile.attribute(attribute) {
            Some(Value::String(s)) => s
                .split(self.separator)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl AuthorizationGenerator for FromAttributesAuthorizationGenerator {
    fn generate(
        &self,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
        profile: &mut UserProfile,
    ) -> AuthResult<()> {
        let roles: Vec<String> = self
            .role_attributes
            .iter()
            .flat_map(|a| self.values(profile, a))
            .collect();
        let permissions: Vec<String> = self
            .permission_attributes
            .iter()
            .flat_map(|a| self.values(profile, a))
            .collect();

        profile.add_roles(roles);
        profile.add_permissions(permissions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSessionStore, MockWebContext};
    use serde_json::json;

    #[test]
    fn test_default_roles() {
        let generator = DefaultRolesAuthorizationGenerator::new(["ROLE_USER"])
            .with_permissions(["document:read"]);
        let mut profile = UserProfile::new("jle");
        profile.add_role("ROLE_ADMIN");

        generator
            .generate(&MockWebContext::new(), &MockSessionStore::new(), &mut profile)
            .unwrap();

        assert!(profile.has_role("ROLE_ADMIN"));
        assert!(profile.has_role("ROLE_USER"));
        assert!(profile.has_permission("document:read"));
    }

    #[test]
    fn test_from_attributes() {
        let generator = FromAttributesAuthorizationGenerator::new(["groups"], ["scopes"]);
        let mut profile = UserProfile::new("jle")
            .with_attribute("groups", "admin, user,,")
            .with_attribute("scopes", json!(["read", "write", 3]));

        generator
            .generate(&MockWebContext::new(), &MockSessionStore::new(), &mut profile)
            .unwrap();

        assert_eq!(profile.roles().len(), 2);
        assert!(profile.has_role("admin") && profile.has_role("user"));
        assert_eq!(profile.permissions().len(), 2);
    }

    #[test]
    fn test_missing_attribute_adds_nothing() {
        let generator = FromAttributesAuthorizationGenerator::new(["groups"], Vec::<String>::new());
        let mut profile = UserProfile::new("jle");
        generator
            .generate(&MockWebContext::new(), &MockSessionStore::new(), &mut profile)
            .unwrap();
        assert!(profile.roles().is_empty());
    }
}
