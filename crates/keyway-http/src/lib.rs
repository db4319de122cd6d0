//! # Keyway HTTP
//!
//! Pre-wired clients for plain HTTP authentication schemes:
//!
//! - [`DirectBasicAuthClient`]: `Authorization: Basic ...` on every request
//! - [`DirectBearerAuthClient`]: `Authorization: Bearer ...`
//! - [`HeaderClient`], [`ParameterClient`], [`CookieClient`]: a token in a
//!   header, a request parameter or a cookie
//! - [`X509Client`]: TLS client certificate
//! - [`IndirectBasicAuthClient`]: basic auth challenge behind a redirect
//!
//! [`register_clients`] makes all of them available to a
//! [`ClientRegistry`] under data-driven type tags.

pub mod direct;
pub mod indirect;
pub mod simple;
pub mod x509;

pub use direct::{CookieClient, DirectBasicAuthClient, DirectBearerAuthClient, HeaderClient, ParameterClient};
pub use indirect::IndirectBasicAuthClient;
pub use simple::{SimpleTestTokenAuthenticator, SimpleTestUsernamePasswordAuthenticator};
pub use x509::{X509Authenticator, X509Client};

use keyway_core::{AuthResult, Client, ClientBuilder, ClientDefinition, ClientRegistry};

/// Register the HTTP presets.
///
/// | type tag | properties |
/// |---|---|
/// | `direct_basic_auth` | |
/// | `direct_bearer_auth` | |
/// | `header` | `header_name`, `prefix_header` |
/// | `parameter` | `parameter_name`, `support_get`, `support_post` |
/// | `cookie` | `cookie_name` |
/// | `x509` | `subject_dn_pattern` |
/// | `indirect_basic_auth` | `realm_name`, `callback_url` |
pub fn register_clients(registry: &mut ClientRegistry) {
    registry.register_factory("direct_basic_auth", |definition, registry| {
        let preset = DirectBasicAuthClient {
            name: definition.name.clone(),
            ..DirectBasicAuthClient::default()
        };
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("direct_bearer_auth", |definition, registry| {
        let preset = DirectBearerAuthClient {
            name: definition.name.clone(),
        };
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("header", |definition, registry| {
        let preset = HeaderClient::new(
            definition.required_property("header_name")?,
            definition.property("prefix_header").unwrap_or_default(),
        )
        .named(definition.name.as_str());
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("parameter", |definition, registry| {
        let preset = ParameterClient::new(definition.required_property("parameter_name")?)
            .named(definition.name.as_str())
            .support_get_request(definition.bool_property("support_get").unwrap_or(false))
            .support_post_request(definition.bool_property("support_post").unwrap_or(true));
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("cookie", |definition, registry| {
        let preset = CookieClient::new(definition.required_property("cookie_name")?)
            .named(definition.name.as_str());
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("x509", |definition, registry| {
        let mut preset = X509Client {
            name: definition.name.clone(),
            ..X509Client::default()
        };
        if let Some(pattern) = definition.property("subject_dn_pattern") {
            preset.subject_dn_pattern = pattern.to_string();
        }
        with_authenticator(preset.builder(), definition, registry)
    });

    registry.register_factory("indirect_basic_auth", |definition, registry| {
        let mut preset = IndirectBasicAuthClient {
            name: definition.name.clone(),
            ..IndirectBasicAuthClient::default()
        };
        if let Some(realm) = definition.property("realm_name") {
            preset.realm_name = realm.to_string();
        }
        preset.callback_url = definition.property("callback_url").map(String::from);
        with_authenticator(preset.builder(), definition, registry)
    });
}

fn with_authenticator(
    builder: ClientBuilder,
    definition: &ClientDefinition,
    registry: &ClientRegistry,
) -> AuthResult<Client> {
    let builder = match registry.definition_authenticator(definition)? {
        Some(authenticator) => builder.shared_authenticator(authenticator),
        None => builder,
    };
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::ClientKind;

    #[test]
    fn test_all_tags_registered() {
        let mut registry = ClientRegistry::new();
        register_clients(&mut registry);
        for tag in [
            "direct_basic_auth",
            "direct_bearer_auth",
            "header",
            "parameter",
            "cookie",
            "x509",
            "indirect_basic_auth",
        ] {
            assert!(registry.has_type(tag), "{tag} not registered");
        }
    }

    #[test]
    fn test_indirect_definition() {
        let mut registry = ClientRegistry::new();
        register_clients(&mut registry);
        let client = registry
            .build(
                &ClientDefinition::new("indirect_basic_auth", "admin")
                    .with_property("realm_name", "Admin area"),
            )
            .unwrap();
        assert_eq!(client.kind(), ClientKind::Indirect);
        assert_eq!(client.name(), "admin");
        assert!(client.callback_url().is_none());
    }
}
