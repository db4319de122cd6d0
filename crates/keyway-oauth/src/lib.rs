//! # Keyway OAuth
//!
//! Indirect clients for redirect-based protocols:
//!
//! - [`OAuth20Client`]: OAuth 2.0 authorization code flow, optional PKCE
//! - [`OidcClient`]: OpenID Connect with state and nonce checks
//! - [`KeycloakClient`]: OpenID Connect against a Keycloak realm, with
//!   realm and client roles
//!
//! Network calls to the provider go through the [`OAuthProviderClient`] and
//! [`OidcProviderClient`] traits; authorization URLs are built with the
//! `oauth2` crate.
//!
//! ```rust,ignore
//! use keyway_oauth::{KeycloakClient, KeycloakConfig};
//!
//! let client = KeycloakClient::new(
//!     KeycloakConfig::new("https://sso.example.com", "acme", "portal", secret),
//!     Arc::new(keycloak_sdk),
//! )
//! .callback_url("https://app.example.com/callback")
//! .build();
//! ```

pub mod keycloak;
pub mod oauth;
pub mod oidc;
pub mod provider;
pub mod state;

pub use keycloak::{KeycloakClient, KeycloakConfig, KeycloakRolesAuthorizationGenerator};
pub use oauth::{OAuth20Client, OAuthAuthenticator, OAuthCallbackExtractor, OAuthRedirectionActionBuilder};
pub use oidc::{
    OidcAuthenticator, OidcClient, OidcConfig, OidcExtractor, OidcLogoutActionBuilder,
    OidcProviderClient, OidcRedirectionActionBuilder,
};
pub use provider::{OAuthConfig, OAuthProvider, OAuthProviderClient, OAuthTokens, OAuthUserInfo};
pub use state::{AuthorizationRequest, OAuthState};
