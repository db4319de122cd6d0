//! # Keyway Core
//!
//! Protocol-agnostic authentication pipeline: extract credentials from a
//! request, validate them, build a user profile, enrich it with roles and
//! permissions, and hand control back to the transport layer when a redirect
//! or challenge is needed.
//!
//! ## Overview
//!
//! - **Credentials**: tagged union of extracted proof of identity
//! - **Extractors**: header, basic auth, parameter, cookie, X.509, composite
//! - **Authenticators**: password authenticator over an identity store
//! - **Profile creators** and **authorization generators**
//! - **Clients**: direct (stateless) and indirect (redirect round trip)
//! - **HttpAction**: redirect, 401, 403 and friends, returned as
//!   [`Outcome::Action`] rather than raised as errors
//!
//! ## Features
//!
//! - `mock`: in-memory [`WebContext`] and [`SessionStore`] for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyway_core::{BasicAuthExtractor, ClientBuilder, Outcome};
//!
//! let client = ClientBuilder::direct("basic")
//!     .extractor(BasicAuthExtractor::default())
//!     .authenticator(password_authenticator)
//!     .build();
//!
//! if let Outcome::Continue(Some(profile)) = client.authenticate(&ctx, &session).await? {
//!     println!("hello {}", profile.id());
//! }
//! ```

pub mod action;
pub mod authenticator;
pub mod client;
pub mod context;
pub mod creator;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod generator;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod profile;
pub mod registry;
pub mod store;
pub mod util;

// Re-export main types
pub use action::HttpAction;
pub use authenticator::{Authenticator, PasswordAuthenticator};
pub use client::{
    CallbackRedirectionActionBuilder, CallbackUrlResolver, Client, ClientBuilder, ClientConfig,
    ClientKind, ClientSetup, ClientView, LogoutActionBuilder, Outcome, RedirectLogoutActionBuilder,
    RedirectionActionBuilder,
};
pub use context::{Cookie, SessionStore, WebContext};
pub use creator::{AuthenticatorProfileCreator, ProfileCreator};
pub use credentials::{Credentials, CredentialsKind, X509Certificate};
pub use error::{AuthError, AuthResult};
pub use extractor::{
    BasicAuthExtractor, CompositeExtractor, CookieExtractor, CredentialsExtractor, HeaderExtractor,
    ParameterExtractor, X509CertificateExtractor,
};
pub use generator::{
    AuthorizationGenerator, DefaultRolesAuthorizationGenerator, FromAttributesAuthorizationGenerator,
};
pub use profile::UserProfile;
pub use registry::{ClientDefinition, ClientFactory, ClientRegistry, Clients, ClientsConfig};
pub use store::{
    AccountRecord, Argon2SecretMatcher, IdentityStore, MemoryProfileService,
    PlainTextSecretMatcher, ProfileService, SecretMatcher,
};
