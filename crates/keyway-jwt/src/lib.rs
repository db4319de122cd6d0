//! # Keyway JWT
//!
//! JWT support for Keyway clients using the `jsonwebtoken` crate:
//!
//! - [`JwtAuthenticator`]: validates token credentials and builds the profile
//!   from the claims
//! - [`JwtGenerator`]: signs a profile into a token
//!
//! Supported algorithms: HS256, HS384, HS512, RS256, RS384, RS512, ES256 and
//! ES384.
//!
//! ```rust,ignore
//! use keyway_jwt::{bearer_client, JwtConfig, JwtGenerator};
//!
//! let config = JwtConfig::with_secret("your-secret-key").issuer("keyway");
//! let token = JwtGenerator::new(config.clone())?.generate(&profile)?;
//! let client = bearer_client("jwt", &config)?;
//! ```

pub mod authenticator;
pub mod config;
pub mod generator;

pub use authenticator::JwtAuthenticator;
pub use config::{JwtAlgorithm, JwtConfig};
pub use generator::JwtGenerator;

use keyway_core::context::{AUTHORIZATION_HEADER, BEARER_HEADER_PREFIX};
use keyway_core::{AuthResult, Client, ClientBuilder, HeaderExtractor};

/// Claim holding the role array.
pub const ROLES_CLAIM: &str = "roles";

/// Claim holding the permission array.
pub const PERMISSIONS_CLAIM: &str = "permissions";

/// Direct client reading a JWT from `Authorization: Bearer <token>`.
pub fn bearer_client(name: impl Into<String>, config: &JwtConfig) -> AuthResult<Client> {
    Ok(ClientBuilder::direct(name)
        .extractor(HeaderExtractor::new(AUTHORIZATION_HEADER, BEARER_HEADER_PREFIX).trim_value(true))
        .authenticator(JwtAuthenticator::new(config)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::mock::{MockSessionStore, MockWebContext};
    use keyway_core::{Outcome, UserProfile};

    #[tokio::test]
    async fn test_bearer_client() {
        let config = JwtConfig::with_secret("test-secret-key-for-jwt-signing-minimum-32-chars");
        let mut profile = UserProfile::new("jle");
        profile.add_role("admin");
        let token = JwtGenerator::new(config.clone()).unwrap().generate(&profile).unwrap();

        let client = bearer_client("jwt", &config).unwrap();
        let ctx = MockWebContext::new().with_header("Authorization", format!("Bearer {token}"));
        let outcome = client.authenticate(&ctx, &MockSessionStore::new()).await.unwrap();
        let Outcome::Continue(Some(authenticated)) = outcome else {
            panic!("expected a profile");
        };
        assert_eq!(authenticated.id(), "jle");
        assert!(authenticated.has_role("admin"));

        // A forged token is anonymous for a direct client
        let forged = MockWebContext::new().with_header("Authorization", "Bearer abc.def.ghi");
        let outcome = client.authenticate(&forged, &MockSessionStore::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Continue(None));
    }
}
