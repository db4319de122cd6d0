//! Signs user profiles into JWTs.

use crate::config::JwtConfig;
use crate::{PERMISSIONS_CLAIM, ROLES_CLAIM};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use keyway_core::{AuthError, AuthResult, UserProfile};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Claims set from the configuration and the profile itself, never copied
/// from attributes.
const RESERVED_CLAIMS: [&str; 9] = [
    "iss",
    "sub",
    "aud",
    "exp",
    "nbf",
    "iat",
    "jti",
    ROLES_CLAIM,
    PERMISSIONS_CLAIM,
];

/// Turns a profile into a signed token the [`JwtAuthenticator`] accepts.
///
/// Attributes become claims, the profile id becomes `sub`, roles and
/// permissions become arrays. Attributes named like registered claims (for
/// instance the `exp` of the token a profile was read from) are dropped.
///
/// [`JwtAuthenticator`]: crate::JwtAuthenticator
pub struct JwtGenerator {
    config: JwtConfig,
    key: EncodingKey,
}

impl std::fmt::Debug for JwtGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtGenerator")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl JwtGenerator {
    /// Create a generator signing with the key material of `config`.
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        let key = config.encoding_key()?;
        Ok(Self { config, key })
    }

    /// Sign `profile`.
    pub fn generate(&self, profile: &UserProfile) -> AuthResult<String> {
        let claims = self.claims(profile);
        let header = Header::new(self.config.algorithm.into());
        encode(&header, &claims, &self.key)
            .map_err(|e| AuthError::Technical(format!("Token encoding failed: {e}")))
    }

    fn claims(&self, profile: &UserProfile) -> Map<String, Value> {
        let mut claims: Map<String, Value> = profile
            .attributes()
            .iter()
            .filter(|(k, _)| !RESERVED_CLAIMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        claims.insert("sub".to_string(), Value::from(profile.id()));
        if !profile.roles().is_empty() {
            claims.insert(ROLES_CLAIM.to_string(), Value::from_iter(profile.roles().iter().cloned()));
        }
        if !profile.permissions().is_empty() {
            claims.insert(
                PERMISSIONS_CLAIM.to_string(),
                Value::from_iter(profile.permissions().iter().cloned()),
            );
        }

        if let Some(issuer) = &self.config.issuer {
            claims.insert("iss".to_string(), Value::from(issuer.as_str()));
        }
        match self.config.audience.as_slice() {
            [] => {}
            [single] => {
                claims.insert("aud".to_string(), Value::from(single.as_str()));
            }
            many => {
                claims.insert("aud".to_string(), Value::from_iter(many.iter().cloned()));
            }
        }

        let now = Utc::now();
        claims.insert("iat".to_string(), Value::from(now.timestamp()));
        if let Some(expiration) = self.config.expiration {
            claims.insert("exp".to_string(), Value::from((now + expiration).timestamp()));
        }
        claims.insert("jti".to_string(), Value::from(Uuid::now_v7().to_string()));
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims() {
        let generator = JwtGenerator::new(
            JwtConfig::with_secret("test-secret-key-for-jwt-signing-minimum-32-chars")
                .issuer("keyway")
                .audience("api"),
        )
        .unwrap();
        let mut profile = UserProfile::new("jle").with_attribute("email", "jle@example.com");
        profile.add_role("admin");

        let claims = generator.claims(&profile);
        assert_eq!(claims["sub"], json!("jle"));
        assert_eq!(claims["email"], json!("jle@example.com"));
        assert_eq!(claims["roles"], json!(["admin"]));
        assert!(!claims.contains_key("permissions"));
        assert_eq!(claims["iss"], json!("keyway"));
        assert_eq!(claims["aud"], json!("api"));
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_registered_claims_not_taken_from_attributes() {
        let generator =
            JwtGenerator::new(JwtConfig::with_secret("test-secret-key-for-jwt-signing-minimum-32-chars"))
                .unwrap();
        let profile = UserProfile::new("jle")
            .with_attribute("exp", 1)
            .with_attribute("nbf", 1)
            .with_attribute("aud", "old-api")
            .with_attribute("roles", json!(["stale"]))
            .with_attribute("email", "jle@example.com");

        let claims = generator.claims(&profile);
        assert!(!claims.contains_key("nbf"));
        assert!(!claims.contains_key("aud"));
        assert!(!claims.contains_key("roles"));
        assert!(claims["exp"].as_i64().unwrap() > 1);
        assert_eq!(claims["email"], json!("jle@example.com"));
    }

    #[test]
    fn test_requires_signing_key() {
        assert!(matches!(
            JwtGenerator::new(JwtConfig::default()),
            Err(AuthError::Configuration(_))
        ));
    }
}
