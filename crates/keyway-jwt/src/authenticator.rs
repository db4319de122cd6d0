//! Validates JWT token credentials.

use crate::config::JwtConfig;
use crate::{PERMISSIONS_CLAIM, ROLES_CLAIM};
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use keyway_core::{
    AuthError, AuthResult, Authenticator, Credentials, SessionStore, UserProfile, WebContext,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// Verifies the signature and time claims of a token and builds the profile
/// from its claims.
///
/// `sub` becomes the profile id, `roles` and `permissions` arrays become the
/// profile sets, every other claim becomes an attribute.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("algorithms", &self.validation.algorithms)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl JwtAuthenticator {
    /// Create an authenticator verifying with the key material of `config`.
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        let key = config.decoding_key()?;

        let mut validation = Validation::new(config.algorithm.into());
        validation.required_spec_claims = HashSet::new();
        validation.leeway = config.leeway_secs;
        validation.validate_nbf = true;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        Ok(Self { key, validation })
    }

    /// Verify `token` and build its profile.
    pub fn validate_token(&self, token: &str) -> AuthResult<UserProfile> {
        let data: TokenData<Map<String, Value>> =
            decode(token, &self.key, &self.validation).map_err(|e| {
                AuthError::Credentials(match e.kind() {
                    ErrorKind::ExpiredSignature => "Token has expired".to_string(),
                    ErrorKind::ImmatureSignature => "Token is not valid yet".to_string(),
                    ErrorKind::InvalidToken => "Malformed token".to_string(),
                    ErrorKind::InvalidSignature => "Invalid signature".to_string(),
                    ErrorKind::InvalidIssuer => "Invalid issuer".to_string(),
                    ErrorKind::InvalidAudience => "Invalid audience".to_string(),
                    _ => format!("Invalid token: {e}"),
                })
            })?;
        profile_from_claims(data.claims)
    }
}

fn profile_from_claims(mut claims: Map<String, Value>) -> AuthResult<UserProfile> {
    let subject = match claims.remove("sub") {
        Some(Value::String(sub)) if !sub.is_empty() => sub,
        _ => return Err(AuthError::Technical("JWT has no subject".to_string())),
    };

    let mut profile = UserProfile::new(subject);
    if let Some(roles) = claims.remove(ROLES_CLAIM) {
        profile.add_roles(strings(&roles));
    }
    if let Some(permissions) = claims.remove(PERMISSIONS_CLAIM) {
        profile.add_permissions(strings(&permissions));
    }
    for (name, value) in claims {
        profile.add_attribute(name, value);
    }
    Ok(profile)
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let token = credentials
            .token_value()
            .ok_or_else(|| AuthError::Credentials("Unsupported credentials type".to_string()))?
            .to_string();

        let profile = self.validate_token(&token)?;
        debug!(id = %profile.id(), "JWT accepted");
        credentials.attach_profile(profile);
        Ok(())
    }
}
