//! JWT configuration and key material.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use keyway_core::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};

/// JWT configuration shared by the authenticator and the generator.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC algorithms (HS256, HS384, HS512)
    pub secret: Option<String>,

    /// Private key (PEM) for RSA/EC algorithms, needed to sign
    pub private_key: Option<String>,

    /// Public key (PEM) for RSA/EC algorithms, needed to verify
    pub public_key: Option<String>,

    /// Algorithm to use
    pub algorithm: JwtAlgorithm,

    /// Issuer written by the generator and required by the authenticator
    pub issuer: Option<String>,

    /// Accepted audiences; empty disables the audience check
    pub audience: Vec<String>,

    /// Lifetime of generated tokens; `None` issues tokens without `exp`
    pub expiration: Option<Duration>,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            private_key: None,
            public_key: None,
            algorithm: JwtAlgorithm::HS256,
            issuer: None,
            audience: Vec::new(),
            expiration: Some(Duration::hours(1)),
            leeway_secs: 60,
        }
    }
}

impl JwtConfig {
    /// HS256 configuration with `secret`.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Set the issuer.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Add an accepted audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    /// Set the lifetime of generated tokens.
    pub fn expiration(mut self, expiration: Option<Duration>) -> Self {
        self.expiration = expiration;
        self
    }

    pub(crate) fn encoding_key(&self) -> AuthResult<EncodingKey> {
        match self.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                Ok(EncodingKey::from_secret(self.hmac_secret()?.as_bytes()))
            }
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                let key = self.private_key("RSA")?;
                EncodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::Configuration(format!("Invalid RSA private key: {e}")))
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                let key = self.private_key("EC")?;
                EncodingKey::from_ec_pem(key.as_bytes())
                    .map_err(|e| AuthError::Configuration(format!("Invalid EC private key: {e}")))
            }
        }
    }

    pub(crate) fn decoding_key(&self) -> AuthResult<DecodingKey> {
        match self.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                Ok(DecodingKey::from_secret(self.hmac_secret()?.as_bytes()))
            }
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                let key = self.public_key("RSA")?;
                DecodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::Configuration(format!("Invalid RSA public key: {e}")))
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                let key = self.public_key("EC")?;
                DecodingKey::from_ec_pem(key.as_bytes())
                    .map_err(|e| AuthError::Configuration(format!("Invalid EC public key: {e}")))
            }
        }
    }

    fn hmac_secret(&self) -> AuthResult<&str> {
        self.secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Configuration("Secret required for HMAC".to_string()))
    }

    fn private_key(&self, family: &str) -> AuthResult<&str> {
        self.private_key
            .as_deref()
            .ok_or_else(|| AuthError::Configuration(format!("Private key required for {family}")))
    }

    fn public_key(&self, family: &str) -> AuthResult<&str> {
        self.public_key
            .as_deref()
            .ok_or_else(|| AuthError::Configuration(format!("Public key required for {family}")))
    }
}

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::RS384 => Algorithm::RS384,
            JwtAlgorithm::RS512 => Algorithm::RS512,
            JwtAlgorithm::ES256 => Algorithm::ES256,
            JwtAlgorithm::ES384 => Algorithm::ES384,
        }
    }
}
