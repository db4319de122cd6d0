//! X.509 client certificate authentication.

use async_trait::async_trait;
use keyway_core::{
    AuthError, AuthResult, Authenticator, Client, ClientBuilder, ClientConfig, ClientSetup,
    Credentials, CredentialsKind, SessionStore, UserProfile, WebContext, X509CertificateExtractor,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default pattern capturing the common name of a subject DN.
pub const DEFAULT_SUBJECT_DN_PATTERN: &str = "CN=(.*?)(?:,|$)";

/// Authenticates a client certificate by its subject DN.
///
/// The first capture group of the pattern becomes the profile id.
#[derive(Debug, Clone)]
pub struct X509Authenticator {
    pattern: Regex,
}

impl X509Authenticator {
    /// Use a custom subject DN pattern with one capture group.
    pub fn new(pattern: &str) -> AuthResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| AuthError::Configuration(format!("Invalid subject DN pattern: {e}")))?;
        if pattern.captures_len() < 2 {
            return Err(AuthError::Configuration(
                "Subject DN pattern must have a capture group".to_string(),
            ));
        }
        Ok(Self { pattern })
    }

    /// Use [`DEFAULT_SUBJECT_DN_PATTERN`].
    pub fn common_name() -> AuthResult<Self> {
        Self::new(DEFAULT_SUBJECT_DN_PATTERN)
    }

    /// Pattern in use.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

#[async_trait]
impl Authenticator for X509Authenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let CredentialsKind::X509 { certificate } = credentials.kind() else {
            return Err(AuthError::Credentials(
                "Unsupported credentials type".to_string(),
            ));
        };
        let certificate = certificate.clone();

        let subject = certificate.subject_dn.as_str();
        let id = self
            .pattern
            .captures(subject)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AuthError::Credentials(format!(
                    "No matching for pattern: {} in subject DN: {subject}",
                    self.pattern
                ))
            })?
            .to_string();

        let mut profile = UserProfile::new(id.as_str());
        profile.add_attribute("subject_dn", certificate.subject_dn.as_str());
        profile.add_attribute("issuer_dn", certificate.issuer_dn.as_str());
        if !certificate.serial_number.is_empty() {
            profile.add_attribute("serial_number", certificate.serial_number.as_str());
        }

        debug!(id = %id, "Certificate accepted");
        credentials.attach_profile(profile);
        Ok(())
    }
}

/// Client certificate presented during the TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Client {
    /// Client name
    pub name: String,
    /// Subject DN pattern of the default authenticator
    #[serde(default = "default_pattern")]
    pub subject_dn_pattern: String,
}

fn default_pattern() -> String {
    DEFAULT_SUBJECT_DN_PATTERN.to_string()
}

impl Default for X509Client {
    fn default() -> Self {
        Self {
            name: "X509Client".to_string(),
            subject_dn_pattern: default_pattern(),
        }
    }
}

impl X509Client {
    /// Start a client builder with this preset installed.
    pub fn builder(self) -> ClientBuilder {
        ClientBuilder::direct(self.name.clone()).setup(self)
    }

    /// Build the client with the pattern-based authenticator.
    pub fn build(self) -> Client {
        self.builder().build()
    }
}

impl ClientSetup for X509Client {
    fn configure(&self, _client_name: &str, config: &mut ClientConfig) -> AuthResult<()> {
        config.set_extractor_if_undefined(X509CertificateExtractor);
        if config.authenticator.is_none() {
            config.set_authenticator_if_undefined(X509Authenticator::new(&self.subject_dn_pattern)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::mock::{MockSessionStore, MockWebContext};
    use keyway_core::X509Certificate;

    async fn validate(authenticator: &X509Authenticator, subject: &str) -> AuthResult<Credentials> {
        let mut credentials = Credentials::x509(X509Certificate::new(subject, "CN=Issuer"));
        authenticator
            .validate(&mut credentials, &MockWebContext::new(), &MockSessionStore::new())
            .await?;
        Ok(credentials)
    }

    #[tokio::test]
    async fn test_common_name_becomes_id() {
        let auth = X509Authenticator::common_name().unwrap();
        let credentials = validate(&auth, "CN=jle,OU=Dev,O=Keyway").await.unwrap();
        let profile = credentials.user_profile().unwrap();
        assert_eq!(profile.id(), "jle");
        assert_eq!(
            profile.attribute("issuer_dn").and_then(|v| v.as_str()),
            Some("CN=Issuer")
        );

        let credentials = validate(&auth, "O=Keyway, CN=last").await.unwrap();
        assert_eq!(credentials.user_profile().unwrap().id(), "last");
    }

    #[tokio::test]
    async fn test_no_match_is_credentials_error() {
        let auth = X509Authenticator::common_name().unwrap();
        assert!(matches!(
            validate(&auth, "O=Keyway").await,
            Err(AuthError::Credentials(_))
        ));
    }

    #[test]
    fn test_pattern_without_group() {
        assert!(matches!(
            X509Authenticator::new("CN=.*"),
            Err(AuthError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_client_reads_handshake_certificate() {
        let client = X509Client::default().build();
        let ctx = MockWebContext::new()
            .with_certificate(X509Certificate::new("CN=device-42,O=Keyway", "CN=CA"));

        let profile = client
            .authenticate(&ctx, &MockSessionStore::new())
            .await
            .unwrap()
            .into_result()
            .unwrap()
            .unwrap();
        assert_eq!(profile.id(), "device-42");
        assert_eq!(profile.client_name(), Some("X509Client"));
    }
}
