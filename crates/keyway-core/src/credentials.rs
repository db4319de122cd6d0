//! Credentials model
//!
//! Credentials are the raw, extracted-but-not-yet-verified proof of identity.
//! Once an authenticator accepts them it attaches the verified
//! [`UserProfile`]; that attachment happens at most once.

use crate::profile::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client certificate as presented by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Certificate {
    /// Subject distinguished name, e.g. `CN=alice,O=Example`
    pub subject_dn: String,
    /// Issuer distinguished name
    pub issuer_dn: String,
    /// Serial number (hex)
    pub serial_number: String,
    /// End of validity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
}

impl X509Certificate {
    /// Create a certificate description from its subject and issuer.
    pub fn new(subject_dn: impl Into<String>, issuer_dn: impl Into<String>) -> Self {
        Self {
            subject_dn: subject_dn.into(),
            issuer_dn: issuer_dn.into(),
            serial_number: String::new(),
            not_after: None,
        }
    }
}

/// The shape of extracted credential material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsKind {
    /// An opaque token (header, parameter or cookie value)
    Token {
        /// Token value
        token: String,
    },
    /// A username and a plain password
    UsernamePassword {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// A TLS client certificate
    X509 {
        /// Presented certificate
        certificate: X509Certificate,
    },
    /// An OAuth 2.0 authorization code returned on the callback
    OAuth {
        /// Authorization code
        code: String,
        /// State echoed by the provider
        state: Option<String>,
    },
    /// An OpenID Connect authentication response
    Oidc {
        /// Authorization code (code and hybrid flows)
        code: Option<String>,
        /// ID token (implicit and hybrid flows)
        id_token: Option<String>,
        /// Access token (implicit and hybrid flows)
        access_token: Option<String>,
    },
}

impl std::fmt::Debug for CredentialsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsKind::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"[REDACTED]")
                .finish(),
            CredentialsKind::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            CredentialsKind::X509 { certificate } => f
                .debug_struct("X509")
                .field("subject_dn", &certificate.subject_dn)
                .finish(),
            CredentialsKind::OAuth { state, .. } => f
                .debug_struct("OAuth")
                .field("code", &"[REDACTED]")
                .field("state", state)
                .finish(),
            CredentialsKind::Oidc {
                code,
                id_token,
                access_token,
            } => f
                .debug_struct("Oidc")
                .field("code", &code.is_some())
                .field("id_token", &id_token.is_some())
                .field("access_token", &access_token.is_some())
                .finish(),
        }
    }
}

/// Extracted credentials plus, after validation, the verified profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    kind: CredentialsKind,
    user_profile: Option<UserProfile>,
}

impl Credentials {
    /// Wrap extracted material.
    pub fn new(kind: CredentialsKind) -> Self {
        Self {
            kind,
            user_profile: None,
        }
    }

    /// Token credentials.
    pub fn token(token: impl Into<String>) -> Self {
        Self::new(CredentialsKind::Token {
            token: token.into(),
        })
    }

    /// Username/password credentials.
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(CredentialsKind::UsernamePassword {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Certificate credentials.
    pub fn x509(certificate: X509Certificate) -> Self {
        Self::new(CredentialsKind::X509 { certificate })
    }

    /// The extracted material.
    pub fn kind(&self) -> &CredentialsKind {
        &self.kind
    }

    /// Token value for token credentials.
    pub fn token_value(&self) -> Option<&str> {
        match &self.kind {
            CredentialsKind::Token { token } => Some(token),
            _ => None,
        }
    }

    /// Username for username/password credentials.
    pub fn username(&self) -> Option<&str> {
        match &self.kind {
            CredentialsKind::UsernamePassword { username, .. } => Some(username),
            _ => None,
        }
    }

    /// Password for username/password credentials.
    pub fn password(&self) -> Option<&str> {
        match &self.kind {
            CredentialsKind::UsernamePassword { password, .. } => Some(password),
            _ => None,
        }
    }

    /// Profile attached by the authenticator.
    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.user_profile.as_ref()
    }

    /// Check if an authenticator already accepted these credentials.
    pub fn is_validated(&self) -> bool {
        self.user_profile.is_some()
    }

    /// Attach the verified profile.
    ///
    /// The first attachment wins; later calls leave it in place and return
    /// false.
    pub fn attach_profile(&mut self, profile: UserProfile) -> bool {
        if self.user_profile.is_some() {
            return false;
        }
        self.user_profile = Some(profile);
        true
    }
}
