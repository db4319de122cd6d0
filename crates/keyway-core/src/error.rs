//! Error types for the authentication pipeline
//!
//! This module defines every failure kind the pipeline can surface. Each kind
//! is a distinct variant so callers can discriminate without string matching.
//! Transport-level interruptions (redirects, challenges) are not errors; they
//! travel as [`HttpAction`](crate::action::HttpAction) values instead.

use thiserror::Error;

/// Authentication error types.
///
/// `Credentials` is the only recoverable kind: direct clients degrade it to
/// "no credentials" and indirect clients turn it into a 401 challenge. The
/// account-domain kinds are always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Required collaborator missing or a required parameter blank at init time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or syntactically invalid credential material
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// Secret did not match the stored one
    #[error("{0}")]
    BadCredentials(String),

    /// No account matches the lookup key
    #[error("{0}")]
    AccountNotFound(String),

    /// More than one account matches the lookup key
    #[error("{0}")]
    MultipleAccountsFound(String),

    /// Account is no longer valid
    #[error("{0}")]
    AccountExpired(String),

    /// Secret is no longer valid
    #[error("{0}")]
    CredentialsExpired(String),

    /// Operation not supported by this kind of client
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Internal or collaborator failure
    #[error("Technical error: {0}")]
    Technical(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Shorthand for the standard "cannot be null" configuration failure.
    pub fn missing(name: &str) -> Self {
        AuthError::Configuration(format!("{name} cannot be null"))
    }

    /// Check if this error is the recoverable credentials kind.
    pub fn is_credentials_error(&self) -> bool {
        matches!(self, AuthError::Credentials(_))
    }

    /// Check if this error should be logged at error level.
    ///
    /// Authentication failures are expected traffic and are not server errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Technical(_) | AuthError::Configuration(_) | AuthError::Unsupported(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Credentials(_)
            | AuthError::BadCredentials(_)
            | AuthError::AccountNotFound(_)
            | AuthError::MultipleAccountsFound(_)
            | AuthError::CredentialsExpired(_) => 401,

            AuthError::AccountExpired(_) => 403,

            AuthError::Configuration(_) | AuthError::Unsupported(_) | AuthError::Technical(_) => {
                500
            }
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "CONFIGURATION_ERROR",
            AuthError::Credentials(_) => "INVALID_CREDENTIALS",
            AuthError::BadCredentials(_) => "BAD_CREDENTIALS",
            AuthError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            AuthError::MultipleAccountsFound(_) => "MULTIPLE_ACCOUNTS_FOUND",
            AuthError::AccountExpired(_) => "ACCOUNT_EXPIRED",
            AuthError::CredentialsExpired(_) => "CREDENTIALS_EXPIRED",
            AuthError::Unsupported(_) => "UNSUPPORTED",
            AuthError::Technical(_) => "TECHNICAL_ERROR",
        }
    }
}
