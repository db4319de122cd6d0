//! Authenticators
//!
//! An authenticator validates extracted credentials and, on success,
//! attaches the verified [`UserProfile`](crate::profile::UserProfile) to
//! them. Validation is idempotent: credentials that already carry a profile
//! are left alone.

use crate::context::{SessionStore, WebContext};
use crate::credentials::{Credentials, CredentialsKind};
use crate::error::{AuthError, AuthResult};
use crate::store::{IdentityStore, SecretMatcher};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Validates credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate `credentials`, attaching the verified profile on success.
    ///
    /// # Errors
    ///
    /// - `Credentials` for malformed or unsupported material
    /// - `BadCredentials`, `AccountNotFound`, `MultipleAccountsFound`,
    ///   `AccountExpired`, `CredentialsExpired` for authentication failures
    async fn validate(
        &self,
        credentials: &mut Credentials,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<()>;
}

/// Username/password authenticator backed by an [`IdentityStore`].
///
/// Exactly one account must match the username; its secret is compared with
/// the [`SecretMatcher`], then account and secret expiry are checked.
pub struct PasswordAuthenticator {
    store: Arc<dyn IdentityStore>,
    matcher: Arc<dyn SecretMatcher>,
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator").finish_non_exhaustive()
    }
}

impl PasswordAuthenticator {
    /// Create an authenticator over `store` comparing secrets with `matcher`.
    pub fn new(store: Arc<dyn IdentityStore>, matcher: Arc<dyn SecretMatcher>) -> Self {
        Self { store, matcher }
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let CredentialsKind::UsernamePassword { username, password } = credentials.kind() else {
            return Err(AuthError::Credentials(
                "Unsupported credentials type".to_string(),
            ));
        };
        let (username, password) = (username.clone(), password.clone());
        if username.trim().is_empty() {
            return Err(AuthError::Credentials("Username cannot be blank".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Credentials("Password cannot be blank".to_string()));
        }

        let mut records = self.store.find_by_username(&username).await?;
        let record = match records.len() {
            0 => {
                return Err(AuthError::AccountNotFound(format!(
                    "No account found for: {username}"
                )))
            }
            1 => records.remove(0),
            _ => {
                return Err(AuthError::MultipleAccountsFound(format!(
                    "Too many accounts found for: {username}"
                )))
            }
        };

        let matches = record
            .password
            .as_deref()
            .is_some_and(|stored| self.matcher.matches(&password, stored));
        if !matches {
            return Err(AuthError::BadCredentials(format!(
                "Bad credentials for: {username}"
            )));
        }

        let now = Utc::now();
        if record.account_expires_at.is_some_and(|at| at <= now) {
            return Err(AuthError::AccountExpired(format!(
                "Account expired for: {username}"
            )));
        }
        if record.password_expires_at.is_some_and(|at| at <= now) {
            return Err(AuthError::CredentialsExpired(format!(
                "Credentials expired for: {username}"
            )));
        }

        debug!(username = %username, id = %record.id, "Password accepted");
        credentials.attach_profile(record.to_profile()?);
        Ok(())
    }
}
