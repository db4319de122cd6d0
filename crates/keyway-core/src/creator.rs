//! Profile creators
//!
//! A profile creator turns validated credentials into a [`UserProfile`].
//! The profile identifier must be a deterministic function of the
//! credentials.

use crate::context::{SessionStore, WebContext};
use crate::credentials::Credentials;
use crate::error::AuthResult;
use crate::profile::UserProfile;
use async_trait::async_trait;

/// Builds a user profile from validated credentials.
#[async_trait]
pub trait ProfileCreator: Send + Sync {
    /// Create the profile, or `None` when the protocol reports that no
    /// profile is available.
    async fn create(
        &self,
        credentials: &Credentials,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<UserProfile>>;
}

/// Returns the profile the authenticator attached to the credentials.
///
/// Used by clients that do not configure a profile creator.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatorProfileCreator;

#[async_trait]
impl ProfileCreator for AuthenticatorProfileCreator {
    async fn create(
        &self,
        credentials: &Credentials,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<UserProfile>> {
        Ok(credentials.user_profile().cloned())
    }
}
