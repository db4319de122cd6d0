//! Redirection and logout action builders
//!
//! Both are pluggable on a client and receive a [`ClientView`] so they can
//! compute the client's callback URL and namespaced session keys.

use super::ClientView;
use crate::action::HttpAction;
use crate::context::{SessionStore, WebContext};
use crate::error::AuthResult;
use crate::profile::UserProfile;
use crate::util::add_parameter;

/// Builds the action that starts the redirect round trip of an indirect
/// client.
pub trait RedirectionActionBuilder: Send + Sync {
    /// Build the action, or `None` when no redirection is possible.
    fn redirection_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>>;
}

impl<F> RedirectionActionBuilder for F
where
    F: Fn(&ClientView<'_>, &dyn WebContext, &dyn SessionStore) -> AuthResult<Option<HttpAction>>
        + Send
        + Sync,
{
    fn redirection_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>> {
        self(client, ctx, session)
    }
}

/// Builds the provider-side logout action of a client.
pub trait LogoutActionBuilder: Send + Sync {
    /// Build the action, or `None` for a local-only logout.
    fn logout_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        session: &dyn SessionStore,
        profile: &UserProfile,
        target_url: Option<&str>,
    ) -> AuthResult<Option<HttpAction>>;
}

/// Redirects to the callback URL of the client.
///
/// Used by clients whose "login page" is the callback itself, e.g. a basic
/// auth challenge served on the callback endpoint.
#[derive(Debug, Clone, Default)]
pub struct CallbackRedirectionActionBuilder;

impl RedirectionActionBuilder for CallbackRedirectionActionBuilder {
    fn redirection_action(
        &self,
        client: &ClientView<'_>,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<Option<HttpAction>> {
        let url = client.compute_callback_url(ctx)?;
        Ok(Some(HttpAction::redirect(ctx, url)))
    }
}

/// Redirects to a fixed provider logout URL, optionally passing the target
/// URL in a query parameter.
#[derive(Debug, Clone)]
pub struct RedirectLogoutActionBuilder {
    logout_url: String,
    target_parameter: Option<String>,
}

impl RedirectLogoutActionBuilder {
    /// Redirect to `logout_url`.
    pub fn new(logout_url: impl Into<String>) -> Self {
        Self {
            logout_url: logout_url.into(),
            target_parameter: None,
        }
    }

    /// Pass the target URL in `parameter`.
    pub fn target_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.target_parameter = Some(parameter.into());
        self
    }
}

impl LogoutActionBuilder for RedirectLogoutActionBuilder {
    fn logout_action(
        &self,
        _client: &ClientView<'_>,
        ctx: &dyn WebContext,
        _session: &dyn SessionStore,
        _profile: &UserProfile,
        target_url: Option<&str>,
    ) -> AuthResult<Option<HttpAction>> {
        let location = match (&self.target_parameter, target_url) {
            (Some(parameter), Some(target)) => add_parameter(&self.logout_url, parameter, target),
            _ => self.logout_url.clone(),
        };
        Ok(Some(HttpAction::redirect(ctx, location)))
    }
}
