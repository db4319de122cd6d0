//! Authenticators for development and tests. Never use them in production.

use async_trait::async_trait;
use keyway_core::profile::USERNAME;
use keyway_core::{
    AuthError, AuthResult, Authenticator, Credentials, CredentialsKind, SessionStore, UserProfile,
    WebContext,
};

/// Accepts any non-blank token; the token becomes the profile id.
#[derive(Debug, Clone, Default)]
pub struct SimpleTestTokenAuthenticator;

#[async_trait]
impl Authenticator for SimpleTestTokenAuthenticator {
    async fn validate(
        &self,
        credentials: &mut Credentials,
        _ctx: &dyn WebContext,
        _session: &dyn SessionStore,
    ) -> AuthResult<()> {
        if credentials.is_validated() {
            return Ok(());
        }
        let token = match credentials.token_value() {
            Some(token) if !token.trim().is_empty() => token.to_string(),
            Some(_) => return Err(AuthError::Credentials("token cannot be blank".to_string())),
            None => {
                return Err(AuthError::Credentials(
                    "Unsupported credentials type".to_string(),
                ))
            }
        };
        credentials.attach_profile(UserProfile::new(token));
        Ok(())
    }
}

/// Accepts a username/password pair when both are equal.
#[derive(Debug, Clone, Default)]
pub struct SimpleTestUsernamePasswordAuthenticator;

#[async_trait]
impl Authenticator for SimpleTestUsernamePasswordAuthenticator {
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
        if username.trim().is_empty() {
            return Err(AuthError::Credentials("Username cannot be blank".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AuthError::Credentials("Password cannot be blank".to_string()));
        }
        if username != password {
            return Err(AuthError::Credentials(format!(
                "Username : '{username}' does not match password"
            )));
        }

        let profile = UserProfile::new(username.as_str()).with_attribute(USERNAME, username.as_str());
        credentials.attach_profile(profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::mock::{MockSessionStore, MockWebContext};

    async fn validate(
        authenticator: &dyn Authenticator,
        credentials: &mut Credentials,
    ) -> AuthResult<()> {
        authenticator
            .validate(credentials, &MockWebContext::new(), &MockSessionStore::new())
            .await
    }

    #[tokio::test]
    async fn test_token() {
        let mut credentials = Credentials::token("abc");
        validate(&SimpleTestTokenAuthenticator, &mut credentials).await.unwrap();
        assert_eq!(credentials.user_profile().unwrap().id(), "abc");

        let mut blank = Credentials::token(" ");
        assert!(matches!(
            validate(&SimpleTestTokenAuthenticator, &mut blank).await,
            Err(AuthError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_username_password() {
        let mut good = Credentials::username_password("jle", "jle");
        validate(&SimpleTestUsernamePasswordAuthenticator, &mut good)
            .await
            .unwrap();
        let profile = good.user_profile().unwrap();
        assert_eq!(profile.id(), "jle");
        assert_eq!(profile.username(), Some("jle"));

        let mut bad = Credentials::username_password("jle", "other");
        assert_eq!(
            validate(&SimpleTestUsernamePasswordAuthenticator, &mut bad)
                .await
                .unwrap_err(),
            AuthError::Credentials("Username : 'jle' does not match password".to_string())
        );
        assert!(!bad.is_validated());
    }
}
