//! End-to-end behavior of the authentication pipeline through the HTTP
//! presets.

use base64::Engine;
use keyway_core::mock::{MockSessionStore, MockWebContext};
use keyway_core::{
    AccountRecord, AuthError, AuthResult, BasicAuthExtractor, ClientBuilder, ClientConfig,
    ClientDefinition, ClientRegistry, ClientsConfig, CompositeExtractor, CookieExtractor,
    Credentials, CredentialsExtractor, CredentialsKind, HttpAction, MemoryProfileService, Outcome,
    ParameterExtractor, PasswordAuthenticator, PlainTextSecretMatcher, SecretMatcher,
    SessionStore, UserProfile, WebContext,
};
use keyway_http::{
    register_clients, CookieClient, DirectBasicAuthClient, IndirectBasicAuthClient,
    ParameterClient, SimpleTestTokenAuthenticator, SimpleTestUsernamePasswordAuthenticator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn basic_header(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
    )
}

fn password_authenticator(accounts: &[(&str, &str, &str)]) -> PasswordAuthenticator {
    let matcher: Arc<dyn SecretMatcher> = Arc::new(PlainTextSecretMatcher);
    let store = MemoryProfileService::new(matcher.clone());
    for (id, username, password) in accounts {
        store.insert_record(AccountRecord::new(*id, *username, Some(password.to_string())));
    }
    PasswordAuthenticator::new(Arc::new(store), matcher)
}

#[tokio::test]
async fn basic_auth_alice_gets_a_profile() {
    let client = DirectBasicAuthClient::default().build(password_authenticator(&[(
        "alice", "alice", "secret",
    )]));
    let ctx = MockWebContext::new().with_header("Authorization", basic_header("alice", "secret"));
    let session = MockSessionStore::new();

    let credentials = client
        .get_credentials(&ctx, &session)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    assert_eq!(
        credentials.kind(),
        &CredentialsKind::UsernamePassword {
            username: "alice".to_string(),
            password: "secret".to_string(),
        }
    );

    let profile = client
        .get_user_profile(&credentials, &ctx, &session)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.id(), "alice");
}

#[tokio::test]
async fn malformed_basic_header_is_a_credentials_error() {
    let ctx = MockWebContext::new().with_header("Authorization", "Basic ###");
    let session = MockSessionStore::new();

    let result = BasicAuthExtractor::default().extract(&ctx, &session);
    assert!(matches!(result, Err(AuthError::Credentials(_))));

    // A direct client treats it as anonymous
    let client = DirectBasicAuthClient::default().build(SimpleTestUsernamePasswordAuthenticator);
    let outcome = client.get_credentials(&ctx, &session).await.unwrap();
    assert_eq!(outcome, Outcome::Continue(None));
}

#[tokio::test]
async fn post_only_parameter_ignores_get_requests() {
    let ctx = MockWebContext::new()
        .with_method("GET")
        .with_parameter("token", "abc");
    let session = MockSessionStore::new();

    let extractor = ParameterExtractor::new("token");
    assert!(extractor.extract(&ctx, &session).unwrap().is_none());

    let client = ParameterClient::new("token").build(SimpleTestTokenAuthenticator);
    assert_eq!(
        client.get_credentials(&ctx, &session).await.unwrap(),
        Outcome::Continue(None)
    );

    let post = MockWebContext::new().with_parameter("token", "abc");
    let profile = client
        .authenticate(&post, &session)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    assert_eq!(profile.id(), "abc");
}

#[tokio::test]
async fn duplicate_accounts_are_reported() {
    let client = DirectBasicAuthClient::default().build(password_authenticator(&[
        ("misagh-1", "misagh", "password"),
        ("misagh-2", "misagh", "password"),
    ]));
    let ctx = MockWebContext::new().with_header("Authorization", basic_header("misagh", "password"));

    let result = client.get_credentials(&ctx, &MockSessionStore::new()).await;
    match result {
        Err(AuthError::MultipleAccountsFound(message)) => assert!(message.contains("misagh")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn session_cookie_becomes_token() {
    let ctx = MockWebContext::new()
        .with_cookie("A", "1")
        .with_cookie("SESSIONID", "xyz");
    let session = MockSessionStore::new();

    let credentials = CookieExtractor::new("SESSIONID")
        .extract(&ctx, &session)
        .unwrap()
        .unwrap();
    assert_eq!(
        credentials.kind(),
        &CredentialsKind::Token {
            token: "xyz".to_string()
        }
    );

    let client = CookieClient::new("SESSIONID").build(SimpleTestTokenAuthenticator);
    let profile = client
        .authenticate(&ctx, &session)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    assert_eq!(profile.id(), "xyz");
}

#[tokio::test]
async fn direct_client_without_credentials_is_anonymous() {
    let client = ClientBuilder::direct("empty")
        .extractor(CompositeExtractor::new())
        .authenticator(SimpleTestTokenAuthenticator)
        .build();

    let outcome = client
        .authenticate(&MockWebContext::new(), &MockSessionStore::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Continue(None));
}

#[tokio::test]
async fn indirect_credentials_error_is_one_challenge() {
    let client = IndirectBasicAuthClient::default()
        .callback_url("/callback")
        .build(SimpleTestUsernamePasswordAuthenticator);
    let ctx = MockWebContext::new().with_header("Authorization", basic_header("jle", "wrong"));

    let outcome = client
        .authenticate(&ctx, &MockSessionStore::new())
        .await
        .unwrap();
    let action = match outcome {
        Outcome::Action(action) => action,
        Outcome::Continue(profile) => panic!("expected an action, got {profile:?}"),
    };
    assert_eq!(action.code(), 401);
    assert_eq!(
        action,
        HttpAction::challenge("WWW-Authenticate", "Basic realm=\"authentication required\"")
    );

    let mut response = MockWebContext::new();
    action.apply(&mut response);
    assert_eq!(response.response_status(), Some(401));
    assert_eq!(
        response.response_header("www-authenticate").as_deref(),
        Some("Basic realm=\"authentication required\"")
    );
}

#[tokio::test]
async fn indirect_round_trip() {
    let client = IndirectBasicAuthClient::default()
        .callback_url("https://app.example.com/callback")
        .build(SimpleTestUsernamePasswordAuthenticator);
    let session = MockSessionStore::new();

    let start = MockWebContext::new().with_method("GET");
    let redirect = client.get_redirection_action(&start, &session).unwrap().unwrap();
    assert!(redirect.is_redirect());

    let callback = MockWebContext::new()
        .with_method("GET")
        .with_parameter("client_name", "IndirectBasicAuthClient")
        .with_header("Authorization", basic_header("jle", "jle"));
    let profile = client
        .authenticate(&callback, &session)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    assert_eq!(profile.id(), "jle");
    assert!(session
        .get(&callback, "IndirectBasicAuthClient$attemptedAuthentication")
        .is_none());
}

#[tokio::test]
async fn generators_observe_previous_changes() {
    let client = CookieClient::new("SESSIONID")
        .builder()
        .authenticator(SimpleTestTokenAuthenticator)
        .authorization_generator(
            |_: &dyn WebContext, _: &dyn SessionStore, profile: &mut UserProfile| -> AuthResult<()> {
                profile.add_role("A");
                Ok(())
            },
        )
        .authorization_generator(
            |_: &dyn WebContext, _: &dyn SessionStore, profile: &mut UserProfile| -> AuthResult<()> {
                if profile.has_role("A") {
                    profile.add_role("B");
                }
                Ok(())
            },
        )
        .build();
    let ctx = MockWebContext::new().with_cookie("SESSIONID", "xyz");

    let profile = client
        .authenticate(&ctx, &MockSessionStore::new())
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    let roles: Vec<&str> = profile.roles().iter().map(String::as_str).collect();
    assert_eq!(roles, vec!["A", "B"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_initialize_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let client = Arc::new(
        ClientBuilder::direct("cookie")
            .setup(move |_: &str, config: &mut ClientConfig| -> AuthResult<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                config.set_extractor_if_undefined(CookieExtractor::new("SESSIONID"));
                Ok(())
            })
            .authenticator(SimpleTestTokenAuthenticator)
            .build(),
    );

    let barrier = Arc::new(tokio::sync::Barrier::new(16));
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                let ctx = MockWebContext::new().with_cookie("SESSIONID", &format!("user-{i}"));
                client.authenticate(&ctx, &MockSessionStore::new()).await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let profile = task.await.unwrap().unwrap().into_result().unwrap().unwrap();
        assert_eq!(profile.id(), format!("user-{i}"));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(client.is_initialized());
}

#[tokio::test]
async fn clients_from_configuration() {
    let mut registry = ClientRegistry::new();
    register_clients(&mut registry);
    registry.register_authenticator("users", Arc::new(password_authenticator(&[("alice", "alice", "secret")])));
    registry.register_authenticator("echo", Arc::new(SimpleTestUsernamePasswordAuthenticator));

    let config = ClientsConfig::from_json(
        r#"{
            "callback_url": "https://app.example.com/callback",
            "clients": [
                { "type": "direct_basic_auth", "name": "api", "authenticator": "users" },
                { "type": "indirect_basic_auth", "name": "admin", "authenticator": "echo",
                  "properties": { "realm_name": "Admin" } }
            ]
        }"#,
    )
    .unwrap();
    let clients = registry.build_all(&config).unwrap();
    clients.init().unwrap();

    let api = clients.find("API").unwrap();
    let ctx = MockWebContext::new().with_header("Authorization", basic_header("alice", "secret"));
    let profile = api
        .authenticate(&ctx, &MockSessionStore::new())
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    assert_eq!(profile.id(), "alice");
    assert_eq!(profile.client_name(), Some("api"));

    let admin = clients.find("admin").unwrap();
    let redirect = admin
        .get_redirection_action(&MockWebContext::new(), &MockSessionStore::new())
        .unwrap()
        .unwrap();
    assert_eq!(
        redirect,
        HttpAction::SeeOther {
            location: "https://app.example.com/callback?client_name=admin".to_string()
        }
    );

    let unknown = registry.build(&ClientDefinition::new("saml2", "idp"));
    assert!(matches!(unknown, Err(AuthError::Configuration(_))));
}

#[tokio::test]
async fn validated_credentials_are_not_revalidated() {
    let authenticator = password_authenticator(&[("alice", "alice", "secret")]);
    let client = DirectBasicAuthClient::default().build(authenticator);
    let ctx = MockWebContext::new().with_header("Authorization", basic_header("alice", "secret"));
    let session = MockSessionStore::new();

    let mut credentials: Credentials = client
        .get_credentials(&ctx, &session)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .unwrap();
    let first = credentials.user_profile().unwrap().id().to_string();
    assert!(!credentials.attach_profile(UserProfile::new("mallory")));
    assert_eq!(credentials.user_profile().unwrap().id(), first);
}
