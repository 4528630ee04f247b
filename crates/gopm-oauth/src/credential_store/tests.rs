use std::path::Path;

use httpmock::prelude::*;
use serde_json::json;

use super::*;

fn test_config(server_base: &str, tokens_path: &Path) -> CredentialStoreConfig {
    CredentialStoreConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://agent.example/oauth/callback".to_string(),
        authorize_url: format!("{server_base}/oauth/authorize"),
        token_url: format!("{server_base}/oauth/token"),
        graphql_url: format!("{server_base}/graphql"),
        tokens_path: tokens_path.to_path_buf(),
        request_timeout_ms: 5_000,
    }
}

fn mock_identity_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": {
                "viewer": {
                    "id": "agent-user-1",
                    "name": "goPM Agent",
                    "organization": { "id": "workspace-1", "name": "Acme" }
                }
            }
        }));
    })
}

#[test]
fn unit_load_requires_client_credentials() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let mut config = test_config("http://localhost:9", &tempdir.path().join("tokens.json"));
    config.client_id = " ".to_string();
    let error = CredentialStore::load(config)
        .err()
        .expect("load should fail without a client id");
    assert!(error.to_string().contains("client id"));
}

#[test]
fn unit_workspace_token_expiry_honors_missing_deadline() {
    let token = WorkspaceToken {
        workspace_id: "workspace-1".to_string(),
        workspace_name: "Acme".to_string(),
        access_token: "token".to_string(),
        token_type: "Bearer".to_string(),
        scope: String::new(),
        agent_user_id: "agent-user-1".to_string(),
        installed_at_unix_ms: 1_000,
        expires_at_unix_ms: None,
    };
    assert!(!token.is_expired_at(u64::MAX));
    let bounded = WorkspaceToken {
        expires_at_unix_ms: Some(2_000),
        ..token
    };
    assert!(!bounded.is_expired_at(1_999));
    assert!(bounded.is_expired_at(2_000));
}

#[test]
fn functional_begin_authorization_embeds_agent_actor_and_scopes() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let config = test_config(
        "https://linear.example",
        &tempdir.path().join("tokens.json"),
    );
    let store = CredentialStore::load(config).expect("load");

    let request = store
        .begin_authorization(Some("workspace-1"))
        .expect("begin authorization");
    assert_eq!(request.state.len(), 64);
    assert!(request.authorize_url.contains("actor=app"));
    assert!(request.authorize_url.contains("response_type=code"));
    assert!(request.authorize_url.contains("workspace_id=workspace-1"));
    assert!(request
        .authorize_url
        .contains("app%3Aassignable%2Capp%3Amentionable"));
    assert!(request.authorize_url.contains(&request.state));
    assert_eq!(store.pending_count(), 1);
}

#[tokio::test]
async fn functional_complete_authorization_installs_workspace() {
    let server = MockServer::start_async().await;
    let token_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth/token")
            .body_includes("grant_type=authorization_code")
            .body_includes("code=auth-code-1");
        then.status(200).json_body(json!({
            "access_token": "lin_oauth_abc",
            "token_type": "Bearer",
            "scope": "read,write",
            "expires_in": 3600
        }));
    });
    let identity_mock = mock_identity_endpoint(&server);

    let tempdir = tempfile::tempdir().expect("tempdir");
    let tokens_path = tempdir.path().join("tokens.json");
    let store =
        CredentialStore::load(test_config(&server.base_url(), &tokens_path)).expect("load");
    let request = store.begin_authorization(None).expect("begin");

    let token = store
        .complete_authorization("auth-code-1", &request.state)
        .await
        .expect("complete authorization");
    token_mock.assert();
    identity_mock.assert();
    assert_eq!(token.workspace_id, "workspace-1");
    assert_eq!(token.workspace_name, "Acme");
    assert_eq!(token.agent_user_id, "agent-user-1");
    assert!(token.expires_at_unix_ms.is_some());

    let stored = store
        .token_for_workspace("workspace-1")
        .expect("stored token");
    assert_eq!(stored.access_token, "lin_oauth_abc");

    let persisted = std::fs::read_to_string(&tokens_path).expect("credentials file");
    assert!(persisted.contains("lin_oauth_abc"));
    assert!(persisted.contains("workspace-1"));
}

#[tokio::test]
async fn regression_state_is_single_use_even_when_exchange_fails() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(500).body("provider exploded");
    });

    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::load(test_config(
        &server.base_url(),
        &tempdir.path().join("tokens.json"),
    ))
    .expect("load");
    let request = store.begin_authorization(None).expect("begin");

    let first = store
        .complete_authorization("bad-code", &request.state)
        .await;
    assert!(matches!(
        first,
        Err(OAuthError::ExchangeFailed { status: 500, .. })
    ));

    let second = store
        .complete_authorization("bad-code", &request.state)
        .await;
    assert!(matches!(second, Err(OAuthError::InvalidState)));
}

#[tokio::test]
async fn regression_replayed_state_after_success_is_rejected() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({ "access_token": "lin_oauth_abc" }));
    });
    mock_identity_endpoint(&server);

    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::load(test_config(
        &server.base_url(),
        &tempdir.path().join("tokens.json"),
    ))
    .expect("load");
    let request = store.begin_authorization(None).expect("begin");

    store
        .complete_authorization("auth-code-1", &request.state)
        .await
        .expect("first redemption");
    let replay = store
        .complete_authorization("auth-code-1", &request.state)
        .await;
    assert!(matches!(replay, Err(OAuthError::InvalidState)));
}

#[tokio::test]
async fn regression_stale_pending_authorization_is_rejected() {
    let server = MockServer::start_async().await;
    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({ "access_token": "lin_oauth_abc" }));
    });

    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::load(test_config(
        &server.base_url(),
        &tempdir.path().join("tokens.json"),
    ))
    .expect("load");
    let request = store.begin_authorization(None).expect("begin");
    store.age_pending_for_tests(
        &request.state,
        current_unix_timestamp_ms().saturating_sub(PENDING_AUTHORIZATION_TTL_MS + 1),
    );

    let result = store
        .complete_authorization("auth-code-1", &request.state)
        .await;
    assert!(matches!(result, Err(OAuthError::InvalidState)));
    token_mock.assert_hits(0);
}

#[tokio::test]
async fn regression_identity_lookup_errors_surface_graphql_errors() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({ "access_token": "lin_oauth_abc" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(json!({ "errors": [{ "message": "forbidden" }] }));
    });

    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::load(test_config(
        &server.base_url(),
        &tempdir.path().join("tokens.json"),
    ))
    .expect("load");
    let request = store.begin_authorization(None).expect("begin");

    let result = store
        .complete_authorization("auth-code-1", &request.state)
        .await;
    match result {
        Err(OAuthError::IdentityLookupFailed(message)) => {
            assert!(message.contains("forbidden"));
        }
        other => panic!("expected identity failure, got {other:?}"),
    }
}

#[test]
fn functional_sweep_removes_stale_pending_and_expired_tokens() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let tokens_path = tempdir.path().join("tokens.json");
    let store = CredentialStore::load(test_config("https://linear.example", &tokens_path))
        .expect("load");

    let request = store.begin_authorization(None).expect("begin");
    let now_ms = current_unix_timestamp_ms();
    store.age_pending_for_tests(
        &request.state,
        now_ms.saturating_sub(PENDING_AUTHORIZATION_TTL_MS + 1),
    );
    {
        let mut guard = store.inner.lock().expect("lock");
        guard.tokens.insert(
            "workspace-expired".to_string(),
            WorkspaceToken {
                workspace_id: "workspace-expired".to_string(),
                workspace_name: "Old".to_string(),
                access_token: "stale".to_string(),
                token_type: "Bearer".to_string(),
                scope: String::new(),
                agent_user_id: "agent-user-1".to_string(),
                installed_at_unix_ms: now_ms.saturating_sub(10_000),
                expires_at_unix_ms: Some(now_ms.saturating_sub(1)),
            },
        );
        guard.tokens.insert(
            "workspace-live".to_string(),
            WorkspaceToken {
                workspace_id: "workspace-live".to_string(),
                workspace_name: "Live".to_string(),
                access_token: "fresh".to_string(),
                token_type: "Bearer".to_string(),
                scope: String::new(),
                agent_user_id: "agent-user-1".to_string(),
                installed_at_unix_ms: now_ms,
                expires_at_unix_ms: None,
            },
        );
    }

    let report = store.sweep_expired_at(now_ms).expect("sweep");
    assert_eq!(report.removed_pending, 1);
    assert_eq!(report.removed_tokens, 1);
    assert_eq!(store.pending_count(), 0);
    assert!(store.token_for_workspace("workspace-expired").is_none());
    assert!(store.token_for_workspace("workspace-live").is_some());

    let persisted = std::fs::read_to_string(&tokens_path).expect("credentials file");
    assert!(!persisted.contains("workspace-expired"));

    let repeat = store.sweep_expired_at(now_ms).expect("second sweep");
    assert_eq!(repeat, SweepReport::default());
}

#[test]
fn functional_load_drops_expired_tokens() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let tokens_path = tempdir.path().join("tokens.json");
    let now_ms = current_unix_timestamp_ms();
    let payload = json!({
        "workspace-expired": {
            "workspace_id": "workspace-expired",
            "workspace_name": "Old",
            "access_token": "stale",
            "agent_user_id": "agent-user-1",
            "installed_at_unix_ms": 1,
            "expires_at_unix_ms": 2
        },
        "workspace-live": {
            "workspace_id": "workspace-live",
            "workspace_name": "Live",
            "access_token": "fresh",
            "agent_user_id": "agent-user-1",
            "installed_at_unix_ms": now_ms,
            "expires_at_unix_ms": null
        }
    });
    std::fs::write(&tokens_path, payload.to_string()).expect("seed credentials");

    let store =
        CredentialStore::load(test_config("https://linear.example", &tokens_path)).expect("load");
    assert!(store.token_for_workspace("workspace-expired").is_none());
    let live = store
        .token_for_workspace("workspace-live")
        .expect("live token");
    assert_eq!(live.token_type, "Bearer");
    assert_eq!(store.installed_workspaces().len(), 1);
}

#[test]
fn regression_malformed_credentials_file_starts_fresh() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let tokens_path = tempdir.path().join("tokens.json");
    std::fs::write(&tokens_path, "{ not json").expect("seed credentials");

    let store =
        CredentialStore::load(test_config("https://linear.example", &tokens_path)).expect("load");
    assert!(store.installed_workspaces().is_empty());
}

#[test]
fn functional_remove_workspace_persists() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let tokens_path = tempdir.path().join("tokens.json");
    let store =
        CredentialStore::load(test_config("https://linear.example", &tokens_path)).expect("load");
    {
        let mut guard = store.inner.lock().expect("lock");
        guard.tokens.insert(
            "workspace-1".to_string(),
            WorkspaceToken {
                workspace_id: "workspace-1".to_string(),
                workspace_name: "Acme".to_string(),
                access_token: "token".to_string(),
                token_type: "Bearer".to_string(),
                scope: String::new(),
                agent_user_id: "agent-user-1".to_string(),
                installed_at_unix_ms: 1,
                expires_at_unix_ms: None,
            },
        );
    }

    assert!(store.remove_workspace("workspace-1").expect("remove"));
    assert!(!store.remove_workspace("workspace-1").expect("second remove"));
    let persisted = std::fs::read_to_string(&tokens_path).expect("credentials file");
    assert!(!persisted.contains("workspace-1"));
}
