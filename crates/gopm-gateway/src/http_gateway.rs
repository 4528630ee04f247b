//! Router wiring and handlers for the goPM HTTP gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use gopm_core::format_unix_ms_rfc3339;
use gopm_linear::WorkspaceResolver;
use gopm_oauth::CredentialStore;
use gopm_runtime::{DispatchOutcome, WebhookDispatcher};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod install_pages;


use install_pages::{render_install_failure_page, render_install_success_page};

const OAUTH_INSTALL_ENDPOINT: &str = "/oauth/install";
const OAUTH_CALLBACK_ENDPOINT: &str = "/oauth/callback";
const OAUTH_STATUS_ENDPOINT: &str = "/oauth/status";
const OAUTH_WORKSPACE_ENDPOINT_TEMPLATE: &str = "/oauth/workspace/{workspace_id}";
const OAUTH_CLEANUP_ENDPOINT: &str = "/oauth/cleanup";
const WEBHOOK_ENDPOINT: &str = "/webhook";
const HEALTH_ENDPOINT: &str = "/health";
const STATUS_ENDPOINT: &str = "/status";

const WEBHOOK_SIGNATURE_HEADER: &str = "linear-signature";

pub struct GatewayState {
    pub store: Arc<CredentialStore>,
    pub resolver: Arc<WorkspaceResolver>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub webhook_secret: Option<String>,
}

pub async fn run_gateway_server(bind: &str, state: Arc<GatewayState>) -> Result<()> {
    let bind_addr = bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid gateway bind address '{bind}'"))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;
    println!(
        "gateway: listening addr={local_addr} webhook_endpoint={WEBHOOK_ENDPOINT} install_endpoint={OAUTH_INSTALL_ENDPOINT}"
    );

    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(OAUTH_INSTALL_ENDPOINT, get(handle_oauth_install))
        .route(OAUTH_CALLBACK_ENDPOINT, get(handle_oauth_callback))
        .route(OAUTH_STATUS_ENDPOINT, get(handle_oauth_status))
        .route(
            OAUTH_WORKSPACE_ENDPOINT_TEMPLATE,
            delete(handle_remove_workspace),
        )
        .route(OAUTH_CLEANUP_ENDPOINT, post(handle_oauth_cleanup))
        .route(WEBHOOK_ENDPOINT, post(handle_webhook))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(STATUS_ENDPOINT, get(handle_status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct InstallQuery {
    workspace_id: Option<String>,
}

async fn handle_oauth_install(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<InstallQuery>,
) -> Response {
    match state.store.begin_authorization(query.workspace_id.as_deref()) {
        Ok(request) => {
            println!(
                "gateway: starting oauth flow workspace_hint={}",
                query.workspace_id.as_deref().unwrap_or("any")
            );
            (
                StatusCode::FOUND,
                [(header::LOCATION, request.authorize_url)],
            )
                .into_response()
        }
        Err(error) => {
            eprintln!("gateway: oauth install failed error={error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to start installation process",
                    "message": error.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn handle_oauth_callback(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(provider_error) = query.error.as_deref() {
        eprintln!(
            "gateway: oauth callback carried provider error={provider_error} description={}",
            query.error_description.as_deref().unwrap_or("none")
        );
        let detail = query
            .error_description
            .as_deref()
            .unwrap_or("Unknown error occurred");
        return (
            StatusCode::BAD_REQUEST,
            Html(render_install_failure_page(provider_error, detail)),
        )
            .into_response();
    }

    let (Some(code), Some(callback_state)) = (query.code.as_deref(), query.state.as_deref())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_install_failure_page(
                "missing_parameters",
                "Missing required parameters (code or state)",
            )),
        )
            .into_response();
    };

    match state.store.complete_authorization(code, callback_state).await {
        Ok(token) => (
            StatusCode::OK,
            Html(render_install_success_page(
                &token.workspace_name,
                &token.agent_user_id,
                &format_unix_ms_rfc3339(token.installed_at_unix_ms),
                &token.scope,
            )),
        )
            .into_response(),
        Err(error) => {
            eprintln!("gateway: oauth callback processing failed error={error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_install_failure_page(
                    "installation_failed",
                    &error.to_string(),
                )),
            )
                .into_response()
        }
    }
}

async fn handle_oauth_status(State(state): State<Arc<GatewayState>>) -> Response {
    let workspaces = state.store.installed_workspaces();
    let entries: Vec<Value> = workspaces
        .iter()
        .map(|token| {
            json!({
                "id": token.workspace_id,
                "name": token.workspace_name,
                "agent_id": token.agent_user_id,
                "installed_at": format_unix_ms_rfc3339(token.installed_at_unix_ms),
                "is_expired": token.is_expired(),
            })
        })
        .collect();
    (
        StatusCode::OK,
        Json(json!({
            "installed": !entries.is_empty(),
            "workspace_count": entries.len(),
            "workspaces": entries,
        })),
    )
        .into_response()
}

async fn handle_remove_workspace(
    State(state): State<Arc<GatewayState>>,
    Path(workspace_id): Path<String>,
) -> Response {
    match state.store.remove_workspace(&workspace_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Agent removed from workspace {workspace_id}"),
            })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("Workspace {workspace_id} not found"),
            })),
        )
            .into_response(),
        Err(error) => {
            eprintln!("gateway: workspace removal failed workspace_id={workspace_id} error={error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to remove workspace",
                    "message": error.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn handle_oauth_cleanup(State(state): State<Arc<GatewayState>>) -> Response {
    match state.store.sweep_expired() {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Cleanup completed",
                "removed_pending": report.removed_pending,
                "removed_tokens": report.removed_tokens,
            })),
        )
            .into_response(),
        Err(error) => {
            eprintln!("gateway: cleanup failed error={error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Cleanup failed",
                    "message": error.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn handle_webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    // Presence gate only; payloads are trusted once the header is carried.
    if state.webhook_secret.is_some() && !headers.contains_key(WEBHOOK_SIGNATURE_HEADER) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing signature" })),
        )
            .into_response();
    }

    match state.dispatcher.dispatch(&payload).await {
        Ok(DispatchOutcome::Handled) => {
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Ok(DispatchOutcome::Skipped(reason)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "skipped": reason })),
        )
            .into_response(),
        Err(error) => {
            eprintln!("gateway: webhook processing failed error={error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "service": "goPM" })),
    )
        .into_response()
}

async fn handle_status(State(state): State<Arc<GatewayState>>) -> Response {
    let workspaces = state.store.installed_workspaces();
    let has_legacy_client = state.resolver.has_legacy_fallback();
    let entries: Vec<Value> = workspaces
        .iter()
        .map(|token| {
            json!({
                "id": token.workspace_id,
                "name": token.workspace_name,
                "agent_id": token.agent_user_id,
                "installed_at": format_unix_ms_rfc3339(token.installed_at_unix_ms),
            })
        })
        .collect();
    let mode = if entries.is_empty() { "legacy" } else { "agent" };
    (
        StatusCode::OK,
        Json(json!({
            "service": "goPM",
            "mode": mode,
            "has_legacy_client": has_legacy_client,
            "agent_workspaces": entries.len(),
            "total_clients": entries.len() + usize::from(has_legacy_client),
            "workspaces": entries,
        })),
    )
        .into_response()
}
