mod cli_args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gopm_gateway::{run_gateway_server, GatewayState};
use gopm_linear::{LinearClientConfig, WorkspaceResolver};
use gopm_oauth::{CredentialStore, CredentialStoreConfig};
use gopm_runtime::{
    AnthropicAssistant, AnthropicAssistantConfig, AssignmentTracker, TaskLifecycleOrchestrator,
    TaskOrchestratorConfig, WebhookDispatcher,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(parent) = cli.tokens_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let store = Arc::new(
        CredentialStore::load(CredentialStoreConfig {
            client_id: cli.linear_client_id.clone(),
            client_secret: cli.linear_client_secret.clone(),
            redirect_uri: cli.linear_redirect_uri.clone(),
            authorize_url: cli.authorize_url.clone(),
            token_url: cli.token_url.clone(),
            graphql_url: cli.graphql_url.clone(),
            tokens_path: cli.tokens_file.clone(),
            request_timeout_ms: cli.linear_timeout_ms,
        })
        .context("failed to load credential store")?,
    );

    let resolver = Arc::new(WorkspaceResolver::new(
        store.clone(),
        cli.linear_api_key.clone(),
        LinearClientConfig {
            graphql_url: cli.graphql_url.clone(),
            request_timeout_ms: cli.linear_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        },
    ));

    let assistant = Arc::new(
        AnthropicAssistant::new(AnthropicAssistantConfig {
            api_base: cli.anthropic_api_base.clone(),
            api_key: cli.anthropic_api_key.clone(),
            model: cli.model.clone(),
            max_tokens: cli.max_tokens,
            request_timeout_ms: cli.assistant_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
        .context("failed to build assistant client")?,
    );

    let orchestrator = Arc::new(TaskLifecycleOrchestrator::new(
        assistant,
        TaskOrchestratorConfig::default(),
    ));
    let tracker = Arc::new(AssignmentTracker::new());
    let dispatcher = Arc::new(WebhookDispatcher::new(
        resolver.clone(),
        orchestrator,
        tracker,
    ));

    let sweep_store = store.clone();
    let sweep_interval = Duration::from_secs(cli.sweep_interval_secs.max(1));
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep_store.sweep_expired() {
                Ok(report) => {
                    if report.removed_pending > 0 || report.removed_tokens > 0 {
                        println!(
                            "sweep: removed_pending={} removed_tokens={}",
                            report.removed_pending, report.removed_tokens
                        );
                    }
                }
                Err(error) => eprintln!("sweep: failed error={error:#}"),
            }
        }
    });

    println!(
        "gopm: starting mode={} legacy_fallback={} model={}",
        if store.installed_workspaces().is_empty() {
            "legacy"
        } else {
            "agent"
        },
        resolver.has_legacy_fallback(),
        cli.model
    );

    let state = Arc::new(GatewayState {
        store,
        resolver,
        dispatcher,
        webhook_secret: cli.linear_webhook_secret.clone(),
    });
    let serve_result = run_gateway_server(&cli.bind, state).await;
    sweeper.abort();
    serve_result
}
