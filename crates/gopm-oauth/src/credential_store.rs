//! Credential store that issues, persists, and expires workspace tokens.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use gopm_core::{current_unix_timestamp_ms, write_text_atomic};

mod provider_client;
mod workspace_token;

#[cfg(test)]
mod tests;

pub use provider_client::WorkspaceIdentity;
use provider_client::{LinearProviderClient, ProviderTokenResponse};
pub use workspace_token::WorkspaceToken;
use workspace_token::PendingAuthorization;

/// Pending authorizations older than this are no longer redeemable.
pub const PENDING_AUTHORIZATION_TTL_MS: u64 = 10 * 60 * 1_000;

/// Scopes requested for every agent installation.
const AGENT_OAUTH_SCOPES: &str = "app:assignable,app:mentionable,read,write,issues:create";

/// Failure modes of the authorization flow, surfaced to the installing human.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid or expired authorization state")]
    InvalidState,
    #[error("token exchange failed with status {status}: {body}")]
    ExchangeFailed { status: u16, body: String },
    #[error("workspace identity lookup failed: {0}")]
    IdentityLookupFailed(String),
    #[error("oauth request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to persist credentials: {0}")]
    PersistFailed(String),
}

/// Configuration for the credential store and its provider endpoints.
#[derive(Debug, Clone)]
pub struct CredentialStoreConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub graphql_url: String,
    pub tokens_path: PathBuf,
    pub request_timeout_ms: u64,
}

/// Authorization URL plus the CSRF state recorded for its callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub state: String,
}

/// Counts of records removed by an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_pending: usize,
    pub removed_tokens: usize,
}

#[derive(Default)]
struct CredentialState {
    tokens: BTreeMap<String, WorkspaceToken>,
    pending: HashMap<String, PendingAuthorization>,
}

/// Single owner of workspace tokens and pending authorizations.
///
/// Map mutations happen behind a `std::sync::Mutex` and never straddle an
/// await: redemption consumes the pending record before the network exchange
/// starts, so a state value can never be redeemed twice.
pub struct CredentialStore {
    config: CredentialStoreConfig,
    provider: LinearProviderClient,
    inner: Mutex<CredentialState>,
}

impl CredentialStore {
    /// Loads persisted tokens and silently drops any that already expired, so
    /// a restart self-heals stale credentials without an explicit sweep.
    pub fn load(config: CredentialStoreConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() || config.client_secret.trim().is_empty() {
            anyhow::bail!("oauth client id and client secret are required");
        }
        let provider = LinearProviderClient::new(&config)?;

        let mut tokens = BTreeMap::new();
        if config.tokens_path.exists() {
            let raw = std::fs::read_to_string(&config.tokens_path).with_context(|| {
                format!(
                    "failed to read credentials file {}",
                    config.tokens_path.display()
                )
            })?;
            match serde_json::from_str::<BTreeMap<String, WorkspaceToken>>(&raw) {
                Ok(parsed) => {
                    let now_ms = current_unix_timestamp_ms();
                    for (workspace_id, token) in parsed {
                        if token.is_expired_at(now_ms) {
                            println!(
                                "credential store: dropped expired token workspace_id={workspace_id}"
                            );
                            continue;
                        }
                        tokens.insert(workspace_id, token);
                    }
                }
                Err(error) => {
                    eprintln!(
                        "failed to parse credentials file {}: {} (starting fresh)",
                        config.tokens_path.display(),
                        error
                    );
                }
            }
            println!("credential store: loaded {} workspace tokens", tokens.len());
        }

        Ok(Self {
            config,
            provider,
            inner: Mutex::new(CredentialState {
                tokens,
                pending: HashMap::new(),
            }),
        })
    }

    /// Generates a provider authorization URL and records the CSRF state.
    ///
    /// The `actor=app` parameter is what makes the grant an agent-identity
    /// installation instead of a human-user OAuth grant.
    pub fn begin_authorization(
        &self,
        workspace_hint: Option<&str>,
    ) -> Result<AuthorizationRequest> {
        let state = generate_state_token()?;
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", AGENT_OAUTH_SCOPES),
            ("response_type", "code"),
            ("state", state.as_str()),
            ("actor", "app"),
        ];
        if let Some(workspace_id) = workspace_hint {
            params.push(("workspace_id", workspace_id));
        }
        let authorize_url =
            reqwest::Url::parse_with_params(&self.config.authorize_url, params.iter().copied())
                .with_context(|| {
                    format!(
                        "failed to build authorization url from {}",
                        self.config.authorize_url
                    )
                })?
                .to_string();

        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("credential store mutex is poisoned"))?;
        guard.pending.insert(
            state.clone(),
            PendingAuthorization {
                state: state.clone(),
                workspace_hint: workspace_hint.map(str::to_string),
                created_unix_ms: current_unix_timestamp_ms(),
            },
        );

        Ok(AuthorizationRequest {
            authorize_url,
            state,
        })
    }

    /// Redeems an authorization callback into a stored workspace token.
    ///
    /// The pending record is removed before the exchange starts; a downstream
    /// exchange failure still leaves the state unredeemable.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> Result<WorkspaceToken, OAuthError> {
        let now_ms = current_unix_timestamp_ms();
        let pending = self.take_pending(state)?;
        if now_ms.saturating_sub(pending.created_unix_ms) > PENDING_AUTHORIZATION_TTL_MS {
            return Err(OAuthError::InvalidState);
        }

        let exchanged: ProviderTokenResponse = self.provider.exchange_code(code).await?;
        let identity = self
            .provider
            .fetch_workspace_identity(&exchanged.access_token)
            .await?;

        let token = WorkspaceToken {
            workspace_id: identity.workspace_id.clone(),
            workspace_name: identity.workspace_name.clone(),
            access_token: exchanged.access_token,
            token_type: exchanged.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: exchanged.scope.unwrap_or_default(),
            agent_user_id: identity.agent_user_id.clone(),
            installed_at_unix_ms: now_ms,
            expires_at_unix_ms: exchanged
                .expires_in
                .map(|seconds| now_ms.saturating_add(seconds.saturating_mul(1_000))),
        };

        {
            let mut guard = self
                .inner
                .lock()
                .map_err(|_| OAuthError::PersistFailed("credential store mutex is poisoned".to_string()))?;
            if guard.tokens.contains_key(&token.workspace_id) {
                println!(
                    "credential store: replacing token workspace_id={}",
                    token.workspace_id
                );
            }
            guard.tokens.insert(token.workspace_id.clone(), token.clone());
            persist_tokens(&self.config.tokens_path, &guard.tokens)
                .map_err(|error| OAuthError::PersistFailed(error.to_string()))?;
        }

        println!(
            "agent installed: workspace_id={} workspace_name={} agent_user_id={}",
            identity.workspace_id, identity.workspace_name, identity.agent_user_id
        );
        Ok(token)
    }

    pub fn token_for_workspace(&self, workspace_id: &str) -> Option<WorkspaceToken> {
        let guard = self.inner.lock().ok()?;
        guard.tokens.get(workspace_id).cloned()
    }

    pub fn installed_workspaces(&self) -> Vec<WorkspaceToken> {
        match self.inner.lock() {
            Ok(guard) => guard.tokens.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Removes a workspace installation; persists when a token was present.
    pub fn remove_workspace(&self, workspace_id: &str) -> Result<bool> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("credential store mutex is poisoned"))?;
        if guard.tokens.remove(workspace_id).is_none() {
            return Ok(false);
        }
        persist_tokens(&self.config.tokens_path, &guard.tokens)?;
        println!("credential store: removed workspace_id={workspace_id}");
        Ok(true)
    }

    /// Drops stale pending authorizations and expired tokens. Idempotent.
    pub fn sweep_expired(&self) -> Result<SweepReport> {
        self.sweep_expired_at(current_unix_timestamp_ms())
    }

    pub(crate) fn sweep_expired_at(&self, now_ms: u64) -> Result<SweepReport> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("credential store mutex is poisoned"))?;

        let before_pending = guard.pending.len();
        guard.pending.retain(|_, pending| {
            now_ms.saturating_sub(pending.created_unix_ms) <= PENDING_AUTHORIZATION_TTL_MS
        });
        let removed_pending = before_pending - guard.pending.len();

        let before_tokens = guard.tokens.len();
        guard.tokens.retain(|_, token| !token.is_expired_at(now_ms));
        let removed_tokens = before_tokens - guard.tokens.len();

        if removed_tokens > 0 {
            persist_tokens(&self.config.tokens_path, &guard.tokens)?;
        }
        if removed_pending > 0 || removed_tokens > 0 {
            println!(
                "credential store sweep: removed_pending={removed_pending} removed_tokens={removed_tokens}"
            );
        }
        Ok(SweepReport {
            removed_pending,
            removed_tokens,
        })
    }

    fn take_pending(&self, state: &str) -> Result<PendingAuthorization, OAuthError> {
        let mut guard = self.inner.lock().map_err(|_| OAuthError::InvalidState)?;
        guard.pending.remove(state).ok_or(OAuthError::InvalidState)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().map(|guard| guard.pending.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn age_pending_for_tests(&self, state: &str, created_unix_ms: u64) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(pending) = guard.pending.get_mut(state) {
                pending.created_unix_ms = created_unix_ms;
            }
        }
    }
}

fn persist_tokens(path: &PathBuf, tokens: &BTreeMap<String, WorkspaceToken>) -> Result<()> {
    let mut payload =
        serde_json::to_string_pretty(tokens).context("failed to serialize credentials")?;
    payload.push('\n');
    write_text_atomic(path, &payload)
        .with_context(|| format!("failed to write credentials file {}", path.display()))
}

fn generate_state_token() -> Result<String> {
    let mut bytes = [0_u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|error| anyhow!("failed to generate state token randomness: {error}"))?;
    Ok(hex::encode(bytes))
}
