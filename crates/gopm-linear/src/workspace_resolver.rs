//! Per-workspace credential resolution with legacy fallback.

use std::sync::Arc;

use gopm_oauth::CredentialStore;

use crate::linear_api_client::{LinearApiClient, LinearAuth, LinearClientConfig};

/// No tenant token and no legacy key can serve the workspace.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no credential available for workspace {workspace_id}")]
    NoCredentialAvailable { workspace_id: String },
    #[error("failed to build linear client: {0}")]
    ClientBuild(anyhow::Error),
}

/// Which credential served a resolution. Tenant carries the agent's own
/// user id in that workspace so callers can tone responses and route
/// webhook events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialProvenance {
    Tenant { agent_user_id: String },
    Legacy,
}

/// A ready client plus where its credential came from.
pub struct WorkspaceCredential {
    pub client: LinearApiClient,
    pub provenance: CredentialProvenance,
}

impl WorkspaceCredential {
    pub fn is_tenant(&self) -> bool {
        matches!(self.provenance, CredentialProvenance::Tenant { .. })
    }
}

/// Resolves workspace ids to credentials: a live installed token wins,
/// the statically configured legacy API key is the fallback.
pub struct WorkspaceResolver {
    store: Arc<CredentialStore>,
    legacy_api_key: Option<String>,
    client_config: LinearClientConfig,
}

impl WorkspaceResolver {
    pub fn new(
        store: Arc<CredentialStore>,
        legacy_api_key: Option<String>,
        client_config: LinearClientConfig,
    ) -> Self {
        let legacy_api_key =
            legacy_api_key.filter(|key| !key.trim().is_empty());
        Self {
            store,
            legacy_api_key,
            client_config,
        }
    }

    pub fn has_legacy_fallback(&self) -> bool {
        self.legacy_api_key.is_some()
    }

    pub fn resolve(&self, workspace_id: &str) -> Result<WorkspaceCredential, ResolveError> {
        if let Some(token) = self.store.token_for_workspace(workspace_id) {
            if !token.is_expired() {
                let client = LinearApiClient::new(
                    &self.client_config,
                    &LinearAuth::OAuthToken(token.access_token.clone()),
                )
                .map_err(ResolveError::ClientBuild)?;
                return Ok(WorkspaceCredential {
                    client,
                    provenance: CredentialProvenance::Tenant {
                        agent_user_id: token.agent_user_id,
                    },
                });
            }
            println!("workspace resolver: token expired workspace_id={workspace_id}");
        }
        if let Some(key) = self.legacy_api_key.as_deref() {
            let client =
                LinearApiClient::new(&self.client_config, &LinearAuth::ApiKey(key.to_string()))
                    .map_err(ResolveError::ClientBuild)?;
            return Ok(WorkspaceCredential {
                client,
                provenance: CredentialProvenance::Legacy,
            });
        }
        Err(ResolveError::NoCredentialAvailable {
            workspace_id: workspace_id.to_string(),
        })
    }

    /// Agent user id for the workspace when an installed token serves it.
    pub fn agent_user_id_for(&self, workspace_id: &str) -> Option<String> {
        let token = self.store.token_for_workspace(workspace_id)?;
        if token.is_expired() {
            return None;
        }
        Some(token.agent_user_id)
    }
}
