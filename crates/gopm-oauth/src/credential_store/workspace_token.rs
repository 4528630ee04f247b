use gopm_core::is_expired_unix_ms;
use serde::{Deserialize, Serialize};

/// Installed agent credentials for one workspace, persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceToken {
    pub workspace_id: String,
    pub workspace_name: String,
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub agent_user_id: String,
    #[serde(default)]
    pub installed_at_unix_ms: u64,
    #[serde(default)]
    pub expires_at_unix_ms: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl WorkspaceToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(gopm_core::current_unix_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_unix_ms: u64) -> bool {
        is_expired_unix_ms(self.expires_at_unix_ms, now_unix_ms)
    }
}

/// In-flight authorization awaiting its callback. Never persisted.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub workspace_hint: Option<String>,
    pub created_unix_ms: u64,
}
