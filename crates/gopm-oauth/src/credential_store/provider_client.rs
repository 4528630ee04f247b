use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CredentialStoreConfig, OAuthError};

const ERROR_BODY_LIMIT: usize = 400;

/// HTTP client for the provider's token and GraphQL endpoints.
#[derive(Debug, Clone)]
pub(super) struct LinearProviderClient {
    http: reqwest::Client,
    token_url: String,
    graphql_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

/// Workspace and agent identity resolved from a freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceIdentity {
    pub workspace_id: String,
    pub workspace_name: String,
    pub agent_user_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProviderTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl LinearProviderClient {
    pub(super) fn new(config: &CredentialStoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build oauth http client")?;
        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            graphql_url: config.graphql_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Exchanges an authorization code for an access token.
    pub(super) async fn exchange_code(
        &self,
        code: &str,
    ) -> Result<ProviderTokenResponse, OAuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(OAuthError::ExchangeFailed {
                status: status.as_u16(),
                body: truncate_for_error(&body, ERROR_BODY_LIMIT),
            });
        }
        serde_json::from_str::<ProviderTokenResponse>(&body).map_err(|error| {
            OAuthError::ExchangeFailed {
                status: status.as_u16(),
                body: format!(
                    "unparseable token response: {error}: {}",
                    truncate_for_error(&body, ERROR_BODY_LIMIT)
                ),
            }
        })
    }

    /// Resolves which workspace the token belongs to and the agent's own
    /// user id within it, via the viewer query.
    pub(super) async fn fetch_workspace_identity(
        &self,
        access_token: &str,
    ) -> Result<WorkspaceIdentity, OAuthError> {
        let query = json!({
            "query": "{ viewer { id name organization { id name } } }"
        });
        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(access_token)
            .json(&query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(OAuthError::IdentityLookupFailed(format!(
                "status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, ERROR_BODY_LIMIT)
            )));
        }
        let parsed: Value = serde_json::from_str(&body).map_err(|error| {
            OAuthError::IdentityLookupFailed(format!("unparseable viewer response: {error}"))
        })?;
        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(OAuthError::IdentityLookupFailed(truncate_for_error(
                    &errors[0].to_string(),
                    ERROR_BODY_LIMIT,
                )));
            }
        }
        let viewer = &parsed["data"]["viewer"];
        let agent_user_id = string_field(viewer, "id");
        let workspace_id = string_field(&viewer["organization"], "id");
        let workspace_name = string_field(&viewer["organization"], "name");
        if agent_user_id.is_empty() || workspace_id.is_empty() {
            return Err(OAuthError::IdentityLookupFailed(
                "viewer response missing organization or viewer id".to_string(),
            ));
        }
        Ok(WorkspaceIdentity {
            workspace_id,
            workspace_name,
            agent_user_id,
        })
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...(truncated)")
}
