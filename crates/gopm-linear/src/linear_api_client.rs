//! GraphQL client for the Linear API with bounded retries.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use crate::linear_transport_helpers::{
    is_retryable_linear_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

/// How a request authenticates: an installed agent token or the legacy key.
///
/// Linear expects `Bearer <token>` for OAuth tokens and the bare key for
/// personal API keys.
#[derive(Debug, Clone)]
pub enum LinearAuth {
    OAuthToken(String),
    ApiKey(String),
}

impl LinearAuth {
    fn header_value(&self) -> String {
        match self {
            LinearAuth::OAuthToken(token) => format!("Bearer {}", token.trim()),
            LinearAuth::ApiKey(key) => key.trim().to_string(),
        }
    }
}

/// Connection knobs shared by every client the resolver builds.
#[derive(Debug, Clone)]
pub struct LinearClientConfig {
    pub graphql_url: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

/// Issue fields the runtime needs for prompts, classification, and routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSnapshot {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub state_name: String,
    pub state_type: String,
    pub team_id: String,
    pub team_name: String,
    pub labels: Vec<String>,
    pub project: Option<ProjectSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub name: String,
    pub description: String,
    pub content: String,
}

/// One workflow state of a team, used for the in-progress transition.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub id: String,
    pub name: String,
    pub state_type: String,
    pub position: f64,
}

#[derive(Clone)]
pub struct LinearApiClient {
    http: reqwest::Client,
    graphql_url: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl LinearApiClient {
    pub fn new(config: &LinearClientConfig, auth: &LinearAuth) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth.header_value())
                .context("invalid linear authorization header")?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create linear api client")?;
        Ok(Self {
            http,
            graphql_url: config.graphql_url.clone(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    /// Creates a comment on an issue and returns the new comment id.
    pub async fn create_comment(&self, issue_id: &str, body: &str) -> Result<String> {
        let data = self
            .graphql(
                "create comment",
                "mutation($issueId: String!, $body: String!) { \
                 commentCreate(input: { issueId: $issueId, body: $body }) { \
                 success comment { id } } }",
                json!({ "issueId": issue_id, "body": body }),
            )
            .await?;
        let comment_id = data["commentCreate"]["comment"]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if comment_id.is_empty() {
            bail!("linear create comment returned no comment id");
        }
        Ok(comment_id)
    }

    pub async fn update_comment(&self, comment_id: &str, body: &str) -> Result<()> {
        let data = self
            .graphql(
                "update comment",
                "mutation($id: String!, $body: String!) { \
                 commentUpdate(id: $id, input: { body: $body }) { success } }",
                json!({ "id": comment_id, "body": body }),
            )
            .await?;
        if data["commentUpdate"]["success"] != Value::Bool(true) {
            bail!("linear update comment was not successful");
        }
        Ok(())
    }

    pub async fn create_reaction(&self, comment_id: &str, emoji: &str) -> Result<()> {
        self.graphql(
            "create reaction",
            "mutation($commentId: String!, $emoji: String!) { \
             reactionCreate(input: { commentId: $commentId, emoji: $emoji }) { success } }",
            json!({ "commentId": comment_id, "emoji": emoji }),
        )
        .await?;
        Ok(())
    }

    pub async fn update_issue_state(&self, issue_id: &str, state_id: &str) -> Result<()> {
        let data = self
            .graphql(
                "update issue state",
                "mutation($id: String!, $stateId: String!) { \
                 issueUpdate(id: $id, input: { stateId: $stateId }) { success } }",
                json!({ "id": issue_id, "stateId": state_id }),
            )
            .await?;
        if data["issueUpdate"]["success"] != Value::Bool(true) {
            bail!("linear update issue state was not successful");
        }
        Ok(())
    }

    pub async fn fetch_issue(&self, issue_id: &str) -> Result<IssueSnapshot> {
        let data = self
            .graphql(
                "fetch issue",
                "query($id: String!) { issue(id: $id) { \
                 id identifier title description \
                 state { name type } \
                 team { id name } \
                 labels { nodes { name } } \
                 project { name description content } } }",
                json!({ "id": issue_id }),
            )
            .await?;
        let issue = &data["issue"];
        if issue.is_null() {
            bail!("linear issue {issue_id} not found");
        }
        let labels = issue["labels"]["nodes"]
            .as_array()
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|node| node["name"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let project = if issue["project"].is_object() {
            Some(ProjectSnapshot {
                name: string_at(&issue["project"], "name"),
                description: string_at(&issue["project"], "description"),
                content: string_at(&issue["project"], "content"),
            })
        } else {
            None
        };
        Ok(IssueSnapshot {
            id: string_at(issue, "id"),
            identifier: string_at(issue, "identifier"),
            title: string_at(issue, "title"),
            description: string_at(issue, "description"),
            state_name: string_at(&issue["state"], "name"),
            state_type: string_at(&issue["state"], "type"),
            team_id: string_at(&issue["team"], "id"),
            team_name: string_at(&issue["team"], "name"),
            labels,
            project,
        })
    }

    /// Lists a team's workflow states ordered by board position.
    pub async fn list_workflow_states(&self, team_id: &str) -> Result<Vec<WorkflowState>> {
        let data = self
            .graphql(
                "list workflow states",
                "query($teamId: String!) { team(id: $teamId) { \
                 states { nodes { id name type position } } } }",
                json!({ "teamId": team_id }),
            )
            .await?;
        let mut states: Vec<WorkflowState> = data["team"]["states"]["nodes"]
            .as_array()
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|node| WorkflowState {
                        id: string_at(node, "id"),
                        name: string_at(node, "name"),
                        state_type: string_at(node, "type"),
                        position: node["position"].as_f64().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        states.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(states)
    }

    /// Posts one GraphQL request with bounded retries on 429/5xx and
    /// transport failures. A response carrying an `errors` array fails even
    /// when the HTTP status is 200.
    async fn graphql(&self, operation: &str, query: &str, variables: Value) -> Result<Value> {
        let payload = json!({ "query": query, "variables": variables });
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self.http.post(&self.graphql_url).json(&payload).send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if !status.is_success() {
                        if attempt < self.retry_max_attempts
                            && is_retryable_linear_status(status.as_u16())
                        {
                            tokio::time::sleep(retry_delay(
                                self.retry_base_delay_ms,
                                attempt,
                                retry_after,
                            ))
                            .await;
                            continue;
                        }
                        bail!(
                            "linear api {operation} failed with status {}: {}",
                            status.as_u16(),
                            truncate_for_error(&body, 800)
                        );
                    }
                    let parsed: Value = serde_json::from_str(&body)
                        .with_context(|| format!("failed to decode linear {operation}"))?;
                    if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
                        if !errors.is_empty() {
                            bail!(
                                "linear api {operation} returned errors: {}",
                                truncate_for_error(&errors[0].to_string(), 800)
                            );
                        }
                    }
                    return Ok(parsed.get("data").cloned().unwrap_or(Value::Null));
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("linear api {operation} request failed"));
                }
            }
        }
    }
}

fn string_at(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn test_client(server: &MockServer) -> LinearApiClient {
        let config = LinearClientConfig {
            graphql_url: format!("{}/graphql", server.base_url()),
            request_timeout_ms: 5_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1,
        };
        LinearApiClient::new(&config, &LinearAuth::OAuthToken("token".to_string()))
            .expect("client")
    }

    #[tokio::test]
    async fn functional_create_comment_returns_comment_id() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .header("authorization", "Bearer token")
                .body_includes("commentCreate");
            then.status(200).json_body(json!({
                "data": { "commentCreate": { "success": true, "comment": { "id": "comment-1" } } }
            }));
        });

        let client = test_client(&server);
        let comment_id = client
            .create_comment("issue-1", "Working on it")
            .await
            .expect("create comment");
        mock.assert();
        assert_eq!(comment_id, "comment-1");
    }

    #[tokio::test]
    async fn functional_retries_server_errors_then_succeeds() {
        let server = MockServer::start_async().await;
        let failing = server.mock(|when, then| {
            when.method(POST).path("/graphql").body_includes("commentUpdate");
            then.status(500).body("upstream sad");
        });
        let client = test_client(&server);
        let result = client.update_comment("comment-1", "edited").await;
        assert!(result.is_err());
        failing.assert_hits(3);
    }

    #[tokio::test]
    async fn regression_graphql_errors_fail_despite_http_200() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(200).json_body(json!({
                "errors": [{ "message": "rate limited" }]
            }));
        });
        let client = test_client(&server);
        let error = client
            .update_issue_state("issue-1", "state-1")
            .await
            .expect_err("should fail");
        mock.assert();
        assert!(error.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn functional_fetch_issue_maps_nested_fields() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/graphql").body_includes("issue(id:");
            then.status(200).json_body(json!({
                "data": { "issue": {
                    "id": "issue-1",
                    "identifier": "ENG-42",
                    "title": "Fix login bug",
                    "description": "Session drops",
                    "state": { "name": "Todo", "type": "unstarted" },
                    "team": { "id": "team-1", "name": "Engineering" },
                    "labels": { "nodes": [{ "name": "bug" }, { "name": "auth" }] },
                    "project": { "name": "Q3 Auth", "description": "Auth work", "content": "" }
                } }
            }));
        });
        let client = test_client(&server);
        let issue = client.fetch_issue("issue-1").await.expect("fetch issue");
        assert_eq!(issue.identifier, "ENG-42");
        assert_eq!(issue.labels, vec!["bug".to_string(), "auth".to_string()]);
        assert_eq!(issue.team_id, "team-1");
        let project = issue.project.expect("project");
        assert_eq!(project.name, "Q3 Auth");
    }

    #[tokio::test]
    async fn functional_list_workflow_states_sorts_by_position() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/graphql").body_includes("states");
            then.status(200).json_body(json!({
                "data": { "team": { "states": { "nodes": [
                    { "id": "s-done", "name": "Done", "type": "completed", "position": 4.0 },
                    { "id": "s-todo", "name": "Todo", "type": "unstarted", "position": 1.0 },
                    { "id": "s-prog", "name": "In Progress", "type": "started", "position": 2.0 }
                ] } } }
            }));
        });
        let client = test_client(&server);
        let states = client
            .list_workflow_states("team-1")
            .await
            .expect("list states");
        let names: Vec<&str> = states.iter().map(|state| state.name.as_str()).collect();
        assert_eq!(names, vec!["Todo", "In Progress", "Done"]);
    }

    #[tokio::test]
    async fn regression_api_key_auth_sends_bare_key() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .header("authorization", "lin_api_123");
            then.status(200).json_body(json!({
                "data": { "commentCreate": { "success": true, "comment": { "id": "c-1" } } }
            }));
        });
        let config = LinearClientConfig {
            graphql_url: format!("{}/graphql", server.base_url()),
            request_timeout_ms: 5_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        };
        let client =
            LinearApiClient::new(&config, &LinearAuth::ApiKey("lin_api_123".to_string()))
                .expect("client");
        client
            .create_comment("issue-1", "hello")
            .await
            .expect("create comment");
        mock.assert();
    }
}
