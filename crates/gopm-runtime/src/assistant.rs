//! Assistant generation seam and its Anthropic-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use gopm_linear::linear_transport_helpers::{
    is_retryable_transport_error, parse_retry_after, retry_delay, truncate_for_error,
};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;

use crate::issue_context::{or_na, IssueContext};

/// Failure modes of a generation request.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant api key is missing")]
    MissingApiKey,
    #[error("assistant request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("assistant request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Produces the review text for a request. The call is opaque to the task
/// lifecycle: it may take arbitrarily long and it may fail.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn generate(
        &self,
        request_text: &str,
        context: &IssueContext,
    ) -> Result<String, AssistantError>;
}

#[derive(Debug, Clone)]
pub struct AnthropicAssistantConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for AnthropicAssistantConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com/v1".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 2_000,
            request_timeout_ms: 120_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// Anthropic messages-endpoint implementation of the assistant seam.
#[derive(Debug, Clone)]
pub struct AnthropicAssistant {
    http: reqwest::Client,
    config: AnthropicAssistantConfig,
}

impl AnthropicAssistant {
    pub fn new(config: AnthropicAssistantConfig) -> Result<Self, AssistantError> {
        if config.api_key.trim().is_empty() {
            return Err(AssistantError::MissingApiKey);
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "x-api-key",
            reqwest::header::HeaderValue::from_str(config.api_key.trim()).map_err(|error| {
                AssistantError::InvalidResponse(format!("invalid api key header: {error}"))
            })?,
        );
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static("2023-06-01"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    fn messages_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/messages") {
            return base.to_string();
        }
        format!("{base}/messages")
    }
}

#[async_trait]
impl AssistantClient for AnthropicAssistant {
    async fn generate(
        &self,
        request_text: &str,
        context: &IssueContext,
    ) -> Result<String, AssistantError> {
        let prompt = build_review_prompt(request_text, context);
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let url = self.messages_url();
        let max_attempts = self.config.retry_max_attempts.max(1);

        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self.http.post(&url).json(&body).send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    let retry_after = parse_retry_after(response.headers());
                    let raw = response.text().await?;
                    if status.is_success() {
                        return extract_message_text(&raw);
                    }
                    if attempt < max_attempts && should_retry_status(status.as_u16()) {
                        sleep(retry_delay(
                            self.config.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    return Err(AssistantError::HttpStatus {
                        status: status.as_u16(),
                        body: truncate_for_error(&raw, 800),
                    });
                }
                Err(error) => {
                    if attempt < max_attempts && is_retryable_transport_error(&error) {
                        sleep(retry_delay(self.config.retry_base_delay_ms, attempt, None)).await;
                        continue;
                    }
                    return Err(AssistantError::Http(error));
                }
            }
        }
    }
}

fn should_retry_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn extract_message_text(raw: &str) -> Result<String, AssistantError> {
    #[derive(Deserialize)]
    struct MessageResponse {
        content: Vec<ContentBlock>,
    }
    #[derive(Deserialize)]
    struct ContentBlock {
        #[serde(default)]
        text: String,
    }

    let parsed: MessageResponse = serde_json::from_str(raw)
        .map_err(|error| AssistantError::InvalidResponse(error.to_string()))?;
    let text = parsed
        .content
        .iter()
        .map(|block| block.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return Err(AssistantError::InvalidResponse(
            "response carried no text content".to_string(),
        ));
    }
    Ok(text)
}

/// Product-manager review prompt: project context, issue context, then the
/// human's request verbatim.
pub fn build_review_prompt(request_text: &str, context: &IssueContext) -> String {
    format!(
        "You are tasked with reviewing a user story based on Linear Project context and \
specific feature requirements. Your goal is to do what is provided in the comment. Ensure \
the response is clear and actionable for both human engineers and AI agents. Follow these \
steps to complete the task:\n\n\
1. Review the Project context which is attached to the linear issue\n\n\
2. Review the comment to determine what the user is requesting\n\n\
3. Review the feature requirements which are listed in the body of the issue\n\n\
4. Provide a response as a product manager and ensure it's concise, direct and to the \
point. If the user asked for help with test cases, acceptance criteria or writing the user \
story or issue then use this format:\n\n\
**Title:** Write a concise, action-oriented title that summarizes the feature.\n\n\
**User type:** Identify the specific user or persona this story is for.\n\n\
**Want:** Describe the specific functionality or capability the user desires.\n\n\
**So that:** Explain the clear business value or outcome of this feature.\n\n\
**Acceptance Criteria:**\n\
- List 3-5 specific, testable requirements, including edge cases and constraints.\n\n\
**Test Scenarios:**\n\
- Write 2-3 Gherkin-style scenarios, including a happy path and at least one edge case.\n\n\
Provide your response using clear markdown formatting with proper headers and bullet \
points.\n\n\
**Project Context:**\n{project_context}\n\n\
**Issue Context:**\n\
- Title: {title}\n\
- Description: {description}\n\
- Team: {team}\n\
- Current State: {state}\n\n\
**User Request:**\n{request_text}",
        project_context = context.project_context_text(),
        title = or_na(&context.issue_title),
        description = or_na(&context.issue_description),
        team = or_na(&context.team),
        state = or_na(&context.state),
    )
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn test_assistant(server: &MockServer) -> AnthropicAssistant {
        AnthropicAssistant::new(AnthropicAssistantConfig {
            api_base: format!("{}/v1", server.base_url()),
            api_key: "test-key".to_string(),
            retry_max_attempts: 2,
            retry_base_delay_ms: 1,
            ..Default::default()
        })
        .expect("assistant")
    }

    #[test]
    fn unit_missing_api_key_is_rejected() {
        let error = AnthropicAssistant::new(AnthropicAssistantConfig::default())
            .err()
            .expect("should fail");
        assert!(matches!(error, AssistantError::MissingApiKey));
    }

    #[test]
    fn unit_review_prompt_embeds_issue_and_request() {
        let context = IssueContext {
            issue_title: "Fix login".to_string(),
            issue_description: "Session drops".to_string(),
            team: "Engineering".to_string(),
            state: "Todo".to_string(),
            project: None,
        };
        let prompt = build_review_prompt("@goPM please review", &context);
        assert!(prompt.contains("- Title: Fix login"));
        assert!(prompt.contains("- Team: Engineering"));
        assert!(prompt.contains("No project associated with this issue"));
        assert!(prompt.ends_with("@goPM please review"));
    }

    #[tokio::test]
    async fn functional_generate_posts_messages_request() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", "2023-06-01")
                .body_includes("claude-3-5-sonnet-20241022");
            then.status(200).json_body(json!({
                "content": [{ "type": "text", "text": "Here is the review." }]
            }));
        });

        let assistant = test_assistant(&server);
        let text = assistant
            .generate("review this", &IssueContext::default())
            .await
            .expect("generate");
        mock.assert();
        assert_eq!(text, "Here is the review.");
    }

    #[tokio::test]
    async fn regression_non_retryable_status_fails_immediately() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(400).body("bad request");
        });

        let assistant = test_assistant(&server);
        let error = assistant
            .generate("review this", &IssueContext::default())
            .await
            .expect_err("should fail");
        mock.assert_hits(1);
        assert!(matches!(
            error,
            AssistantError::HttpStatus { status: 400, .. }
        ));
    }

    #[tokio::test]
    async fn regression_empty_content_is_invalid() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({ "content": [] }));
        });

        let assistant = test_assistant(&server);
        let error = assistant
            .generate("review this", &IssueContext::default())
            .await
            .expect_err("should fail");
        assert!(matches!(error, AssistantError::InvalidResponse(_)));
    }
}
