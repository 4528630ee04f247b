//! Routes webhook payloads to the task, assignment, and reaction flows.

use std::sync::Arc;

use anyhow::{Context, Result};
use gopm_linear::{extract_workspace_id, ResolveError, WorkspaceCredential, WorkspaceResolver};
use serde_json::Value;

use crate::{
    assignment_tracker::AssignmentTracker,
    task_runtime::{MentionTrigger, TaskLifecycleOrchestrator},
};

const MENTION_MARKERS: &[&str] = &["@goPM", "@gopm"];

const POSITIVE_COMMENT_EMOJI: &[&str] = &["👍", "❤️", "🎉", "✅"];
const NEGATIVE_COMMENT_EMOJI: &[&str] = &["👎", "❌", "😞"];
const URGENT_ISSUE_EMOJI: &[&str] = &["🔥", "⚡", "🚨", "⏰"];
const APPROVAL_ISSUE_EMOJI: &[&str] = &["✅", "🎉", "👍"];

/// Whether a payload was acted on. Skipped events are acknowledged upstream
/// with a success status; only processing failures become errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Skipped(&'static str),
}

pub struct WebhookDispatcher {
    resolver: Arc<WorkspaceResolver>,
    orchestrator: Arc<TaskLifecycleOrchestrator>,
    tracker: Arc<AssignmentTracker>,
}

impl WebhookDispatcher {
    pub fn new(
        resolver: Arc<WorkspaceResolver>,
        orchestrator: Arc<TaskLifecycleOrchestrator>,
        tracker: Arc<AssignmentTracker>,
    ) -> Self {
        Self {
            resolver,
            orchestrator,
            tracker,
        }
    }

    pub async fn dispatch(&self, payload: &Value) -> Result<DispatchOutcome> {
        let event_type = payload["type"].as_str().unwrap_or_default();
        let action = payload["action"].as_str().unwrap_or_default();
        println!("webhook: received type={event_type} action={action}");

        let Some(workspace_id) = extract_workspace_id(payload) else {
            println!("webhook: cannot route event without workspace id type={event_type}");
            return Ok(DispatchOutcome::Skipped("no workspace id"));
        };
        let credential = match self.resolver.resolve(&workspace_id) {
            Ok(credential) => credential,
            Err(ResolveError::NoCredentialAvailable { .. }) => {
                println!("webhook: no credential for workspace_id={workspace_id}");
                return Ok(DispatchOutcome::Skipped("no credential for workspace"));
            }
            Err(error) => return Err(error.into()),
        };

        match (event_type, action) {
            ("Comment", "create") => {
                self.handle_comment_created(&credential, &workspace_id, payload)
                    .await
            }
            ("Issue", "create") | ("Issue", "update") => {
                self.handle_issue_event(&credential, &workspace_id, action, payload)
                    .await
            }
            ("Reaction", "create") => {
                self.handle_reaction_created(&credential, &workspace_id, payload)
                    .await
            }
            _ => {
                println!("webhook: unhandled event type={event_type} action={action}");
                Ok(DispatchOutcome::Skipped("unhandled event type"))
            }
        }
    }

    async fn handle_comment_created(
        &self,
        credential: &WorkspaceCredential,
        workspace_id: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome> {
        let data = &payload["data"];
        let body = data["body"].as_str().unwrap_or_default();
        if !contains_mention(body) {
            return Ok(DispatchOutcome::Skipped("no mention in comment"));
        }
        let issue_id = data["issue"]["id"].as_str().unwrap_or_default();
        if issue_id.is_empty() {
            return Ok(DispatchOutcome::Skipped("comment without issue id"));
        }
        let trigger_comment_id = data["id"].as_str().map(str::to_string);

        self.orchestrator
            .start_task(
                credential,
                MentionTrigger {
                    issue_id: issue_id.to_string(),
                    workspace_id: workspace_id.to_string(),
                    request_text: body.trim().to_string(),
                    trigger_comment_id,
                },
            )
            .await
            .context("failed to start task for comment mention")?;
        Ok(DispatchOutcome::Handled)
    }

    async fn handle_issue_event(
        &self,
        credential: &WorkspaceCredential,
        workspace_id: &str,
        action: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome> {
        let data = &payload["data"];
        let issue_id = data["id"].as_str().unwrap_or_default();
        if issue_id.is_empty() {
            return Ok(DispatchOutcome::Skipped("issue without id"));
        }

        let mut handled = false;
        let description = data["description"].as_str().unwrap_or_default();
        if contains_mention(description) {
            // Description mentions have no trigger comment, so no reaction.
            self.orchestrator
                .start_task(
                    credential,
                    MentionTrigger {
                        issue_id: issue_id.to_string(),
                        workspace_id: workspace_id.to_string(),
                        request_text: description.trim().to_string(),
                        trigger_comment_id: None,
                    },
                )
                .await
                .context("failed to start task for description mention")?;
            handled = true;
        }

        if action == "update" {
            let agent_user_id = self.resolver.agent_user_id_for(workspace_id);
            let assignee_id = data["assignee"]["id"].as_str();
            match (assignee_id, agent_user_id.as_deref()) {
                (Some(assignee), Some(agent)) if assignee == agent => {
                    if self.tracker.assignment(issue_id).is_none() {
                        let snapshot = credential
                            .client
                            .fetch_issue(issue_id)
                            .await
                            .with_context(|| format!("failed to fetch issue {issue_id}"))?;
                        self.tracker
                            .on_assigned(credential, &snapshot, workspace_id)
                            .await?;
                        handled = true;
                    } else if let Some(state_name) = data["state"]["name"].as_str() {
                        self.tracker
                            .on_status_changed(credential, issue_id, state_name)
                            .await?;
                        handled = true;
                    }
                }
                _ => {
                    // An explicit null assignee marks an unassignment; a
                    // missing field is just an unrelated update.
                    if data.get("assignee").is_some_and(Value::is_null) {
                        self.tracker
                            .on_unassigned(credential, issue_id, workspace_id)
                            .await?;
                        handled = true;
                    }
                }
            }
        }

        if handled {
            Ok(DispatchOutcome::Handled)
        } else {
            Ok(DispatchOutcome::Skipped("issue event matched no rule"))
        }
    }

    async fn handle_reaction_created(
        &self,
        credential: &WorkspaceCredential,
        workspace_id: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome> {
        let data = &payload["data"];
        let emoji = data["emoji"].as_str().unwrap_or_default();
        let issue_id = data["issue"]["id"].as_str().unwrap_or_default();
        let Some(agent_user_id) = self.resolver.agent_user_id_for(workspace_id) else {
            return Ok(DispatchOutcome::Skipped("no agent identity for workspace"));
        };
        if issue_id.is_empty() || emoji.is_empty() {
            return Ok(DispatchOutcome::Skipped("reaction without issue or emoji"));
        }

        if data["comment"].is_object() {
            let author_id = data["comment"]["author"]["id"].as_str().unwrap_or_default();
            if author_id != agent_user_id {
                return Ok(DispatchOutcome::Skipped("reaction on someone else's comment"));
            }
            let reply = if POSITIVE_COMMENT_EMOJI.contains(&emoji) {
                Some("🤖 Thanks for the positive feedback! Happy to help anytime.".to_string())
            } else if NEGATIVE_COMMENT_EMOJI.contains(&emoji) {
                Some(
                    "🤖 I see you weren't satisfied with my response. Feel free to provide \
more details or @mention me with specific feedback on how I can improve!"
                        .to_string(),
                )
            } else {
                None
            };
            return self
                .post_reaction_reply(credential, issue_id, reply, "comment reaction")
                .await;
        }

        let assignee_id = data["issue"]["assignee"]["id"].as_str().unwrap_or_default();
        if assignee_id != agent_user_id {
            return Ok(DispatchOutcome::Skipped("reaction on unassigned issue"));
        }
        let reply = if URGENT_ISSUE_EMOJI.contains(&emoji) {
            Some(format!(
                "🤖 I see this has been marked as urgent with {emoji}. Moving this to high priority!"
            ))
        } else if APPROVAL_ISSUE_EMOJI.contains(&emoji) {
            Some(format!(
                "🤖 Thanks for the {emoji}! Let me know if there's anything else I can help with."
            ))
        } else {
            None
        };
        self.post_reaction_reply(credential, issue_id, reply, "issue reaction")
            .await
    }

    async fn post_reaction_reply(
        &self,
        credential: &WorkspaceCredential,
        issue_id: &str,
        reply: Option<String>,
        kind: &str,
    ) -> Result<DispatchOutcome> {
        let Some(reply) = reply else {
            return Ok(DispatchOutcome::Skipped("emoji carries no reply"));
        };
        credential
            .client
            .create_comment(issue_id, &reply)
            .await
            .with_context(|| format!("failed to post {kind} reply for issue {issue_id}"))?;
        Ok(DispatchOutcome::Handled)
    }
}

fn contains_mention(text: &str) -> bool {
    MENTION_MARKERS.iter().any(|marker| text.contains(marker))
}
