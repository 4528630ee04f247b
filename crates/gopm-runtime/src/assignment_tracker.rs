//! Assignment tracking: welcomes on assignment, farewells on unassignment,
//! closing acknowledgments on completion.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use gopm_core::current_unix_timestamp_ms;
use gopm_linear::{IssueSnapshot, WorkspaceCredential};

use crate::classify::{
    detect_issue_priority, detect_issue_type, is_not_started_state, IssuePriority, IssueType,
};

/// A tracked agent assignment, kept in memory from assignment until
/// unassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAssignment {
    pub issue_id: String,
    pub workspace_id: String,
    pub assigned_unix_ms: u64,
    pub issue_title: String,
    pub issue_state: String,
}

#[derive(Default)]
pub struct AssignmentTracker {
    assignments: Mutex<HashMap<String, AgentAssignment>>,
}

impl AssignmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the assignment, posts a context-aware welcome, then moves the
    /// issue out of not-started states. The state transition is best-effort;
    /// its failure never fails the welcome.
    pub async fn on_assigned(
        &self,
        credential: &WorkspaceCredential,
        issue: &IssueSnapshot,
        workspace_id: &str,
    ) -> Result<()> {
        let assignment = AgentAssignment {
            issue_id: issue.id.clone(),
            workspace_id: workspace_id.to_string(),
            assigned_unix_ms: current_unix_timestamp_ms(),
            issue_title: issue.title.clone(),
            issue_state: issue.state_name.clone(),
        };
        {
            let mut guard = self
                .assignments
                .lock()
                .map_err(|_| anyhow!("assignment map mutex is poisoned"))?;
            guard.insert(issue.id.clone(), assignment);
        }
        println!(
            "assignment tracker: assigned issue_id={} workspace_id={workspace_id}",
            issue.id
        );

        let welcome = welcome_message(issue);
        credential
            .client
            .create_comment(&issue.id, &welcome)
            .await
            .with_context(|| format!("failed to post welcome for issue {}", issue.id))?;

        if let Err(error) = self.move_to_in_progress(credential, issue).await {
            eprintln!(
                "assignment tracker: in-progress transition failed issue_id={} error={error:#}",
                issue.id
            );
        }
        Ok(())
    }

    /// Posts a farewell and drops the record. Assignments made before a
    /// restart are not tracked; those get the generic farewell.
    pub async fn on_unassigned(
        &self,
        credential: &WorkspaceCredential,
        issue_id: &str,
        workspace_id: &str,
    ) -> Result<()> {
        let tracked = {
            let mut guard = self
                .assignments
                .lock()
                .map_err(|_| anyhow!("assignment map mutex is poisoned"))?;
            guard.remove(issue_id)
        };
        let elapsed_minutes = tracked.as_ref().map(|assignment| {
            current_unix_timestamp_ms()
                .saturating_sub(assignment.assigned_unix_ms)
                / 60_000
        });
        println!(
            "assignment tracker: unassigned issue_id={issue_id} workspace_id={workspace_id} tracked={}",
            tracked.is_some()
        );

        credential
            .client
            .create_comment(issue_id, &farewell_message(elapsed_minutes))
            .await
            .with_context(|| format!("failed to post farewell for issue {issue_id}"))?;
        Ok(())
    }

    /// Posts a closing acknowledgment when an agent-assigned issue reaches a
    /// done state. Other state changes are ignored.
    pub async fn on_status_changed(
        &self,
        credential: &WorkspaceCredential,
        issue_id: &str,
        new_state_name: &str,
    ) -> Result<()> {
        let lower = new_state_name.to_lowercase();
        if !lower.contains("done") && !lower.contains("completed") {
            return Ok(());
        }
        let message = format!(
            "🎉 Great! This issue has been marked as {new_state_name}. \
Let me know if you need any follow-up assistance."
        );
        credential
            .client
            .create_comment(issue_id, &message)
            .await
            .with_context(|| format!("failed to post closing note for issue {issue_id}"))?;
        Ok(())
    }

    pub fn assignment(&self, issue_id: &str) -> Option<AgentAssignment> {
        let guard = self.assignments.lock().ok()?;
        guard.get(issue_id).cloned()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    async fn move_to_in_progress(
        &self,
        credential: &WorkspaceCredential,
        issue: &IssueSnapshot,
    ) -> Result<()> {
        if !is_not_started_state(&issue.state_name) {
            println!(
                "assignment tracker: issue already underway issue_id={} state={}",
                issue.id, issue.state_name
            );
            return Ok(());
        }
        let states = credential.client.list_workflow_states(&issue.team_id).await?;
        let Some(target) = pick_in_progress_state(&states) else {
            println!(
                "assignment tracker: no in-progress state found issue_id={} team_id={}",
                issue.id, issue.team_id
            );
            return Ok(());
        };
        credential
            .client
            .update_issue_state(&issue.id, &target.id)
            .await?;
        println!(
            "assignment tracker: moved issue_id={} from \"{}\" to \"{}\"",
            issue.id, issue.state_name, target.name
        );
        Ok(())
    }
}

/// First workflow state of type `started`, else one with an in-progress
/// sounding name.
fn pick_in_progress_state(
    states: &[gopm_linear::WorkflowState],
) -> Option<&gopm_linear::WorkflowState> {
    if let Some(state) = states.iter().find(|state| state.state_type == "started") {
        return Some(state);
    }
    states.iter().find(|state| {
        let lower = state.name.to_lowercase();
        ["in progress", "in development", "started", "working", "doing"]
            .iter()
            .any(|keyword| lower.contains(keyword))
    })
}

fn welcome_message(issue: &IssueSnapshot) -> String {
    let priority = detect_issue_priority(issue);
    let issue_type = detect_issue_type(issue);

    let mut message = format!("🤖 I've been assigned to this {}", issue_type.label());
    match priority {
        IssuePriority::Urgent => message.push_str(" (urgent)"),
        IssuePriority::High => message.push_str(" (high priority)"),
        IssuePriority::Normal => {}
    }
    message.push_str(" and will start working on it immediately.\n\n");
    message.push_str(match issue_type {
        IssueType::Bug => {
            "🔍 I'll investigate the issue and provide analysis with potential solutions."
        }
        IssueType::Feature => {
            "✨ I'll break down the requirements and provide implementation guidance."
        }
        IssueType::Epic => "📋 I'll break this down into manageable user stories and tasks.",
        IssueType::Task => "📝 I'll analyze this and provide detailed guidance and recommendations.",
    });
    if let Some(project) = &issue.project {
        if !project.name.is_empty() {
            message.push_str(&format!("\n\n🏗️ Project context: {}", project.name));
        }
    }
    message.push_str("\n\nFeel free to @mention me anytime for updates or specific questions!");
    message
}

fn farewell_message(elapsed_minutes: Option<u64>) -> String {
    match elapsed_minutes {
        Some(minutes) => format!(
            "🤖 I've been unassigned from this issue after working on it for {minutes} minutes. \
Feel free to @mention me again if you need help!"
        ),
        None => "🤖 I've been unassigned from this issue. \
Feel free to @mention me again if you need help!"
            .to_string(),
    }
}
