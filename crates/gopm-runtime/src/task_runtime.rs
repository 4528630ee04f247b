//! Task lifecycle: one mutable status comment per issue, edited through the
//! acknowledge / progress / terminal phases by a detached worker task.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use gopm_core::{current_unix_timestamp_ms, format_unix_ms_rfc3339};
use gopm_linear::{LinearApiClient, WorkspaceCredential};
use tokio::{sync::watch, task::JoinHandle};

use crate::{assistant::AssistantClient, classify::detect_request_kind, issue_context::IssueContext};

mod messages;
mod progress;


pub use progress::ProgressTickerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Created,
    Acknowledged,
    Running,
    Completed,
    Failed,
}

/// The tracked status comment of an in-flight task. At most one per issue;
/// a newer task replaces the entry and orphans the previous comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub issue_id: String,
    pub workspace_id: String,
    pub status_comment_id: String,
    pub started_unix_ms: u64,
    pub phase: TaskPhase,
}

/// A mention that should start a task. The trigger comment id is present
/// for comment mentions and absent for description mentions.
#[derive(Debug, Clone)]
pub struct MentionTrigger {
    pub issue_id: String,
    pub workspace_id: String,
    pub request_text: String,
    pub trigger_comment_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskOrchestratorConfig {
    pub ticker: ProgressTickerConfig,
}

pub struct TaskLifecycleOrchestrator {
    assistant: Arc<dyn AssistantClient>,
    config: TaskOrchestratorConfig,
    active: Mutex<HashMap<String, ActiveTask>>,
    // Keyed by issue id; the comment id records which worker owns the entry.
    handles: Mutex<HashMap<String, (String, JoinHandle<()>)>>,
}

impl TaskLifecycleOrchestrator {
    pub fn new(assistant: Arc<dyn AssistantClient>, config: TaskOrchestratorConfig) -> Self {
        Self {
            assistant,
            config,
            active: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Acknowledges a mention, creates the working comment, and spawns the
    /// detached generation task. Returns the working comment id as soon as
    /// the comment exists; the generation runs in the background.
    pub async fn start_task(
        self: &Arc<Self>,
        credential: &WorkspaceCredential,
        trigger: MentionTrigger,
    ) -> Result<String> {
        let client = credential.client.clone();
        let is_agent = credential.is_tenant();

        // The reaction is best-effort: a failure must never block the task.
        let mut acknowledged = false;
        if let Some(comment_id) = trigger.trigger_comment_id.as_deref() {
            match client.create_reaction(comment_id, "🤔").await {
                Ok(()) => acknowledged = true,
                Err(error) => {
                    eprintln!(
                        "task runtime: reaction failed issue_id={} comment_id={comment_id} error={error:#}",
                        trigger.issue_id
                    );
                }
            }
        }

        let snapshot = client
            .fetch_issue(&trigger.issue_id)
            .await
            .with_context(|| format!("failed to fetch issue {}", trigger.issue_id))?;
        let context = IssueContext::from_snapshot(&snapshot);

        let now_ms = current_unix_timestamp_ms();
        let body = messages::working_comment(is_agent, &format_unix_ms_rfc3339(now_ms));
        let comment_id = client
            .create_comment(&trigger.issue_id, &body)
            .await
            .with_context(|| {
                format!("failed to create working comment for issue {}", trigger.issue_id)
            })?;
        println!(
            "task runtime: working comment created issue_id={} comment_id={comment_id} agent={is_agent}",
            trigger.issue_id
        );

        let task = ActiveTask {
            issue_id: trigger.issue_id.clone(),
            workspace_id: trigger.workspace_id.clone(),
            status_comment_id: comment_id.clone(),
            started_unix_ms: now_ms,
            phase: if acknowledged {
                TaskPhase::Acknowledged
            } else {
                TaskPhase::Created
            },
        };
        {
            let mut guard = self
                .active
                .lock()
                .map_err(|_| anyhow!("task map mutex is poisoned"))?;
            if let Some(previous) = guard.insert(trigger.issue_id.clone(), task) {
                println!(
                    "task runtime: replaced active task issue_id={} orphaned_comment_id={}",
                    trigger.issue_id, previous.status_comment_id
                );
            }
        }

        let orchestrator = Arc::clone(self);
        let issue_id = trigger.issue_id.clone();
        let run_comment_id = comment_id.clone();
        let handle = tokio::spawn(async move {
            orchestrator
                .run_task(client, issue_id, run_comment_id, trigger.request_text, context, is_agent)
                .await;
        });
        if let Ok(mut guard) = self.handles.lock() {
            guard.insert(trigger.issue_id.clone(), (comment_id.clone(), handle));
        }

        Ok(comment_id)
    }

    /// Detached worker: analyzing edit, progress ticker, generation, then
    /// the terminal edit. The ticker is cancelled and awaited before any
    /// terminal edit so a late tick can never overwrite the final text.
    async fn run_task(
        self: Arc<Self>,
        client: LinearApiClient,
        issue_id: String,
        comment_id: String,
        request_text: String,
        context: IssueContext,
        is_agent: bool,
    ) {
        self.set_phase(&issue_id, &comment_id, TaskPhase::Running);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let ticker_client = client.clone();
        let ticker_comment = comment_id.clone();
        let ticker_config = self.config.ticker.clone();
        let ticker = tokio::spawn(async move {
            progress::run_progress_ticker(ticker_config, cancel_rx, move |body| {
                let client = ticker_client.clone();
                let comment_id = ticker_comment.clone();
                async move { client.update_comment(&comment_id, &body).await }
            })
            .await
        });

        let analyzing =
            messages::analyzing_status(&format_unix_ms_rfc3339(current_unix_timestamp_ms()));
        let generated = match client.update_comment(&comment_id, &analyzing).await {
            Ok(()) => self
                .assistant
                .generate(&request_text, &context)
                .await
                .map_err(anyhow::Error::from),
            Err(error) => Err(error),
        };

        // Tick/terminal serialization: stop the ticker first.
        let _ = cancel_tx.send(true);
        let _ = ticker.await;

        let phase = match generated {
            Ok(response) => {
                let body = messages::completion(
                    &response,
                    detect_request_kind(&request_text),
                    is_agent,
                    &format_unix_ms_rfc3339(current_unix_timestamp_ms()),
                );
                match client.update_comment(&comment_id, &body).await {
                    Ok(()) => {
                        println!(
                            "task runtime: task completed issue_id={issue_id} comment_id={comment_id}"
                        );
                        TaskPhase::Completed
                    }
                    Err(error) => {
                        eprintln!(
                            "task runtime: completion edit failed issue_id={issue_id} error={error:#}"
                        );
                        self.finalize_failure(&client, &issue_id, &comment_id, is_agent)
                            .await;
                        TaskPhase::Failed
                    }
                }
            }
            Err(error) => {
                eprintln!("task runtime: generation failed issue_id={issue_id} error={error:#}");
                self.finalize_failure(&client, &issue_id, &comment_id, is_agent)
                    .await;
                TaskPhase::Failed
            }
        };

        self.clear_task(&issue_id, &comment_id, phase);
        self.release_handle(&issue_id, &comment_id);
    }

    /// Edits the working comment to the failure notice; when that edit also
    /// fails, creates a brand-new comment once and otherwise only logs.
    async fn finalize_failure(
        &self,
        client: &LinearApiClient,
        issue_id: &str,
        comment_id: &str,
        is_agent: bool,
    ) {
        let body = messages::failure_notice(
            is_agent,
            &format_unix_ms_rfc3339(current_unix_timestamp_ms()),
        );
        if let Err(error) = client.update_comment(comment_id, &body).await {
            eprintln!(
                "task runtime: failure edit failed issue_id={issue_id} comment_id={comment_id} error={error:#}"
            );
            if let Err(error) = client.create_comment(issue_id, &body).await {
                eprintln!(
                    "task runtime: failure fallback comment failed issue_id={issue_id} error={error:#}"
                );
            }
        }
    }

    pub fn active_task(&self, issue_id: &str) -> Option<ActiveTask> {
        let guard = self.active.lock().ok()?;
        guard.get(issue_id).cloned()
    }

    pub fn active_task_count(&self) -> usize {
        self.active.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Awaits the detached worker for an issue. Used by shutdown and tests.
    pub async fn wait_for_task(&self, issue_id: &str) {
        let handle = match self.handles.lock() {
            Ok(mut guard) => guard.remove(issue_id).map(|(_, handle)| handle),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn set_phase(&self, issue_id: &str, comment_id: &str, phase: TaskPhase) {
        if let Ok(mut guard) = self.active.lock() {
            if let Some(task) = guard.get_mut(issue_id) {
                if task.status_comment_id == comment_id {
                    task.phase = phase;
                }
            }
        }
    }

    /// Drops the worker's handle entry once it finishes, with the same
    /// ownership check as `clear_task` so a replacement's handle survives.
    fn release_handle(&self, issue_id: &str, comment_id: &str) {
        if let Ok(mut guard) = self.handles.lock() {
            let owned = guard
                .get(issue_id)
                .map(|(owner, _)| owner == comment_id)
                .unwrap_or(false);
            if owned {
                guard.remove(issue_id);
            }
        }
    }

    /// Removes the tracked entry, but only when it still belongs to this
    /// worker's comment. A replacement task owns the entry by then.
    fn clear_task(&self, issue_id: &str, comment_id: &str, phase: TaskPhase) {
        if let Ok(mut guard) = self.active.lock() {
            let owned = guard
                .get(issue_id)
                .map(|task| task.status_comment_id == comment_id)
                .unwrap_or(false);
            if owned {
                guard.remove(issue_id);
                println!(
                    "task runtime: cleared task issue_id={issue_id} comment_id={comment_id} phase={phase:?}"
                );
            }
        }
    }
}
