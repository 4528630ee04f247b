//! Runtime behaviors of the goPM agent: task lifecycle around one mutable
//! status comment, assignment tracking, issue classification, webhook event
//! dispatch, and the assistant generation seam.

pub mod assignment_tracker;
pub mod assistant;
pub mod classify;
pub mod issue_context;
pub mod task_runtime;
pub mod webhook_dispatch;

pub use assignment_tracker::{AgentAssignment, AssignmentTracker};
pub use assistant::{
    AnthropicAssistant, AnthropicAssistantConfig, AssistantClient, AssistantError,
};
pub use classify::{
    detect_issue_priority, detect_issue_type, detect_request_kind, is_not_started_state,
    IssuePriority, IssueType, RequestKind,
};
pub use issue_context::{IssueContext, ProjectContext};
pub use task_runtime::{
    ActiveTask, MentionTrigger, ProgressTickerConfig, TaskLifecycleOrchestrator,
    TaskOrchestratorConfig, TaskPhase,
};
pub use webhook_dispatch::{DispatchOutcome, WebhookDispatcher};
