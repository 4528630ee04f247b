//! Keyword classification of issues and requests.
//!
//! All detectors are pure and total: unknown input falls back to the
//! default variant instead of failing.

use gopm_linear::IssueSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuePriority {
    Urgent,
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    Bug,
    Feature,
    Epic,
    Task,
}

impl IssueType {
    pub fn label(self) -> &'static str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Epic => "epic",
            IssueType::Task => "task",
        }
    }
}

/// What the human asked for, used to pick a next-steps suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Breakdown,
    Analysis,
    Estimation,
    Requirements,
    General,
}

pub fn detect_issue_priority(issue: &IssueSnapshot) -> IssuePriority {
    let title = issue.title.to_lowercase();
    let description = issue.description.to_lowercase();
    let label_matches = |names: &[&str]| {
        issue
            .labels
            .iter()
            .any(|label| names.contains(&label.to_lowercase().as_str()))
    };

    if ["urgent", "critical", "hotfix"]
        .iter()
        .any(|keyword| title.contains(keyword))
        || ["urgent", "critical"]
            .iter()
            .any(|keyword| description.contains(keyword))
        || label_matches(&["urgent", "critical", "p0", "hotfix"])
    {
        return IssuePriority::Urgent;
    }

    if ["high priority", "important"]
        .iter()
        .any(|keyword| title.contains(keyword) || description.contains(keyword))
        || label_matches(&["high", "p1", "important"])
    {
        return IssuePriority::High;
    }

    IssuePriority::Normal
}

pub fn detect_issue_type(issue: &IssueSnapshot) -> IssueType {
    let title = issue.title.to_lowercase();
    let description = issue.description.to_lowercase();
    let label_matches = |names: &[&str]| {
        issue
            .labels
            .iter()
            .any(|label| names.contains(&label.to_lowercase().as_str()))
    };

    if ["bug", "fix", "error"]
        .iter()
        .any(|keyword| title.contains(keyword))
        || ["bug", "error"]
            .iter()
            .any(|keyword| description.contains(keyword))
        || label_matches(&["bug", "fix", "error"])
    {
        return IssueType::Bug;
    }

    if ["feature", "add", "implement"]
        .iter()
        .any(|keyword| title.contains(keyword))
        || ["feature", "new"]
            .iter()
            .any(|keyword| description.contains(keyword))
        || label_matches(&["feature", "enhancement", "new"])
    {
        return IssueType::Feature;
    }

    if title.contains("epic") || label_matches(&["epic"]) {
        return IssueType::Epic;
    }

    IssueType::Task
}

pub fn detect_request_kind(text: &str) -> RequestKind {
    let lower = text.to_lowercase();
    if lower.contains("break down") || lower.contains("epic") {
        return RequestKind::Breakdown;
    }
    if lower.contains("analyze") || lower.contains("review") {
        return RequestKind::Analysis;
    }
    if lower.contains("estimate") || lower.contains("effort") {
        return RequestKind::Estimation;
    }
    if lower.contains("requirements") || lower.contains("criteria") {
        return RequestKind::Requirements;
    }
    RequestKind::General
}

/// Issue states the agent should move out of when it picks up work.
pub fn is_not_started_state(state_name: &str) -> bool {
    let lower = state_name.to_lowercase();
    ["backlog", "todo", "planned", "new", "open", "triage"]
        .iter()
        .any(|keyword| lower.contains(keyword))
}
