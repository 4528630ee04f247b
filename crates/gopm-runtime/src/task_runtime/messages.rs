//! Comment bodies posted through the task lifecycle. Agent-toned when the
//! workspace runs on an installed agent token, legacy-toned otherwise.

use crate::classify::RequestKind;

pub(super) fn working_comment(is_agent: bool, timestamp: &str) -> String {
    if is_agent {
        format!("🤖 goPM agent is working on this...\nStarted: {timestamp}")
    } else {
        format!("🤔 working on it\nLast updated: {timestamp}")
    }
}

pub(super) fn analyzing_status(timestamp: &str) -> String {
    format!("🤔 Analyzing this issue...\n\n_Started: {timestamp}_")
}

pub(super) fn completion(
    response: &str,
    request_kind: RequestKind,
    is_agent: bool,
    timestamp: &str,
) -> String {
    let signature = if is_agent {
        format!("🤖 _Completed by goPM agent: {timestamp}_")
    } else {
        format!("_Completed: {timestamp}_")
    };
    format!(
        "{response}\n\n{next_steps}\n\n{signature}",
        next_steps = next_steps(request_kind)
    )
}

pub(super) fn failure_notice(is_agent: bool, timestamp: &str) -> String {
    if is_agent {
        format!(
            "🤖 goPM agent encountered an error processing this request. \
Please try again or contact support.\n\n_Error time: {timestamp}_"
        )
    } else {
        format!(
            "❌ Sorry, I encountered an error processing your request. \
Please try again.\n\n_Error time: {timestamp}_"
        )
    }
}

fn next_steps(request_kind: RequestKind) -> &'static str {
    match request_kind {
        RequestKind::Breakdown => {
            "🎯 **Next Steps**: Consider creating sub-issues for each story, or @mention me \
with \"create tasks\" if you'd like me to help structure them."
        }
        RequestKind::Analysis => {
            "🎯 **Next Steps**: If you need deeper analysis on any specific area, @mention me \
with more details. Ready to help refine requirements!"
        }
        RequestKind::Estimation => {
            "🎯 **Next Steps**: Share this estimate with your dev team for validation, or \
@mention me if scope changes significantly."
        }
        RequestKind::Requirements => {
            "🎯 **Next Steps**: Review these with stakeholders, then @mention me if you need \
help breaking down into tasks or creating acceptance criteria."
        }
        RequestKind::General => {
            "🎯 **Next Steps**: @mention me anytime for follow-up questions, deeper analysis, \
or help with next phases!"
        }
    }
}
