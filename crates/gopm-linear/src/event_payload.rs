//! Workspace-id extraction from webhook payloads.

use serde_json::Value;

/// JSON paths checked in order when routing a webhook payload. Comment
/// events nest the organization under the parent issue, issue events carry
/// it directly, and some payloads only have the top-level field.
const WORKSPACE_ID_PATHS: &[&[&str]] = &[
    &["data", "issue", "team", "organization", "id"],
    &["data", "issue", "organization", "id"],
    &["data", "comment", "issue", "team", "organization", "id"],
    &["data", "organization", "id"],
    &["organizationId"],
];

/// Returns the first workspace id found along the candidate paths.
/// `None` means the event cannot be routed to a tenant.
pub fn extract_workspace_id(payload: &Value) -> Option<String> {
    for path in WORKSPACE_ID_PATHS {
        let mut cursor = payload;
        let mut found = true;
        for segment in *path {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if !found {
            continue;
        }
        if let Some(id) = cursor.as_str() {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}
