//! Linear GraphQL client plus per-workspace credential resolution.
//!
//! `LinearApiClient` speaks GraphQL with bounded retries. `WorkspaceResolver`
//! picks the credential for a workspace (installed agent token first, then
//! the legacy API key) and hands back a ready client. `event_payload` digs
//! workspace ids out of webhook payloads.

pub mod event_payload;
pub mod linear_api_client;
pub mod linear_transport_helpers;
pub mod workspace_resolver;

pub use event_payload::extract_workspace_id;
pub use linear_api_client::{
    IssueSnapshot, LinearApiClient, LinearAuth, LinearClientConfig, ProjectSnapshot,
    WorkflowState,
};
pub use workspace_resolver::{
    CredentialProvenance, ResolveError, WorkspaceCredential, WorkspaceResolver,
};
