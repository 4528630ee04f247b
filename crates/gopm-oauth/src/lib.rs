//! Multi-tenant OAuth credential store for goPM agent installations.
//!
//! Owns authorization state, per-workspace access tokens, and the durable
//! credentials file. Everything else in the system borrows credentials from
//! here and never mutates them directly.

mod credential_store;

pub use credential_store::{
    AuthorizationRequest, CredentialStore, CredentialStoreConfig, OAuthError, SweepReport,
    WorkspaceIdentity, WorkspaceToken, PENDING_AUTHORIZATION_TTL_MS,
};
