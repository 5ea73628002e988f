//! Notebook session orchestration
//!
//! This crate owns the lifecycle of interactive notebook sessions: it persists
//! per-workspace metadata, launches each session through a provisioning
//! client (a remote sandbox platform or a local stub), and keeps the
//! in-memory registry of sessions. It is consumed by the session-api HTTP
//! service but has no HTTP dependency of its own.

pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod platform;
pub mod provisioner;
pub mod secrets;
pub mod storage;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Settings;
pub use error::{OrchestratorError, Result};
pub use manager::{CreateSessionRequest, SessionManager};
pub use models::{Metadata, SessionRecord, SessionStatus, WorkspaceSpec};
pub use provisioner::SessionProvisioner;
pub use storage::{LocalWorkspaceStorage, WorkspaceStorage};
