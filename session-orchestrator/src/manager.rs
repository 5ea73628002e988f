//! Session lifecycle manager: the sole owner of the session registry.
//!
//! The registry lock only guards map operations. It is never held across a
//! storage write or a provisioning call, so a slow sandbox launch does not
//! serialize unrelated creations or queries.

use crate::config::Settings;
use crate::error::{OrchestratorError, Result};
use crate::models::{Metadata, SessionRecord, SessionStatus, WorkspaceSpec};
use crate::provisioner::{self, SessionProvisioner};
use crate::secrets::{generate_access_token, generate_workspace_id};
use crate::storage::{LocalWorkspaceStorage, WorkspaceStorage};
use crate::validation::{validate_entrypoint_filename, validate_workspace_id};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, instrument, warn, Instrument, Span};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub entrypoint_filename: Option<String>,
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<String, SessionRecord>,
    /// Ids whose creation or termination is underway.
    in_flight: HashSet<String>,
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Map operations cannot leave the registry half-updated.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases an in-flight id when its create or terminate finishes or bails out.
struct Reservation {
    registry: Arc<Mutex<Registry>>,
    workspace_id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        lock_registry(&self.registry)
            .in_flight
            .remove(&self.workspace_id);
    }
}

#[derive(Clone)]
pub struct SessionManager {
    settings: Arc<Settings>,
    storage: Arc<dyn WorkspaceStorage>,
    provisioner: Arc<dyn SessionProvisioner>,
    registry: Arc<Mutex<Registry>>,
}

impl SessionManager {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn WorkspaceStorage>,
        provisioner: Arc<dyn SessionProvisioner>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            storage,
            provisioner,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Local storage plus whichever provisioner the settings select.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let storage = LocalWorkspaceStorage::new(&settings.workspace_storage_root)?;
        let provisioner = provisioner::from_settings(&settings)?;
        info!(
            storage_root = %storage.root().display(),
            provisioner = provisioner.mode(),
            "Session manager initialized"
        );
        Ok(Self::new(settings, Arc::new(storage), provisioner))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn provisioner_mode(&self) -> &'static str {
        self.provisioner.mode()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.registry)
    }

    fn reservation(&self, workspace_id: &str) -> Reservation {
        Reservation {
            registry: Arc::clone(&self.registry),
            workspace_id: workspace_id.to_string(),
        }
    }

    /// Claim `workspace_id` for creation.
    fn reserve_creation(&self, workspace_id: &str) -> Result<Reservation> {
        let mut registry = self.registry();

        let active = registry
            .sessions
            .get(workspace_id)
            .is_some_and(|record| !record.status.is_terminal());
        if active || registry.in_flight.contains(workspace_id) {
            return Err(OrchestratorError::WorkspaceConflict(
                workspace_id.to_string(),
            ));
        }

        registry.in_flight.insert(workspace_id.to_string());
        Ok(self.reservation(workspace_id))
    }

    /// Persist the workspace, then launch a session for it.
    ///
    /// Storage is written before any provisioning attempt, so a storage
    /// failure never leaves an orphaned sandbox behind. A failed launch is
    /// still recorded in the registry (status `failed`) before the error is
    /// returned.
    ///
    /// Once the launch has started it runs to completion in its own task,
    /// even if the caller stops waiting.
    #[instrument(skip_all, fields(workspace_id))]
    pub async fn create_session(&self, req: CreateSessionRequest) -> Result<SessionRecord> {
        let workspace_id = match req.workspace_id {
            Some(id) => {
                validate_workspace_id(&id)?;
                id
            }
            None => generate_workspace_id(),
        };
        Span::current().record("workspace_id", workspace_id.as_str());

        let entrypoint = req
            .entrypoint_filename
            .unwrap_or_else(|| self.settings.default_entrypoint.clone());
        validate_entrypoint_filename(&entrypoint)?;

        let reservation = self.reserve_creation(&workspace_id)?;
        let token = generate_access_token(self.settings.effective_token_length());

        let storage = Arc::clone(&self.storage);
        let (requirements, env, metadata) = (req.requirements, req.env, req.metadata);
        let spec = tokio::task::spawn_blocking(move || -> Result<WorkspaceSpec> {
            let workspace_path = storage.ensure_workspace(&workspace_id)?;
            let spec = WorkspaceSpec::new(
                workspace_id,
                token,
                entrypoint,
                requirements,
                env,
                metadata,
                &workspace_path,
            );
            storage.persist_requirements(spec.workspace_id(), spec.requirements())?;
            storage.persist_metadata(spec.workspace_id(), &workspace_document(&spec))?;
            Ok(spec)
        })
        .await??;

        let provisioner = Arc::clone(&self.provisioner);
        let registry = Arc::clone(&self.registry);
        let launch = tokio::spawn(
            async move {
                let mut record = SessionRecord::new(spec.workspace_id(), spec.token());
                let launched = provisioner.launch_session(&spec, &mut record).await;

                lock_registry(&registry)
                    .sessions
                    .insert(record.workspace_id.clone(), record.clone());
                drop(reservation);

                launched.map(|()| record)
            }
            .instrument(Span::current()),
        );

        match launch.await? {
            Ok(record) => {
                info!(
                    sandbox_id = %record.sandbox_id,
                    status = %record.status,
                    "Session created"
                );
                Ok(record)
            }
            Err(e) => {
                warn!("Session creation failed: {e}");
                Err(e)
            }
        }
    }

    pub fn get_session(&self, workspace_id: &str) -> Result<SessionRecord> {
        self.registry()
            .sessions
            .get(workspace_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::WorkspaceNotFound(workspace_id.to_string()))
    }

    /// Snapshot of every known session, keyed by workspace id.
    pub fn list_sessions(&self) -> BTreeMap<String, SessionRecord> {
        self.registry()
            .sessions
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Stop the sandbox behind a running session.
    ///
    /// Terminating an already terminated session is a no-op. A failed stop
    /// keeps the previous status and records the error under
    /// `termination_error`. Only one termination per workspace runs at a
    /// time; a concurrent call fails with `InvalidState`.
    #[instrument(skip(self))]
    pub async fn terminate_session(&self, workspace_id: &str) -> Result<SessionRecord> {
        let (mut record, reservation) = {
            let mut registry = self.registry();
            let record = registry
                .sessions
                .get(workspace_id)
                .cloned()
                .ok_or_else(|| OrchestratorError::WorkspaceNotFound(workspace_id.to_string()))?;

            match record.status {
                SessionStatus::Running => {}
                SessionStatus::Terminated => return Ok(record),
                status => {
                    return Err(OrchestratorError::InvalidState(format!(
                        "Workspace {workspace_id} is {status} and cannot be terminated"
                    )))
                }
            }

            if !registry.in_flight.insert(workspace_id.to_string()) {
                return Err(OrchestratorError::InvalidState(format!(
                    "Workspace {workspace_id} is already being terminated"
                )));
            }
            (record, self.reservation(workspace_id))
        };

        let provisioner = Arc::clone(&self.provisioner);
        let registry = Arc::clone(&self.registry);
        let stop = tokio::spawn(
            async move {
                let stopped = provisioner.stop_session(&mut record).await;
                if let Err(e) = &stopped {
                    record.note_termination_failure(e.to_string());
                }

                lock_registry(&registry)
                    .sessions
                    .insert(record.workspace_id.clone(), record.clone());
                drop(reservation);

                stopped.map(|()| record)
            }
            .instrument(Span::current()),
        );

        let record = stop.await??;
        info!(sandbox_id = %record.sandbox_id, "Session terminated");
        Ok(record)
    }
}

/// The sorted-key document persisted as `workspace.json`.
fn workspace_document(spec: &WorkspaceSpec) -> Metadata {
    let mut document = Metadata::new();
    document.insert("workspace_id".to_string(), json!(spec.workspace_id()));
    document.insert(
        "entrypoint_filename".to_string(),
        json!(spec.entrypoint_filename()),
    );
    document.insert("requirements".to_string(), json!(spec.requirements()));
    document.insert("env".to_string(), json!(spec.env()));
    document.insert("metadata".to_string(), json!(spec.metadata()));
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::METADATA_FILE;
    use crate::test_utils::{stub_manager, RecordingProvisioner};
    use tempfile::TempDir;

    #[test]
    fn test_workspace_document_contents() {
        let mut metadata = Metadata::new();
        metadata.insert("owner".to_string(), json!("data-team"));
        let spec = WorkspaceSpec::new(
            "ws1",
            "secret",
            "main.py",
            vec!["numpy".to_string()],
            BTreeMap::from([("DEBUG".to_string(), "1".to_string())]),
            metadata,
            std::path::Path::new("/srv/ws1"),
        );

        let document = workspace_document(&spec);

        assert_eq!(document["workspace_id"], "ws1");
        assert_eq!(document["entrypoint_filename"], "main.py");
        assert_eq!(document["requirements"], json!(["numpy"]));
        assert_eq!(document["env"], json!({"DEBUG": "1"}));
        assert_eq!(document["metadata"]["owner"], "data-team");
        assert_eq!(document["metadata"]["workspace_path"], "/srv/ws1");
        assert!(!serde_json::to_string(&document).unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn test_create_writes_workspace_files() {
        let temp_dir = TempDir::new().unwrap();
        let manager = stub_manager(temp_dir.path());

        let record = manager
            .create_session(CreateSessionRequest {
                workspace_id: Some("ws1".to_string()),
                requirements: vec!["numpy".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let workspace_dir = temp_dir.path().canonicalize().unwrap().join("ws1");
        assert_eq!(
            std::fs::read_to_string(workspace_dir.join("requirements.txt")).unwrap(),
            "numpy\n"
        );
        let document: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(workspace_dir.join(METADATA_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(document["entrypoint_filename"], "main.py");
        assert_eq!(record.workspace_id, "ws1");
    }

    /// Records the thread every storage call runs on.
    struct ThreadRecordingStorage {
        inner: LocalWorkspaceStorage,
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ThreadRecordingStorage {
        fn record(&self) {
            self.threads.lock().unwrap().push(std::thread::current().id());
        }
    }

    impl WorkspaceStorage for ThreadRecordingStorage {
        fn ensure_workspace(&self, workspace_id: &str) -> Result<std::path::PathBuf> {
            self.record();
            self.inner.ensure_workspace(workspace_id)
        }

        fn persist_requirements(
            &self,
            workspace_id: &str,
            requirements: &[String],
        ) -> Result<std::path::PathBuf> {
            self.record();
            self.inner.persist_requirements(workspace_id, requirements)
        }

        fn persist_metadata(
            &self,
            workspace_id: &str,
            metadata: &Metadata,
        ) -> Result<std::path::PathBuf> {
            self.record();
            self.inner.persist_metadata(workspace_id, metadata)
        }
    }

    #[tokio::test]
    async fn test_storage_runs_off_the_runtime_thread() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(ThreadRecordingStorage {
            inner: LocalWorkspaceStorage::new(temp_dir.path()).unwrap(),
            threads: Mutex::new(Vec::new()),
        });
        let manager = SessionManager::new(
            Settings::local(temp_dir.path()),
            storage.clone(),
            Arc::new(RecordingProvisioner::stub()),
        );

        manager
            .create_session(CreateSessionRequest {
                workspace_id: Some("ws1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = storage.threads.lock().unwrap();
        assert_eq!(threads.len(), 3);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn test_reservation_released_after_storage_failure() {
        let temp_dir = TempDir::new().unwrap();
        let provisioner = Arc::new(RecordingProvisioner::stub());
        let storage = crate::test_utils::FailingStorage::new(temp_dir.path());
        let manager = SessionManager::new(
            Settings::local(temp_dir.path()),
            Arc::new(storage),
            provisioner.clone(),
        );

        let req = CreateSessionRequest {
            workspace_id: Some("ws1".to_string()),
            ..Default::default()
        };
        assert!(manager.create_session(req.clone()).await.is_err());

        // A leaked reservation would surface as a conflict here.
        let err = manager.create_session(req).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Storage { .. }));
        assert!(manager.registry().in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_storage() {
        let temp_dir = TempDir::new().unwrap();
        let manager = stub_manager(temp_dir.path());

        let err = manager
            .create_session(CreateSessionRequest {
                workspace_id: Some("../escape".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));

        let err = manager
            .create_session(CreateSessionRequest {
                entrypoint_filename: Some("../main.py".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
        assert!(manager.list_sessions().is_empty());
    }
}
