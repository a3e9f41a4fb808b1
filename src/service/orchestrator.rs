//! Orchestrator core: single-writer state machine over the WAL.
//!
//! All derived state (snapshot registry, command queue, job table) lives
//! in one [`CoreState`] rebuilt by folding the WAL at startup and mutated
//! only through [`Orchestrator::commit`], which appends to the WAL,
//! applies the same fold step, and publishes the record to the event hub.
//! A `RwLock` gives many concurrent readers and one writer, so two racing
//! mutations can never interleave their WAL records.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::domain::{
    Command, CommandId, CommandKind, CommandStatus, EventHub, EventOutcome, JobId, JobLogEntry,
    JobStatus, RestoreJob, Snapshot, SnapshotId, SnapshotStatus, WalEvent,
};
use crate::error::OrchestratorError;
use crate::storage::{ByteStream, ObjectStore, compute_checksum};
use crate::wal::{Wal, WalError, WalRecord};

/// Derived, rebuildable projection of the WAL.
///
/// Held purely in memory between restarts; `replay()` runs to completion
/// before the orchestrator accepts requests.
#[derive(Debug, Default)]
struct CoreState {
    snapshots: HashMap<SnapshotId, Snapshot>,
    jobs: HashMap<JobId, RestoreJob>,
    commands: HashMap<CommandId, Command>,
    /// Enqueue order, the order agents see commands in.
    command_order: Vec<CommandId>,
}

/// The orchestrator control plane.
///
/// Single active writer: there is no leader election, and replica
/// failover is out of scope. The write path is one mutual-exclusion
/// section around "WAL append + state fold + hub publish".
#[derive(Debug)]
pub struct Orchestrator {
    state: RwLock<CoreState>,
    wal: Wal,
    event_hub: EventHub,
    store: Arc<dyn ObjectStore>,
    /// Cleared after the first failed WAL append; mutating operations
    /// refuse work once cleared and the readiness probe reports degraded.
    accepting: AtomicBool,
}

impl Orchestrator {
    /// Builds the orchestrator by replaying the WAL into memory.
    ///
    /// # Errors
    ///
    /// Returns a [`OrchestratorError::WalWrite`] if the log cannot be
    /// read; the process must not serve requests in that case.
    pub fn new(
        wal: Wal,
        event_hub: EventHub,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, OrchestratorError> {
        let records = wal.replay()?;
        let mut state = CoreState::default();
        for record in &records {
            Self::apply(&mut state, record);
        }
        tracing::info!(
            records = records.len(),
            snapshots = state.snapshots.len(),
            jobs = state.jobs.len(),
            "wal replay complete"
        );

        Ok(Self {
            state: RwLock::new(state),
            wal,
            event_hub,
            store,
            accepting: AtomicBool::new(true),
        })
    }

    /// Returns a reference to the event hub.
    #[must_use]
    pub fn event_hub(&self) -> &EventHub {
        &self.event_hub
    }

    /// Returns `false` once a WAL append has failed; the readiness probe
    /// reports degraded and mutating endpoints refuse new work.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    // ── Snapshot Registry ───────────────────────────────────────────────

    /// Allocates snapshot identity and a storage location.
    ///
    /// The snapshot starts in `pending_upload`; the agent uploads bytes
    /// directly to storage and then calls
    /// [`complete_snapshot_upload`](Self::complete_snapshot_upload).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidRequest`] on empty inputs, or
    /// [`OrchestratorError::WalWrite`] if the record cannot be appended.
    pub async fn create_snapshot(
        &self,
        agent_id: &str,
        declared_checksum: &str,
        declared_size: u64,
        metadata: HashMap<String, String>,
    ) -> Result<Snapshot, OrchestratorError> {
        if agent_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "agent_id must not be empty".to_string(),
            ));
        }
        let checksum = declared_checksum.trim().to_lowercase();
        if checksum.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "checksum must not be empty".to_string(),
            ));
        }
        self.ensure_accepting()?;

        let snapshot_id = SnapshotId::new();
        let storage_key = format!("snapshots/{snapshot_id}");

        let mut state = self.state.write().await;
        self.commit(
            &mut state,
            WalEvent::SnapshotCreated {
                snapshot_id,
                agent_id: agent_id.to_string(),
                checksum,
                size: declared_size,
                storage_key,
                metadata,
            },
        )?;

        tracing::info!(%snapshot_id, agent_id, "snapshot created");
        state
            .snapshots
            .get(&snapshot_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Internal("snapshot missing after fold".to_string()))
    }

    /// Verifies the uploaded bytes and gates snapshot visibility.
    ///
    /// The declared checksum is only an early-rejection hint; the real
    /// check streams the stored object through the hash again. On match
    /// the snapshot becomes `available`; on mismatch it is permanently
    /// `failed` (the bytes are retained for diagnostics).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ChecksumMismatch`] on a failed
    /// verification, [`OrchestratorError::InvalidStateTransition`] if the
    /// snapshot is not `pending_upload` or the object was never uploaded,
    /// and [`OrchestratorError::StorageUnavailable`] if the store cannot
    /// be reached (retryable; no WAL record is appended).
    pub async fn complete_snapshot_upload(
        &self,
        snapshot_id: SnapshotId,
        actual_checksum: &str,
    ) -> Result<Snapshot, OrchestratorError> {
        self.ensure_accepting()?;

        let snapshot = {
            let state = self.state.read().await;
            state
                .snapshots
                .get(&snapshot_id)
                .cloned()
                .ok_or(OrchestratorError::SnapshotNotFound(snapshot_id))?
        };
        if snapshot.status != SnapshotStatus::PendingUpload {
            return Err(OrchestratorError::InvalidStateTransition(format!(
                "snapshot {snapshot_id} is {}, not pending_upload",
                snapshot.status.as_str()
            )));
        }

        let reported = actual_checksum.trim().to_lowercase();
        if reported != snapshot.checksum {
            return self.fail_snapshot(snapshot_id, &snapshot.checksum, reported).await;
        }

        if !self.store.exists(&snapshot.storage_key).await? {
            return Err(OrchestratorError::InvalidStateTransition(format!(
                "snapshot {snapshot_id} object has not been uploaded"
            )));
        }

        // Streams the stored copy; declared values are never trusted.
        let computed = compute_checksum(self.store.as_ref(), &snapshot.storage_key).await?;

        if computed != snapshot.checksum {
            return self.fail_snapshot(snapshot_id, &snapshot.checksum, computed).await;
        }

        let mut state = self.state.write().await;
        let current = state
            .snapshots
            .get(&snapshot_id)
            .ok_or(OrchestratorError::SnapshotNotFound(snapshot_id))?;
        if current.status != SnapshotStatus::PendingUpload {
            return Err(OrchestratorError::InvalidStateTransition(format!(
                "snapshot {snapshot_id} is {}, not pending_upload",
                current.status.as_str()
            )));
        }
        self.commit(&mut state, WalEvent::SnapshotAvailable { snapshot_id })?;

        tracing::info!(%snapshot_id, "snapshot verified and available");
        state
            .snapshots
            .get(&snapshot_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Internal("snapshot missing after fold".to_string()))
    }

    /// Records a failed verification and reports the mismatch.
    async fn fail_snapshot(
        &self,
        snapshot_id: SnapshotId,
        declared: &str,
        computed: String,
    ) -> Result<Snapshot, OrchestratorError> {
        let mut state = self.state.write().await;
        let current = state
            .snapshots
            .get(&snapshot_id)
            .ok_or(OrchestratorError::SnapshotNotFound(snapshot_id))?;
        if current.status == SnapshotStatus::PendingUpload {
            self.commit(
                &mut state,
                WalEvent::SnapshotFailed {
                    snapshot_id,
                    computed_checksum: computed.clone(),
                },
            )?;
            tracing::warn!(%snapshot_id, declared, computed, "snapshot checksum mismatch");
        }
        Err(OrchestratorError::ChecksumMismatch {
            declared: declared.to_string(),
            computed,
        })
    }

    /// Returns snapshot metadata.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::SnapshotNotFound`] for unknown ids.
    pub async fn get_snapshot(
        &self,
        snapshot_id: SnapshotId,
    ) -> Result<Snapshot, OrchestratorError> {
        let state = self.state.read().await;
        state
            .snapshots
            .get(&snapshot_id)
            .cloned()
            .ok_or(OrchestratorError::SnapshotNotFound(snapshot_id))
    }

    /// Returns all snapshots, optionally filtered by owning agent,
    /// ordered by creation time.
    pub async fn list_snapshots(&self, agent_filter: Option<&str>) -> Vec<Snapshot> {
        let state = self.state.read().await;
        let mut snapshots: Vec<Snapshot> = state
            .snapshots
            .values()
            .filter(|s| agent_filter.is_none_or(|a| s.agent_id == a))
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        snapshots
    }

    /// Opens a streaming read of a verified snapshot's stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidStateTransition`] unless the
    /// snapshot is `available`, plus any storage gateway error.
    pub async fn snapshot_object(
        &self,
        snapshot_id: SnapshotId,
    ) -> Result<(Snapshot, ByteStream), OrchestratorError> {
        let snapshot = self.get_snapshot(snapshot_id).await?;
        if snapshot.status != SnapshotStatus::Available {
            return Err(OrchestratorError::InvalidStateTransition(format!(
                "snapshot {snapshot_id} is {}, not available",
                snapshot.status.as_str()
            )));
        }
        let stream = self.store.get(&snapshot.storage_key).await?;
        Ok((snapshot, stream))
    }

    // ── Restore Job State Machine ───────────────────────────────────────

    /// Creates a restore job, enqueues its command, and starts it.
    ///
    /// All three WAL records (`job_created`, `command_created`,
    /// `job_started`) are appended under the writer lock before this
    /// returns, so a crash between them cannot be observed from outside.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidStateTransition`] if the
    /// snapshot is not `available`, or
    /// [`OrchestratorError::SnapshotNotFound`] for unknown snapshots.
    pub async fn create_restore_job(
        &self,
        snapshot_id: SnapshotId,
        target_agent_id: &str,
    ) -> Result<RestoreJob, OrchestratorError> {
        if target_agent_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "target_agent_id must not be empty".to_string(),
            ));
        }
        self.ensure_accepting()?;

        let mut state = self.state.write().await;
        let snapshot = state
            .snapshots
            .get(&snapshot_id)
            .ok_or(OrchestratorError::SnapshotNotFound(snapshot_id))?
            .clone();
        if !snapshot.is_restorable() {
            return Err(OrchestratorError::InvalidStateTransition(format!(
                "snapshot {snapshot_id} is {}, not available",
                snapshot.status.as_str()
            )));
        }

        let job_id = JobId::new();
        let command_id = CommandId::new();

        self.commit(
            &mut state,
            WalEvent::JobCreated {
                job_id,
                snapshot_id,
                target_agent_id: target_agent_id.to_string(),
            },
        )?;
        self.commit(
            &mut state,
            WalEvent::CommandCreated {
                command_id,
                agent_id: target_agent_id.to_string(),
                job_id,
                kind: CommandKind::RestoreSnapshot {
                    snapshot_id,
                    storage_key: snapshot.storage_key.clone(),
                    checksum: snapshot.checksum.clone(),
                    size: snapshot.size,
                },
            },
        )?;
        self.commit(&mut state, WalEvent::JobStarted { job_id })?;

        tracing::info!(%job_id, %snapshot_id, target_agent_id, "restore job dispatched");
        state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Internal("job missing after fold".to_string()))
    }

    /// Returns a restore job with its status and logs.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::JobNotFound`] for unknown ids.
    pub async fn get_restore_job(&self, job_id: JobId) -> Result<RestoreJob, OrchestratorError> {
        let state = self.state.read().await;
        state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound(job_id))
    }

    /// Returns all restore jobs ordered by creation time.
    pub async fn list_jobs(&self) -> Vec<RestoreJob> {
        let state = self.state.read().await;
        let mut jobs: Vec<RestoreJob> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        jobs
    }

    /// Returns every agent identity known from command history, sorted.
    pub async fn list_agents(&self) -> Vec<String> {
        let state = self.state.read().await;
        let agents: BTreeSet<String> = state
            .commands
            .values()
            .map(|c| c.agent_id.clone())
            .collect();
        agents.into_iter().collect()
    }

    // ── Command Queue ───────────────────────────────────────────────────

    /// Returns the agent's non-terminal commands in enqueue order.
    ///
    /// Re-polling returns the same commands until a terminal event lands
    /// (at-least-once delivery). The first time a command appears in a
    /// poll response, a single `command_sent` record is appended; polls
    /// that only re-offer `sent` commands touch nothing.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::WalWrite`] if a first-delivery marker
    /// cannot be recorded; no commands are handed out unrecorded.
    pub async fn poll_commands(&self, agent_id: &str) -> Result<Vec<Command>, OrchestratorError> {
        {
            let state = self.state.read().await;
            let open = open_commands(&state, agent_id);
            if open.iter().all(|c| c.status == CommandStatus::Sent) {
                return Ok(open);
            }
        }

        self.ensure_accepting()?;
        let mut state = self.state.write().await;
        let first_delivery: Vec<CommandId> = state
            .command_order
            .iter()
            .filter(|id| {
                state
                    .commands
                    .get(id)
                    .is_some_and(|c| c.agent_id == agent_id && c.status == CommandStatus::Pending)
            })
            .copied()
            .collect();
        for command_id in first_delivery {
            self.commit(&mut state, WalEvent::CommandSent { command_id })?;
        }

        Ok(open_commands(&state, agent_id))
    }

    /// Consumes an agent-reported outcome for a command.
    ///
    /// Success completes the command and, since jobs are single-command,
    /// the job; failure fails both. Events for terminal jobs or commands
    /// are appended to the job log without any state transition.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::AgentUnknown`] if the command does
    /// not exist or is not owned by `agent_id`; no state changes.
    pub async fn post_agent_event(
        &self,
        agent_id: &str,
        command_id: CommandId,
        outcome: EventOutcome,
        detail: Option<String>,
    ) -> Result<RestoreJob, OrchestratorError> {
        self.ensure_accepting()?;

        let mut state = self.state.write().await;
        let command = state
            .commands
            .get(&command_id)
            .filter(|c| c.agent_id == agent_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::AgentUnknown {
                agent_id: agent_id.to_string(),
                command_id,
            })?;

        let job_id = command.job_id;
        let job_status = state
            .jobs
            .get(&job_id)
            .map(|j| j.status)
            .ok_or_else(|| OrchestratorError::Internal("command without job".to_string()))?;

        if job_status.is_terminal() || command.status.is_terminal() {
            self.commit(
                &mut state,
                WalEvent::AgentEventLogged {
                    job_id,
                    command_id,
                    agent_id: agent_id.to_string(),
                    outcome,
                    detail,
                },
            )?;
            tracing::debug!(%job_id, %command_id, "event for terminal job recorded in log only");
        } else {
            match outcome {
                EventOutcome::Success => {
                    self.commit(
                        &mut state,
                        WalEvent::CommandCompleted { command_id, detail },
                    )?;
                    let all_done = state
                        .commands
                        .values()
                        .filter(|c| c.job_id == job_id)
                        .all(|c| c.status.is_terminal());
                    if all_done {
                        self.commit(&mut state, WalEvent::JobCompleted { job_id })?;
                    }
                }
                EventOutcome::Failure => {
                    self.commit(&mut state, WalEvent::CommandFailed { command_id, detail })?;
                    self.commit(&mut state, WalEvent::JobFailed { job_id })?;
                }
            }
            tracing::info!(%job_id, %command_id, ?outcome, "agent event consumed");
        }

        state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Internal("job missing after fold".to_string()))
    }

    // ── Write path ──────────────────────────────────────────────────────

    fn ensure_accepting(&self) -> Result<(), OrchestratorError> {
        if self.accepting.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WalError::Unavailable.into())
        }
    }

    /// Appends to the WAL, folds the record into derived state, and
    /// publishes it to the event hub. The only mutation path.
    fn commit(
        &self,
        state: &mut CoreState,
        event: WalEvent,
    ) -> Result<WalRecord, OrchestratorError> {
        let record = match self.wal.append(event) {
            Ok(record) => record,
            Err(e) => {
                self.accepting.store(false, Ordering::SeqCst);
                tracing::error!(error = %e, "wal append failed; refusing further mutations");
                return Err(e.into());
            }
        };
        Self::apply(state, &record);
        self.event_hub.publish(record.clone());
        Ok(record)
    }

    /// One fold step. Replay and live mutation both go through here, so
    /// rebuilding from the WAL is deterministic by construction.
    fn apply(state: &mut CoreState, record: &WalRecord) {
        let at = record.timestamp;
        match &record.event {
            WalEvent::SnapshotCreated {
                snapshot_id,
                agent_id,
                checksum,
                size,
                storage_key,
                metadata,
            } => {
                state.snapshots.insert(
                    *snapshot_id,
                    Snapshot {
                        id: *snapshot_id,
                        agent_id: agent_id.clone(),
                        checksum: checksum.clone(),
                        size: *size,
                        storage_key: storage_key.clone(),
                        status: SnapshotStatus::PendingUpload,
                        created_at: at,
                        updated_at: at,
                        metadata: metadata.clone(),
                    },
                );
            }
            WalEvent::SnapshotAvailable { snapshot_id } => {
                if let Some(snapshot) = state.snapshots.get_mut(snapshot_id) {
                    snapshot.status = SnapshotStatus::Available;
                    snapshot.updated_at = at;
                }
            }
            WalEvent::SnapshotFailed { snapshot_id, .. } => {
                if let Some(snapshot) = state.snapshots.get_mut(snapshot_id) {
                    snapshot.status = SnapshotStatus::Failed;
                    snapshot.updated_at = at;
                }
            }
            WalEvent::JobCreated {
                job_id,
                snapshot_id,
                target_agent_id,
            } => {
                state.jobs.insert(
                    *job_id,
                    RestoreJob {
                        id: *job_id,
                        snapshot_id: *snapshot_id,
                        target_agent_id: target_agent_id.clone(),
                        status: JobStatus::Pending,
                        created_at: at,
                        updated_at: at,
                        logs: vec![JobLogEntry {
                            at,
                            message: format!("restore job created for snapshot {snapshot_id}"),
                        }],
                    },
                );
            }
            WalEvent::JobStarted { job_id } => {
                if let Some(job) = state.jobs.get_mut(job_id) {
                    job.status = JobStatus::InProgress;
                    job.updated_at = at;
                    let message =
                        format!("restore command dispatched to agent {}", job.target_agent_id);
                    job.logs.push(JobLogEntry { at, message });
                }
            }
            WalEvent::JobCompleted { job_id } => {
                if let Some(job) = state.jobs.get_mut(job_id) {
                    job.status = JobStatus::Completed;
                    job.updated_at = at;
                    job.logs.push(JobLogEntry {
                        at,
                        message: "restore completed".to_string(),
                    });
                }
            }
            WalEvent::JobFailed { job_id } => {
                if let Some(job) = state.jobs.get_mut(job_id) {
                    job.status = JobStatus::Failed;
                    job.updated_at = at;
                    job.logs.push(JobLogEntry {
                        at,
                        message: "restore failed".to_string(),
                    });
                }
            }
            WalEvent::CommandCreated {
                command_id,
                agent_id,
                job_id,
                kind,
            } => {
                state.commands.insert(
                    *command_id,
                    Command {
                        id: *command_id,
                        agent_id: agent_id.clone(),
                        job_id: *job_id,
                        kind: kind.clone(),
                        status: CommandStatus::Pending,
                        created_at: at,
                        updated_at: at,
                    },
                );
                state.command_order.push(*command_id);
            }
            WalEvent::CommandSent { command_id } => {
                if let Some(command) = state.commands.get_mut(command_id) {
                    command.status = CommandStatus::Sent;
                    command.updated_at = at;
                }
            }
            WalEvent::CommandCompleted { command_id, detail } => {
                if let Some(command) = state.commands.get_mut(command_id) {
                    command.status = CommandStatus::Completed;
                    command.updated_at = at;
                }
                append_command_log(state, *command_id, at, "success", detail.as_deref());
            }
            WalEvent::CommandFailed { command_id, detail } => {
                if let Some(command) = state.commands.get_mut(command_id) {
                    command.status = CommandStatus::Failed;
                    command.updated_at = at;
                }
                append_command_log(state, *command_id, at, "failure", detail.as_deref());
            }
            WalEvent::AgentEventLogged {
                job_id,
                command_id,
                agent_id,
                outcome,
                detail,
            } => {
                if let Some(job) = state.jobs.get_mut(job_id) {
                    let outcome = match outcome {
                        EventOutcome::Success => "success",
                        EventOutcome::Failure => "failure",
                    };
                    let mut message = format!(
                        "post-terminal {outcome} event from agent {agent_id} for command {command_id}"
                    );
                    if let Some(detail) = detail {
                        message.push_str(&format!(": {detail}"));
                    }
                    job.updated_at = at;
                    job.logs.push(JobLogEntry { at, message });
                }
            }
        }
    }
}

/// Appends a command outcome summary to the owning job's log.
fn append_command_log(
    state: &mut CoreState,
    command_id: CommandId,
    at: chrono::DateTime<chrono::Utc>,
    outcome: &str,
    detail: Option<&str>,
) {
    let Some(job_id) = state.commands.get(&command_id).map(|c| c.job_id) else {
        return;
    };
    if let Some(job) = state.jobs.get_mut(&job_id) {
        let mut message = format!("agent reported {outcome} for command {command_id}");
        if let Some(detail) = detail {
            message.push_str(&format!(": {detail}"));
        }
        job.updated_at = at;
        job.logs.push(JobLogEntry { at, message });
    }
}

/// The agent's non-terminal commands in enqueue order.
fn open_commands(state: &CoreState, agent_id: &str) -> Vec<Command> {
    state
        .command_order
        .iter()
        .filter_map(|id| state.commands.get(id))
        .filter(|c| c.agent_id == agent_id && !c.status.is_terminal())
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::path::Path;

    use bytes::Bytes;
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::storage::{MemoryObjectStore, stream_from_bytes};

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn open_at(dir: &Path) -> (Orchestrator, MemoryObjectStore) {
        let wal = Wal::open(dir.join("orch.wal")).unwrap_or_else(|_| panic!("wal open failed"));
        let store = MemoryObjectStore::new();
        let orch = Orchestrator::new(wal, EventHub::new(100), Arc::new(store.clone()))
            .ok()
            .unwrap_or_else(|| panic!("orchestrator init failed"));
        (orch, store)
    }

    fn make_orchestrator() -> (tempfile::TempDir, Orchestrator, MemoryObjectStore) {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir failed"));
        let (orch, store) = open_at(dir.path());
        (dir, orch, store)
    }

    async fn uploaded_snapshot(
        orch: &Orchestrator,
        store: &MemoryObjectStore,
        agent_id: &str,
        data: &[u8],
    ) -> Snapshot {
        let checksum = sha256_hex(data);
        let snapshot = orch
            .create_snapshot(agent_id, &checksum, data.len() as u64, HashMap::new())
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_snapshot failed"));
        let _ = store
            .put(
                &snapshot.storage_key,
                stream_from_bytes(Bytes::copy_from_slice(data)),
            )
            .await;
        orch.complete_snapshot_upload(snapshot.id, &checksum)
            .await
            .ok()
            .unwrap_or_else(|| panic!("complete_snapshot_upload failed"))
    }

    async fn dump(orch: &Orchestrator) -> serde_json::Value {
        let state = orch.state.read().await;
        let mut snapshots: Vec<&Snapshot> = state.snapshots.values().collect();
        snapshots.sort_by_key(|s| *s.id.as_uuid());
        let mut jobs: Vec<&RestoreJob> = state.jobs.values().collect();
        jobs.sort_by_key(|j| *j.id.as_uuid());
        let mut commands: Vec<&Command> = state.commands.values().collect();
        commands.sort_by_key(|c| *c.id.as_uuid());
        serde_json::json!({
            "snapshots": snapshots,
            "jobs": jobs,
            "commands": commands,
            "order": state.command_order,
        })
    }

    #[tokio::test]
    async fn upload_with_matching_checksum_becomes_available() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"backup bytes").await;

        assert_eq!(snapshot.status, SnapshotStatus::Available);

        // Round-trip integrity: an independent recomputation still matches.
        let recomputed = compute_checksum(&store, &snapshot.storage_key).await;
        assert_eq!(recomputed.ok(), Some(snapshot.checksum));
    }

    #[tokio::test]
    async fn stored_bytes_mismatch_fails_snapshot() {
        let (_dir, orch, store) = make_orchestrator();
        let declared = sha256_hex(b"what the agent promised");
        let snapshot = orch
            .create_snapshot("agent-1", &declared, 100, HashMap::new())
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_snapshot failed"));
        let _ = store
            .put(
                &snapshot.storage_key,
                stream_from_bytes(Bytes::from_static(b"what actually got uploaded")),
            )
            .await;

        let result = orch.complete_snapshot_upload(snapshot.id, &declared).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::ChecksumMismatch { .. })
        ));

        let snapshot = orch
            .get_snapshot(snapshot.id)
            .await
            .ok()
            .unwrap_or_else(|| panic!("get_snapshot failed"));
        assert_eq!(snapshot.status, SnapshotStatus::Failed);

        // A failed snapshot is permanently unusable for restores.
        let job = orch.create_restore_job(snapshot.id, "agent-1").await;
        assert!(matches!(
            job,
            Err(OrchestratorError::InvalidStateTransition(_))
        ));
    }

    #[tokio::test]
    async fn reported_checksum_hint_rejects_early() {
        let (_dir, orch, store) = make_orchestrator();
        let data = b"correctly uploaded";
        let declared = sha256_hex(data);
        let snapshot = orch
            .create_snapshot("agent-1", &declared, data.len() as u64, HashMap::new())
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_snapshot failed"));
        let _ = store
            .put(
                &snapshot.storage_key,
                stream_from_bytes(Bytes::from_static(data)),
            )
            .await;

        let result = orch
            .complete_snapshot_upload(snapshot.id, &sha256_hex(b"something else"))
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::ChecksumMismatch { .. })
        ));
        let snapshot = orch
            .get_snapshot(snapshot.id)
            .await
            .ok()
            .unwrap_or_else(|| panic!("get_snapshot failed"));
        assert_eq!(snapshot.status, SnapshotStatus::Failed);
    }

    #[tokio::test]
    async fn job_against_pending_snapshot_is_rejected() {
        let (_dir, orch, _store) = make_orchestrator();
        let snapshot = orch
            .create_snapshot("agent-1", "abc123", 100, HashMap::new())
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_snapshot failed"));

        let result = orch.create_restore_job(snapshot.id, "agent-1").await;
        assert!(matches!(
            result,
            Err(OrchestratorError::InvalidStateTransition(_))
        ));

        // No command was enqueued and no record beyond snapshot_created.
        let polled = orch.poll_commands("agent-1").await.ok().unwrap_or_default();
        assert!(polled.is_empty());
        let records = orch.wal.replay().ok().unwrap_or_default();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn complete_upload_requires_uploaded_object() {
        let (_dir, orch, store) = make_orchestrator();
        let data = b"late upload";
        let declared = sha256_hex(data);
        let snapshot = orch
            .create_snapshot("agent-1", &declared, data.len() as u64, HashMap::new())
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_snapshot failed"));

        // Completing before the object exists is rejected without a
        // WAL record; the snapshot stays pending and the call can retry.
        let result = orch.complete_snapshot_upload(snapshot.id, &declared).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::InvalidStateTransition(_))
        ));
        let current = orch
            .get_snapshot(snapshot.id)
            .await
            .ok()
            .unwrap_or_else(|| panic!("get_snapshot failed"));
        assert_eq!(current.status, SnapshotStatus::PendingUpload);

        let _ = store
            .put(
                &snapshot.storage_key,
                stream_from_bytes(Bytes::from_static(data)),
            )
            .await;
        let completed = orch.complete_snapshot_upload(snapshot.id, &declared).await;
        assert_eq!(
            completed.ok().map(|s| s.status),
            Some(SnapshotStatus::Available)
        );
    }

    #[tokio::test]
    async fn full_restore_flow_completes_job() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"restore me").await;

        let job = orch
            .create_restore_job(snapshot.id, "agent-2")
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_restore_job failed"));
        assert_eq!(job.status, JobStatus::InProgress);

        // The target agent polls and sees exactly one command.
        let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        assert_eq!(polled.len(), 1);
        let Some(command) = polled.first() else {
            panic!("expected one command");
        };
        assert_eq!(command.status, CommandStatus::Sent);
        let CommandKind::RestoreSnapshot { storage_key, .. } = &command.kind;
        assert_eq!(storage_key, &snapshot.storage_key);

        let job = orch
            .post_agent_event(
                "agent-2",
                command.id,
                EventOutcome::Success,
                Some("restored 1 volume".to_string()),
            )
            .await
            .ok()
            .unwrap_or_else(|| panic!("post_agent_event failed"));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.logs.iter().any(|l| l.message.contains("restored 1 volume")));

        // The acknowledged command is not re-offered.
        let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        assert!(polled.is_empty());
    }

    #[tokio::test]
    async fn poll_is_idempotent_and_marks_sent_once() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
        let _ = orch.create_restore_job(snapshot.id, "agent-2").await;

        let first = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        let second = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        assert_eq!(first.len(), 1);
        assert_eq!(
            first.iter().map(|c| c.id).collect::<Vec<_>>(),
            second.iter().map(|c| c.id).collect::<Vec<_>>()
        );

        let sent_records = orch
            .wal
            .replay()
            .ok()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| matches!(r.event, WalEvent::CommandSent { .. }))
            .count();
        assert_eq!(sent_records, 1);
    }

    #[tokio::test]
    async fn foreign_agent_event_is_rejected() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-a", b"data").await;
        let job = orch
            .create_restore_job(snapshot.id, "agent-a")
            .await
            .ok()
            .unwrap_or_else(|| panic!("create_restore_job failed"));
        let polled = orch.poll_commands("agent-a").await.ok().unwrap_or_default();
        let Some(command) = polled.first() else {
            panic!("expected one command");
        };

        let result = orch
            .post_agent_event("agent-b", command.id, EventOutcome::Success, None)
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::AgentUnknown { .. })
        ));

        // Job state unchanged.
        let job = orch
            .get_restore_job(job.id)
            .await
            .ok()
            .unwrap_or_else(|| panic!("get_restore_job failed"));
        assert_eq!(job.status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn failure_event_fails_command_and_job() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
        let _ = orch.create_restore_job(snapshot.id, "agent-2").await;
        let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        let Some(command) = polled.first() else {
            panic!("expected one command");
        };

        let job = orch
            .post_agent_event(
                "agent-2",
                command.id,
                EventOutcome::Failure,
                Some("target disk full".to_string()),
            )
            .await
            .ok()
            .unwrap_or_else(|| panic!("post_agent_event failed"));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.logs.iter().any(|l| l.message.contains("target disk full")));
    }

    #[tokio::test]
    async fn events_after_terminal_job_only_append_logs() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
        let _ = orch.create_restore_job(snapshot.id, "agent-2").await;
        let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        let Some(command) = polled.first() else {
            panic!("expected one command");
        };
        let job = orch
            .post_agent_event("agent-2", command.id, EventOutcome::Success, None)
            .await
            .ok()
            .unwrap_or_else(|| panic!("post_agent_event failed"));
        let log_count = job.logs.len();

        // A duplicate delivery (at-least-once) after the terminal state.
        let job = orch
            .post_agent_event("agent-2", command.id, EventOutcome::Failure, None)
            .await
            .ok()
            .unwrap_or_else(|| panic!("post-terminal event rejected"));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.logs.len(), log_count + 1);
    }

    #[tokio::test]
    async fn replay_rebuilds_identical_state() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir failed"));
        let before = {
            let (orch, store) = open_at(dir.path());
            let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
            let _ = orch.create_restore_job(snapshot.id, "agent-2").await;
            let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
            if let Some(command) = polled.first() {
                let _ = orch
                    .post_agent_event("agent-2", command.id, EventOutcome::Success, None)
                    .await;
            }
            dump(&orch).await
        };

        // Fold the same record sequence from scratch, twice.
        let (reopened, _) = open_at(dir.path());
        assert_eq!(before, dump(&reopened).await);
        drop(reopened);
        let (again, _) = open_at(dir.path());
        assert_eq!(before, dump(&again).await);
    }

    #[tokio::test]
    async fn restart_keeps_unacknowledged_commands_pollable() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir failed"));
        {
            let (orch, store) = open_at(dir.path());
            let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
            let _ = orch.create_restore_job(snapshot.id, "agent-2").await;
            let _ = orch.poll_commands("agent-2").await;
        }

        let (orch, _store) = open_at(dir.path());
        let polled = orch.poll_commands("agent-2").await.ok().unwrap_or_default();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled.first().map(|c| c.status), Some(CommandStatus::Sent));
    }

    #[tokio::test]
    async fn wal_failure_refuses_further_mutations() {
        let (_dir, orch, _store) = make_orchestrator();
        orch.accepting.store(false, Ordering::SeqCst);
        assert!(!orch.is_accepting());

        let result = orch
            .create_snapshot("agent-1", "abc123", 1, HashMap::new())
            .await;
        assert!(matches!(result, Err(OrchestratorError::WalWrite(_))));
    }

    #[tokio::test]
    async fn create_snapshot_validates_inputs() {
        let (_dir, orch, _store) = make_orchestrator();
        let result = orch.create_snapshot("", "abc123", 1, HashMap::new()).await;
        assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
        let result = orch.create_snapshot("agent-1", " ", 1, HashMap::new()).await;
        assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn list_agents_is_derived_from_command_history() {
        let (_dir, orch, store) = make_orchestrator();
        let snapshot = uploaded_snapshot(&orch, &store, "agent-1", b"data").await;
        let _ = orch.create_restore_job(snapshot.id, "beta").await;
        let _ = orch.create_restore_job(snapshot.id, "alpha").await;

        assert_eq!(orch.list_agents().await, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn every_commit_reaches_the_event_hub() {
        let (_dir, orch, _store) = make_orchestrator();
        let mut rx = orch.event_hub().subscribe();

        let _ = orch
            .create_snapshot("agent-1", "abc123", 1, HashMap::new())
            .await;

        let record = rx.recv().await;
        let Ok(record) = record else {
            panic!("expected a published record");
        };
        assert_eq!(record.sequence, 1);
        assert_eq!(record.event.event_type_str(), "snapshot_created");
    }
}
