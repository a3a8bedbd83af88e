/// Upload/processing state machine
///
/// Composes the file intake and the transfer session into one lifecycle:
///
/// ```text
/// idle → uploading → processing → complete
///           ↓            ↓
///         failed ←───────┘
/// failed → idle (retry / clear), complete → idle (clear)
/// ```
///
/// Which controls are enabled is computed from the phase alone, so the UI
/// never needs its own "is uploading" flags.
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::data::ProjectId;
use super::intake::{AcceptPolicy, Candidate, FileIntake, StagedFile};
use super::transfer::{TransferEvent, TransferPhase, TransferSession};
use crate::api::models::ProcessingOutcome;

static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one transfer; events carrying any other ticket are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferTicket {
    pub project: ProjectId,
    id: u64,
}

/// Why a session command was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("The file queue cannot change while {0:?}")]
    Locked(TransferPhase),

    #[error("A transfer is already {0:?}")]
    AlreadyRunning(TransferPhase),

    #[error("Nothing to upload")]
    EmptyQueue,
}

/// How progress should be drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressDisplay {
    Hidden,
    /// Uploading with a known percentage
    Determinate(f32),
    /// Waiting on the server; no granularity available
    Indeterminate,
}

/// Control enablement, derived from the phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub can_browse: bool,
    pub can_remove: bool,
    pub can_clear: bool,
    pub can_submit: bool,
    pub can_retry: bool,
    pub progress: ProgressDisplay,
}

impl Controls {
    /// Enablement for a phase and queue length
    ///
    /// Submit needs a non-empty queue. Clear needs something to clear: staged
    /// files, or a finished transfer to reset.
    pub fn for_phase(phase: TransferPhase, progress_percent: f32, queue_len: usize) -> Self {
        let editable = matches!(phase, TransferPhase::Idle | TransferPhase::Failed);
        let finished = matches!(phase, TransferPhase::Complete | TransferPhase::Failed);
        Self {
            can_browse: editable,
            can_remove: editable,
            can_clear: !phase.is_busy() && (queue_len > 0 || finished),
            can_submit: phase.accepts_submit() && queue_len > 0,
            can_retry: phase == TransferPhase::Failed,
            progress: match phase {
                TransferPhase::Uploading => ProgressDisplay::Determinate(progress_percent),
                TransferPhase::Processing => ProgressDisplay::Indeterminate,
                _ => ProgressDisplay::Hidden,
            },
        }
    }
}

/// What applying an event meant for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Stale ticket or event out of phase
    Ignored,
    Updated,
    /// The session reached `complete`; the caller should reload results
    Completed(Vec<ProcessingOutcome>),
    Failed(String),
}

/// The single upload session of a project view
#[derive(Debug, Clone)]
pub struct UploadSession {
    project: ProjectId,
    intake: FileIntake,
    transfer: TransferSession,
    active: Option<TransferTicket>,
}

impl UploadSession {
    pub fn new(project: ProjectId, policy: AcceptPolicy) -> Self {
        Self {
            project,
            intake: FileIntake::new(policy),
            transfer: TransferSession::default(),
            active: None,
        }
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn phase(&self) -> TransferPhase {
        self.transfer.phase()
    }

    pub fn intake(&self) -> &FileIntake {
        &self.intake
    }

    pub fn transfer(&self) -> &TransferSession {
        &self.transfer
    }

    pub fn controls(&self) -> Controls {
        Controls::for_phase(
            self.transfer.phase(),
            self.transfer.progress_percent(),
            self.intake.len(),
        )
    }

    /// Message for the banner: transfer failures win over intake rejections
    pub fn error_message(&self) -> Option<String> {
        self.transfer
            .error_message()
            .or_else(|| self.intake.error().map(|e| e.to_string()))
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if self.controls().can_browse {
            Ok(())
        } else {
            Err(SessionError::Locked(self.phase()))
        }
    }

    /// Stage candidates (only in `idle` / `failed`)
    pub fn stage(&mut self, candidates: Vec<Candidate>) -> Result<usize, SessionError> {
        self.ensure_editable()?;
        Ok(self.intake.stage(candidates))
    }

    /// Remove one staged file (only in `idle` / `failed`)
    pub fn remove(&mut self, index: usize) -> Result<Option<StagedFile>, SessionError> {
        self.ensure_editable()?;
        Ok(self.intake.remove(index))
    }

    /// Empty the queue and return to `idle` (not while a transfer runs)
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if !self.controls().can_clear {
            return Err(SessionError::Locked(self.phase()));
        }
        self.intake.clear();
        self.transfer.reset();
        self.active = None;
        Ok(())
    }

    /// `failed → idle`, keeping the queue for another attempt
    pub fn retry(&mut self) -> Result<(), SessionError> {
        if self.phase() != TransferPhase::Failed {
            return Err(SessionError::Locked(self.phase()));
        }
        self.transfer.reset();
        self.active = None;
        Ok(())
    }

    /// Move to `uploading` and hand out the files to send
    ///
    /// Refused without any state change while a transfer is in flight, after
    /// completion, or with an empty queue.
    pub fn begin_submit(&mut self) -> Result<(TransferTicket, Vec<StagedFile>), SessionError> {
        let phase = self.phase();
        if !phase.accepts_submit() {
            return Err(SessionError::AlreadyRunning(phase));
        }
        if self.intake.is_empty() {
            return Err(SessionError::EmptyQueue);
        }

        self.transfer.begin();
        self.intake.dismiss_error();
        let ticket = TransferTicket {
            project: self.project,
            id: NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed),
        };
        self.active = Some(ticket);
        tracing::info!(
            "Starting transfer {} for project {} ({} files)",
            ticket.id,
            self.project,
            self.intake.len()
        );
        Ok((ticket, self.intake.files().to_vec()))
    }

    /// Feed a transfer event; events from other tickets are dropped
    pub fn apply(&mut self, ticket: TransferTicket, event: TransferEvent) -> Applied {
        if self.active != Some(ticket) {
            tracing::debug!("Dropping event from stale transfer {:?}", ticket);
            return Applied::Ignored;
        }
        if !self.transfer.apply(event) {
            return Applied::Ignored;
        }
        match self.phase() {
            TransferPhase::Complete => {
                self.active = None;
                Applied::Completed(self.transfer.outcomes().to_vec())
            }
            TransferPhase::Failed => {
                self.active = None;
                Applied::Failed(self.transfer.error_message().unwrap_or_default())
            }
            _ => Applied::Updated,
        }
    }
}
