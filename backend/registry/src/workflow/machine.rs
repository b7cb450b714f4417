//! Workflow state machine.
//!
//! A plain reducer: every transition is a method that either applies fully
//! or returns an error and leaves the machine untouched. Timed updates carry
//! the run id they were scheduled for, so anything arriving from a run that
//! was reset or replaced is refused.

use std::fmt;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::errors::{RegistryError, Result};
use crate::workflow::stepper::PROGRESS_MAX;
use crate::workflow::WorkflowKind;

/// Lifecycle of a workflow instance. Forward-only until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    /// Image analysis, phase 1.
    Uploading,
    /// Image analysis, phase 2.
    Processing,
    /// Credit issuance, phase 1.
    Calculating,
    /// Credit issuance, phase 2.
    Minting,
    Complete,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Calculating => "calculating",
            Self::Minting => "minting",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a spawned run needs: its id, its cancellation token and the
/// validated inputs.
pub struct RunTicket<K: WorkflowKind> {
    pub run_id: u64,
    pub token: CancellationToken,
    pub ready: K::Ready,
}

pub struct WorkflowMachine<K: WorkflowKind> {
    state: WorkflowState,
    progress: u8,
    run_id: u64,
    draft: K::Draft,
    result: Option<K::Output>,
    cancel: Option<CancellationToken>,
}

impl<K: WorkflowKind> Default for WorkflowMachine<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: WorkflowKind> WorkflowMachine<K> {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            progress: 0,
            run_id: 0,
            draft: K::Draft::default(),
            result: None,
            cancel: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Id of the most recent run (0 before the first start).
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn draft(&self) -> &K::Draft {
        &self.draft
    }

    pub fn result(&self) -> Option<&K::Output> {
        self.result.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state == K::FIRST || self.state == K::SECOND
    }

    /// Mutable access to the inputs; only while idle.
    pub fn draft_mut(&mut self) -> Result<&mut K::Draft> {
        self.require(WorkflowState::Idle, "edit inputs")?;
        Ok(&mut self.draft)
    }

    /// `Idle → FIRST`. Validates the draft first; on any error the machine
    /// is unchanged.
    pub fn start(&mut self, kind: &K, token: CancellationToken) -> Result<RunTicket<K>> {
        self.require(WorkflowState::Idle, "start")?;
        let ready = kind.prepare(&self.draft)?;

        self.run_id += 1;
        self.state = K::FIRST;
        self.progress = 0;
        self.result = None;
        self.cancel = Some(token.clone());

        Ok(RunTicket {
            run_id: self.run_id,
            token,
            ready,
        })
    }

    pub fn record_progress(&mut self, run_id: u64, value: u8) -> Result<()> {
        self.check_run(run_id)?;
        if !self.is_running() {
            return Err(RegistryError::InvalidTransition {
                from: self.state,
                action: "record progress",
            });
        }
        if value > PROGRESS_MAX {
            return Err(RegistryError::InvalidProgress(format!(
                "{value} exceeds {PROGRESS_MAX}"
            )));
        }
        if value < self.progress {
            return Err(RegistryError::InvalidProgress(format!(
                "{value} is below current progress {}",
                self.progress
            )));
        }
        self.progress = value;
        Ok(())
    }

    /// `FIRST → SECOND`.
    pub fn advance_phase(&mut self, run_id: u64) -> Result<()> {
        self.check_run(run_id)?;
        self.require(K::FIRST, "enter second phase")?;
        self.state = K::SECOND;
        Ok(())
    }

    /// `SECOND → Complete`, storing the result. Progress must already be 100.
    pub fn complete(&mut self, run_id: u64, output: K::Output) -> Result<()> {
        self.check_run(run_id)?;
        self.require(K::SECOND, "complete")?;
        if self.progress != PROGRESS_MAX {
            return Err(RegistryError::InvalidProgress(format!(
                "cannot complete at {}%",
                self.progress
            )));
        }
        self.state = WorkflowState::Complete;
        self.result = Some(output);
        self.cancel = None;
        Ok(())
    }

    /// Back to `Idle` from any state, clearing progress, result and inputs.
    /// A run still in flight is cancelled. Idempotent.
    pub fn reset(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.state = WorkflowState::Idle;
        self.progress = 0;
        self.result = None;
        self.draft = K::Draft::default();
    }

    /// Cancel the in-flight run, if any, without touching the rest of the
    /// state. Used when the owning session goes away.
    pub fn abandon(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn snapshot(&self) -> Snapshot<K> {
        Snapshot {
            workflow: K::NAME,
            state: self.state,
            progress: self.progress,
            run_id: self.run_id,
            draft: self.draft().clone(),
            result: self.result().cloned(),
        }
    }

    fn require(&self, expected: WorkflowState, action: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(RegistryError::InvalidTransition {
                from: self.state,
                action,
            });
        }
        Ok(())
    }

    fn check_run(&self, run_id: u64) -> Result<()> {
        if run_id != self.run_id {
            return Err(RegistryError::StaleRun {
                stale: run_id,
                current: self.run_id,
            });
        }
        Ok(())
    }
}

/// Owned, serializable view of a [`WorkflowMachine`].
#[derive(Serialize)]
#[serde(bound = "")]
pub struct Snapshot<K: WorkflowKind> {
    pub workflow: &'static str,
    pub state: WorkflowState,
    pub progress: u8,
    pub run_id: u64,
    pub draft: K::Draft,
    pub result: Option<K::Output>,
}
