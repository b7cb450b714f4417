//! Runs one [`WorkflowMachine`] on the tokio runtime.
//!
//! The machine lives inside a [`watch`] channel: every transition goes
//! through `send_if_modified`, so writers are serialized and observers are
//! woken only for changes that actually applied. A started run is a spawned
//! task that walks both phases, then stores the synthesized result.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{RegistryError, Result};
use crate::workflow::machine::RunTicket;
use crate::workflow::stepper::advance;
use crate::workflow::timer::{Timer, Wait};
use crate::workflow::{MetricsProvider, Snapshot, WorkflowKind, WorkflowMachine, WorkflowState};

pub struct WorkflowEngine<K: WorkflowKind> {
    kind: Arc<K>,
    metrics: Arc<dyn MetricsProvider>,
    machine: watch::Sender<WorkflowMachine<K>>,
    /// Parent of every run token; cancelled when the engine is discarded.
    lifetime: CancellationToken,
}

impl<K: WorkflowKind> WorkflowEngine<K> {
    pub fn new(
        kind: Arc<K>,
        metrics: Arc<dyn MetricsProvider>,
        lifetime: CancellationToken,
    ) -> Self {
        let (machine, _) = watch::channel(WorkflowMachine::new());
        Self {
            kind,
            metrics,
            machine,
            lifetime,
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn snapshot(&self) -> Snapshot<K> {
        self.machine.borrow().snapshot()
    }

    pub fn state(&self) -> WorkflowState {
        self.machine.borrow().state()
    }

    /// Observe every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowMachine<K>> {
        self.machine.subscribe()
    }

    /// Wait until no run is in flight, or until the engine is discarded,
    /// then take a snapshot.
    ///
    /// A run stopped by discard or shutdown never leaves its running state,
    /// so the engine's lifetime token ends the wait as well.
    pub async fn settled(&self) -> Snapshot<K> {
        let mut rx = self.subscribe();
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => {}
            // Only fails once the sender is dropped, and `self` owns it.
            _ = rx.wait_for(|m| !m.is_running()) => {}
        }
        self.snapshot()
    }

    /// Edit the draft inputs. Refused unless the workflow is idle.
    pub fn edit<T>(&self, f: impl FnOnce(&mut K::Draft) -> Result<T>) -> Result<T> {
        self.apply(|m| f(m.draft_mut()?))
    }

    /// Validate the inputs and spawn a run. Returns the run id.
    ///
    /// Refused, with the machine left untouched, when inputs are missing or
    /// the workflow is not idle.
    pub fn start(self: &Arc<Self>) -> Result<u64> {
        if self.lifetime.is_cancelled() {
            return Err(RegistryError::InvalidTransition {
                from: self.state(),
                action: "start a discarded workflow",
            });
        }
        let token = self.lifetime.child_token();
        let ticket = self.apply(|m| m.start(&self.kind, token))?;
        let run_id = ticket.run_id;

        info!("{} run {run_id} started", K::NAME);
        tokio::spawn(Arc::clone(self).drive(ticket));
        Ok(run_id)
    }

    /// Return to idle, cancelling any run in flight.
    pub fn reset(&self) {
        let mut last_run = 0;
        self.machine.send_modify(|m| {
            m.reset();
            last_run = m.run_id();
        });
        debug!("{} reset after run {last_run}", K::NAME);
    }

    /// Cancel everything this engine has scheduled. Called when the owning
    /// session is removed; the engine refuses new runs afterwards.
    pub fn discard(&self) {
        self.machine.send_if_modified(|m| {
            m.abandon();
            false
        });
        self.lifetime.cancel();
    }

    async fn drive(self: Arc<Self>, ticket: RunTicket<K>) {
        let run = ticket.run_id;
        match self.run_phases(&ticket).await {
            Ok(Wait::Elapsed) => {
                let output = self.kind.synthesize(&ticket.ready, self.metrics.as_ref());
                match self.apply(|m| m.complete(run, output)) {
                    Ok(()) => info!("{} run {run} complete", K::NAME),
                    Err(e) => debug!("{} run {run} result discarded: {e}", K::NAME),
                }
            }
            Ok(Wait::Cancelled) => debug!("{} run {run} cancelled", K::NAME),
            Err(e) => debug!("{} run {run} abandoned: {e}", K::NAME),
        }
    }

    async fn run_phases(&self, ticket: &RunTicket<K>) -> Result<Wait> {
        let run = ticket.run_id;
        let timer = Timer::new(ticket.token.clone());
        let [first, second] = self.kind.phases();

        if advance(&first, &timer, |p| self.apply(|m| m.record_progress(run, p)))
            .await?
            .is_cancelled()
        {
            return Ok(Wait::Cancelled);
        }

        let reached = self.apply(|m| {
            m.advance_phase(run)?;
            Ok(m.progress())
        })?;
        debug!("{} run {run} entered {} at {reached}%", K::NAME, K::SECOND);

        advance(&second, &timer, |p| self.apply(|m| m.record_progress(run, p))).await
    }

    fn apply<T>(&self, f: impl FnOnce(&mut WorkflowMachine<K>) -> Result<T>) -> Result<T> {
        let mut outcome = None;
        self.machine.send_if_modified(|m| {
            let result = f(m);
            let applied = result.is_ok();
            outcome = Some(result);
            applied
        });
        outcome.unwrap_or_else(|| {
            Err(RegistryError::InvalidProgress(
                "transition was not applied".to_string(),
            ))
        })
    }
}
