//! # Workflow engine
//!
//! Both long-running dashboard features (image analysis and credit issuance)
//! share the same shape: a two-phase, timed, forward-only process that ends
//! with a fabricated result.
//!
//! ```text
//! Idle ──start──► phase 1 ──► phase 2 ──► Complete
//!  ▲                                          │
//!  └───────────────────reset──────────────────┘
//! ```
//!
//! | Module          | Role                                                  |
//! |-----------------|-------------------------------------------------------|
//! | [`timer`]       | cancellable delay between steps                       |
//! | [`stepper`]     | walks progress through a [`Phase`]                    |
//! | [`synthesizer`] | pluggable [`MetricsProvider`] fabricating results     |
//! | [`machine`]     | reducer holding state, progress, inputs and result    |
//! | [`engine`]      | drives one machine on the tokio runtime               |
//! | [`sessions`]    | one engine per dashboard session                      |
//!
//! A concrete workflow is a [`WorkflowKind`]: it names its two running
//! states, its phases, how drafts are validated, and how results are made.

pub mod analysis;
pub mod engine;
pub mod issuance;
pub mod machine;
pub mod sessions;
pub mod stepper;
pub mod synthesizer;
pub mod timer;

use std::fmt::Debug;

use serde::Serialize;

use crate::errors::Result;

pub use engine::WorkflowEngine;
pub use machine::{Snapshot, WorkflowMachine, WorkflowState};
pub use sessions::Sessions;
pub use stepper::Phase;
pub use synthesizer::{MetricsProvider, RandomMetrics};

pub trait WorkflowKind: Send + Sync + 'static {
    /// Inputs the user edits while the workflow is idle.
    type Draft: Default + Clone + Debug + Serialize + Send + Sync + 'static;
    /// Validated inputs handed to a run.
    type Ready: Clone + Send + Sync + 'static;
    /// The synthesized result stored on completion.
    type Output: Clone + Debug + Serialize + Send + Sync + 'static;

    /// Short name used in logs and API payloads.
    const NAME: &'static str;
    /// State entered on start (phase 1).
    const FIRST: WorkflowState;
    /// State entered when phase 1 finishes (phase 2).
    const SECOND: WorkflowState;

    /// The two progress phases; the second must end at 100.
    fn phases(&self) -> [Phase; 2];

    /// Validate the draft, producing the inputs for a run.
    fn prepare(&self, draft: &Self::Draft) -> Result<Self::Ready>;

    /// Build the result once both phases have finished.
    fn synthesize(&self, ready: &Self::Ready, metrics: &dyn MetricsProvider) -> Self::Output;
}
