//! Image analysis workflow: `idle → uploading → processing → complete`.
//!
//! The user picks a project and attaches drone or satellite imagery; the run
//! "uploads" the files, "analyses" them and produces an [`AnalysisReport`].
//! Only attachment metadata is handled; no image bytes are read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Timing;
use crate::errors::{RegistryError, Result};
use crate::models::Project;
use crate::workflow::{MetricsProvider, Phase, WorkflowKind, WorkflowState};

/// Metadata of one file attached to an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
}

impl Attachment {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, size_bytes: u64, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            media_type: media_type.into(),
        }
    }

    /// Drone imagery (any `image/*`) and satellite rasters (`.tiff`).
    pub fn is_supported(&self) -> bool {
        let media = self.media_type.to_ascii_lowercase();
        let name = self.name.to_ascii_lowercase();
        media.starts_with("image/")
            || media.contains("tiff")
            || name.ends_with(".tif")
            || name.ends_with(".tiff")
    }
}

/// Inputs editable while the analysis is idle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisDraft {
    pub project: Option<Project>,
    pub attachments: Vec<Attachment>,
}

impl AnalysisDraft {
    /// Replace the attachment list, refusing unsupported files.
    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) -> Result<()> {
        if let Some(bad) = attachments.iter().find(|a| !a.is_supported()) {
            return Err(RegistryError::UnsupportedAttachment(bad.name.clone()));
        }
        self.attachments = attachments;
        Ok(())
    }
}

/// Validated inputs of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub project: Project,
    pub attachments: Vec<Attachment>,
}

/// Fabricated ecosystem metrics for the analysed imagery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub project_id: String,
    pub images_analysed: usize,
    /// Vegetation index, in `[0, 1]`.
    pub ndvi: f64,
    pub biodiversity_index: f64,
    /// Share of the surveyed area classified healthy, in percent.
    pub area_healthy: f64,
    pub anomalies: Vec<String>,
    /// Model confidence, in percent.
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

pub struct ImageAnalysis {
    phases: [Phase; 2],
}

impl ImageAnalysis {
    pub fn new(timing: &Timing) -> Result<Self> {
        Ok(Self {
            phases: [
                Phase::new(0, 30, 5, timing.upload_step)?,
                Phase::new(30, 100, 10, timing.processing_step)?,
            ],
        })
    }
}

impl WorkflowKind for ImageAnalysis {
    type Draft = AnalysisDraft;
    type Ready = AnalysisInput;
    type Output = AnalysisReport;

    const NAME: &'static str = "image_analysis";
    const FIRST: WorkflowState = WorkflowState::Uploading;
    const SECOND: WorkflowState = WorkflowState::Processing;

    fn phases(&self) -> [Phase; 2] {
        self.phases
    }

    fn prepare(&self, draft: &AnalysisDraft) -> Result<AnalysisInput> {
        let project = draft
            .project
            .clone()
            .ok_or(RegistryError::MissingSelection)?;
        if draft.attachments.is_empty() {
            return Err(RegistryError::NoAttachments);
        }
        Ok(AnalysisInput {
            project,
            attachments: draft.attachments.clone(),
        })
    }

    fn synthesize(&self, ready: &AnalysisInput, metrics: &dyn MetricsProvider) -> AnalysisReport {
        metrics.analyse(ready)
    }
}
