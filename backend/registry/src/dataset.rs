//! Read-only dataset layer — loading and synchronous queries.
//!
//! The dataset is authored by hand and embedded in the binary. Nothing in the
//! service writes back to it; workflows receive cloned [`Project`] records.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{RegistryError, Result};
use crate::models::{Notification, Priority, Project, ProjectStatus};

const BUILTIN_DATASET: &str = include_str!("../data/dataset.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub projects: Vec<Project>,
    pub notifications: Vec<Notification>,
}

/// Aggregate figures shown on the dashboard statistics cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_projects: usize,
    pub active_projects: usize,
    pub verified_projects: usize,
    pub pending_validations: usize,
    pub completed_projects: usize,
    /// Share of verified + completed projects, rounded to a whole percent.
    pub compliance_rate: u32,
    pub total_credits_issued: u64,
    pub total_credits_available: u64,
    pub total_carbon_sequestered: f64,
    pub average_ndvi: f64,
    pub high_priority_notifications: usize,
}

impl Dataset {
    /// The mock dataset compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DATASET)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load the dataset from `path`, or the embedded one when `path` is `None`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let dataset = match path {
            Some(path) => Self::from_json(&std::fs::read_to_string(path)?)?,
            None => Self::builtin()?,
        };
        info!(
            "Dataset loaded: {} projects, {} notifications",
            dataset.projects.len(),
            dataset.notifications.len()
        );
        Ok(dataset)
    }

    // ─────────────────────────────────────────────────────────
    // Project queries
    // ─────────────────────────────────────────────────────────

    pub fn find_project(&self, id: &str) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| RegistryError::ProjectNotFound(id.to_string()))
    }

    /// Case-insensitive substring search over name and location, optionally
    /// narrowed to one status. An empty search term matches every project;
    /// whitespace is matched literally.
    pub fn search_projects(&self, search: &str, status: Option<ProjectStatus>) -> Vec<&Project> {
        let needle = search.to_lowercase();
        self.projects
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.location.to_lowercase().contains(&needle)
            })
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect()
    }

    /// Projects that can feed a credit issuance run.
    pub fn projects_with_credits(&self) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| p.credits_available > 0)
            .collect()
    }

    // ─────────────────────────────────────────────────────────
    // Notification queries
    // ─────────────────────────────────────────────────────────

    pub fn notifications(&self, priority: Option<Priority>) -> Vec<&Notification> {
        self.notifications
            .iter()
            .filter(|n| priority.map_or(true, |p| n.priority == p))
            .collect()
    }

    // ─────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────

    pub fn statistics(&self) -> Statistics {
        let count = |status: ProjectStatus| {
            self.projects
                .iter()
                .filter(|p| p.status == status)
                .count()
        };

        let total = self.projects.len();
        let verified = count(ProjectStatus::Verified);
        let completed = count(ProjectStatus::Completed);
        let compliance_rate = if total == 0 {
            0
        } else {
            ((verified + completed) as f64 / total as f64 * 100.0).round() as u32
        };
        let average_ndvi = if total == 0 {
            0.0
        } else {
            self.projects.iter().map(|p| p.ndvi_score).sum::<f64>() / total as f64
        };

        Statistics {
            total_projects: total,
            active_projects: count(ProjectStatus::Active),
            verified_projects: verified,
            pending_validations: count(ProjectStatus::Pending) + count(ProjectStatus::Monitoring),
            completed_projects: completed,
            compliance_rate,
            total_credits_issued: self.projects.iter().map(|p| p.credits_issued).sum(),
            total_credits_available: self.projects.iter().map(|p| p.credits_available).sum(),
            total_carbon_sequestered: self.projects.iter().map(|p| p.carbon_sequestered).sum(),
            average_ndvi,
            high_priority_notifications: self.notifications(Some(Priority::High)).len(),
        }
    }
}
