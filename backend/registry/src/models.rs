//! Record types of the registry's mock dataset.
//!
//! These mirror the hand-authored records the dashboard renders: restoration
//! projects with their imagery and verification history, and the alert feed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a restoration project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Pending,
    Verified,
    Monitoring,
    Completed,
}

impl ProjectStatus {
    /// Parse the query-string form used by the dashboard filters.
    pub fn from_filter(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "monitoring" => Some(Self::Monitoring),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Drone,
    Satellite,
}

/// Imagery already on file for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectImage {
    pub id: String,
    pub url: String,
    pub kind: ImageKind,
    pub date: NaiveDate,
    pub processed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    SiteVisit,
    RemoteSensing,
    ThirdParty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Approved,
    Rejected,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub date: NaiveDate,
    pub kind: VerificationKind,
    pub status: VerificationStatus,
    pub notes: String,
}

/// A registered restoration project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub location: String,
    pub coordinates: Coordinates,
    pub status: ProjectStatus,
    /// Restored area in hectares.
    pub area: f64,
    pub start_date: NaiveDate,
    pub last_update: NaiveDate,
    pub credits_issued: u64,
    pub credits_available: u64,
    pub ndvi_score: f64,
    pub biodiversity_index: f64,
    /// Tonnes of carbon sequestered to date.
    pub carbon_sequestered: f64,
    pub images: Vec<ProjectImage>,
    pub verification_history: Vec<VerificationRecord>,
}

impl Project {
    /// Whether any verification (of any outcome) has been recorded.
    pub fn has_verification(&self) -> bool {
        !self.verification_history.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_filter(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    VerificationDue,
    ProcessingComplete,
    CreditsReady,
    AnomalyDetected,
    MilestoneAchieved,
    WeatherAlert,
}

/// An entry in the dashboard alert feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    /// Name of the project the alert refers to.
    pub project: String,
    pub message: String,
    pub priority: Priority,
    pub date: NaiveDate,
}
