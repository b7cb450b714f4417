//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::workflow::WorkflowState;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Unknown filter value: {0}")]
    InvalidFilter(String),

    #[error("No project selected")]
    MissingSelection,

    #[error("No images attached")]
    NoAttachments,

    #[error("Unsupported attachment: {0}")]
    UnsupportedAttachment(String),

    #[error("Project {0} has no credits available for issuance")]
    NoCreditsAvailable(String),

    #[error("Invalid credit amount {requested}: must be between 1 and {available}")]
    InvalidAmount { requested: u64, available: u64 },

    #[error("Cannot {action} while workflow is {from}")]
    InvalidTransition {
        from: WorkflowState,
        action: &'static str,
    },

    #[error("Invalid progress update: {0}")]
    InvalidProgress(String),

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Stale update for run {stale}, current run is {current}")]
    StaleRun { stale: u64, current: u64 },

    #[error("No transaction hash: issuance has not completed")]
    NotIssued,
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProjectNotFound(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidFilter(_)
            | Self::MissingSelection
            | Self::NoAttachments
            | Self::UnsupportedAttachment(_)
            | Self::NoCreditsAvailable(_)
            | Self::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTransition { .. } | Self::StaleRun { .. } | Self::NotIssued => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
