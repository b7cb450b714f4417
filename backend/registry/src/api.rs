//! Axum REST API handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Statistics};
use crate::errors::{RegistryError, Result};
use crate::models::{Notification, Priority, Project, ProjectStatus};
use crate::workflow::analysis::{Attachment, ImageAnalysis};
use crate::workflow::issuance::{CreditCalculation, CreditIssuance};
use crate::workflow::{Sessions, Snapshot, WorkflowKind, WorkflowState};

/// Upper bound on a `?wait=true` long-poll.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiState {
    pub dataset: Arc<Dataset>,
    pub analysis: Sessions<ImageAnalysis>,
    pub issuance: Sessions<CreditIssuance>,
}

/// Resolves the session store serving workflow `K`, so the session
/// handlers can be shared by both workflows.
pub trait SessionsOf<K: WorkflowKind> {
    fn sessions(&self) -> &Sessions<K>;
}

impl SessionsOf<ImageAnalysis> for ApiState {
    fn sessions(&self) -> &Sessions<ImageAnalysis> {
        &self.analysis
    }
}

impl SessionsOf<CreditIssuance> for ApiState {
    fn sessions(&self) -> &Sessions<CreditIssuance> {
        &self.issuance
    }
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    /// Hold the response until no run is in flight.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EstimateQuery {
    pub amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisSelection {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentsRequest {
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct IssuanceSelection {
    pub project_id: String,
    pub custom_amount: Option<u64>,
}

#[derive(Serialize)]
pub struct ProjectsResponse<'a> {
    pub count: usize,
    pub projects: Vec<&'a Project>,
}

#[derive(Serialize)]
pub struct NotificationsResponse<'a> {
    pub count: usize,
    pub notifications: Vec<&'a Notification>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: u64,
    pub workflow: &'static str,
    pub state: WorkflowState,
}

#[derive(Serialize)]
pub struct RunStarted {
    pub session_id: u64,
    pub run_id: u64,
}

// ─────────────────────────────────────────────────────────
// Dataset handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /projects?search=&status=`
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ProjectQuery>,
) -> Result<impl IntoResponse> {
    let status = parse_filter(query.status.as_deref(), ProjectStatus::from_filter)?;
    let projects = state
        .dataset
        .search_projects(query.search.as_deref().unwrap_or_default(), status);
    Ok(Json(serde_json::json!(ProjectsResponse {
        count: projects.len(),
        projects,
    })))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>> {
    Ok(Json(state.dataset.find_project(&project_id)?.clone()))
}

/// `GET /projects/:id/credits/estimate?amount=`
///
/// Previews the issuance a credit run would perform, without starting one.
pub async fn estimate_credits(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<CreditCalculation>> {
    let project = state.dataset.find_project(&project_id)?;
    let price = state.issuance.kind().credit_price();
    Ok(Json(CreditCalculation::for_project(
        project,
        query.amount,
        price,
    )?))
}

/// `GET /issuance/projects`
///
/// Projects that still have credits to issue.
pub async fn issuable_projects(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let projects = state.dataset.projects_with_credits();
    Json(serde_json::json!(ProjectsResponse {
        count: projects.len(),
        projects,
    }))
}

/// `GET /notifications?priority=`
pub async fn list_notifications(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse> {
    let priority = parse_filter(query.priority.as_deref(), Priority::from_filter)?;
    let notifications = state.dataset.notifications(priority);
    Ok(Json(serde_json::json!(NotificationsResponse {
        count: notifications.len(),
        notifications,
    })))
}

/// `GET /stats`
pub async fn statistics(State(state): State<Arc<ApiState>>) -> Json<Statistics> {
    Json(state.dataset.statistics())
}

/// `None` and `"all"` mean no filter; anything else must parse.
fn parse_filter<T>(raw: Option<&str>, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| RegistryError::InvalidFilter(value.to_string())),
    }
}

// ─────────────────────────────────────────────────────────
// Workflow session handlers (shared by both workflows)
// ─────────────────────────────────────────────────────────

/// `POST /analysis`, `POST /issuance`
pub async fn create_session<K>(State(state): State<Arc<ApiState>>) -> impl IntoResponse
where
    K: WorkflowKind,
    ApiState: SessionsOf<K>,
{
    let (session_id, engine) = state.sessions().create().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            workflow: K::NAME,
            state: engine.state(),
        }),
    )
}

/// `GET /analysis/:id?wait=`, `GET /issuance/:id?wait=`
///
/// With `wait=true` the response is held until the run settles, or until
/// the long-poll timeout, whichever comes first.
pub async fn get_session<K>(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Snapshot<K>>>
where
    K: WorkflowKind,
    ApiState: SessionsOf<K>,
{
    let engine = state.sessions().get(session_id).await?;
    if !query.wait {
        return Ok(Json(engine.snapshot()));
    }
    let snapshot = tokio::time::timeout(LONG_POLL_TIMEOUT, engine.settled())
        .await
        .unwrap_or_else(|_| engine.snapshot());
    Ok(Json(snapshot))
}

/// `POST /analysis/:id/start`, `POST /issuance/:id/start`
pub async fn start_session<K>(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
) -> Result<impl IntoResponse>
where
    K: WorkflowKind,
    ApiState: SessionsOf<K>,
{
    let engine = state.sessions().get(session_id).await?;
    let run_id = engine.start()?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted { session_id, run_id }),
    ))
}

/// `POST /analysis/:id/reset`, `POST /issuance/:id/reset`
pub async fn reset_session<K>(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
) -> Result<Json<Snapshot<K>>>
where
    K: WorkflowKind,
    ApiState: SessionsOf<K>,
{
    let engine = state.sessions().get(session_id).await?;
    engine.reset();
    Ok(Json(engine.snapshot()))
}

/// `DELETE /analysis/:id`, `DELETE /issuance/:id`
pub async fn delete_session<K>(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
) -> Result<StatusCode>
where
    K: WorkflowKind,
    ApiState: SessionsOf<K>,
{
    state.sessions().remove(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────
// Workflow-specific inputs
// ─────────────────────────────────────────────────────────

/// `PUT /analysis/:id/selection`
pub async fn select_analysis_project(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
    Json(body): Json<AnalysisSelection>,
) -> Result<Json<Snapshot<ImageAnalysis>>> {
    let project = state.dataset.find_project(&body.project_id)?.clone();
    let engine = state.analysis.get(session_id).await?;
    engine.edit(|draft| {
        draft.project = Some(project);
        Ok(())
    })?;
    Ok(Json(engine.snapshot()))
}

/// `PUT /analysis/:id/attachments`
pub async fn set_attachments(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
    Json(body): Json<AttachmentsRequest>,
) -> Result<Json<Snapshot<ImageAnalysis>>> {
    let engine = state.analysis.get(session_id).await?;
    engine.edit(|draft| draft.set_attachments(body.attachments))?;
    Ok(Json(engine.snapshot()))
}

/// `PUT /issuance/:id/selection`
///
/// Rejects projects without credits and out-of-range custom amounts up
/// front; the same checks run again when the issuance starts.
pub async fn select_issuance_project(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
    Json(body): Json<IssuanceSelection>,
) -> Result<Json<Snapshot<CreditIssuance>>> {
    let project = state.dataset.find_project(&body.project_id)?.clone();
    let engine = state.issuance.get(session_id).await?;
    CreditCalculation::for_project(
        &project,
        body.custom_amount,
        engine.kind().credit_price(),
    )?;
    engine.edit(|draft| {
        draft.project = Some(project);
        draft.custom_amount = body.custom_amount;
        Ok(())
    })?;
    Ok(Json(engine.snapshot()))
}

/// `GET /issuance/:id/transaction`
///
/// The minted transaction hash as plain text, ready for the clipboard.
pub async fn transaction_hash(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<u64>,
) -> Result<String> {
    let engine = state.issuance.get(session_id).await?;
    engine
        .snapshot()
        .result
        .map(|receipt| receipt.transaction_hash)
        .ok_or(RegistryError::NotIssued)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
