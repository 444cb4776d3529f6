//! Generic agent job administration.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;
use helpdesk_core::generic_agent::{
    GenericAgentJob, JobActions, JobUpdate, MatchCriteria, should_run, validate_name,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// A job with its decoded schedule, selection and actions.
#[derive(Debug, Serialize)]
pub struct JobView {
    /// Job name.
    pub name: String,
    /// Whether the job is enabled.
    pub valid: bool,
    /// Last recorded run.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Weekdays, 0 = Sunday; empty means every day.
    pub schedule_days: Vec<i64>,
    /// Hours.
    pub schedule_hours: Vec<i64>,
    /// Minutes.
    pub schedule_minutes: Vec<i64>,
    /// Whether the scheduler would run the job right now.
    pub due_now: bool,
    /// Ticket selection.
    pub criteria: MatchCriteria,
    /// Ticket changes.
    pub actions: JobActions,
    /// Raw key/value rows.
    pub config: BTreeMap<String, String>,
}

impl JobView {
    fn new(job: GenericAgentJob, now: DateTime<Utc>) -> Self {
        Self {
            due_now: should_run(&job, now),
            last_run_at: job.schedule_last_run(),
            schedule_days: job.schedule_days(),
            schedule_hours: job.schedule_hours(),
            schedule_minutes: job.schedule_minutes(),
            criteria: job.match_criteria(),
            actions: job.actions(),
            name: job.name,
            valid: job.valid,
            config: job.config,
        }
    }
}

/// Body of `POST /admin/generic-agent`.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Job name.
    pub name: String,
    /// Defaults to enabled.
    #[serde(default = "enabled")]
    pub valid: bool,
    /// Key/value rows.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

const fn enabled() -> bool {
    true
}

/// `GET /admin/generic-agent`
pub async fn list_jobs(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<JobView>>>, AppError> {
    let now = state.clock.now();
    let mut jobs = Vec::new();
    for name in state.generic_agent.list_names().await? {
        jobs.push(JobView::new(state.generic_agent.get(&name).await?, now));
    }
    Ok(ok(jobs))
}

/// `GET /admin/generic-agent/:name`
pub async fn get_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<JobView>>, AppError> {
    let job = state.generic_agent.get(&name).await?;
    Ok(ok(JobView::new(job, state.clock.now())))
}

/// `POST /admin/generic-agent`
pub async fn create_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobView>>), AppError> {
    validate_name(&req.name)?;
    let job = GenericAgentJob {
        name: req.name.trim().to_string(),
        valid: req.valid,
        config: req.config,
        last_run_at: None,
    };
    state.generic_agent.create(&job).await?;
    let stored = state.generic_agent.get(&job.name).await?;
    Ok((StatusCode::CREATED, ok(JobView::new(stored, state.clock.now()))))
}

/// `PUT /admin/generic-agent/:name`
pub async fn update_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<ApiResponse<JobView>>, AppError> {
    state.generic_agent.update(&name, &update).await?;
    let current = update
        .new_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&name);
    let job = state.generic_agent.get(current).await?;
    Ok(ok(JobView::new(job, state.clock.now())))
}

/// `DELETE /admin/generic-agent/:name`
pub async fn delete_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.generic_agent.delete(&name).await?;
    Ok(ok(json!({ "message": "Job deleted" })))
}
