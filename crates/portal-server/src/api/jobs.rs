//! Jobs API handlers

use crate::api::{auth, page_params, parse_id};
use crate::db::queries::{self, JobFilters};
use crate::error::{ensure_valid, ApiError, ApiResult};
use crate::models::*;
use crate::observability::{AuditEventType, AuditLogger};
use crate::scoring::{self, PointAction};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub work_type: Option<WorkType>,
    pub domain: Option<String>,
    pub search: Option<String>,
    pub min_stipend: Option<i64>,
    pub max_stipend: Option<i64>,
    /// Comma-separated tag list; a job matches when any tag overlaps.
    pub tags: Option<String>,
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let (page, limit, offset) = page_params(query.page, query.limit, 10, 50)?;

    let mut errors = Vec::new();
    if let Some(min) = query.min_stipend {
        if min < 0 {
            errors.push("Minimum stipend must be a non-negative integer".to_string());
        }
    }
    if let Some(max) = query.max_stipend {
        if max < 0 {
            errors.push("Maximum stipend must be a non-negative integer".to_string());
        }
    }
    ensure_valid(errors)?;

    let tags = query.tags.as_deref().map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });

    let filters = JobFilters {
        job_type: query.job_type.map(|t| t.as_str().to_string()),
        work_type: query.work_type.map(|w| w.as_str().to_string()),
        domain: query.domain.clone(),
        min_stipend: query.min_stipend,
        max_stipend: query.max_stipend,
        tags: tags.filter(|t| !t.is_empty()),
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };

    let (jobs, total) = queries::list_jobs(&state.db, &filters, limit, offset).await?;

    Ok(Json(ApiResponse::ok(json!({
        "jobs": jobs,
        "pagination": Pagination::new(page, limit, total),
    }))))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let id = parse_id(&id, "Job")?;
    let mut job = queries::get_job(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    // Posters viewing their own listing don't inflate the counter
    let viewer = auth::optional_auth(&state, &headers);
    let is_poster = viewer
        .map(|s| s.user_id.to_string() == job.posted_by.id)
        .unwrap_or(false);
    if !is_poster {
        queries::increment_job_views(&state.db, id).await?;
        job.views += 1;
    }

    Ok(Json(ApiResponse::ok(json!({ "job": job }))))
}

fn validate_job_fields(
    title: Option<&str>,
    company: Option<&str>,
    description: Option<&str>,
    deadline: Option<chrono::DateTime<Utc>>,
    stipend: Option<i64>,
    errors: &mut Vec<String>,
) {
    if let Some(title) = title {
        if title.trim().len() < 3 || title.len() > 100 {
            errors.push("Title must be between 3 and 100 characters".to_string());
        }
    }
    if let Some(company) = company {
        if company.trim().len() < 2 || company.len() > 100 {
            errors.push("Company name must be between 2 and 100 characters".to_string());
        }
    }
    if let Some(description) = description {
        if description.trim().len() < 50 || description.len() > 2000 {
            errors.push("Description must be between 50 and 2000 characters".to_string());
        }
    }
    if let Some(deadline) = deadline {
        if deadline <= Utc::now() {
            errors.push("Deadline must be in the future".to_string());
        }
    }
    if let Some(stipend) = stipend {
        if stipend < 0 {
            errors.push("Stipend must be a non-negative integer".to_string());
        }
    }
}

pub async fn create_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let session = auth::require_auth(&state, &headers)?;

    let mut errors = Vec::new();
    validate_job_fields(
        Some(&req.title),
        Some(&req.company),
        Some(&req.description),
        Some(req.deadline),
        Some(req.stipend),
        &mut errors,
    );
    if req.duration.trim().is_empty() {
        errors.push("Duration is required".to_string());
    }
    if req.domain.trim().is_empty() {
        errors.push("Domain is required".to_string());
    }
    if req.tags.is_empty() || req.tags.iter().any(|t| t.trim().is_empty()) {
        errors.push("At least one tag is required".to_string());
    }
    ensure_valid(errors)?;

    let job = queries::create_job(&state.db, session.user_id, &req).await?;

    // Posting rewards: fixed points plus the posting counter, then badges
    let _ = scoring::award_points(&state.db, session.user_id, PointAction::Post.points()).await?;
    let _ = queries::increment_user_counter(&state.db, session.user_id, "posts").await?;
    let _ = scoring::evaluate_badges(&state.db, session.user_id).await?;

    info!("Job created: {} by {}", job.id, job.posted_by.email);
    AuditLogger::job(
        &state,
        AuditEventType::JobCreated,
        &job.id,
        &session.user_id.to_string(),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            "Job created successfully",
            json!({ "job": job }),
        )),
    ))
}

pub async fn update_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateJobRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let id = parse_id(&id, "Job")?;

    let job = queries::get_job(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    if job.posted_by.id != session.user_id.to_string() && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Not authorized to update this job".to_string(),
        ));
    }

    let mut errors = Vec::new();
    validate_job_fields(
        req.title.as_deref(),
        req.company.as_deref(),
        req.description.as_deref(),
        req.deadline,
        req.stipend,
        &mut errors,
    );
    ensure_valid(errors)?;

    let job = queries::update_job(&state.db, id, &req)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    AuditLogger::job(
        &state,
        AuditEventType::JobUpdated,
        &job.id,
        &session.user_id.to_string(),
    )
    .await;

    Ok(Json(ApiResponse::ok_with_message(
        "Job updated successfully",
        json!({ "job": job }),
    )))
}

pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let id = parse_id(&id, "Job")?;

    let job = queries::get_job(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    if job.posted_by.id != session.user_id.to_string() && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this job".to_string(),
        ));
    }

    queries::delete_job(&state.db, id).await?;

    AuditLogger::job(
        &state,
        AuditEventType::JobDeleted,
        &id.to_string(),
        &session.user_id.to_string(),
    )
    .await;

    Ok(Json(ApiResponse::message_only("Job deleted successfully")))
}

#[derive(Debug, Deserialize)]
pub struct UserJobsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn user_jobs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<UserJobsQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let user_id = parse_id(&user_id, "User")?;
    let (page, limit, offset) = page_params(query.page, query.limit, 10, 50)?;

    let (jobs, total) = queries::jobs_by_user(&state.db, user_id, limit, offset).await?;

    Ok(Json(ApiResponse::ok(json!({
        "jobs": jobs,
        "pagination": Pagination::new(page, limit, total),
    }))))
}

pub async fn stats_overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    auth::require_admin(&state, &headers)?;

    let status_stats = queries::job_status_stats(&state.db).await?;
    let type_stats = queries::job_type_stats(&state.db).await?;
    let domain_stats = queries::job_domain_stats(&state.db).await?;

    Ok(Json(ApiResponse::ok(json!({
        "statusStats": status_stats,
        "typeStats": type_stats,
        "domainStats": domain_stats,
    }))))
}
