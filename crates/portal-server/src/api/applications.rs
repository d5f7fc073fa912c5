//! Applications API handlers

use crate::api::{auth, page_params, parse_id};
use crate::db::queries;
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
use uuid::Uuid;

/// Submit an application. The storage layer's unique (job, applicant) index
/// is what rejects the losing insert when duplicates race; everything after
/// the insert (counters, points, referrer credit, badges) runs step by step
/// without a transaction, so a failure partway leaves earlier steps applied.
pub async fn apply(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let session = auth::require_auth(&state, &headers)?;
    if session.role != Role::Student {
        return Err(ApiError::Forbidden("Student role required".to_string()));
    }

    let mut errors = Vec::new();
    if req.resume.trim().is_empty() {
        errors.push("Resume URL is required".to_string());
    }
    if let Some(ref letter) = req.cover_letter {
        if letter.len() > 1000 {
            errors.push("Cover letter cannot exceed 1000 characters".to_string());
        }
    }
    ensure_valid(errors)?;

    let job_id = Uuid::parse_str(&req.job_id)
        .map_err(|_| ApiError::Validation(vec!["Invalid job ID".to_string()]))?;
    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    if job.status != JobStatus::Active || Utc::now().timestamp() >= job.deadline {
        return Err(ApiError::BusinessRule(
            "Job is no longer accepting applications".to_string(),
        ));
    }

    if job.posted_by.id == session.user_id.to_string() {
        return Err(ApiError::BusinessRule(
            "Cannot apply to your own job posting".to_string(),
        ));
    }

    let referrer = match req.referred_by.as_deref() {
        Some(id) => {
            let referrer_id = Uuid::parse_str(id)
                .map_err(|_| ApiError::BusinessRule("Invalid referrer".to_string()))?;
            if queries::get_user(&state.db, referrer_id).await?.is_none() {
                return Err(ApiError::BusinessRule("Invalid referrer".to_string()));
            }
            Some(referrer_id)
        }
        None => None,
    };

    let application = queries::create_application(
        &state.db,
        job_id,
        session.user_id,
        req.cover_letter.as_deref(),
        &req.resume,
        referrer,
    )
    .await?
    .ok_or_else(|| {
        ApiError::BusinessRule("You have already applied for this job".to_string())
    })?;

    queries::increment_job_applicants(&state.db, job_id).await?;

    // Applicant rewards
    let _ = scoring::award_points(&state.db, session.user_id, PointAction::Apply.points()).await?;
    let _ = queries::increment_user_counter(&state.db, session.user_id, "applications").await?;
    let _ = scoring::evaluate_badges(&state.db, session.user_id).await?;

    // Referrer rewards
    if let Some(referrer_id) = referrer {
        let _ = scoring::award_points(&state.db, referrer_id, PointAction::Referral.points()).await?;
        let _ = queries::increment_user_counter(&state.db, referrer_id, "referrals").await?;
        let _ = scoring::evaluate_badges(&state.db, referrer_id).await?;
    }

    info!(
        "Application submitted: {} for job {}",
        application.id, job_id
    );
    AuditLogger::application(
        &state,
        AuditEventType::ApplicationSubmitted,
        &application.id,
        &session.user_id.to_string(),
        json!({ "jobId": job_id.to_string() }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            "Application submitted successfully",
            json!({ "application": application }),
        )),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListApplicationsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ApplicationStatus>,
}

pub async fn list_own(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListApplicationsQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let (page, limit, offset) = page_params(query.page, query.limit, 10, 50)?;

    let (applications, total) = queries::applications_for_applicant(
        &state.db,
        session.user_id,
        query.status.map(|s| s.as_str()),
        limit,
        offset,
    )
    .await?;

    Ok(Json(ApiResponse::ok(json!({
        "applications": applications,
        "pagination": Pagination::new(page, limit, total),
    }))))
}

pub async fn job_applications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Query(query): Query<ListApplicationsQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let job_id = parse_id(&job_id, "Job")?;

    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    if job.posted_by.id != session.user_id.to_string() && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Not authorized to view applications for this job".to_string(),
        ));
    }

    let (page, limit, offset) = page_params(query.page, query.limit, 10, 50)?;
    let (applications, total) = queries::applications_for_job(
        &state.db,
        job_id,
        query.status.map(|s| s.as_str()),
        limit,
        offset,
    )
    .await?;

    Ok(Json(ApiResponse::ok(json!({
        "applications": applications,
        "job": job,
        "pagination": Pagination::new(page, limit, total),
    }))))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let id = parse_id(&id, "Application")?;

    let application = queries::get_application(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Application"))?;

    let job_id = parse_id(&application.job_id, "Job")?;
    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    let viewer = session.user_id.to_string();
    let can_view = application.applicant_id == viewer
        || job.posted_by.id == viewer
        || session.role == Role::Admin;
    if !can_view {
        return Err(ApiError::Forbidden(
            "Not authorized to view this application".to_string(),
        ));
    }

    Ok(Json(ApiResponse::ok(json!({ "application": application }))))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateApplicationStatusRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let id = parse_id(&id, "Application")?;

    let application = queries::get_application(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Application"))?;

    let job_id = parse_id(&application.job_id, "Job")?;
    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;

    if job.posted_by.id != session.user_id.to_string() && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Not authorized to update this application".to_string(),
        ));
    }

    if let Some(ref feedback) = req.feedback {
        let mut errors = Vec::new();
        if let Some(rating) = feedback.rating {
            if !(1..=5).contains(&rating) {
                errors.push("Rating must be between 1 and 5".to_string());
            }
        }
        if let Some(ref comments) = feedback.comments {
            if comments.len() > 1000 {
                errors.push("Comments cannot exceed 1000 characters".to_string());
            }
        }
        ensure_valid(errors)?;
    }

    let old_status = application.status;
    let application = queries::update_application_status(
        &state.db,
        id,
        req.status.as_str(),
        req.feedback.as_ref(),
        session.user_id,
        req.interview.as_ref(),
    )
    .await?
    .ok_or(ApiError::NotFound("Application"))?;

    // One-time selection award, guarded by the old-vs-new comparison so an
    // idempotent re-set of Selected can't double-pay.
    if req.status == ApplicationStatus::Selected && old_status != ApplicationStatus::Selected {
        let applicant_id = parse_id(&application.applicant_id, "User")?;
        if scoring::award_points(&state.db, applicant_id, PointAction::Selected.points())
            .await?
            .is_some()
        {
            let _ = scoring::evaluate_badges(&state.db, applicant_id).await?;
            AuditLogger::gamification(
                &state,
                AuditEventType::PointsAwarded,
                &application.applicant_id,
                json!({ "action": "selected", "points": PointAction::Selected.points() }),
            )
            .await;
        }
    }

    AuditLogger::application(
        &state,
        AuditEventType::ApplicationStatusChanged,
        &application.id,
        &session.user_id.to_string(),
        json!({ "from": old_status.as_str(), "to": req.status.as_str() }),
    )
    .await;

    Ok(Json(ApiResponse::ok_with_message(
        "Application status updated successfully",
        json!({ "application": application }),
    )))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;
    let id = parse_id(&id, "Application")?;

    if let Some(ref reason) = req.reason {
        if reason.len() > 500 {
            return Err(ApiError::Validation(vec![
                "Withdrawal reason cannot exceed 500 characters".to_string(),
            ]));
        }
    }

    let application = queries::get_application(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Application"))?;

    if application.applicant_id != session.user_id.to_string() {
        return Err(ApiError::Forbidden(
            "Not authorized to withdraw this application".to_string(),
        ));
    }

    if application.is_withdrawn {
        return Err(ApiError::BusinessRule(
            "Application is already withdrawn".to_string(),
        ));
    }

    let application = queries::withdraw_application(&state.db, id, req.reason.as_deref())
        .await?
        .ok_or_else(|| {
            ApiError::BusinessRule("Application is already withdrawn".to_string())
        })?;

    AuditLogger::application(
        &state,
        AuditEventType::ApplicationWithdrawn,
        &application.id,
        &session.user_id.to_string(),
        json!({ "reason": req.reason }),
    )
    .await;

    Ok(Json(ApiResponse::ok_with_message(
        "Application withdrawn successfully",
        json!({ "application": application }),
    )))
}

pub async fn stats_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;

    let stats = queries::application_status_stats(&state.db, session.user_id).await?;
    let total = queries::count_active_applications(&state.db, session.user_id).await?;

    Ok(Json(ApiResponse::ok(json!({
        "stats": stats,
        "totalApplications": total,
    }))))
}

pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_admin(&state, &headers)?;
    let id = parse_id(&id, "Application")?;

    if queries::get_application(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("Application"));
    }

    queries::delete_application(&state.db, id).await?;

    AuditLogger::application(
        &state,
        AuditEventType::ApplicationDeleted,
        &id.to_string(),
        &session.user_id.to_string(),
        json!({}),
    )
    .await;

    Ok(Json(ApiResponse::message_only(
        "Application deleted successfully",
    )))
}
