//! Users API handlers

use crate::api::{auth, page_params, parse_id};
use crate::db::queries;
use crate::error::{ensure_valid, ApiError, ApiResult};
use crate::models::*;
use crate::observability::{AuditEntry, AuditEventType, AuditLogger};
use crate::scoring::{self, PointAction};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let id = parse_id(&id, "User")?;
    let user = queries::get_user(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(ApiResponse::ok(json!({ "user": user }))))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
    pub search: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    auth::require_admin(&state, &headers)?;
    let (page, limit, offset) = page_params(query.page, query.limit, 10, 100)?;

    let (users, total) = queries::list_users(
        &state.db,
        query.role,
        query.search.as_deref(),
        limit,
        offset,
    )
    .await?;

    Ok(Json(ApiResponse::ok(json!({
        "users": users,
        "pagination": Pagination::new(page, limit, total),
    }))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_admin(&state, &headers)?;
    let id = parse_id(&id, "User")?;

    let user = queries::set_user_active(&state.db, id, req.is_active)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    AuditLogger::log(
        &state,
        AuditEntry::new(if req.is_active {
            AuditEventType::UserActivated
        } else {
            AuditEventType::UserDeactivated
        })
        .entity("user", &user.id)
        .actor(&session.user_id.to_string(), Some(session.role.as_str())),
    )
    .await;

    let message = if req.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(Json(ApiResponse::ok_with_message(
        message,
        json!({ "user": user }),
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardXpRequest {
    pub user_id: Option<String>,
    pub action: PointAction,
    pub points: Option<i64>,
}

/// Generic award path. Self-award is open to any authenticated account;
/// awarding another account requires admin.
pub async fn award_xp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AwardXpRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;

    if let Some(points) = req.points {
        if points < 1 {
            return Err(ApiError::Validation(vec![
                "Points must be a positive integer".to_string(),
            ]));
        }
    }

    let target = match req.user_id.as_deref() {
        Some(id) => parse_id(id, "User")?,
        None => session.user_id,
    };

    if target != session.user_id && session.role != Role::Admin {
        return Err(ApiError::Forbidden("Insufficient permissions".to_string()));
    }

    let amount = req.points.unwrap_or_else(|| req.action.points());

    let user = scoring::award_points(&state.db, target, amount)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    let old_level = scoring::level_for(user.xp - amount);

    let earned = scoring::evaluate_badges(&state.db, target)
        .await?
        .unwrap_or_default();

    AuditLogger::gamification(
        &state,
        AuditEventType::PointsAwarded,
        &user.id,
        json!({ "action": req.action.as_str(), "points": amount }),
    )
    .await;
    if !earned.is_empty() {
        AuditLogger::gamification(
            &state,
            AuditEventType::BadgeEarned,
            &user.id,
            json!({ "badges": earned }),
        )
        .await;
    }

    let user = queries::get_user(&state.db, target)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ApiResponse::ok_with_message(
        &format!("Awarded {} XP for {}", amount, req.action.as_str()),
        json!({
            "user": user,
            "awarded": amount,
            "leveledUp": user.level > old_level,
            "newLevel": user.level,
        }),
    )))
}

/// Increment one of the caller's activity counters, then re-run badge rules.
pub async fn update_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(action): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_auth(&state, &headers)?;

    if !matches!(action.as_str(), "applications" | "posts" | "referrals") {
        return Err(ApiError::BusinessRule("Invalid action type".to_string()));
    }

    queries::increment_user_counter(&state.db, session.user_id, &action)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    let _ = scoring::evaluate_badges(&state.db, session.user_id).await?;

    let user = queries::get_user(&state.db, session.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ApiResponse::ok_with_message(
        &format!("{} count updated successfully", action),
        json!({ "user": user }),
    )))
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    pub q: Option<String>,
    pub role: Option<Role>,
}

pub async fn search_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SearchUsersQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    auth::require_auth(&state, &headers)?;

    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    ensure_valid(if q.is_empty() {
        vec!["Search query is required".to_string()]
    } else {
        vec![]
    })?;

    let users = queries::search_users(&state.db, q, query.role).await?;
    Ok(Json(ApiResponse::ok(json!({ "users": users }))))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = auth::require_admin(&state, &headers)?;
    let id = parse_id(&id, "User")?;

    if queries::get_user(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    if id == session.user_id {
        return Err(ApiError::BusinessRule(
            "Cannot delete your own account".to_string(),
        ));
    }

    queries::delete_user(&state.db, id).await?;

    AuditLogger::log(
        &state,
        AuditEntry::new(AuditEventType::UserDeleted)
            .entity("user", &id.to_string())
            .actor(&session.user_id.to_string(), Some(session.role.as_str())),
    )
    .await;

    Ok(Json(ApiResponse::message_only("User deleted successfully")))
}
