//! Leaderboard API handlers
//!
//! Positions are always computed from current scores: a page carries
//! offset-based ranks, and a single account's position is one plus the
//! count of accounts with a strictly greater score under the same filter.
//! There is no cached rank table to maintain.

use crate::api::{auth, page_params, parse_id};
use crate::db::queries;
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::scoring::BADGE_RULES;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Window size returned around an account's position: 5 above, the account
/// itself, 4 below.
const NEARBY_WINDOW: i64 = 10;

/// (query offset, rank of the first returned row) for the nearby window,
/// clamped at position 1 near the top of the board.
fn nearby_window(rank: i64) -> (i64, i64) {
    ((rank - 6).max(0), (rank - 5).max(1))
}

fn badge_definitions() -> serde_json::Value {
    let mut defs = serde_json::Map::new();
    for rule in BADGE_RULES {
        defs.insert(
            rule.name.to_string(),
            json!({ "description": rule.description, "icon": rule.icon }),
        );
    }
    serde_json::Value::Object(defs)
}

fn with_ranks(users: Vec<User>, offset: i64) -> Vec<LeaderboardEntry> {
    users
        .into_iter()
        .enumerate()
        .map(|(index, user)| LeaderboardEntry {
            user,
            rank: offset + index as i64 + 1,
            is_current_user: None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
    pub university: Option<String>,
}

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let (page, limit, offset) = page_params(query.page, query.limit, 20, 100)?;
    let role = query.role.map(|r| r.as_str());
    let university = query.university.as_deref();

    let users = queries::ranked_users(&state.db, role, university, limit, offset).await?;
    let total = queries::count_ranked(&state.db, role, university).await?;
    let leaderboard = with_ranks(users, offset);

    // Computed independently for the caller so their position is visible
    // even when it falls outside the requested page
    let mut current_user_rank = None;
    if let Some(session) = auth::optional_auth(&state, &headers) {
        if let Some(user) = queries::get_user(&state.db, session.user_id).await? {
            current_user_rank =
                Some(queries::position_for_xp(&state.db, role, university, user.xp).await?);
        }
    }

    Ok(Json(ApiResponse::ok(json!({
        "leaderboard": leaderboard,
        "currentUserRank": current_user_rank,
        "badgeDefinitions": badge_definitions(),
        "pagination": Pagination::new(page, limit, total),
    }))))
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
    pub category: Option<String>,
}

pub async fn top_performers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=50).contains(&limit) {
        return Err(ApiError::Validation(vec![
            "Limit must be between 1 and 50".to_string(),
        ]));
    }

    let category = query.category.as_deref().unwrap_or("xp");
    if !matches!(category, "xp" | "applications" | "posts" | "referrals") {
        return Err(ApiError::Validation(vec![
            "Category must be one of: xp, applications, posts, referrals".to_string(),
        ]));
    }

    let users = queries::top_users(&state.db, category, limit).await?;
    let top = with_ranks(users, 0);

    Ok(Json(ApiResponse::ok(json!({
        "topPerformers": top,
        "category": category,
        "badgeDefinitions": badge_definitions(),
    }))))
}

#[derive(Debug, Deserialize)]
pub struct UniversityQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn university_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(university): Path<String>,
    Query(query): Query<UniversityQuery>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let (page, limit, offset) = page_params(query.page, query.limit, 20, 50)?;

    let users = queries::ranked_users(
        &state.db,
        Some("student"),
        Some(&university),
        limit,
        offset,
    )
    .await?;
    let total = queries::count_ranked(&state.db, Some("student"), Some(&university)).await?;
    let leaderboard = with_ranks(users, offset);

    Ok(Json(ApiResponse::ok(json!({
        "leaderboard": leaderboard,
        "university": university,
        "badgeDefinitions": badge_definitions(),
        "pagination": Pagination::new(page, limit, total),
    }))))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let total_users = queries::count_students(&state.db).await?;
    let avg_xp = queries::avg_student_xp(&state.db).await?;
    let top_universities = queries::top_universities(&state.db).await?;
    let badge_stats = queries::badge_counts(&state.db).await?;
    let level_stats = queries::level_counts(&state.db).await?;

    Ok(Json(ApiResponse::ok(json!({
        "totalUsers": total_users,
        "avgXp": avg_xp.round() as i64,
        "topUniversities": top_universities,
        "badgeStats": badge_stats,
        "levelStats": level_stats,
        "badgeDefinitions": badge_definitions(),
    }))))
}

pub async fn user_position(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let id = parse_id(&user_id, "User")?;
    let user = queries::get_user(&state.db, id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::NotFound("User"))?;

    let rank = queries::position_for_xp(&state.db, Some("student"), None, user.xp).await?;

    let (skip, first_rank) = nearby_window(rank);
    let nearby = queries::ranked_users(&state.db, Some("student"), None, NEARBY_WINDOW, skip).await?;

    let nearby: Vec<LeaderboardEntry> = nearby
        .into_iter()
        .enumerate()
        .map(|(index, u)| {
            let is_current = u.id == user.id;
            LeaderboardEntry {
                user: u,
                rank: first_rank + index as i64,
                is_current_user: Some(is_current),
            }
        })
        .collect();

    let entry = LeaderboardEntry {
        user,
        rank,
        is_current_user: None,
    };

    Ok(Json(ApiResponse::ok(json!({
        "user": entry,
        "nearbyUsers": nearby,
        "badgeDefinitions": badge_definitions(),
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_window_clamps_at_top() {
        // Top-ranked accounts pull the window down to position 1
        assert_eq!(nearby_window(1), (0, 1));
        assert_eq!(nearby_window(3), (0, 1));
        assert_eq!(nearby_window(5), (0, 1));
        assert_eq!(nearby_window(6), (0, 1));
    }

    #[test]
    fn test_nearby_window_mid_board() {
        // Five above, the account, four below
        assert_eq!(nearby_window(100), (94, 95));
        assert_eq!(nearby_window(7), (1, 2));
    }

    #[test]
    fn test_badge_definitions_cover_all_rules() {
        let defs = badge_definitions();
        let map = defs.as_object().unwrap();
        assert_eq!(map.len(), BADGE_RULES.len());
        assert!(map.contains_key("Campus Recruiter"));
        assert!(map.contains_key("Early Bird"));
        for value in map.values() {
            assert!(value.get("description").is_some());
        }
    }
}
