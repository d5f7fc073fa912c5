//! Authentication API handlers

use crate::db::queries;
use crate::error::{ensure_valid, ApiError, ApiResult};
use crate::models::*;
use crate::observability::{AuditEntry, AuditEventType, AuditLogger};
use crate::scoring;
use crate::state::AppState;
use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer "))
}

pub fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthSession, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing auth token".to_string()))?;
    let session = state
        .sessions
        .get(token)
        .map(|s| s.clone())
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    if session.expires_at < now() {
        state.sessions.remove(token);
        return Err(ApiError::Unauthorized("Token expired".to_string()));
    }

    Ok(session)
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthSession, ApiError> {
    let session = require_auth(state, headers)?;
    if session.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }
    Ok(session)
}

/// Best-effort session lookup for routes that behave differently when a
/// valid token is present but never reject.
pub fn optional_auth(state: &AppState, headers: &HeaderMap) -> Option<AuthSession> {
    require_auth(state, headers).ok()
}

pub fn issue_session(state: &AppState, user_id: Uuid, role: Role) -> String {
    let token = Uuid::new_v4().to_string();
    let session = AuthSession {
        user_id,
        role,
        expires_at: now() + state.session_ttl_secs,
    };
    state.sessions.insert(token.clone(), session);
    token
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?
        .to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let mut errors = Vec::new();
    if req.name.trim().len() < 2 {
        errors.push("Name must be at least 2 characters long".to_string());
    }
    if !valid_email(&req.email) {
        errors.push("Please provide a valid email".to_string());
    }
    if req.password.len() < 6 {
        errors.push("Password must be at least 6 characters long".to_string());
    }
    if req.role == Role::Student && req.university.as_deref().map_or(true, |u| u.trim().is_empty()) {
        errors.push("University is required for students".to_string());
    }
    ensure_valid(errors)?;

    let email = req.email.trim().to_lowercase();
    if queries::get_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::BusinessRule(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let early_bird = queries::count_users(&state.db).await? < scoring::EARLY_BIRD_COHORT;
    let university = match req.role {
        Role::Student => req.university.as_deref(),
        Role::Admin => None,
    };

    let user = queries::create_user(
        &state.db,
        req.name.trim(),
        &email,
        &password_hash,
        req.role,
        university,
        early_bird,
    )
    .await?;

    let user_id = Uuid::parse_str(&user.id).map_err(|e| anyhow!(e))?;

    // Materialize cohort badges (Early Bird) right away
    let _ = scoring::evaluate_badges(&state.db, user_id).await?;
    let user = queries::get_user(&state.db, user_id)
        .await?
        .unwrap_or(user);

    let token = issue_session(&state, user_id, user.role);

    info!("User registered: {} ({})", user.email, user.role.as_str());
    AuditLogger::log(
        &state,
        AuditEntry::new(AuditEventType::UserRegistered)
            .entity("user", &user.id)
            .actor(&user.id, Some(user.role.as_str())),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            "User registered successfully",
            json!({ "user": user, "token": token }),
        )),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let mut errors = Vec::new();
    if !valid_email(&req.email) {
        errors.push("Please provide a valid email".to_string());
    }
    if req.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    ensure_valid(errors)?;

    let email = req.email.trim().to_lowercase();
    let creds = queries::get_credentials(&state.db, &email, req.role).await?;

    let Some(creds) = creds else {
        AuditLogger::auth(&state, &email, req.role.as_str(), false, Some("unknown account")).await;
        return Err(ApiError::Unauthorized(
            "Invalid email, password, or role".to_string(),
        ));
    };

    if !verify_password(&req.password, &creds.password_hash) {
        AuditLogger::auth(&state, &email, req.role.as_str(), false, Some("bad password")).await;
        return Err(ApiError::Unauthorized(
            "Invalid email, password, or role".to_string(),
        ));
    }

    if !creds.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    queries::touch_last_login(&state.db, creds.user_id).await?;
    let user = queries::get_user(&state.db, creds.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let token = issue_session(&state, creds.user_id, creds.role);
    AuditLogger::auth(&state, &user.id, user.role.as_str(), true, None).await;

    Ok(Json(ApiResponse::ok_with_message(
        "Login successful",
        json!({ "user": user, "token": token }),
    )))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = require_auth(&state, &headers)?;
    let user = queries::get_user(&state.db, session.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(ApiResponse::ok(json!({ "user": user }))))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = require_auth(&state, &headers)?;

    let mut errors = Vec::new();
    if let Some(ref name) = req.name {
        if name.trim().len() < 2 {
            errors.push("Name must be at least 2 characters long".to_string());
        }
    }
    if let Some(ref university) = req.university {
        if university.trim().is_empty() {
            errors.push("University cannot be empty".to_string());
        }
    }
    if let Some(ref bio) = req.bio {
        if bio.len() > 500 {
            errors.push("Bio cannot exceed 500 characters".to_string());
        }
    }
    ensure_valid(errors)?;

    let user = queries::update_profile(&state.db, session.user_id, &req)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    AuditLogger::log(
        &state,
        AuditEntry::new(AuditEventType::ProfileUpdated)
            .entity("user", &user.id)
            .actor(&user.id, Some(user.role.as_str())),
    )
    .await;

    Ok(Json(ApiResponse::ok_with_message(
        "Profile updated successfully",
        json!({ "user": user }),
    )))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let session = require_auth(&state, &headers)?;

    let mut errors = Vec::new();
    if req.current_password.is_empty() {
        errors.push("Current password is required".to_string());
    }
    if req.new_password.len() < 6 {
        errors.push("New password must be at least 6 characters long".to_string());
    }
    ensure_valid(errors)?;

    let creds = queries::get_credentials_by_id(&state.db, session.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !verify_password(&req.current_password, &creds.password_hash) {
        return Err(ApiError::BusinessRule(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&req.new_password)?;
    queries::set_password(&state.db, session.user_id, &new_hash).await?;

    AuditLogger::log(
        &state,
        AuditEntry::new(AuditEventType::PasswordChanged)
            .entity("user", &session.user_id.to_string())
            .actor(&session.user_id.to_string(), Some(session.role.as_str())),
    )
    .await;

    Ok(Json(ApiResponse::message_only(
        "Password changed successfully",
    )))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    require_auth(&state, &headers)?;
    if let Some(token) = bearer_token(&headers) {
        state.sessions.remove(token);
    }

    AuditLogger::log(
        &state,
        AuditEntry::new(AuditEventType::SessionRevoked),
    )
    .await;

    Ok(Json(ApiResponse::message_only("Logout successful")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(valid_email("student@university.edu"));
        assert!(valid_email("a.b@c.co"));
        assert!(!valid_email("no-at-sign"));
        assert!(!valid_email("@missing.local"));
        assert!(!valid_email("user@nodot"));
        assert!(!valid_email("user@.leading"));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2password").unwrap();
        assert_ne!(hash, "hunter2password");
        assert!(verify_password("hunter2password", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }
}
