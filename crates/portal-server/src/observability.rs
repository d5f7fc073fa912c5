//! Observability - Sentry integration and audit trail
//!
//! Provides:
//! - Sentry error tracking (enabled via SENTRY_DSN env var)
//! - Structured audit logging for account, posting and application activity
//! - Persistence of every audit event to the events table

use crate::db::queries;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use tracing::{error, info, span, warn, Level};

/// Initialize Sentry if SENTRY_DSN is set
pub fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    if dsn.is_empty() {
        info!("Sentry DSN is empty, error tracking disabled");
        return None;
    }

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("ENVIRONMENT").ok().map(|s| s.into()),
            traces_sample_rate: 0.1,
            ..Default::default()
        },
    ));

    info!("Sentry initialized for error tracking");
    Some(guard)
}

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Accounts
    UserRegistered,
    LoginSucceeded,
    LoginFailed,
    PasswordChanged,
    SessionRevoked,
    ProfileUpdated,
    UserActivated,
    UserDeactivated,
    UserDeleted,

    // Postings
    JobCreated,
    JobUpdated,
    JobDeleted,

    // Applications
    ApplicationSubmitted,
    ApplicationStatusChanged,
    ApplicationWithdrawn,
    ApplicationDeleted,

    // Gamification
    PointsAwarded,
    BadgeEarned,

    // Security
    RateLimitExceeded,
    UnauthorizedAccess,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "unknown".to_string());
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Structured audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event_type: AuditEventType,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            entity_type: None,
            entity_id: None,
            actor_id: None,
            actor_role: None,
            payload: None,
            success: true,
            error_message: None,
        }
    }

    pub fn entity(mut self, entity_type: &str, entity_id: &str) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn actor(mut self, id: &str, role: Option<&str>) -> Self {
        self.actor_id = Some(id.to_string());
        self.actor_role = role.map(|s| s.to_string());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn failed(mut self, error: &str) -> Self {
        self.success = false;
        self.error_message = Some(error.to_string());
        self
    }
}

/// Audit logger for structured logging and persistence
pub struct AuditLogger;

impl AuditLogger {
    /// Log an audit event to both tracing and the database
    pub async fn log(state: &AppState, entry: AuditEntry) {
        let span = span!(
            Level::INFO,
            "audit",
            event_type = %entry.event_type,
            entity_type = ?entry.entity_type,
            entity_id = ?entry.entity_id,
            actor = ?entry.actor_id,
            success = entry.success,
        );
        let _guard = span.enter();

        if entry.success {
            info!(
                event = %entry.event_type,
                entity = ?entry.entity_id,
                actor = ?entry.actor_id,
                "Audit event"
            );
        } else {
            warn!(
                event = %entry.event_type,
                entity = ?entry.entity_id,
                actor = ?entry.actor_id,
                error = ?entry.error_message,
                "Audit event failed"
            );

            if let Some(ref msg) = entry.error_message {
                sentry::capture_message(
                    &format!("{}: {}", entry.event_type, msg),
                    sentry::Level::Warning,
                );
            }
        }

        let payload_str = entry
            .payload
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        if let Err(e) = queries::log_event(
            &state.db,
            &entry.event_type.to_string(),
            entry.entity_type.as_deref(),
            entry.entity_id.as_deref(),
            payload_str.as_deref(),
            entry.actor_id.as_deref(),
        )
        .await
        {
            error!(error = %e, "Failed to persist audit event");
        }
    }

    /// Log an authentication event
    pub async fn auth(state: &AppState, actor: &str, role: &str, success: bool, error: Option<&str>) {
        let mut entry = AuditEntry::new(if success {
            AuditEventType::LoginSucceeded
        } else {
            AuditEventType::LoginFailed
        })
        .actor(actor, Some(role));

        if let Some(e) = error {
            entry = entry.failed(e);
        }

        Self::log(state, entry).await;
    }

    /// Log a posting event
    pub async fn job(state: &AppState, event: AuditEventType, job_id: &str, actor: &str) {
        let entry = AuditEntry::new(event).entity("job", job_id).actor(actor, None);
        Self::log(state, entry).await;
    }

    /// Log an application event
    pub async fn application(
        state: &AppState,
        event: AuditEventType,
        application_id: &str,
        actor: &str,
        payload: serde_json::Value,
    ) {
        let entry = AuditEntry::new(event)
            .entity("application", application_id)
            .actor(actor, None)
            .with_payload(payload);
        Self::log(state, entry).await;
    }

    /// Log a point award or badge unlock
    pub async fn gamification(
        state: &AppState,
        event: AuditEventType,
        user_id: &str,
        payload: serde_json::Value,
    ) {
        let entry = AuditEntry::new(event)
            .entity("user", user_id)
            .with_payload(payload);
        Self::log(state, entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_builder() {
        let entry = AuditEntry::new(AuditEventType::ApplicationSubmitted)
            .entity("application", "app-123")
            .actor("user-1", Some("student"))
            .with_payload(serde_json::json!({"jobId": "job-9"}));

        assert!(entry.success);
        assert_eq!(entry.entity_id, Some("app-123".to_string()));
        assert_eq!(entry.actor_id, Some("user-1".to_string()));
        assert_eq!(entry.actor_role, Some("student".to_string()));
    }

    #[test]
    fn test_audit_entry_failed() {
        let entry = AuditEntry::new(AuditEventType::LoginFailed)
            .actor("user-1", Some("student"))
            .failed("Invalid email, password, or role");

        assert!(!entry.success);
        assert_eq!(
            entry.error_message,
            Some("Invalid email, password, or role".to_string())
        );
    }

    #[test]
    fn test_event_type_display_is_snake_case() {
        assert_eq!(AuditEventType::UserRegistered.to_string(), "user_registered");
        assert_eq!(AuditEventType::BadgeEarned.to_string(), "badge_earned");
        assert_eq!(
            AuditEventType::ApplicationStatusChanged.to_string(),
            "application_status_changed"
        );
    }
}
