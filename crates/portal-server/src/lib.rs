//! Portal Server - Central API for the campus opportunity portal
//!
//! Architecture:
//! - REST API: accounts, job postings, applications, leaderboard
//! - Scoring engine: point awards, derived levels, badge unlocks
//! - PostgreSQL storage; the unique (job, applicant) index is the sole
//!   arbiter of the one-application-per-posting invariant
//! - Bearer sessions held in process; per-IP rate limiting
//!
//! Key invariants:
//! - level == xp / 350 + 1, recomputed on every score change
//! - Badge sets are append-only; a badge is never removed
//! - Postings close lazily once their deadline passes; no background sweep
//! - Leaderboard positions are counted from live scores, never cached

pub mod api;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod scoring;
pub mod state;

pub use db::DbPool;
pub use error::{ApiError, ApiResult};
pub use observability::{init_sentry, AuditEventType, AuditLogger};
pub use state::AppState;
