//! Application state

use crate::db::DbPool;
use crate::middleware::RateLimiter;
use crate::models::AuthSession;
use dashmap::DashMap;

pub struct AppState {
    pub db: DbPool,
    /// token -> session. Opaque bearer tokens, expiry checked on every use.
    pub sessions: DashMap<String, AuthSession>,
    pub rate_limiter: RateLimiter,
    pub session_ttl_secs: i64,
}

impl AppState {
    pub fn new(db: DbPool, session_ttl_secs: i64, rate_limit: u32, rate_window_secs: u64) -> Self {
        Self {
            db,
            sessions: DashMap::new(),
            rate_limiter: RateLimiter::new(rate_limit, rate_window_secs),
            session_ttl_secs,
        }
    }
}
