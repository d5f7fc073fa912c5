//! API handlers

pub mod applications;
pub mod auth;
pub mod jobs;
pub mod leaderboard;
pub mod users;

use crate::error::ApiError;
use uuid::Uuid;

/// Parse a path id, mapping malformed ids to a 404 for the entity.
pub fn parse_id(id: &str, entity: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(entity))
}

/// Normalize page/limit query values against a per-route maximum.
pub fn page_params(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
    max_limit: i64,
) -> Result<(i64, i64, i64), ApiError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);

    let mut errors = Vec::new();
    if page < 1 {
        errors.push("Page must be a positive integer".to_string());
    }
    if limit < 1 || limit > max_limit {
        errors.push(format!("Limit must be between 1 and {}", max_limit));
    }
    crate::error::ensure_valid(errors)?;

    Ok((page, limit, (page - 1) * limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid", "Job").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "Job").unwrap(), id);
    }

    #[test]
    fn test_page_params_defaults_and_bounds() {
        let (page, limit, offset) = page_params(None, None, 10, 50).unwrap();
        assert_eq!((page, limit, offset), (1, 10, 0));

        let (page, limit, offset) = page_params(Some(3), Some(20), 10, 50).unwrap();
        assert_eq!((page, limit, offset), (3, 20, 40));

        assert!(page_params(Some(0), None, 10, 50).is_err());
        assert!(page_params(None, Some(51), 10, 50).is_err());
        assert!(page_params(None, Some(0), 10, 50).is_err());
    }
}
