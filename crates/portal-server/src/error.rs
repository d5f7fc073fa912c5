//! API error taxonomy and response mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation Error")]
    Validation(Vec<String>),

    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BusinessRule(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn development_mode() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|e| e == "development")
        .unwrap_or(false)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut errors: Option<Vec<String>> = None;

        let message = match self {
            ApiError::Validation(field_errors) => {
                errors = Some(field_errors);
                "Validation Error".to_string()
            }
            ApiError::Internal(ref e) => {
                tracing::error!(error = %e, "Unhandled error");
                if development_mode() {
                    errors = Some(vec![e.to_string()]);
                }
                "Internal server error".to_string()
            }
            ref other => other.to_string(),
        };

        let mut body = json!({ "success": false, "message": message });
        if let Some(errs) = errors {
            body["errors"] = json!(errs);
        }

        (status, Json(body)).into_response()
    }
}

/// Collects field-level validation messages; errors out if any were recorded.
pub fn ensure_valid(errors: Vec<String>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation(vec!["bad".into()]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BusinessRule("duplicate".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("not yours".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NotFound("Job").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::NotFound("Job").to_string(), "Job not found");
    }

    #[test]
    fn test_ensure_valid() {
        assert!(ensure_valid(vec![]).is_ok());
        let err = ensure_valid(vec!["Name must be at least 2 characters long".into()]);
        assert!(matches!(err, Err(ApiError::Validation(v)) if v.len() == 1));
    }
}
