use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Referenced entity (event, post, profile, point of interest, address) does not exist
    NotFound(String),
    /// Role violation or failed domain precondition
    NotAllowed(String),
    /// Input parsed but failed domain validation
    BadValues(String),
    /// No valid session, wrong credentials, or a session where none is expected
    Unauthorized(String),
    /// The geocoding service could not be reached or replied with garbage
    Upstream(String),
    Internal(String),
    DatabaseError(String),
    SerializationError(String),
    ConfigurationError(String),
}

impl AppError {
    /// Short category name used in the `error` field of responses
    pub fn category(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::NotAllowed(_) => "NotAllowed",
            AppError::BadValues(_) => "BadValues",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Upstream(_) => "Unreachable",
            AppError::Internal(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::ConfigurationError(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAllowed(_) => StatusCode::FORBIDDEN,
            AppError::BadValues(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::NotAllowed(msg) => write!(f, "Not allowed: {}", msg),
            AppError::BadValues(msg) => write!(f, "Bad values: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AppError::NotFound(msg)
            | AppError::NotAllowed(msg)
            | AppError::BadValues(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {}", msg);
                msg.clone()
            }
            AppError::Internal(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::ConfigurationError(_) => {
                tracing::error!("{}", self);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": self.category(),
            "details": details,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotAllowed("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::BadValues("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::DatabaseError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_categories_collapse() {
        assert_eq!(AppError::SerializationError("x".into()).category(), "Internal");
        assert_eq!(AppError::Upstream("x".into()).category(), "Unreachable");
    }
}
