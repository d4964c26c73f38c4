// Request-scoped failures, one variant per failure category

use thiserror::Error;

pub const INSUFFICIENT_PERMISSIONS: &str = "User has insufficient permissions for this endpoint/method";

/// Why a caller could not be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Authentication(#[from] AuthFailure),

    #[error("{}", INSUFFICIENT_PERMISSIONS)]
    Authorization,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

pub type RequestResult<T> = Result<T, RequestError>;

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        RequestError::Validation(message.into())
    }

    /// HTTP status code for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::Authentication(_) => 401,
            RequestError::Authorization => 403,
            RequestError::NotFound(_) => 404,
            RequestError::Validation(_) => 400,
            RequestError::Conflict(_) => 409,
            RequestError::Persistence(_) | RequestError::Internal(_) => 500,
        }
    }

    /// JSON body: client errors carry `message`, server errors carry `error`
    pub fn body(&self) -> serde_json::Value {
        match self {
            RequestError::Persistence(_) | RequestError::Internal(_) => {
                serde_json::json!({ "error": self.to_string() })
            }
            _ => serde_json::json!({ "message": self.to_string() }),
        }
    }
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            RequestError::Persistence(e) => tracing::error!(error = %e, "store failure"),
            RequestError::Internal(msg) => tracing::error!(error = %msg, "internal failure"),
            _ => {}
        }

        (status, axum::Json(self.body())).into_response()
    }
}
