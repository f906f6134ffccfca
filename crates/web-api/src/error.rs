use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Unauthenticated => ApiError::unauthorized("authentication failed"),
            AppErr::UnknownUser => {
                ApiError::new(StatusCode::UNAUTHORIZED, "UNKNOWN_USER", "unknown user")
            }
            AppErr::NotFound => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "requested resource not found",
            ),
            AppErr::NotAuthor => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "only the author may perform this action",
            ),
            AppErr::Conflict { resource } => ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{resource} already exists"),
            ),
            AppErr::Persistence(message) => {
                tracing::error!(error = %message, "persistence failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "database error",
                )
            }
            AppErr::Password(err) => {
                tracing::error!(error = %err, "password hashing failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PASSWORD_ERROR",
                    "password error",
                )
            }
            err @ (AppErr::DuplicateConnection(_)
            | AppErr::InvalidState(_)
            | AppErr::Infrastructure(_)) => {
                tracing::error!(error = %err, "internal error");
                ApiError::internal_server_error("internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
