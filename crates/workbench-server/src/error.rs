//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use workbench::conversation::ConversationError;
use workbench::dispatch::DispatchError;
use workbench::project::{FileError, ProjectError};
use workbench::{InterpreterError, WorkbenchError};

/// An error returned by the HTTP layer.
///
/// Serializes as:
/// ```json
/// { "ok": false, "error": { "code": "<code>", "message": "<message>" } }
/// ```
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

/// Body of an [`ApiError`].
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    /// Always `false`
    pub ok: bool,
    /// What went wrong
    pub error: ApiErrorBody,
}

/// Code and message of an [`ApiError`].
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// An error with an explicit status and code.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse {
                ok: false,
                error: ApiErrorBody {
                    code: code.into(),
                    message: message.into(),
                },
            },
        }
    }

    /// 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 400.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 409.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// 500.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Error code in the body.
    pub fn code(&self) -> &str {
        &self.body.error.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(_) => Self::not_found(err.to_string()),
            ProjectError::SourceNotFound(_) | ProjectError::InvalidPath(_) => {
                Self::bad_request(err.to_string())
            }
            ProjectError::File(e) => e.into(),
            ProjectError::Store(_) | ProjectError::Io(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(_) => Self::not_found(err.to_string()),
            ConversationError::Store(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<WorkbenchError> for ApiError {
    fn from(err: WorkbenchError) -> Self {
        match err {
            WorkbenchError::Project(e) => e.into(),
            WorkbenchError::Conversation(e) => e.into(),
        }
    }
}

impl From<InterpreterError> for ApiError {
    fn from(err: InterpreterError) -> Self {
        match err {
            InterpreterError::ConversationNotFound(_) | InterpreterError::ProjectNotFound(_) => {
                Self::not_found(err.to_string())
            }
            InterpreterError::Conversation(e) => e.into(),
            InterpreterError::Project(e) => e.into(),
        }
    }
}

/// Only the conditions that are client or server errors at the HTTP level.
///
/// Handlers report the remaining file conditions in a 200 body; see
/// [`crate::files`].
impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.code(), err.to_string()),
            FileError::AlreadyExists(_) => {
                Self::new(StatusCode::CONFLICT, err.code(), err.to_string())
            }
            FileError::Io(_) => Self::internal(err.to_string()),
            _ => Self::new(StatusCode::BAD_REQUEST, err.code(), err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownAgent(_) | DispatchError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, err.code(), err.to_string())
            }
            DispatchError::UnknownTaskKind { .. }
            | DispatchError::MissingParameter(_)
            | DispatchError::InvalidParameter { .. }
            | DispatchError::Unsupported(_) => {
                Self::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
            }
            DispatchError::File(e) => e.into(),
            DispatchError::Project(e) => e.into(),
            DispatchError::Store(_) | DispatchError::Serialization(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_statuses() {
        let err: ApiError = FileError::NotFound("a.txt".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = FileError::AlreadyExists("a.txt".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "already_exists");
    }

    #[test]
    fn test_unknown_agent_is_not_found() {
        let err: ApiError = DispatchError::UnknownAgent("ghost".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "unknown_agent");
    }

    #[test]
    fn test_body_shape() {
        let err = ApiError::bad_request("nope");
        let body = serde_json::to_value(&err.body).unwrap_or_default();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(body["error"]["message"], "nope");
    }
}
