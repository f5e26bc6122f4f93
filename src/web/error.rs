//! JSON error responses for the API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;

use crate::sync::EnqueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidTarget,
    InvalidPort,
    InvalidJobId,
    JobNotFound,
    SyncInProgress,
    QueueClosed,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidTarget | ApiErrorCode::InvalidPort | ApiErrorCode::InvalidJobId => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::JobNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::SyncInProgress => StatusCode::CONFLICT,
            ApiErrorCode::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// Extra fields merged into the error object, e.g. the conflicting job id.
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }
}

impl From<EnqueueError> for ApiError {
    fn from(err: EnqueueError) -> Self {
        match err {
            EnqueueError::SyncInProgress { job_id } => Self {
                code: ApiErrorCode::SyncInProgress,
                message: err.to_string(),
                details: Some(json!({ "job_id": job_id })),
            },
            EnqueueError::QueueClosed => Self::new(ApiErrorCode::QueueClosed, err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if let (Some(serde_json::Value::Object(extra)), Some(obj)) =
            (self.details, error.as_object_mut())
        {
            obj.extend(extra);
        }
        (self.code.status(), Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::JobId;

    #[test]
    fn test_conflict_carries_job_id() {
        let job_id = JobId::new();
        let err = ApiError::from(EnqueueError::SyncInProgress { job_id });
        assert_eq!(err.code, ApiErrorCode::SyncInProgress);
        assert_eq!(err.code.status(), StatusCode::CONFLICT);
        assert_eq!(err.details, Some(json!({ "job_id": job_id.to_string() })));
    }
}
