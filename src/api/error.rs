use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::EngineError;

/// Error payload returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable kind, present when the failure is a known
    /// schedule-data condition rather than an internal fault
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Log the fault and answer 500 without leaking details.
pub fn internal_error<E: std::fmt::Display>(error: E) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %error, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
            kind: None,
        }),
    )
}

/// 404 with a short subject, e.g. "Route not found".
pub fn not_found(subject: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{subject} not found"),
            kind: None,
        }),
    )
}

/// Map an engine failure: schedule-data conditions answer 422 and carry
/// their kind, database faults stay internal.
pub fn engine_error(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    match error {
        EngineError::Database(_) => internal_error(error),
        condition => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: condition.to_string(),
                kind: Some(condition.kind().to_string()),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_conditions_answer_422_with_kind() {
        let (status, body) = engine_error(EngineError::NoScheduleWindow);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind.as_deref(), Some("no-schedule-window"));

        let (status, body) = engine_error(EngineError::InsufficientGeometry);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind.as_deref(), Some("insufficient-geometry"));
    }

    #[test]
    fn database_faults_stay_internal() {
        let (status, body) = engine_error(EngineError::Database(sqlx::Error::PoolClosed));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.kind.is_none());
    }

    #[test]
    fn kind_is_omitted_from_json_when_absent() {
        let body = serde_json::to_string(&ErrorResponse {
            error: "Route not found".to_string(),
            kind: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"error":"Route not found"}"#);
    }
}
