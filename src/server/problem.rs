//! RFC 7807 problem documents for failed requests.

use crate::error::SearchGptError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Problem details body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

impl ProblemDetails {
    pub fn new(status: StatusCode, detail: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            kind: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: status.canonical_reason().unwrap_or("Unknown").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: instance.into(),
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Build and log the problem for an error raised while serving `instance`.
    pub fn from_error(err: &SearchGptError, instance: &str) -> Self {
        let problem = Self::new(status_for(err), err.to_string(), instance);
        error!(
            trace_id = %problem.trace_id,
            status = problem.status,
            "Request to {} failed: {}",
            instance,
            err
        );
        problem
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// HTTP status for an error. Only caller mistakes are 4xx.
pub fn status_for(err: &SearchGptError) -> StatusCode {
    match err {
        SearchGptError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            Json(self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_bad_request() {
        let err = SearchGptError::InvalidInput("Message must not be empty".to_string());
        let problem = ProblemDetails::from_error(&err, "/api/chat/ask");

        assert_eq!(problem.status, 400);
        assert_eq!(problem.kind, "https://httpstatuses.io/400");
        assert_eq!(problem.title, "Bad Request");
        assert_eq!(problem.instance, "/api/chat/ask");
        assert!(problem.detail.contains("Message must not be empty"));
        assert!(Uuid::parse_str(&problem.trace_id).is_ok());
    }

    #[test]
    fn test_upstream_failures_are_internal_errors() {
        let err = SearchGptError::Search("Search request failed with status 403".to_string());
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);

        let err = SearchGptError::OpenAI("rate limited".to_string());
        let problem = ProblemDetails::from_error(&err, "/api/chat/stream");
        assert_eq!(problem.title, "Internal Server Error");
    }

    #[test]
    fn test_serialized_field_names() {
        let problem = ProblemDetails::new(StatusCode::BAD_REQUEST, "bad", "/x");
        let value = serde_json::to_value(&problem).unwrap();

        assert_eq!(value["type"], "https://httpstatuses.io/400");
        assert!(value.get("traceId").is_some());
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_response_content_type() {
        let response = ProblemDetails::new(StatusCode::BAD_REQUEST, "bad", "/x").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }
}
