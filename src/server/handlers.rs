//! Request handlers for the chat API.

use super::problem::ProblemDetails;
use crate::conversation::ConversationId;
use crate::error::SearchGptError;
use crate::rag::{ChatRequest, ChatResponse, ChatService};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared application state.
pub struct AppState {
    pub service: ChatService,
}

#[derive(Serialize)]
struct DeltaEvent<'a> {
    text: &'a str,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ProblemDetails> {
    let Json(request) = body.map_err(|e| rejected(&e, &uri))?;

    let response = state
        .service
        .ask(&request)
        .await
        .map_err(|e| ProblemDetails::from_error(&e, uri.path()))?;

    Ok(Json(response))
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ProblemDetails> {
    let Json(request) = body.map_err(|e| rejected(&e, &uri))?;
    let conversation = request.conversation_id;

    let chunks = state
        .service
        .ask_stream(request, None)
        .await
        .map_err(|e| ProblemDetails::from_error(&e, uri.path()))?;

    info!("SSE client connected for conversation {}", conversation);
    let instance = uri.path().to_string();

    // Dropping the response body on disconnect drops the upstream completion.
    let events = chunks.map(move |chunk| match chunk {
        Ok(text) => {
            debug!("SSE delta ({} bytes) for conversation {}", text.len(), conversation);
            Event::default().event("delta").json_data(DeltaEvent { text: &text })
        }
        Err(e) => {
            let problem = ProblemDetails::from_error(&e, &instance);
            Event::default().event("error").json_data(problem)
        }
    });

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response())
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ProblemDetails> {
    let id = conversation_id
        .parse::<ConversationId>()
        .map_err(|e| ProblemDetails::from_error(&e, uri.path()))?;

    state
        .service
        .delete(id)
        .await
        .map_err(|e| ProblemDetails::from_error(&e, uri.path()))?;

    Ok(StatusCode::NO_CONTENT)
}

fn rejected(rejection: &JsonRejection, uri: &Uri) -> ProblemDetails {
    let err = SearchGptError::InvalidInput(rejection.body_text());
    ProblemDetails::from_error(&err, uri.path())
}
