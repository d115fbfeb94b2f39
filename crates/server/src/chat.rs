//! Chat boundary routes.
//!
//! - `POST /start` — open a session for a subject, returning the session id
//!   and an opening greeting
//! - `POST /chat`  — send one turn for an existing session
//!
//! Malformed input and unknown sessions return 400 with an explicit error
//! code; an abandoned turn (whole-turn deadline exceeded) returns 500. The
//! agent itself never fails a turn, so nothing else maps to 5xx here.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use clinichat_agent::authorizer::is_valid_subject_id;
use clinichat_agent::AgentRuntime;
use clinichat_core::errors::BoundaryError;
use clinichat_core::messages;
use clinichat_core::session::{SessionId, SessionRecord, SessionStore};
use clinichat_core::InMemorySessionStore;

#[derive(Clone)]
pub struct ChatState {
    sessions: Arc<InMemorySessionStore>,
    runtime: Arc<AgentRuntime>,
    turn_deadline: Duration,
}

impl ChatState {
    pub fn new(
        sessions: Arc<InMemorySessionStore>,
        runtime: Arc<AgentRuntime>,
        turn_deadline: Duration,
    ) -> Self {
        Self { sessions, runtime, turn_deadline }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub subject_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: String,
    pub response: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TurnRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn from_boundary(error: &BoundaryError) -> Self {
        Self { error: error.user_message().to_string(), code: error.code().to_string() }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/start", post(start_session))
        .route("/chat", post(send_turn))
        .with_state(state)
}

pub async fn start_session(
    State(state): State<ChatState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let subject_id = match request.subject_id {
        Some(subject_id) => {
            if !is_valid_subject_id(&subject_id) {
                let error = BoundaryError::BadRequest {
                    message: "subject_id is malformed".to_string(),
                };
                warn!(
                    event_name = "server.chat.start_rejected",
                    correlation_id = %correlation_id,
                    code = error.code(),
                    "session start rejected"
                );
                return Err((StatusCode::BAD_REQUEST, Json(ApiError::from_boundary(&error))));
            }
            subject_id
        }
        None => String::new(),
    };

    let session_id = SessionId::generate();
    let greeting = if subject_id.is_empty() {
        messages::HOW_CAN_I_HELP.to_string()
    } else {
        // The opening greeting runs through the agent like any turn; if the
        // deadline fires we still open the session with the canned greeting.
        match tokio::time::timeout(
            state.turn_deadline,
            state.runtime.handle_turn(&subject_id, "שלום"),
        )
        .await
        {
            Ok(turn) => turn.final_answer,
            Err(_) => messages::GREETING_REPLY.to_string(),
        }
    };

    state.sessions.put(session_id.clone(), SessionRecord::new(subject_id));
    info!(
        event_name = "server.chat.session_started",
        correlation_id = %correlation_id,
        session_id = %session_id,
        "session started"
    );

    Ok(Json(StartResponse { session_id: session_id.to_string(), response: greeting }))
}

pub async fn send_turn(
    State(state): State<ChatState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let (session_id, message) = match (request.session_id, request.message) {
        (Some(session_id), Some(message))
            if !session_id.trim().is_empty() && !message.trim().is_empty() =>
        {
            (SessionId::from_raw(session_id), message)
        }
        _ => {
            let error = BoundaryError::BadRequest {
                message: "session_id and message are required".to_string(),
            };
            return Err((StatusCode::BAD_REQUEST, Json(ApiError::from_boundary(&error))));
        }
    };

    let Some(record) = state.sessions.get(&session_id) else {
        let error = BoundaryError::SessionNotFound { session_id: session_id.to_string() };
        warn!(
            event_name = "server.chat.session_not_found",
            correlation_id = %correlation_id,
            session_id = %session_id,
            "turn for unknown session"
        );
        return Err((StatusCode::BAD_REQUEST, Json(ApiError::from_boundary(&error))));
    };

    // Turns for the same session serialize; other sessions are unaffected.
    let guard = state.sessions.turn_guard(&session_id);
    let _serialized = match &guard {
        Some(lock) => Some(lock.lock().await),
        None => None,
    };

    match tokio::time::timeout(
        state.turn_deadline,
        state.runtime.handle_turn(&record.subject_id, &message),
    )
    .await
    {
        Ok(turn) => {
            state.sessions.record_turn(&session_id);
            info!(
                event_name = "server.chat.turn_completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                iteration = turn.iteration,
                "turn completed"
            );
            Ok(Json(TurnResponse { response: turn.final_answer }))
        }
        Err(_) => {
            // Abandoned turn: report a generic failure and leave the session
            // record untouched.
            warn!(
                event_name = "server.chat.turn_abandoned",
                correlation_id = %correlation_id,
                session_id = %session_id,
                deadline_secs = state.turn_deadline.as_secs(),
                "turn exceeded its deadline and was abandoned"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: messages::GENERIC_APOLOGY.to_string(),
                    code: "turn_deadline_exceeded".to_string(),
                }),
            ))
        }
    }
}
