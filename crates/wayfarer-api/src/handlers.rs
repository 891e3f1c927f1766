//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path and body parameters via axum extractors,
//! calls into the dialogue orchestrator and returns JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use wayfarer_chat::{ModeRequest, ProviderToggles, SessionSummary, TurnOptions, TurnOutcome};
use wayfarer_core::types::{DialogueState, Session, SessionId, TravelMode, Turn};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Optional per-turn overrides accepted by both message endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TurnOverrides {
    /// Destination to use instead of one found in the message.
    pub city: Option<String>,
    /// `chat`, `day_plan` or `multi_day`.
    pub mode: Option<String>,
    /// Trip length for `multi_day`.
    pub days: Option<u8>,
    pub use_web: Option<bool>,
    pub use_weather: Option<bool>,
    pub use_events: Option<bool>,
}

impl TurnOverrides {
    fn into_options(self) -> Result<TurnOptions, ApiError> {
        let mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_mode(raw, self.days)?),
        };
        Ok(TurnOptions {
            city: self.city,
            mode,
            providers: ProviderToggles {
                weather: self.use_weather.unwrap_or(true),
                events: self.use_events.unwrap_or(true),
                search: self.use_web.unwrap_or(true),
            },
        })
    }
}

/// Body for POST /sessions/{id}/turns.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(flatten)]
    pub overrides: TurnOverrides,
}

/// Body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted on first contact; a new session is created.
    pub session_id: Option<String>,
    pub message: String,
    #[serde(flatten)]
    pub overrides: TurnOverrides,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Full snapshot of one session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: SessionId,
    pub state: DialogueState,
    pub city: Option<String>,
    pub mode: TravelMode,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl From<Session> for SessionDetail {
    fn from(session: Session) -> Self {
        Self {
            state: session.state(),
            id: session.id,
            city: session.city,
            mode: session.mode,
            turns: session.turns,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("'{}' is not a valid session id", raw)))
}

fn parse_mode(raw: &str, days: Option<u8>) -> Result<ModeRequest, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "chat" => Ok(ModeRequest::Chat),
        "day_plan" | "one_day" => Ok(ModeRequest::OneDay),
        "multi_day" => Ok(ModeRequest::MultiDay {
            days: days.filter(|d| *d > 0),
        }),
        other => Err(ApiError::BadRequest(format!(
            "unknown mode '{}'; expected chat, day_plan or multi_day",
            other
        ))),
    }
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.store().len(),
    })
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /sessions - open a new conversation.
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.orchestrator.start_session();
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// GET /sessions - summaries of live sessions.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let mut sessions = state.store().list();
    sessions.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
    Json(SessionListResponse { sessions })
}

/// GET /sessions/{id} - session snapshot including the transcript.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.store().get(id)?;
    Ok(Json(session.into()))
}

/// DELETE /sessions/{id} - discard a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.store().remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Turns
// =============================================================================

/// POST /sessions/{id}/turns - send one message to an existing session.
pub async fn post_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let id = parse_session_id(&id)?;
    let Json(body) = body?;
    let options = body.overrides.into_options()?;
    let outcome = state
        .orchestrator
        .handle_turn_with(id, &body.message, &options)
        .await?;
    Ok(Json(outcome))
}

/// POST /chat - send a message, creating a session on first contact.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let Json(body) = body?;
    let options = body.overrides.into_options()?;
    let id = match body.session_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_session_id(raw)?,
        _ => {
            let id = state.orchestrator.start_session();
            info!(session_id = %id, "Session created on first contact");
            id
        }
    };
    let outcome = state
        .orchestrator
        .handle_turn_with(id, &body.message, &options)
        .await?;
    Ok(Json(outcome))
}
