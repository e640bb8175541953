use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tutor_core::{
    CallError, Conversation, ConversationState, Level, Subject, Turn, Tutor, TutorError,
    VisionClient,
};
use uuid::Uuid;

use crate::session::{Session, SessionStoreError, SessionStoreRef};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    tutor: Arc<Tutor>,
    vision: Arc<VisionClient>,
    sessions: SessionStoreRef,
}

impl AppState {
    pub fn new(tutor: Tutor, vision: VisionClient, sessions: SessionStoreRef) -> Self {
        Self {
            tutor: Arc::new(tutor),
            vision: Arc::new(vision),
            sessions,
        }
    }
}

#[derive(Deserialize)]
pub struct QuestionRequest {
    question: String,
}

#[derive(Deserialize)]
pub struct StudyPlanRequest {
    subject: Subject,
    level: Level,
    #[serde(default)]
    prior_performance: Option<String>,
}

#[derive(Deserialize)]
pub struct TranscribeRequest {
    image_base64: String,
    mime_type: String,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Serialize)]
pub struct SessionCreated {
    session_id: String,
}

#[derive(Serialize)]
pub struct SessionSummary {
    session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            updated_at: session.updated_at,
            expires_at: session.expires_at,
        }
    }
}

/// Snapshot of a session's conversation
#[derive(Serialize)]
pub struct SessionView {
    session_id: String,
    state: ConversationState,
    base_resolution: Option<String>,
    history: Vec<Turn>,
}

impl SessionView {
    fn new(session_id: &str, conversation: &Conversation) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: conversation.state(),
            base_resolution: conversation.base_resolution().map(str::to_string),
            history: conversation.history().to_vec(),
        }
    }
}

/// Model answer. `error` is set when the answer text is an inline failure message.
#[derive(Serialize)]
pub struct AnswerResponse {
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct TranscriptionResponse {
    text: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(String),
    SessionBusy(String),
    BadRequest(String),
    Storage(String),
    Tutor(TutorError),
}

impl From<TutorError> for ApiError {
    fn from(e: TutorError) -> Self {
        ApiError::Tutor(e)
    }
}

impl From<CallError> for ApiError {
    fn from(e: CallError) -> Self {
        ApiError::Tutor(TutorError::Call(e))
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound(_) => ApiError::SessionNotFound(e.to_string()),
            SessionStoreError::StorageError(_) => ApiError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SessionNotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::SessionBusy(id) => (
                StatusCode::CONFLICT,
                format!("Session {} is still waiting for an answer", id),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Storage(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Tutor(TutorError::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Tutor(TutorError::InvalidState(message)) => (StatusCode::CONFLICT, message),
            // Only the vision client can be unconfigured once the daemon is up
            ApiError::Tutor(TutorError::Call(CallError::Unconfigured)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Image transcription is disabled: TUTOR_VISION_API_KEY is not set".to_string(),
            ),
            ApiError::Tutor(TutorError::Call(e)) => (StatusCode::BAD_GATEWAY, e.user_message()),
            ApiError::Tutor(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/submit", post(submit_question))
        .route("/sessions/:id/ask", post(ask_follow_up))
        .route("/sessions/:id/reset", post(reset_session))
        .route("/study-plan", post(study_plan))
        .route("/transcribe", post(transcribe))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "Exam tutor is running"
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let session = state
        .sessions
        .create_session(Uuid::new_v4().to_string())
        .await?;
    info!(session_id = %session.id, "Session created");
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id,
        }),
    ))
}

/// Live sessions, oldest first
async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let mut sessions = state.sessions.list_sessions().await?;
    sessions.sort_by_key(|session| session.created_at);
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    let conversation = session.conversation.lock().await;
    Ok(Json(SessionView::new(&session.id, &conversation)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.delete_session(&session_id).await?;
    info!(session_id = %session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    let mut conversation = session
        .conversation
        .try_lock()
        .map_err(|_| ApiError::SessionBusy(session_id.clone()))?;

    let result = state.tutor.submit(&mut conversation, &payload.question).await;
    drop(conversation);

    // A failed attempt still counts as activity
    state.sessions.touch_session(&session_id).await?;
    let answer = result?;
    Ok(Json(AnswerResponse {
        answer,
        error: None,
    }))
}

async fn ask_follow_up(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    let mut conversation = session
        .conversation
        .try_lock()
        .map_err(|_| ApiError::SessionBusy(session_id.clone()))?;

    let result = state.tutor.ask(&mut conversation, &payload.question).await;
    drop(conversation);

    state.sessions.touch_session(&session_id).await?;
    let reply = result?;
    Ok(Json(AnswerResponse {
        answer: reply.text,
        error: reply.failure.map(|e| e.to_string()),
    }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    session.conversation.lock().await.reset();
    state.sessions.touch_session(&session_id).await?;
    info!(session_id = %session_id, "Session reset");
    Ok(StatusCode::NO_CONTENT)
}

async fn study_plan(
    State(state): State<AppState>,
    Json(payload): Json<StudyPlanRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let plan = state
        .tutor
        .study_plan(
            payload.subject,
            payload.level,
            payload.prior_performance.as_deref(),
        )
        .await?;
    Ok(Json(AnswerResponse {
        answer: plan,
        error: None,
    }))
}

async fn transcribe(
    State(state): State<AppState>,
    Json(payload): Json<TranscribeRequest>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    if !payload.mime_type.starts_with("image/") {
        return Err(ApiError::BadRequest(format!(
            "Unsupported mime type: {}",
            payload.mime_type
        )));
    }
    let image = STANDARD
        .decode(payload.image_base64.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image: {}", e)))?;

    let text = state
        .vision
        .transcribe(&image, &payload.mime_type, payload.instruction.as_deref())
        .await?;
    Ok(Json(TranscriptionResponse { text }))
}
