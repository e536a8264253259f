//! The conversation API: register, login, chat, logout.
//!
//! Chat turns are serialized per session through the [`SessionRegistry`]
//! lock, and both sides of a turn are persisted whatever the outcome, so a
//! fallback reply is part of the durable history like any other.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use maitred_agent::runtime::{AgentRuntime, TraceEvent};
use maitred_core::domain::chat::ChatHistory;
use maitred_core::domain::user::User;
use maitred_db::repositories::{
    ChatSessionRepository, RepositoryError, SessionRecord, UserRepository,
};

use crate::auth;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    users: Arc<dyn UserRepository>,
    chat_sessions: Arc<dyn ChatSessionRepository>,
    runtime: Arc<AgentRuntime>,
    registry: SessionRegistry,
    include_trace: bool,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        chat_sessions: Arc<dyn ChatSessionRepository>,
        runtime: Arc<AgentRuntime>,
        registry: SessionRegistry,
        include_trace: bool,
    ) -> Self {
        Self { users, chat_sessions, runtime, registry, include_trace }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/chat", post(chat))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("unknown or expired session")]
    UnknownSession,
    #[error("internal error")]
    Internal(#[from] RepositoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UsernameTaken(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::UnknownSession => StatusCode::UNAUTHORIZED,
            Self::Internal(source) => {
                error!(%source, "request failed on a storage error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = request.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::Validation("username must be 1-64 characters".to_string()));
    }
    if request.password.len() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters".to_string()));
    }

    let hash = auth::hash_credential(username, &request.password);
    let user = state.users.create(username, &hash).await.map_err(|error| match error {
        RepositoryError::DuplicateUsername(name) => ApiError::UsernameTaken(name),
        other => ApiError::Internal(other),
    })?;

    info!(user_id = user.id.0, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id: user.id.0, username: user.username }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .users
        .find_by_username(request.username.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !auth::verify_credential(&user.username, &request.password, &user.credential_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let session_id = SessionRegistry::issue_session_id();
    let now = Utc::now();
    // One durable history per user: a fresh login re-attaches the existing
    // history under a new session id and retires the old id.
    let record = match state.chat_sessions.find_for_user(user.id).await? {
        Some(mut existing) => {
            state.registry.evict(&existing.session_id).await;
            existing.session_id = session_id.clone();
            existing.updated_at = now;
            existing
        }
        None => SessionRecord {
            session_id: session_id.clone(),
            owner: user.id,
            history: ChatHistory::new(),
            created_at: now,
            updated_at: now,
        },
    };
    state.chat_sessions.save(record).await?;
    state.registry.admit(&session_id, user.id).await;

    info!(user_id = user.id.0, "session opened");
    Ok(Json(LoginResponse { session_id }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEvent>>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }

    // Sessions outlive the process; re-admit ones we have not seen yet.
    let handle = match state.registry.resolve(&request.session_id).await {
        Some(handle) => handle,
        None => {
            let record = state
                .chat_sessions
                .find(&request.session_id)
                .await?
                .ok_or(ApiError::UnknownSession)?;
            state.registry.admit(&request.session_id, record.owner).await
        }
    };

    let _turn = handle.turn_lock.lock().await;

    let mut record = state
        .chat_sessions
        .find(&request.session_id)
        .await?
        .ok_or(ApiError::UnknownSession)?;
    let user: User =
        state.users.find_by_id(record.owner).await?.ok_or(ApiError::UnknownSession)?;

    let outcome = state.runtime.respond(&user, &record.history, message).await;

    record.history.push_human(message);
    record.history.push_agent(&outcome.reply);
    record.updated_at = Utc::now();
    state.chat_sessions.save(record).await?;

    Ok(Json(ChatResponse {
        response: outcome.reply,
        trace: state.include_trace.then_some(outcome.trace),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_id: String,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Result<StatusCode, ApiError> {
    state.registry.evict(&request.session_id).await;
    state.chat_sessions.delete(&request.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
