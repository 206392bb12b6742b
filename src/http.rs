//! HTTP API and Prometheus metrics endpoint.
//!
//! Runs on a separate tokio task next to the WebSocket gateway:
//!
//! - `POST /api/users?userId=&displayName=` - create or replace a user
//! - `DELETE /api/users/{userId}` - delete a user
//! - `POST /api/message?content=&senderId=&receiverId=` - store a message
//! - `GET /api/message?userId=` - chat history for a user
//! - `GET /api/presence` - users with a live session
//! - `GET /metrics` - Prometheus text format
//!
//! Messages posted here are stored but not pushed to live sessions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use cipher_proto::ServerFrame;
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::db::{Database, DbError, HistoryRecord};
use crate::session::SessionManager;
use crate::store::{NewMessage, UserProfile};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub db: Database,
    pub sessions: Arc<SessionManager>,
}

/// Errors returned by API handlers, rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(e) => {
                error!(error = %e, "API request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match &self {
            Self::Database(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserParams {
    user_id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostMessageParams {
    content: String,
    sender_id: String,
    receiver_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryParams {
    user_id: String,
}

/// Build the API router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/:user_id", delete(delete_user))
        .route("/api/message", post(post_message).get(fetch_messages))
        .route("/api/presence", get(presence))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn create_user(
    State(state): State<HttpState>,
    Query(params): Query<CreateUserParams>,
) -> Result<Json<UserProfile>, ApiError> {
    if params.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId must not be empty".into()));
    }
    let profile = state
        .db
        .users()
        .upsert(&params.user_id, &params.display_name)
        .await?;
    info!(user_id = %profile.user_id, "User upserted");
    Ok(Json(profile))
}

async fn delete_user(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.db.users().delete(&user_id).await {
        Ok(()) => {
            info!(user_id = %user_id, "User deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(DbError::UserNotFound(id)) => Err(ApiError::NotFound(format!("User {id} not found"))),
        Err(e) => Err(e.into()),
    }
}

async fn find_user(db: &Database, user_id: &str) -> Result<UserProfile, ApiError> {
    db.users()
        .find(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))
}

async fn post_message(
    State(state): State<HttpState>,
    Query(params): Query<PostMessageParams>,
) -> Result<Json<Value>, ApiError> {
    if params.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".into()));
    }
    let limit = state.sessions.policy().max_content_length;
    if params.content.chars().count() > limit {
        return Err(ApiError::BadRequest(format!(
            "content longer than {limit} characters"
        )));
    }

    let sender = find_user(&state.db, &params.sender_id).await?;
    let receiver = find_user(&state.db, &params.receiver_id).await?;

    let stored = state
        .db
        .messages()
        .insert(&NewMessage {
            sender_id: sender.user_id.clone(),
            receiver_id: receiver.user_id.clone(),
            content: params.content,
            timestamp: Utc::now(),
        })
        .await?;
    crate::metrics::inc_persisted();

    info!(
        from = %sender.display_name,
        to = %receiver.display_name,
        message_id = stored.id,
        "Message stored via HTTP"
    );

    let record = HistoryRecord {
        sender,
        receiver,
        content: stored.content,
        timestamp: stored.timestamp,
    };
    Ok(Json(json!({ "message": record })))
}

/// History is read from the joined view rather than `MessageStore::range`,
/// since each record carries both participants' profiles.
async fn fetch_messages(
    State(state): State<HttpState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let chat_history = state.db.messages().history_for(&params.user_id).await?;
    info!(user_id = %params.user_id, count = chat_history.len(), "History fetched");
    Ok(Json(json!({ "chat_history": chat_history })))
}

async fn presence(State(state): State<HttpState>) -> Json<ServerFrame> {
    Json(state.sessions.presence().frame().await)
}

/// Run the HTTP server.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, state: HttpState) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    info!(%addr, "HTTP API listening");

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!(error = %e, "HTTP server error");
    }
}
