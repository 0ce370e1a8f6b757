//! HTTP surface: four multipart edit endpoints, the chat relay, and a health probe.
//!
//! Provider calls are blocking, so every dispatch runs on tokio's blocking pool.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use studio_contracts::chat::{ChatReply, Conversation};
use studio_contracts::errors::RelayError;
use studio_contracts::operations::{EditForm, EditResponse, Operation};
use studio_engine::{ChatRelay, EditDispatcher};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EditDispatcher>,
    pub relay: Arc<ChatRelay>,
    pub started_at: String,
}

impl AppState {
    pub fn new(dispatcher: EditDispatcher, relay: ChatRelay) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            relay: Arc::new(relay),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    // The `/api/*` paths are the ones the bundled front end calls.
    let edits = Router::new()
        .route("/edit-remove-bg", post(remove_background))
        .route("/edit-resize", post(resize))
        .route("/edit-prompt", post(prompt_edit))
        .route("/edit-expand", post(expand))
        .route("/api/remove-bg", post(remove_background))
        .route("/api/resize", post(resize))
        .route("/api/edit", post(prompt_edit))
        .route("/api/expand", post(expand))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .merge(edits)
        .route("/chat", post(chat))
        .route("/api/code-chat", post(chat))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn remove_background(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    run_edit(state, Operation::RemoveBackground, multipart).await
}

async fn resize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    run_edit(state, Operation::Resize, multipart).await
}

async fn prompt_edit(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    run_edit(state, Operation::PromptEdit, multipart).await
}

async fn expand(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    run_edit(state, Operation::Expand, multipart).await
}

async fn run_edit(
    state: AppState,
    operation: Operation,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    let multipart = multipart.map_err(|rejection| ApiError::Rejected {
        status: StatusCode::BAD_REQUEST,
        message: rejection.body_text(),
    })?;
    let form = read_edit_form(multipart).await?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("edit", %request_id, operation = operation.id());
    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        dispatcher.dispatch(operation, form)
    })
    .await
    .map_err(|err| {
        tracing::error!(%request_id, error = %err, "edit task did not complete");
        RelayError::Unexpected(operation.spec().failure_message.to_string())
    })?;
    Ok(Json(outcome?))
}

async fn read_edit_form(mut multipart: Multipart) -> Result<EditForm, ApiError> {
    let mut form = EditForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => form.image = Some(field.bytes().await?.to_vec()),
            "prompt" => form.prompt = Some(field.text().await?),
            "width" => form.width = Some(field.text().await?),
            "height" => form.height = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<Conversation>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(conversation) = payload.map_err(|rejection| {
        RelayError::bad_input(format!("Invalid chat request: {}", rejection.body_text()))
    })?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id, messages = conversation.len());
    let relay = state.relay.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        relay.relay(&conversation)
    })
    .await
    .map_err(|err| {
        tracing::error!(%request_id, error = %err, "chat task did not complete");
        RelayError::Unexpected("Failed to generate content".to_string())
    })?;
    Ok(Json(outcome?))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    started_at: String,
    image_provider: String,
    image_model: String,
    chat_provider: String,
    chat_model: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.clone(),
        image_provider: state.dispatcher.provider_name().to_string(),
        image_model: state.dispatcher.model().to_string(),
        chat_provider: state.relay.provider_name().to_string(),
        chat_model: state.relay.model().to_string(),
    })
}
