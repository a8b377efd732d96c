//! The chat endpoint the client talks to.
//!
//! `POST /chat` takes `{ "message", "session_id" }`, appends the message to
//! that session's history, asks the model for a reply and answers with
//! `{ "response" }`, or `{ "error" }` with a 4xx/5xx status. Histories live
//! in memory for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::ai::ModelClient;
use crate::config::ServeSettings;
use crate::state::{ChatMessage, ChatRole};

/// Session used when a request carries no `session_id`
pub const DEFAULT_SERVER_SESSION: &str = "default_session";
pub const NO_MESSAGE_ERROR: &str = "No message provided";
pub const MODEL_FAILED_ERROR: &str = "Failed to get response from AI";

type History = Arc<Mutex<Vec<ChatMessage>>>;

pub struct ServerState {
    model: ModelClient,
    sessions: Mutex<HashMap<String, History>>,
}

impl ServerState {
    pub fn new(model: ModelClient) -> Self {
        Self {
            model,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// History for `session_id`, created empty on first use
    async fn session(&self, session_id: &str) -> History {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }
}

#[derive(Deserialize)]
struct ChatPayload {
    message: Option<String>,
    session_id: Option<String>,
}

pub fn create_app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/chat", post(chat_endpoint))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn error_reply(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

async fn chat_endpoint(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected chat request body");
            return error_reply(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let Some(message) = payload.message.filter(|m| !m.is_empty()) else {
        return error_reply(StatusCode::BAD_REQUEST, NO_MESSAGE_ERROR);
    };
    let session_id = payload
        .session_id
        .unwrap_or_else(|| DEFAULT_SERVER_SESSION.to_string());

    // Held across the model call so turns in one session stay ordered
    let session = state.session(&session_id).await;
    let mut history = session.lock().await;

    history.push(ChatMessage {
        role: ChatRole::Outgoing,
        text: message,
        pending: false,
    });

    match state.model.reply(&history).await {
        Ok(text) => {
            history.push(ChatMessage {
                role: ChatRole::Incoming,
                text: text.clone(),
                pending: false,
            });
            info!(session = %session_id, turns = history.len(), "chat reply sent");
            (StatusCode::OK, Json(json!({ "response": text })))
        }
        Err(e) => {
            // A failed turn is not kept in the history
            history.pop();
            error!(session = %session_id, error = %e, "model call failed");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, MODEL_FAILED_ERROR)
        }
    }
}

pub async fn run_server(settings: ServeSettings) -> Result<()> {
    let model = ModelClient::from_settings(&settings)?;
    info!(
        bind = %settings.bind,
        provider = model.provider().as_str(),
        model = model.model(),
        "starting chat server"
    );

    let app = create_app(Arc::new(ServerState::new(model)));

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind TCP listener to address {}", settings.bind))?;
    println!("Serving chat endpoint on http://{}/chat (Ctrl+C to stop)", settings.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
