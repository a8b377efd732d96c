use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ChatError, DEFAULT_SERVER_ERROR};

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: &'a str,
}

/// Talks to the remote chat endpoint. One POST per message, no retries.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    url: String,
    session_id: String,
}

impl ChatClient {
    pub fn new(url: &str, session_id: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            session_id: session_id.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn send(&self, message: &str) -> Result<String, ChatError> {
        let request = ChatRequest {
            message,
            session_id: &self.session_id,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "chat endpoint replied");

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| ChatError::Transport(format!("malformed body: {}", e)))?;
        if data.is_null() {
            return Err(ChatError::Transport("empty JSON body".to_string()));
        }

        if status.is_success() {
            if let Some(text) = data.get("response").and_then(field_text) {
                return Ok(text);
            }
        }

        let message = data
            .get("error")
            .and_then(field_text)
            .unwrap_or_else(|| DEFAULT_SERVER_ERROR.to_string());
        warn!(%status, error = %message, "chat endpoint reported failure");
        Err(ChatError::Server(message))
    }
}

/// Text of a reply field, or None when the field is empty or falsy
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
