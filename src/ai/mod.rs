//! Model providers behind the chat endpoint

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use anyhow::{Result, anyhow};

use crate::config::ServeSettings;
use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Provider::Gemini),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Ollama => "llama3.2:latest",
        }
    }
}

/// The model a server answers with. `history` ends with the new user turn.
#[derive(Clone)]
pub enum ModelClient {
    Gemini(GeminiClient),
    Ollama(OllamaClient),
}

impl ModelClient {
    pub fn from_settings(settings: &ServeSettings) -> Result<Self> {
        match settings.provider {
            Provider::Gemini => {
                let api_key = settings
                    .gemini_api_key
                    .as_deref()
                    .ok_or_else(|| anyhow!("Gemini API key not configured"))?;
                Ok(ModelClient::Gemini(GeminiClient::new(&settings.gemini_url, api_key, &settings.model)))
            }
            Provider::Ollama => Ok(ModelClient::Ollama(OllamaClient::new(&settings.ollama_url, &settings.model))),
        }
    }

    pub async fn reply(&self, history: &[ChatMessage]) -> Result<String> {
        match self {
            ModelClient::Gemini(client) => client.reply(history).await,
            ModelClient::Ollama(client) => client.reply(history).await,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ModelClient::Gemini(_) => Provider::Gemini,
            ModelClient::Ollama(_) => Provider::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ModelClient::Gemini(client) => client.model(),
            ModelClient::Ollama(client) => client.model(),
        }
    }
}
