use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow, bail};

use crate::ai::{gemini::GEMINI_API_URL, ollama::OLLAMA_URL, Provider};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/chat";
pub const DEFAULT_SESSION_ID: &str = "chat_session_user_001";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// On-disk configuration. Every field is optional; missing ones fall back
/// to the defaults above.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    // Client
    pub backend_url: Option<String>,
    pub session_id: Option<String>,

    // Server
    pub bind: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_url: Option<String>,
    pub ollama_url: Option<String>,
}

/// Values the bridge runs with. Resolved once at startup and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub session_id: String,
}

/// Values the chat endpoint server runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSettings {
    pub bind: SocketAddr,
    pub provider: Provider,
    pub model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_url: String,
    pub ollama_url: String,
}

/// Command-line values for `serve`; each wins over the config file
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`, or from the default location when `path` is None.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config: {}", config_path.display()))?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the file values
    pub fn resolve(&self, url: Option<String>, session: Option<String>) -> Settings {
        Settings {
            backend_url: url
                .or_else(|| self.backend_url.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            session_id: session
                .or_else(|| self.session_id.clone())
                .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()),
        }
    }

    /// Resolve server settings. `env_api_key` is the GEMINI_API_KEY value,
    /// which takes precedence over the file. Gemini without a key is an error.
    pub fn resolve_serve(&self, overrides: ServeOverrides, env_api_key: Option<String>) -> Result<ServeSettings> {
        let bind_str = overrides
            .bind
            .or_else(|| self.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .with_context(|| format!("Invalid bind address: {}", bind_str))?;

        let provider = match overrides.provider.or_else(|| self.provider.clone()) {
            Some(name) => Provider::from_str(&name)
                .ok_or_else(|| anyhow!("Unknown provider '{}' (expected gemini or ollama)", name))?,
            None => Provider::Gemini,
        };

        let gemini_api_key = env_api_key
            .filter(|k| !k.is_empty())
            .or_else(|| self.gemini_api_key.clone());
        if provider == Provider::Gemini && gemini_api_key.is_none() {
            bail!("GEMINI_API_KEY environment variable not set (or set gemini_api_key in the config file)");
        }

        Ok(ServeSettings {
            bind,
            provider,
            model: overrides
                .model
                .or_else(|| self.model.clone())
                .unwrap_or_else(|| provider.default_model().to_string()),
            gemini_api_key,
            gemini_url: self.gemini_url.clone().unwrap_or_else(|| GEMINI_API_URL.to_string()),
            ollama_url: self.ollama_url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
        })
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatbridge").join("config.json"))
    }
}

/// Where the TUI writes its log, since stderr belongs to the terminal UI
pub fn log_file_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join("chatbridge").join("chatbridge.log"))
}
