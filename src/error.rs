use thiserror::Error;

/// Shown in place of the reply when the request never produced a usable body
pub const CONNECTION_FAILED: &str = "Sorry, the connection failed. Check the server.";

/// Used when the server reports failure without saying why
pub const DEFAULT_SERVER_ERROR: &str = "Failed to connect to the server.";

/// Why a send did not produce a reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The request went through but the server signalled failure or
    /// left out the `response` field
    #[error("server error: {0}")]
    Server(String),

    /// Network failure or a body that could not be parsed
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChatError {
    /// Text that replaces the placeholder bubble
    pub fn bubble_text(&self) -> String {
        match self {
            ChatError::Server(message) => format!("Error: {}", message),
            ChatError::Transport(_) => CONNECTION_FAILED.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_text() {
        let err = ChatError::Server("bad session".to_string());
        assert_eq!(err.bubble_text(), "Error: bad session");
    }

    #[test]
    fn test_transport_error_hides_cause() {
        let err = ChatError::Transport("connection refused".to_string());
        assert_eq!(err.bubble_text(), CONNECTION_FAILED);
        assert!(err.to_string().contains("connection refused"));
    }
}
