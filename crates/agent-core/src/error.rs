//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Classification tag carried by every error that can leave the agent loop.
///
/// Callers pick a remedy from the kind alone: reset the conversation
/// (`State`), retry later (`Network`), reconfigure (`Config`), or report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    State,
    Network,
    Config,
    Generic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::State => write!(f, "state"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Generic => write!(f, "generic"),
        }
    }
}

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Provider rejected the request because of turn ordering or argument shape
    #[error("Conversation state rejected by provider: {0}")]
    ConversationState(String),

    /// State errors persisted after every reset-and-retry attempt
    #[error("Conversation state could not be recovered after {attempts} attempts: {last}")]
    Unrecoverable { attempts: usize, last: String },

    /// Connectivity failure talking to the provider
    #[error("Network error: {0}")]
    Network(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration error (unsupported backend, missing key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Parse error (e.g., malformed provider payload)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AgentError {
    /// Classification used by the agent loop and by hosts
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::ConversationState(_) | AgentError::Unrecoverable { .. } => ErrorKind::State,
            AgentError::Network(_) => ErrorKind::Network,
            AgentError::Config(_) | AgentError::Auth(_) => ErrorKind::Config,
            _ => ErrorKind::Generic,
        }
    }

    /// Whether the loop may reset history and try again
    pub fn is_state_error(&self) -> bool {
        matches!(self, AgentError::ConversationState(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::ConversationState(_) => {
                "The conversation got out of sync with the AI service. Retrying...".into()
            }
            AgentError::Unrecoverable { .. } => {
                "The conversation state could not be recovered. Please start a new conversation.".into()
            }
            AgentError::Network(_) => {
                "Could not reach the AI service. Check your network connection and try again.".into()
            }
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your API key.".into(),
            AgentError::Config(msg) => format!("The agent is misconfigured: {}", msg),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::Parse(_) => "The AI service sent a response that could not be read.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(AgentError::ConversationState("x".into()).kind(), ErrorKind::State);
        assert_eq!(
            AgentError::Unrecoverable { attempts: 3, last: "x".into() }.kind(),
            ErrorKind::State
        );
        assert_eq!(AgentError::Network("down".into()).kind(), ErrorKind::Network);
        assert_eq!(AgentError::Config("nope".into()).kind(), ErrorKind::Config);
        assert_eq!(AgentError::Provider("500".into()).kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_only_conversation_state_is_retried() {
        assert!(AgentError::ConversationState("bad order".into()).is_state_error());
        assert!(!AgentError::Unrecoverable { attempts: 3, last: "x".into() }.is_state_error());
        assert!(!AgentError::Network("down".into()).is_state_error());
    }
}
