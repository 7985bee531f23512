use thiserror::Error;

/// Result type alias for chat export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while locating, expanding, extracting or rendering a conversation
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to launch the browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Failed to connect to an existing browser
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    /// Tab creation, lookup or teardown failed
    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// JavaScript evaluation inside the page failed
    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The page snapshot could not be decoded
    #[error("Failed to parse DOM snapshot: {0}")]
    DomParseFailed(String),

    /// A selector path in the layout could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The chat message container is not present on the page
    #[error("Chat container not found on this page")]
    ContainerNotFound,

    /// The container holds no message that could be extracted
    #[error("No messages found in this conversation")]
    NoMessages,

    /// Dispatching the activation event on a unit failed
    #[error("Failed to activate message: {0}")]
    ActivationFailed(String),

    /// A unit did not leave its collapsed state in time
    #[error("Expansion timed out after {timeout_ms}ms ({failed} unit(s) left collapsed)")]
    ExpansionTimeout { timeout_ms: u64, failed: usize },

    /// A single unit's content could not be read
    #[error("Failed to extract message: {0}")]
    ExtractionFailed(String),

    /// The document renderer rejected the content
    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    /// Configuration file could not be read or is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while saving the exported document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = ExportError::ExpansionTimeout {
            timeout_ms: 2000,
            failed: 1,
        };
        assert_eq!(err.to_string(), "Expansion timed out after 2000ms (1 unit(s) left collapsed)");
    }

    #[test]
    fn test_invalid_selector_message() {
        let err = ExportError::InvalidSelector {
            selector: "div[".to_string(),
            reason: "unterminated attribute".to_string(),
        };
        assert!(err.to_string().contains("div["));
        assert!(err.to_string().contains("unterminated attribute"));
    }
}
