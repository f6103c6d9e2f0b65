//! Unified error types for the harness

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reference matched nothing before the deadline
    #[error("Element not found within {timeout_ms}ms: {reference}")]
    ElementNotFound { reference: String, timeout_ms: u64 },

    /// A strict reference matched more than one element
    #[error("Ambiguous match: {reference} resolved to {count} elements, expected exactly one")]
    AmbiguousMatch { reference: String, count: usize },

    /// The element exists but never became actionable
    #[error("Element not actionable within {timeout_ms}ms: {reference} ({reason})")]
    NotActionable {
        reference: String,
        reason: String,
        timeout_ms: u64,
    },

    /// An observed value differs from the expected one
    #[error("Assertion failed: {assertion} on {target}\n  expected: {expected}\n  actual:   {actual}")]
    AssertionFailure {
        assertion: String,
        target: String,
        expected: String,
        actual: String,
    },

    /// The success signal of an authenticate sequence never appeared
    #[error("Authentication timed out after {timeout_ms}ms waiting for {signal} (location: {location})")]
    AuthenticationTimeout {
        signal: String,
        location: String,
        timeout_ms: u64,
    },

    /// The site showed its failure signal instead of the success signal
    #[error("Authentication rejected at {location}: {message}")]
    AuthenticationRejected { location: String, message: String },

    /// Handle used after its session navigated away
    #[error("Stale handle: {reference} was resolved before the session navigated (epoch {resolved_epoch}, now {current_epoch})")]
    StaleHandle {
        reference: String,
        resolved_epoch: u64,
        current_epoch: u64,
    },

    /// Session already torn down
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Outer test budget exhausted
    #[error("Test exceeded its time budget of {0}ms")]
    TestTimeout(u64),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(reference: S, timeout_ms: u64) -> Self {
        Error::ElementNotFound {
            reference: reference.into(),
            timeout_ms,
        }
    }

    /// Create a new ambiguous match error
    pub fn ambiguous_match<S: Into<String>>(reference: S, count: usize) -> Self {
        Error::AmbiguousMatch {
            reference: reference.into(),
            count,
        }
    }

    /// Create a new assertion failure carrying both sides of the comparison
    pub fn assertion_failure(
        assertion: impl Into<String>,
        target: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::AssertionFailure {
            assertion: assertion.into(),
            target: target.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new session closed error
    pub fn session_closed<S: Into<String>>(id: S) -> Self {
        Error::SessionClosed(id.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new navigation failed error
    pub fn navigation_failed<S: Into<String>>(msg: S) -> Self {
        Error::NavigationFailed(msg.into())
    }

    /// Create a new script execution failed error
    pub fn script_execution_failed<S: Into<String>>(msg: S) -> Self {
        Error::ScriptExecutionFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error means the handle or session can no longer be used
    pub fn is_session_fault(&self) -> bool {
        matches!(self, Error::StaleHandle { .. } | Error::SessionClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_failure_reports_both_values() {
        let err = Error::assertion_failure("to_have_text", "css=.badge", "2", "1");
        let msg = err.to_string();
        assert!(msg.contains("css=.badge"));
        assert!(msg.contains("expected: 2"));
        assert!(msg.contains("actual:   1"));
    }

    #[test]
    fn test_session_fault_classification() {
        assert!(Error::session_closed("p1").is_session_fault());
        assert!(!Error::element_not_found("id=x", 100).is_session_fault());
    }
}
