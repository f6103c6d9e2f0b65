//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract interfaces for CDP communication.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// CDP event representation
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    pub params: Value,
    /// Session ID (for multi-session targets)
    pub session_id: Option<String>,
}

/// CDP response representation
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    pub result: Option<Value>,
    /// Error if any
    pub error: Option<CdpError>,
}

/// CDP error representation
#[derive(Debug, Clone)]
pub struct CdpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

/// CDP connection trait
///
/// Represents a WebSocket connection to a Chrome DevTools Protocol target.
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a CDP command and wait for response
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, crate::Error>;

    /// Subscribe to CDP events.
    ///
    /// Events are queued in arrival order, ahead of any later command response.
    async fn listen_events(&self) -> Result<tokio::sync::mpsc::UnboundedReceiver<CdpEvent>, crate::Error>;

    /// Close the connection
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if connection is active
    fn is_active(&self) -> bool;
}

/// CDP client trait
///
/// High-level client for one page target.
#[async_trait]
pub trait CdpClient: Send + Sync + std::fmt::Debug {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection>;

    /// Navigate to a URL and wait until the document is loaded or `timeout` elapses
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<NavigationResult, crate::Error>;

    /// Evaluate JavaScript in the page
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, crate::Error>;

    /// URL of the current history entry
    async fn current_url(&self) -> Result<String, crate::Error>;

    /// Get page content
    async fn get_content(&self) -> Result<String, crate::Error>;

    /// Reload the page
    async fn reload(&self, ignore_cache: bool) -> Result<(), crate::Error>;

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), crate::Error>;

    /// Call a raw CDP method (returns JSON Value)
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, crate::Error>;
}

/// Navigation result
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// Loader ID of the new document, if one was created
    pub loader_id: Option<String>,
    /// URL after navigation
    pub url: String,
    /// Whether `document.readyState` reached "complete" before the timeout
    pub loaded: bool,
}

/// JavaScript evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    /// String value
    String(String),
    /// Number value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Null value
    Null,
    /// Object/Array (as JSON)
    Object(Value),
}

/// A page target living in its own browser context
#[derive(Debug, Clone)]
pub struct TargetHandle {
    /// Target ID
    pub target_id: String,
    /// Browser context the target was created in
    pub browser_context_id: Option<String>,
    /// Page-level WebSocket debugger URL
    pub ws_url: String,
}

/// CDP browser trait
///
/// Controls browser-level operations via CDP.
#[async_trait]
pub trait CdpBrowser: Send + Sync + std::fmt::Debug {
    /// Create a page target inside a fresh, isolated browser context
    async fn create_target(&self) -> Result<TargetHandle, crate::Error>;

    /// Create a CDP client attached to a page target
    async fn create_client(&self, target: &TargetHandle) -> Result<Arc<dyn CdpClient>, crate::Error>;

    /// Close the target and dispose its browser context
    async fn dispose_target(&self, target: &TargetHandle) -> Result<(), crate::Error>;

    /// Get browser version
    async fn get_version(&self) -> Result<BrowserVersion, crate::Error>;

    /// Close every connection held by this controller
    async fn close(&self) -> Result<(), crate::Error>;
}

/// Browser version information
#[derive(Debug, Clone)]
pub struct BrowserVersion {
    /// Protocol version
    pub protocol_version: String,
    /// Product name
    pub product: String,
    /// User agent
    pub user_agent: String,
    /// Browser-level WebSocket debugger URL
    pub ws_debugger_url: String,
}
