//! Mock CDP implementation for testing
//!
//! Scriptable stand-ins for the CDP traits so the layers above can be tested
//! without a running Chrome.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::cdp::traits::*;
use crate::Error;

type CommandResponder = Box<dyn Fn(&str, &Value) -> Result<Value, Error> + Send + Sync>;
type ScriptResponder = Box<dyn Fn(&str) -> Result<EvaluationResult, Error> + Send + Sync>;

/// Mock CDP connection
pub struct MockCdpConnection {
    id: String,
    is_active: Arc<AtomicBool>,
    next_id: AtomicU64,
    responder: Option<CommandResponder>,
    commands: StdMutex<Vec<String>>,
    subscribers: StdMutex<Vec<UnboundedSender<CdpEvent>>>,
}

impl std::fmt::Debug for MockCdpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpConnection")
            .field("id", &self.id)
            .field("is_active", &self.is_active.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCdpConnection {
    /// Create a new mock CDP connection that answers every command with `{}`
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_active: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            responder: None,
            commands: StdMutex::new(Vec::new()),
            subscribers: StdMutex::new(Vec::new()),
        }
    }

    /// Create a mock connection whose results come from `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Methods sent so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent {
            method: method.to_string(),
            params,
            session_id: None,
        };
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut log) = self.commands.lock() {
            log.push(method.to_string());
        }

        let result = match &self.responder {
            Some(responder) => responder(method, &params)?,
            None => serde_json::json!({}),
        };

        Ok(CdpResponse {
            id,
            result: Some(result),
            error: None,
        })
    }

    async fn listen_events(&self) -> Result<UnboundedReceiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }
        let (tx, rx) = unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP client
///
/// Keeps a current URL and answers `evaluate` through an optional script
/// responder. Every evaluated script is logged.
pub struct MockCdpClient {
    connection: Arc<MockCdpConnection>,
    url: Mutex<String>,
    scripts: Mutex<Vec<String>>,
    responder: Option<ScriptResponder>,
    navigation_error: Option<String>,
}

impl std::fmt::Debug for MockCdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpClient")
            .field("connection", &self.connection)
            .finish()
    }
}

impl MockCdpClient {
    /// Create a new mock CDP client sitting on `about:blank`
    pub fn new() -> Self {
        Self {
            connection: Arc::new(MockCdpConnection::new()),
            url: Mutex::new("about:blank".to_string()),
            scripts: Mutex::new(Vec::new()),
            responder: None,
            navigation_error: None,
        }
    }

    /// Answer `evaluate` calls with `responder`
    pub fn with_script_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Result<EvaluationResult, Error> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Make every navigation fail with `error_text`
    pub fn with_navigation_error<S: Into<String>>(mut self, error_text: S) -> Self {
        self.navigation_error = Some(error_text.into());
        self
    }

    /// Connection the client sends through; use it to emit page events
    pub fn mock_connection(&self) -> Arc<MockCdpConnection> {
        Arc::clone(&self.connection)
    }

    /// Scripts evaluated so far
    pub async fn scripts(&self) -> Vec<String> {
        self.scripts.lock().await.clone()
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        self.connection.clone()
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<NavigationResult, Error> {
        if let Some(error_text) = &self.navigation_error {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }
        *self.url.lock().await = url.to_string();
        Ok(NavigationResult {
            loader_id: Some(uuid::Uuid::new_v4().to_string()),
            url: url.to_string(),
            loaded: true,
        })
    }

    async fn evaluate(&self, script: &str, _await_promise: bool) -> Result<EvaluationResult, Error> {
        if !self.connection.is_active() {
            return Err(Error::cdp("Connection is closed"));
        }
        self.scripts.lock().await.push(script.to_string());

        match &self.responder {
            Some(responder) => responder(script),
            None if script.contains("document.readyState") => {
                Ok(EvaluationResult::String("complete".to_string()))
            }
            None => Ok(EvaluationResult::Null),
        }
    }

    async fn current_url(&self) -> Result<String, Error> {
        Ok(self.url.lock().await.clone())
    }

    async fn get_content(&self) -> Result<String, Error> {
        Ok("<html><head></head><body></body></html>".to_string())
    }

    async fn reload(&self, _ignore_cache: bool) -> Result<(), Error> {
        Ok(())
    }

    async fn enable_domain(&self, _domain: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn call_method(&self, method: &str, params: Value) -> Result<Value, Error> {
        let response = self.connection.send_command(method, params).await?;
        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}

/// Mock CDP browser
///
/// Hands out fresh [`MockCdpClient`]s and counts created and disposed targets.
#[derive(Debug, Default)]
pub struct MockCdpBrowser {
    created: AtomicUsize,
    disposed: AtomicUsize,
    is_closed: AtomicBool,
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of targets created
    pub fn created_targets(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of targets disposed
    pub fn disposed_targets(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_target(&self) -> Result<TargetHandle, Error> {
        if self.is_closed.load(Ordering::SeqCst) {
            return Err(Error::cdp("Browser is closed"));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let target_id = uuid::Uuid::new_v4().to_string();
        Ok(TargetHandle {
            ws_url: format!("ws://mock/devtools/page/{}", target_id),
            browser_context_id: Some(uuid::Uuid::new_v4().to_string()),
            target_id,
        })
    }

    async fn create_client(&self, _target: &TargetHandle) -> Result<Arc<dyn CdpClient>, Error> {
        Ok(Arc::new(MockCdpClient::new()))
    }

    async fn dispose_target(&self, _target: &TargetHandle) -> Result<(), Error> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        Ok(BrowserVersion {
            protocol_version: "1.3".to_string(),
            product: "Chrome/Mock".to_string(),
            user_agent: "Mozilla/5.0 (Mock)".to_string(),
            ws_debugger_url: "ws://mock/devtools/browser/mock".to_string(),
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
