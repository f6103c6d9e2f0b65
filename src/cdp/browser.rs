//! CDP browser control implementation
//!
//! Talks to a Chrome started with `--remote-debugging-port`. Every page target
//! is created inside its own browser context so cookies and storage never leak
//! between sessions.

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// Browser endpoint (e.g., "ws://localhost:9222")
    endpoint: String,
    /// Browser-level connection, opened on first use
    browser_connection: OnceCell<Arc<dyn CdpConnection>>,
    /// Page connections (target_id -> connection)
    connections: Mutex<HashMap<String, Arc<dyn CdpConnection>>>,
}

impl CdpBrowserImpl {
    /// Create a new CDP browser controller
    ///
    /// # Arguments
    /// * `endpoint` - Browser WebSocket endpoint (e.g., "ws://localhost:9222")
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = endpoint.into();
        info!("Creating CDP browser controller for endpoint: {}", endpoint);
        Self {
            endpoint,
            browser_connection: OnceCell::new(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// HTTP form of the endpoint, for the DevTools discovery API
    fn http_endpoint(&self) -> String {
        self.endpoint
            .trim_end_matches('/')
            .replace("ws://", "http://")
            .replace("wss://", "https://")
    }

    /// WebSocket form of the endpoint
    fn ws_endpoint(&self) -> String {
        self.endpoint
            .trim_end_matches('/')
            .replace("http://", "ws://")
            .replace("https://", "wss://")
    }

    /// Page-level debugger URL for a target id
    fn page_ws_url(&self, target_id: &str) -> String {
        format!("{}/devtools/page/{}", self.ws_endpoint(), target_id)
    }

    async fn browser_connection(&self) -> Result<Arc<dyn CdpConnection>, Error> {
        self.browser_connection
            .get_or_try_init(|| async {
                let version = self.get_version().await?;
                let connection = CdpWebSocketConnection::connect(version.ws_debugger_url).await?;
                Ok::<Arc<dyn CdpConnection>, Error>(connection)
            })
            .await
            .cloned()
    }

    async fn browser_command(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let connection = self.browser_connection().await?;
        let response = connection.send_command(method, params).await?;
        response
            .result
            .ok_or_else(|| Error::cdp(format!("No result for {}", method)))
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    async fn create_target(&self) -> Result<TargetHandle, Error> {
        let context = self
            .browser_command(
                "Target.createBrowserContext",
                serde_json::json!({ "disposeOnDetach": true }),
            )
            .await?;
        let browser_context_id = context
            .get("browserContextId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::cdp("No browserContextId in createBrowserContext response"))?;

        let target = self
            .browser_command(
                "Target.createTarget",
                serde_json::json!({
                    "url": "about:blank",
                    "browserContextId": browser_context_id,
                }),
            )
            .await?;
        let target_id = target
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No targetId in createTarget response"))?
            .to_string();

        debug!("Created target {} in context {}", target_id, browser_context_id);

        Ok(TargetHandle {
            ws_url: self.page_ws_url(&target_id),
            target_id,
            browser_context_id: Some(browser_context_id),
        })
    }

    async fn create_client(&self, target: &TargetHandle) -> Result<Arc<dyn CdpClient>, Error> {
        info!("Creating CDP client for target: {}", target.target_id);

        let connection = CdpWebSocketConnection::connect(target.ws_url.clone()).await?;
        self.connections
            .lock()
            .await
            .insert(target.target_id.clone(), connection.clone() as Arc<dyn CdpConnection>);

        let client = Arc::new(CdpClientImpl::new(connection));
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(client)
    }

    async fn dispose_target(&self, target: &TargetHandle) -> Result<(), Error> {
        info!("Disposing target {}", target.target_id);

        let connection = self.connections.lock().await.remove(&target.target_id);
        if let Some(connection) = connection {
            if let Err(e) = connection.close().await {
                warn!("Failed to close page connection {}: {}", target.target_id, e);
            }
        }

        if let Err(e) = self
            .browser_command(
                "Target.closeTarget",
                serde_json::json!({ "targetId": target.target_id }),
            )
            .await
        {
            warn!("Target.closeTarget failed for {}: {}", target.target_id, e);
        }

        if let Some(context_id) = &target.browser_context_id {
            self.browser_command(
                "Target.disposeBrowserContext",
                serde_json::json!({ "browserContextId": context_id }),
            )
            .await?;
        }

        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let url = format!("{}/json/version", self.http_endpoint());
        debug!("Fetching browser version from {}", url);

        let version_json: serde_json::Value = reqwest::Client::new()
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                Error::internal(format!(
                    "Failed to reach Chrome at {}. Start Chrome with --remote-debugging-port=9222. Original error: {}",
                    self.endpoint, e
                ))
            })?
            .json()
            .await
            .map_err(|e| Error::internal(format!("Failed to parse version: {}", e)))?;

        let field = |name: &str| {
            version_json
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string()
        };

        let ws_debugger_url = version_json
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No webSocketDebuggerUrl in /json/version"))?
            .to_string();

        Ok(BrowserVersion {
            protocol_version: field("Protocol-Version"),
            product: field("Browser"),
            user_agent: field("User-Agent"),
            ws_debugger_url,
        })
    }

    async fn close(&self) -> Result<(), Error> {
        let connections: Vec<(String, Arc<dyn CdpConnection>)> =
            self.connections.lock().await.drain().collect();

        info!("CdpBrowser::close: closing {} page connections", connections.len());
        for (target_id, connection) in connections {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target_id, e);
            }
        }

        if let Some(connection) = self.browser_connection.get() {
            connection.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_forms() {
        let browser = CdpBrowserImpl::new("ws://localhost:9222/");
        assert_eq!(browser.http_endpoint(), "http://localhost:9222");
        assert_eq!(
            browser.page_ws_url("ABC"),
            "ws://localhost:9222/devtools/page/ABC"
        );
    }

    #[test]
    fn test_http_endpoint_accepted() {
        let browser = CdpBrowserImpl::new("http://127.0.0.1:9333");
        assert_eq!(browser.ws_endpoint(), "ws://127.0.0.1:9333");
        assert_eq!(browser.http_endpoint(), "http://127.0.0.1:9333");
    }
}
