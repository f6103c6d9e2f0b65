//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for common operations.

use super::traits::*;
use super::types::*;
use crate::wait::{wait_until, WaitOptions};
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between `document.readyState` checks after a navigation
const READY_STATE_POLL_MS: u64 = 100;

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self { connection }
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => EvaluationResult::Number(
                obj.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0),
            ),
            "boolean" => EvaluationResult::Bool(
                obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            ),
            "object" if obj.subtype.as_deref() == Some("null") => EvaluationResult::Null,
            "object" => EvaluationResult::Object(obj.value.clone().unwrap_or(serde_json::Value::Null)),
            _ => EvaluationResult::Null,
        }
    }

    /// Poll `document.readyState` until "complete" or `timeout` elapses
    async fn wait_for_load(&self, timeout: Duration) -> Result<bool, Error> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let outcome = wait_until(
            WaitOptions::new(timeout_ms, READY_STATE_POLL_MS),
            move || async move {
                match self.evaluate("document.readyState", false).await {
                    Ok(EvaluationResult::String(state)) => Ok::<_, Error>(state == "complete"),
                    Ok(other) => {
                        debug!("Document not ready yet: {:?}", other);
                        Ok(false)
                    }
                    // The execution context is replaced while the new document commits
                    Err(e) => {
                        debug!("Ready state check failed during navigation: {}", e);
                        Ok(false)
                    }
                }
            },
            |complete| *complete,
        )
        .await?;
        Ok(outcome.is_satisfied())
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<NavigationResult, Error> {
        info!("Navigating to {}", url);

        let params = NavigateParams {
            url: url.to_string(),
            referrer: None,
        };
        let result = self
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }

        let loaded = self.wait_for_load(timeout).await?;
        if !loaded {
            warn!("Page {} did not finish loading within {:?}", url, timeout);
        }

        Ok(NavigationResult {
            loader_id: result
                .get("loaderId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            url: self.current_url().await.unwrap_or_else(|_| url.to_string()),
            loaded,
        })
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        let params = EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
        };

        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse EvaluateResponse: {}", e)))?;

        if let Some(exception) = response.exception_details {
            return Err(Error::script_execution_failed(exception.message()));
        }

        Ok(Self::parse_remote_object(&response.result))
    }

    async fn current_url(&self) -> Result<String, Error> {
        let result = self
            .call_method("Page.getNavigationHistory", serde_json::json!({}))
            .await?;
        let history: NavigationHistory = serde_json::from_value(result)?;

        history
            .entries
            .get(history.current_index)
            .map(|entry| entry.url.clone())
            .ok_or_else(|| Error::cdp("Navigation history has no current entry"))
    }

    async fn get_content(&self) -> Result<String, Error> {
        match self.evaluate("document.documentElement.outerHTML", false).await? {
            EvaluationResult::String(html) => Ok(html),
            _ => Ok(String::new()),
        }
    }

    async fn reload(&self, ignore_cache: bool) -> Result<(), Error> {
        info!("Reloading page (ignore_cache: {})", ignore_cache);
        self.call_method("Page.reload", serde_json::json!({ "ignoreCache": ignore_cache }))
            .await?;
        Ok(())
    }

    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);
        self.call_method(&format!("{}.enable", domain), serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(Error::cdp(format!("{}: {}", method, error.message)));
        }
        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::MockCdpConnection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn remote(kind: &str, subtype: Option<&str>, value: Option<serde_json::Value>) -> RemoteObject {
        RemoteObject {
            r#type: kind.to_string(),
            subtype: subtype.map(|s| s.to_string()),
            value,
            description: None,
        }
    }

    #[test]
    fn test_parse_remote_object_string() {
        let result = CdpClientImpl::parse_remote_object(&remote("string", None, Some(serde_json::json!("test"))));
        assert_eq!(result, EvaluationResult::String("test".to_string()));
    }

    #[test]
    fn test_parse_remote_object_bool() {
        let result = CdpClientImpl::parse_remote_object(&remote("boolean", None, Some(serde_json::json!(true))));
        assert_eq!(result, EvaluationResult::Bool(true));
    }

    #[test]
    fn test_parse_remote_object_null_subtype() {
        let result = CdpClientImpl::parse_remote_object(&remote("object", Some("null"), None));
        assert_eq!(result, EvaluationResult::Null);
    }

    #[test]
    fn test_parse_remote_object_undefined() {
        let result = CdpClientImpl::parse_remote_object(&remote("undefined", None, None));
        assert_eq!(result, EvaluationResult::Null);
    }

    #[tokio::test]
    async fn test_evaluate_surfaces_exceptions() {
        let connection = Arc::new(crate::cdp::mock::MockCdpConnection::with_responder(|method, _| {
            assert_eq!(method, "Runtime.evaluate");
            Ok(serde_json::json!({
                "result": { "type": "object", "subtype": "error" },
                "exceptionDetails": {
                    "text": "Uncaught",
                    "exception": { "type": "object", "description": "SyntaxError: Unexpected token" }
                }
            }))
        }));
        let client = CdpClientImpl::new(connection);

        let err = client.evaluate("(() => {", false).await.unwrap_err();
        assert!(matches!(err, Error::ScriptExecutionFailed(msg) if msg.contains("SyntaxError")));
    }

    #[tokio::test]
    async fn test_navigate_reports_error_text() {
        let connection = Arc::new(crate::cdp::mock::MockCdpConnection::with_responder(|method, _| {
            match method {
                "Page.navigate" => Ok(serde_json::json!({
                    "frameId": "F1",
                    "errorText": "net::ERR_NAME_NOT_RESOLVED"
                })),
                _ => Ok(serde_json::json!({})),
            }
        }));
        let client = CdpClientImpl::new(connection);

        let err = client
            .navigate("https://nowhere.invalid/", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NavigationFailed(msg) if msg.contains("ERR_NAME_NOT_RESOLVED")));
    }

    fn loading_site(ready_after: usize, checks: Arc<AtomicUsize>) -> Arc<MockCdpConnection> {
        Arc::new(MockCdpConnection::with_responder(move |method, _| match method {
            "Page.navigate" => Ok(serde_json::json!({ "frameId": "F1", "loaderId": "L1" })),
            "Runtime.evaluate" => {
                let state = if checks.fetch_add(1, Ordering::SeqCst) < ready_after {
                    "loading"
                } else {
                    "complete"
                };
                Ok(serde_json::json!({ "result": { "type": "string", "value": state } }))
            }
            _ => Ok(serde_json::json!({
                "currentIndex": 0,
                "entries": [{ "id": 1, "url": "https://www.saucedemo.com/", "title": "Swag Labs" }]
            })),
        }))
    }

    #[tokio::test]
    async fn test_navigate_waits_for_complete_ready_state() {
        let checks = Arc::new(AtomicUsize::new(0));
        let client = CdpClientImpl::new(loading_site(2, Arc::clone(&checks)));

        let result = client
            .navigate("https://www.saucedemo.com/", Duration::from_secs(2))
            .await
            .unwrap();

        assert!(result.loaded);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
        assert_eq!(result.loader_id.as_deref(), Some("L1"));
        assert_eq!(result.url, "https://www.saucedemo.com/");
    }

    #[tokio::test]
    async fn test_navigate_gives_up_on_slow_load() {
        let checks = Arc::new(AtomicUsize::new(0));
        let client = CdpClientImpl::new(loading_site(usize::MAX, checks));

        let result = client
            .navigate("https://www.saucedemo.com/", Duration::from_millis(150))
            .await
            .unwrap();
        assert!(!result.loaded);
    }

    #[tokio::test]
    async fn test_current_url_reads_history() {
        let connection = Arc::new(crate::cdp::mock::MockCdpConnection::with_responder(|_, _| {
            Ok(serde_json::json!({
                "currentIndex": 0,
                "entries": [{ "id": 1, "url": "https://www.w3schools.com/", "title": "W3Schools" }]
            }))
        }));
        let client = CdpClientImpl::new(connection);

        assert_eq!(client.current_url().await.unwrap(), "https://www.w3schools.com/");
    }
}
