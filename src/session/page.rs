//! CDP-backed page session
//!
//! Runs DOM queries and actions as scripts through a [`CdpClient`] attached to
//! one isolated page target.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cdp::traits::{CdpClient, CdpEvent, EvaluationResult};
use crate::session::js::{ActionReport, ScriptBuilder};
use crate::session::traits::{
    ActionOutcome, DomAction, DomQuery, ElementReference, PageSession, QueryOutcome, Selection,
};
use crate::wait::WaitOptions;
use crate::Error;

/// Evaluation errors raised while a document is being replaced
const CONTEXT_GONE: [&str; 3] = [
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
];

/// Main-frame navigations committed by the page, counted from its events
#[derive(Debug)]
struct NavigationWatch {
    events: UnboundedReceiver<CdpEvent>,
    main_frame: Option<String>,
    committed: u64,
}

impl NavigationWatch {
    fn new(events: UnboundedReceiver<CdpEvent>, main_frame: Option<String>) -> Self {
        Self {
            events,
            main_frame,
            committed: 0,
        }
    }

    /// Drain queued events and return the running count
    fn poll(&mut self) -> u64 {
        while let Ok(event) = self.events.try_recv() {
            if self.is_main_frame_navigation(&event) {
                debug!("Main frame navigated ({})", event.method);
                self.committed += 1;
            }
        }
        self.committed
    }

    fn is_main_frame_navigation(&mut self, event: &CdpEvent) -> bool {
        match event.method.as_str() {
            "Page.frameNavigated" => {
                let frame = &event.params["frame"];
                if frame.get("parentId").map_or(false, |p| !p.is_null()) {
                    return false;
                }
                if let Some(id) = frame.get("id").and_then(|v| v.as_str()) {
                    self.main_frame = Some(id.to_string());
                }
                true
            }
            "Page.navigatedWithinDocument" => {
                let frame_id = event.params.get("frameId").and_then(|v| v.as_str());
                frame_id.is_some() && frame_id == self.main_frame.as_deref()
            }
            _ => false,
        }
    }
}

/// Page session implementation over CDP
///
/// The epoch counts explicit `goto`/`reload` calls plus every main-frame
/// navigation the page reports, including ones started by a click.
#[derive(Debug)]
pub struct CdpPageSession {
    id: String,
    client: Arc<dyn CdpClient>,
    explicit_navigations: AtomicU64,
    watch: Mutex<NavigationWatch>,
    is_active: AtomicBool,
    options: WaitOptions,
    navigation_timeout: Duration,
}

impl CdpPageSession {
    /// Attach a session to the page behind `client` and start following its
    /// navigations
    pub async fn attach(
        client: Arc<dyn CdpClient>,
        options: WaitOptions,
        navigation_timeout: Duration,
    ) -> Result<Self, Error> {
        let events = client.connection().listen_events().await?;
        let tree = client.call_method("Page.getFrameTree", serde_json::json!({})).await?;
        let main_frame = tree
            .pointer("/frameTree/frame/id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            client,
            explicit_navigations: AtomicU64::new(0),
            watch: Mutex::new(NavigationWatch::new(events, main_frame)),
            is_active: AtomicBool::new(true),
            options,
            navigation_timeout,
        })
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.is_active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::session_closed(&self.id))
        }
    }

    fn is_context_gone(err: &Error) -> bool {
        match err {
            Error::Cdp(msg) | Error::ScriptExecutionFailed(msg) => {
                CONTEXT_GONE.iter().any(|needle| msg.contains(needle))
            }
            _ => false,
        }
    }

    /// Evaluate a harness script and return its object result.
    ///
    /// `None` means the document went away mid-evaluation.
    async fn run_script(&self, script: &str) -> Result<Option<serde_json::Value>, Error> {
        match self.client.evaluate(script, false).await {
            Ok(EvaluationResult::Object(value)) => Ok(Some(value)),
            Ok(other) => Err(Error::script_execution_failed(format!(
                "Harness script returned a non-object result: {:?}",
                other
            ))),
            Err(e) if Self::is_context_gone(&e) => {
                debug!("Document replaced during evaluation: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PageSession for CdpPageSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn epoch(&self) -> u64 {
        let committed = self
            .watch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .poll();
        self.explicit_navigations.load(Ordering::SeqCst) + committed
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    fn wait_options(&self) -> WaitOptions {
        self.options
    }

    async fn goto(&self, url: &str) -> Result<(), Error> {
        self.ensure_active()?;
        self.explicit_navigations.fetch_add(1, Ordering::SeqCst);

        let result = self.client.navigate(url, self.navigation_timeout).await?;
        info!("Session {} at {} (loaded: {})", self.id, result.url, result.loaded);
        Ok(())
    }

    async fn reload(&self) -> Result<(), Error> {
        self.ensure_active()?;
        self.explicit_navigations.fetch_add(1, Ordering::SeqCst);
        self.client.reload(false).await
    }

    async fn current_url(&self) -> Result<String, Error> {
        self.ensure_active()?;
        self.client.current_url().await
    }

    async fn content(&self) -> Result<String, Error> {
        self.ensure_active()?;
        self.client.get_content().await
    }

    async fn query(
        &self,
        reference: &ElementReference,
        selection: Selection,
        query: &DomQuery,
    ) -> Result<QueryOutcome, Error> {
        self.ensure_active()?;
        let script = ScriptBuilder::new(reference, selection).query_script(query)?;

        match self.run_script(&script).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(QueryOutcome::absent()),
        }
    }

    async fn act(
        &self,
        reference: &ElementReference,
        selection: Selection,
        action: &DomAction,
    ) -> Result<ActionOutcome, Error> {
        self.ensure_active()?;
        debug!("{} on {}{}", action, reference, selection);
        let script = ScriptBuilder::new(reference, selection).action_script(action)?;

        match self.run_script(&script).await? {
            Some(value) => {
                let report: ActionReport = serde_json::from_value(value)?;
                Ok(report.into())
            }
            None => {
                // The action ran and the document it ran in was replaced
                debug!("{} on {}{} replaced the document", action, reference, selection);
                Ok(ActionOutcome::Done)
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        if self.is_active.swap(false, Ordering::SeqCst) {
            info!("Closing session {}", self.id);
        }
        Ok(())
    }
}
