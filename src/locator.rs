//! Locator resolver
//!
//! Turns an [`ElementReference`] into a lazy [`Handle`] bound to one session.
//! Resolving never touches the page; every action and query re-resolves the
//! reference when it runs.
//!
//! Actions wait (bounded) for exactly one actionable match. Point-in-time
//! queries (`is_visible`, `count`) never wait and report absence as
//! `false`/`0`. Value queries (`text_content`, `input_value`, `attribute` and
//! the state queries) wait for the element to exist.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::session::traits::{
    ActionOutcome, DomAction, DomQuery, ElementReference, PageSession, QueryOutcome, Selection,
};
use crate::wait::{Condition, WaitOptions, WaitOutcome};
use crate::{Error, Result};

/// Handle for the element with the given `id` attribute
pub fn resolve_by_id(session: &Arc<dyn PageSession>, id: &str) -> Handle {
    resolve(session, ElementReference::id(id))
}

/// Handle for the element whose attribute `name` equals `value`
pub fn resolve_by_attribute(session: &Arc<dyn PageSession>, name: &str, value: &str) -> Handle {
    resolve(session, ElementReference::attribute(name, value))
}

/// Handle for the element at an XPath
pub fn resolve_by_path(session: &Arc<dyn PageSession>, path: &str) -> Handle {
    resolve(session, ElementReference::path(path))
}

/// Handle for a CSS selector
pub fn resolve_css(session: &Arc<dyn PageSession>, selector: &str) -> Handle {
    resolve(session, ElementReference::css(selector))
}

/// Handle for the smallest elements containing `text`
pub fn resolve_text(session: &Arc<dyn PageSession>, text: &str) -> Handle {
    resolve(session, ElementReference::text(text))
}

/// Handle for any reference
pub fn resolve(session: &Arc<dyn PageSession>, reference: ElementReference) -> Handle {
    Handle {
        session: Arc::clone(session),
        reference,
        selection: Selection::Strict,
        epoch: session.epoch(),
        options: session.wait_options(),
    }
}

/// Lazy, session-bound element handle
///
/// Valid only while its session is open and has not navigated since the
/// handle was resolved.
#[derive(Debug, Clone)]
pub struct Handle {
    session: Arc<dyn PageSession>,
    reference: ElementReference,
    selection: Selection,
    epoch: u64,
    options: WaitOptions,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.reference, self.selection)
    }
}

impl Handle {
    pub fn reference(&self) -> &ElementReference {
        &self.reference
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn session(&self) -> &Arc<dyn PageSession> {
        &self.session
    }

    pub fn options(&self) -> WaitOptions {
        self.options
    }

    /// Child handle scoped inside every match of this one
    pub fn within(&self, reference: ElementReference) -> Handle {
        Handle {
            session: Arc::clone(&self.session),
            reference: reference.scoped(self.reference.clone()),
            selection: Selection::Strict,
            epoch: self.epoch,
            options: self.options,
        }
    }

    /// Target the first match instead of requiring exactly one
    pub fn first(mut self) -> Self {
        self.selection = Selection::First;
        self
    }

    /// Target the match at a zero-based index
    pub fn nth(mut self, index: usize) -> Self {
        self.selection = Selection::Nth(index);
        self
    }

    /// Override the bounded wait for this handle
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    fn ensure_bound(&self) -> Result<()> {
        if !self.session.is_active() {
            return Err(Error::session_closed(self.session.id()));
        }
        let current = self.session.epoch();
        if current != self.epoch {
            return Err(Error::StaleHandle {
                reference: self.to_string(),
                resolved_epoch: self.epoch,
                current_epoch: current,
            });
        }
        Ok(())
    }

    fn ambiguous(&self, count: usize) -> Error {
        Error::ambiguous_match(self.to_string(), count)
    }

    fn not_found(&self, timeout_ms: u64) -> Error {
        Error::element_not_found(self.to_string(), timeout_ms)
    }

    /// One observation of the page, made while the handle is still bound
    pub(crate) async fn observe(&self, query: &DomQuery) -> Result<QueryOutcome> {
        self.ensure_bound()?;
        let outcome = self.session.query(&self.reference, self.selection, query).await?;
        // A navigation that committed mid-query may have answered from the new page
        self.ensure_bound()?;
        Ok(outcome)
    }

    /// Whether an observation selected an element
    pub(crate) fn is_present(&self, outcome: &QueryOutcome) -> bool {
        self.selection.pick(outcome.count).is_some()
    }

    /// Whether an observation violates strictness
    pub(crate) fn is_ambiguous(&self, outcome: &QueryOutcome) -> bool {
        self.selection.is_ambiguous(outcome.count)
    }

    async fn perform(&self, action: DomAction) -> Result<()> {
        self.ensure_bound()?;

        let this = self;
        let action = &action;
        let condition = Condition::new(move || async move {
            this.ensure_bound()?;
            this.session.act(&this.reference, this.selection, action).await
        });

        let outcome = condition
            .wait(self.options, |o| {
                !matches!(o, ActionOutcome::NotFound | ActionOutcome::NotActionable(_))
            })
            .await?;

        match outcome {
            WaitOutcome::Satisfied(ActionOutcome::Done) => {
                debug!("{} on {} done", action, self);
                Ok(())
            }
            WaitOutcome::Satisfied(ActionOutcome::Ambiguous(count)) => Err(self.ambiguous(count)),
            WaitOutcome::Satisfied(ActionOutcome::Rejected(reason)) => Err(Error::NotActionable {
                reference: self.to_string(),
                reason,
                timeout_ms: 0,
            }),
            WaitOutcome::TimedOut(Some(ActionOutcome::NotActionable(reason))) => Err(Error::NotActionable {
                reference: self.to_string(),
                reason,
                timeout_ms: self.options.timeout_ms,
            }),
            _ => Err(self.not_found(self.options.timeout_ms)),
        }
    }

    /// Wait for the selected element and read one property of it
    async fn read(&self, query: DomQuery) -> Result<serde_json::Value> {
        self.ensure_bound()?;

        let query = &query;
        let condition = Condition::new(move || self.observe(query));
        let outcome = condition
            .wait(self.options, |o| self.is_ambiguous(o) || self.is_present(o))
            .await?;

        match outcome {
            WaitOutcome::Satisfied(o) if self.is_ambiguous(&o) => Err(self.ambiguous(o.count)),
            WaitOutcome::Satisfied(o) => Ok(o.value),
            WaitOutcome::TimedOut(_) => Err(self.not_found(self.options.timeout_ms)),
        }
    }

    /// Read one property right now; absence yields `None`
    async fn peek(&self, query: DomQuery) -> Result<Option<serde_json::Value>> {
        let outcome = self.observe(&query).await?;
        if self.is_ambiguous(&outcome) {
            return Err(self.ambiguous(outcome.count));
        }
        Ok(self.is_present(&outcome).then_some(outcome.value))
    }

    /// Replace the value of an input
    #[instrument(skip_all, fields(target = %self))]
    pub async fn fill(&self, text: &str) -> Result<()> {
        self.perform(DomAction::Fill(text.to_string())).await
    }

    /// Empty an input
    #[instrument(skip_all, fields(target = %self))]
    pub async fn clear(&self) -> Result<()> {
        self.perform(DomAction::Clear).await
    }

    #[instrument(skip_all, fields(target = %self))]
    pub async fn click(&self) -> Result<()> {
        self.perform(DomAction::Click).await
    }

    /// Ensure a checkbox or radio button is checked
    #[instrument(skip_all, fields(target = %self))]
    pub async fn check(&self) -> Result<()> {
        self.perform(DomAction::SetChecked(true)).await
    }

    /// Ensure a checkbox is unchecked; a checked radio button is refused
    #[instrument(skip_all, fields(target = %self))]
    pub async fn uncheck(&self) -> Result<()> {
        self.perform(DomAction::SetChecked(false)).await
    }

    /// Select one option of a `<select>` by value or label
    #[instrument(skip_all, fields(target = %self))]
    pub async fn select_option(&self, value: &str) -> Result<()> {
        self.perform(DomAction::SelectOptions(vec![value.to_string()])).await
    }

    /// Select several options of a `<select multiple>`
    #[instrument(skip_all, fields(target = %self))]
    pub async fn select_options(&self, values: &[&str]) -> Result<()> {
        self.perform(DomAction::SelectOptions(
            values.iter().map(|v| v.to_string()).collect(),
        ))
        .await
    }

    /// Visible right now; an absent element is not visible
    pub async fn is_visible(&self) -> Result<bool> {
        Ok(self
            .peek(DomQuery::Visible)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Number of elements the handle targets right now
    pub async fn count(&self) -> Result<usize> {
        let outcome = self.observe(&DomQuery::Count).await?;
        Ok(self.selection.narrowed(outcome.count))
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        Ok(self.read(DomQuery::Enabled).await?.as_bool().unwrap_or(false))
    }

    pub async fn is_editable(&self) -> Result<bool> {
        Ok(self.read(DomQuery::Editable).await?.as_bool().unwrap_or(false))
    }

    pub async fn is_checked(&self) -> Result<bool> {
        Ok(self.read(DomQuery::Checked).await?.as_bool().unwrap_or(false))
    }

    /// Attribute value, `None` when the element lacks it
    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let value = self.read(DomQuery::Attribute(name.to_string())).await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn text_content(&self) -> Result<String> {
        let value = self.read(DomQuery::Text).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Current value of an input, textarea or select
    pub async fn input_value(&self) -> Result<String> {
        let value = self.read(DomQuery::Value).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::NotActionable {
                reference: self.to_string(),
                reason: "element is not an input, textarea or select".to_string(),
                timeout_ms: self.options.timeout_ms,
            })
    }
}
