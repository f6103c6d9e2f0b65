//! Page session traits
//!
//! A [`PageSession`] is one isolated browser page owned by one test. The
//! harness talks to it in terms of element references, DOM queries and DOM
//! actions; how those are carried out is up to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::wait::WaitOptions;

/// How a reference picks elements out of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum Selector {
    /// Element `id` attribute
    Id(String),
    /// Any attribute with an exact value
    Attribute { name: String, value: String },
    /// XPath expression
    Path(String),
    /// CSS selector
    Css(String),
    /// Smallest elements whose text contains the string (case-insensitive)
    Text(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "id={}", id),
            Selector::Attribute { name, value } => write!(f, "[{}=\"{}\"]", name, value),
            Selector::Path(path) => write!(f, "xpath={}", path),
            Selector::Css(css) => write!(f, "css={}", css),
            Selector::Text(text) => write!(f, "text={}", text),
        }
    }
}

/// Immutable description of how to find an element, optionally scoped
/// inside the matches of a parent reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementReference {
    pub selector: Selector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ElementReference>>,
}

impl ElementReference {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            parent: None,
        }
    }

    pub fn id<S: Into<String>>(id: S) -> Self {
        Self::new(Selector::Id(id.into()))
    }

    pub fn attribute<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::new(Selector::Attribute {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn path<S: Into<String>>(path: S) -> Self {
        Self::new(Selector::Path(path.into()))
    }

    pub fn css<S: Into<String>>(selector: S) -> Self {
        Self::new(Selector::Css(selector.into()))
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::new(Selector::Text(text.into()))
    }

    /// Scope this reference inside `outer`.
    ///
    /// An existing scope chain is kept; `outer` becomes its outermost link.
    pub fn scoped(mut self, outer: ElementReference) -> Self {
        self.parent = Some(Box::new(match self.parent.take() {
            Some(parent) => parent.scoped(outer),
            None => outer,
        }));
        self
    }
}

impl fmt::Display for ElementReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{} >> ", parent)?;
        }
        write!(f, "{}", self.selector)
    }
}

/// Which of the matches an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "kind", content = "value")]
pub enum Selection {
    /// Exactly one match is required
    #[default]
    Strict,
    /// First match in document order
    First,
    /// Zero-based index in document order
    Nth(usize),
}

impl Selection {
    /// Index of the targeted match, given the number of matches
    pub fn pick(&self, count: usize) -> Option<usize> {
        match *self {
            Selection::Strict if count == 1 => Some(0),
            Selection::Strict => None,
            Selection::First if count > 0 => Some(0),
            Selection::First => None,
            Selection::Nth(index) if index < count => Some(index),
            Selection::Nth(_) => None,
        }
    }

    /// Whether `count` matches violate strictness
    pub fn is_ambiguous(&self, count: usize) -> bool {
        matches!(self, Selection::Strict) && count > 1
    }

    /// Number of elements left once the selection narrows `count` matches
    pub fn narrowed(&self, count: usize) -> usize {
        match *self {
            Selection::Strict => count,
            Selection::First => count.min(1),
            Selection::Nth(index) => usize::from(index < count),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Strict => Ok(()),
            Selection::First => write!(f, " >> first"),
            Selection::Nth(index) => write!(f, " >> nth={}", index),
        }
    }
}

/// Read-only question about the targeted element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum DomQuery {
    Count,
    Visible,
    Enabled,
    Editable,
    Checked,
    Attribute(String),
    Text,
    Value,
}

/// Answer to a [`DomQuery`]
///
/// `count` is the number of matches before selection; `value` is null when
/// no element was selected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryOutcome {
    pub count: usize,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl QueryOutcome {
    pub fn absent() -> Self {
        Self {
            count: 0,
            value: serde_json::Value::Null,
        }
    }
}

/// Mutation applied to the targeted element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum DomAction {
    Fill(String),
    Clear,
    Click,
    SetChecked(bool),
    SelectOptions(Vec<String>),
}

impl fmt::Display for DomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomAction::Fill(_) => write!(f, "fill"),
            DomAction::Clear => write!(f, "clear"),
            DomAction::Click => write!(f, "click"),
            DomAction::SetChecked(true) => write!(f, "check"),
            DomAction::SetChecked(false) => write!(f, "uncheck"),
            DomAction::SelectOptions(_) => write!(f, "select_option"),
        }
    }
}

/// Result of one attempt at a [`DomAction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    NotFound,
    Ambiguous(usize),
    /// Not actionable yet; a later attempt may succeed
    NotActionable(String),
    /// Refused for good, or already dispatched without the intended effect
    Rejected(String),
}

/// One isolated page owned by a single test
#[async_trait]
pub trait PageSession: Send + Sync + fmt::Debug {
    /// Session ID
    fn id(&self) -> &str;

    /// Number of navigations so far, explicit or triggered by the page
    fn epoch(&self) -> u64;

    /// False once the session has been closed
    fn is_active(&self) -> bool;

    /// Bounded-wait defaults copied onto every handle resolved here
    fn wait_options(&self) -> WaitOptions;

    /// Navigate to `url` and wait for the document to load
    async fn goto(&self, url: &str) -> Result<(), crate::Error>;

    /// Reload the current document
    async fn reload(&self) -> Result<(), crate::Error>;

    /// Current location
    async fn current_url(&self) -> Result<String, crate::Error>;

    /// Serialized document
    async fn content(&self) -> Result<String, crate::Error>;

    /// Single point-in-time observation; never waits
    async fn query(
        &self,
        reference: &ElementReference,
        selection: Selection,
        query: &DomQuery,
    ) -> Result<QueryOutcome, crate::Error>;

    /// Single attempt at an action; never waits
    async fn act(
        &self,
        reference: &ElementReference,
        selection: Selection,
        action: &DomAction,
    ) -> Result<ActionOutcome, crate::Error>;

    /// Close the session; later calls fail with `SessionClosed`
    async fn close(&self) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display_with_scope() {
        let reference = ElementReference::text("Ngoc Anh").scoped(ElementReference::css("table tbody"));
        assert_eq!(reference.to_string(), "css=table tbody >> text=Ngoc Anh");
    }

    #[test]
    fn test_scoped_keeps_existing_chain() {
        let reference = ElementReference::css("td")
            .scoped(ElementReference::css("tr"))
            .scoped(ElementReference::id("results"));
        assert_eq!(reference.to_string(), "id=results >> css=tr >> css=td");
    }

    #[test]
    fn test_selection_pick() {
        assert_eq!(Selection::Strict.pick(1), Some(0));
        assert_eq!(Selection::Strict.pick(2), None);
        assert_eq!(Selection::First.pick(3), Some(0));
        assert_eq!(Selection::Nth(2).pick(3), Some(2));
        assert_eq!(Selection::Nth(3).pick(3), None);
        assert!(Selection::Strict.is_ambiguous(2));
        assert!(!Selection::First.is_ambiguous(2));
    }

    #[test]
    fn test_reference_serializes_for_scripts() {
        let json = serde_json::to_value(ElementReference::attribute("name", "firstName")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "selector": { "kind": "Attribute", "value": { "name": "name", "value": "firstName" } }
            })
        );
    }

    #[test]
    fn test_query_outcome_parses_missing_value() {
        let outcome: QueryOutcome = serde_json::from_value(serde_json::json!({ "count": 0 })).unwrap();
        assert_eq!(outcome, QueryOutcome::absent());
    }
}
