//! Auto-retrying assertions
//!
//! `expect(&handle).to_be_visible().await` observes the page until the
//! assertion holds or the bounded wait runs out. `.not()` negates any
//! assertion. A failure carries the assertion, its target, and both the
//! expected and the last observed value.

use std::sync::Arc;
use tracing::debug;

use crate::locator::Handle;
use crate::session::traits::{DomQuery, PageSession, QueryOutcome};
use crate::url_pattern::UrlPattern;
use crate::wait::{wait_until, WaitOptions, WaitOutcome};
use crate::{Error, Result};

/// Start an assertion on an element handle
pub fn expect(handle: &Handle) -> Expectation {
    Expectation {
        options: handle.options(),
        handle: handle.clone(),
        negated: false,
    }
}

/// Start an assertion on the page location
pub fn expect_page(session: &Arc<dyn PageSession>) -> PageExpectation {
    PageExpectation {
        session: Arc::clone(session),
        negated: false,
        options: session.wait_options(),
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pending assertion on one element
#[derive(Debug, Clone)]
pub struct Expectation {
    handle: Handle,
    negated: bool,
    options: WaitOptions,
}

impl Expectation {
    /// Negate the assertion
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    fn name(&self, assertion: &str) -> String {
        if self.negated {
            format!("not.{}", assertion)
        } else {
            assertion.to_string()
        }
    }

    fn expected(&self, expected: String) -> String {
        if self.negated {
            format!("not {}", expected)
        } else {
            expected
        }
    }

    fn describe(&self, outcome: &QueryOutcome) -> String {
        if !self.handle.is_present(outcome) {
            return "<no element>".to_string();
        }
        match &outcome.value {
            serde_json::Value::String(s) => format!("{:?}", s),
            serde_json::Value::Null => "<none>".to_string(),
            other => other.to_string(),
        }
    }

    /// Poll `query` until `holds` (xor negation) accepts an observation
    async fn verify<P>(&self, assertion: &str, query: DomQuery, expected: String, holds: P) -> Result<()>
    where
        P: Fn(&QueryOutcome) -> bool,
    {
        let handle = &self.handle;
        let query = &query;
        let negated = self.negated;
        let passes = |o: &QueryOutcome| holds(o) != negated;

        let outcome = wait_until(
            self.options,
            move || handle.observe(query),
            |o| handle.is_ambiguous(o) || passes(o),
        )
        .await?;

        match outcome {
            WaitOutcome::Satisfied(o) if handle.is_ambiguous(&o) => {
                Err(Error::ambiguous_match(handle.to_string(), o.count))
            }
            WaitOutcome::Satisfied(_) => {
                debug!("{} on {} passed", self.name(assertion), handle);
                Ok(())
            }
            WaitOutcome::TimedOut(last) => {
                let last = last.unwrap_or_else(QueryOutcome::absent);
                if !negated && !handle.is_present(&last) {
                    return Err(Error::element_not_found(handle.to_string(), self.options.timeout_ms));
                }
                Err(Error::assertion_failure(
                    self.name(assertion),
                    handle.to_string(),
                    self.expected(expected),
                    self.describe(&last),
                ))
            }
        }
    }

    fn flag(&self, outcome: &QueryOutcome) -> bool {
        self.handle.is_present(outcome) && outcome.value.as_bool().unwrap_or(false)
    }

    fn string<'o>(&self, outcome: &'o QueryOutcome) -> Option<&'o str> {
        if self.handle.is_present(outcome) {
            outcome.value.as_str()
        } else {
            None
        }
    }

    pub async fn to_be_visible(&self) -> Result<()> {
        self.verify("to_be_visible", DomQuery::Visible, "visible".into(), |o| self.flag(o))
            .await
    }

    /// Passes when the element is absent or not visible
    pub async fn to_be_hidden(&self) -> Result<()> {
        let hidden = self.clone().not();
        hidden
            .verify("to_be_visible", DomQuery::Visible, "visible".into(), |o| hidden.flag(o))
            .await
            .map_err(|e| match e {
                Error::AssertionFailure { target, actual, .. } => Error::assertion_failure(
                    self.name("to_be_hidden"),
                    target,
                    self.expected("hidden".to_string()),
                    actual,
                ),
                other => other,
            })
    }

    pub async fn to_be_enabled(&self) -> Result<()> {
        self.verify("to_be_enabled", DomQuery::Enabled, "enabled".into(), |o| self.flag(o))
            .await
    }

    pub async fn to_be_disabled(&self) -> Result<()> {
        self.verify("to_be_disabled", DomQuery::Enabled, "disabled".into(), |o| {
            self.handle.is_present(o) && !self.flag(o)
        })
        .await
    }

    pub async fn to_be_editable(&self) -> Result<()> {
        self.verify("to_be_editable", DomQuery::Editable, "editable".into(), |o| self.flag(o))
            .await
    }

    pub async fn to_be_checked(&self) -> Result<()> {
        self.verify("to_be_checked", DomQuery::Checked, "checked".into(), |o| self.flag(o))
            .await
    }

    pub async fn to_have_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.verify(
            "to_have_attribute",
            DomQuery::Attribute(name.to_string()),
            format!("{}={:?}", name, value),
            |o| self.string(o) == Some(value),
        )
        .await
    }

    /// Whole text equality, whitespace-normalized
    pub async fn to_have_text(&self, text: &str) -> Result<()> {
        let expected = normalize_whitespace(text);
        self.verify("to_have_text", DomQuery::Text, format!("{:?}", expected), |o| {
            self.string(o).map(normalize_whitespace).as_deref() == Some(expected.as_str())
        })
        .await
    }

    pub async fn to_contain_text(&self, text: &str) -> Result<()> {
        let expected = normalize_whitespace(text);
        self.verify("to_contain_text", DomQuery::Text, format!("{:?}", expected), |o| {
            self.string(o)
                .map(|actual| normalize_whitespace(actual).contains(&expected))
                .unwrap_or(false)
        })
        .await
    }

    pub async fn to_have_value(&self, value: &str) -> Result<()> {
        self.verify("to_have_value", DomQuery::Value, format!("{:?}", value), |o| {
            self.string(o) == Some(value)
        })
        .await
    }

    /// Number of targeted elements; zero means absent and is not an error
    pub async fn to_have_count(&self, expected: usize) -> Result<()> {
        let handle = &self.handle;
        let negated = self.negated;
        let count_of = |o: &QueryOutcome| handle.selection().narrowed(o.count);
        let query = DomQuery::Count;
        let query = &query;

        let outcome = wait_until(
            self.options,
            move || handle.observe(query),
            |o| (count_of(o) == expected) != negated,
        )
        .await?;

        match outcome {
            WaitOutcome::Satisfied(_) => Ok(()),
            WaitOutcome::TimedOut(last) => Err(Error::assertion_failure(
                self.name("to_have_count"),
                handle.to_string(),
                self.expected(expected.to_string()),
                last.map(|o| count_of(&o)).unwrap_or(0).to_string(),
            )),
        }
    }
}

/// Pending assertion on the page location
#[derive(Debug, Clone)]
pub struct PageExpectation {
    session: Arc<dyn PageSession>,
    negated: bool,
    options: WaitOptions,
}

impl PageExpectation {
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    /// Location matches `pattern` (exact string, glob with `*`, or regex)
    pub async fn to_have_url<P: Into<UrlPattern>>(&self, pattern: P) -> Result<()> {
        let pattern = pattern.into();
        let session = &self.session;
        let negated = self.negated;

        let outcome = wait_until(
            self.options,
            move || session.current_url(),
            |url| pattern.matches(url) != negated,
        )
        .await?;

        match outcome {
            WaitOutcome::Satisfied(_) => Ok(()),
            WaitOutcome::TimedOut(last) => Err(Error::assertion_failure(
                if negated { "not.to_have_url" } else { "to_have_url" },
                format!("page {}", session.id()),
                if negated {
                    format!("not {}", pattern)
                } else {
                    pattern.to_string()
                },
                last.unwrap_or_default(),
            )),
        }
    }
}
