//! Mock session implementation for testing
//!
//! [`MockPage`] is a [`PageSession`] over an in-memory fake DOM. Pages are
//! registered as routes, clicks can trigger arbitrary mutations, and delayed
//! mutations simulate content that appears or disappears after a while.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::traits::{
    ActionOutcome, DomAction, DomQuery, ElementReference, PageSession, QueryOutcome, Selection,
    Selector,
};
use crate::wait::WaitOptions;
use crate::{Error, Result};

/// Change applied to the fake DOM by a click handler or a timer
pub type Mutation = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;

/// One element of the fake DOM
#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
    pub readonly: bool,
    pub checked: bool,
    pub multiple: bool,
    pub options: Vec<String>,
    pub selected: Vec<String>,
    /// XPath this element answers to
    pub path: Option<String>,
    /// `id` of the containing element
    pub parent: Option<String>,
}

impl FakeElement {
    pub fn new<S: Into<String>>(tag: S) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            readonly: false,
            checked: false,
            multiple: false,
            options: Vec::new(),
            selected: Vec::new(),
            path: None,
            parent: None,
        }
    }

    pub fn id<S: Into<String>>(self, id: S) -> Self {
        self.attr("id", id)
    }

    pub fn class<S: Into<String>>(mut self, class: S) -> Self {
        let class = class.into();
        let merged = match self.attrs.get("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class,
        };
        self.attrs.insert("class".to_string(), merged);
        self
    }

    pub fn attr<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn value<S: Into<String>>(mut self, value: S) -> Self {
        self.value = value.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Option values of a `<select>`; the first one starts selected
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        if !self.multiple {
            self.selected = self.options.iter().take(1).cloned().collect();
            self.value = self.selected.first().cloned().unwrap_or_default();
        }
        self
    }

    pub fn at_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn child_of<S: Into<String>>(mut self, parent_id: S) -> Self {
        self.parent = Some(parent_id.into());
        self
    }

    pub fn element_id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    pub fn input_type(&self) -> &str {
        self.attrs.get("type").map(String::as_str).unwrap_or("text")
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn is_toggle(&self) -> bool {
        self.tag == "input" && matches!(self.input_type(), "checkbox" | "radio")
    }

    fn is_text_input(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type(),
                "button" | "submit" | "reset" | "checkbox" | "radio" | "file" | "image" | "hidden"
            ),
            _ => false,
        }
    }

    fn has_value(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }
}

/// In-memory document plus the site behaviour around it
#[derive(Default)]
pub struct FakeDom {
    url: String,
    elements: Vec<FakeElement>,
    routes: HashMap<String, Vec<FakeElement>>,
    click_handlers: HashMap<String, Mutation>,
    scheduled: Vec<(Instant, Mutation)>,
    /// Navigations committed so far, from any source
    navigations: u64,
}

impl fmt::Debug for FakeDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeDom")
            .field("url", &self.url)
            .field("elements", &self.elements.len())
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("navigations", &self.navigations)
            .finish()
    }
}

impl FakeDom {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Change the location without loading a document (client-side routing).
    ///
    /// Counts as a navigation: handles resolved earlier go stale.
    pub fn set_url<S: Into<String>>(&mut self, url: S) {
        self.url = url.into();
        self.navigations += 1;
    }

    pub fn navigations(&self) -> u64 {
        self.navigations
    }

    pub fn elements(&self) -> &[FakeElement] {
        &self.elements
    }

    pub fn element(&self, id: &str) -> Option<&FakeElement> {
        self.elements.iter().find(|e| e.element_id() == Some(id))
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut FakeElement> {
        self.elements.iter_mut().find(|e| e.element_id() == Some(id))
    }

    pub fn insert(&mut self, element: FakeElement) {
        self.elements.push(element);
    }

    /// Remove the element with `id` and everything inside it
    pub fn remove(&mut self, id: &str) -> Option<FakeElement> {
        let index = self.index_of(id)?;
        let removed = self.elements.remove(index);
        self.remove_descendants(id);
        Some(removed)
    }

    fn remove_descendants(&mut self, id: &str) {
        let children: Vec<String> = self
            .elements
            .iter()
            .filter(|e| e.parent.as_deref() == Some(id))
            .filter_map(|e| e.element_id().map(str::to_string))
            .collect();
        self.elements.retain(|e| e.parent.as_deref() != Some(id));
        for child in children {
            self.remove_descendants(&child);
        }
    }

    /// Remove every element carrying `class`
    pub fn remove_class(&mut self, class: &str) {
        self.elements.retain(|e| !e.has_class(class));
    }

    /// Replace the document with the route registered for `url`.
    ///
    /// An unknown route still counts as a navigation, as an error page would.
    pub fn load(&mut self, url: &str) -> Result<()> {
        self.navigations += 1;
        let elements = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| Error::navigation_failed(format!("{}: net::ERR_NAME_NOT_RESOLVED", url)))?;
        self.elements = elements;
        self.url = url.to_string();
        self.scheduled.clear();
        Ok(())
    }

    /// Run `mutation` once `delay` has elapsed
    pub fn schedule<F>(&mut self, delay: Duration, mutation: F)
    where
        F: Fn(&mut FakeDom) + Send + Sync + 'static,
    {
        self.scheduled.push((Instant::now() + delay, Arc::new(mutation)));
    }

    fn apply_due(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.scheduled = later;
        for (_, mutation) in due {
            mutation(self);
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.element_id() == Some(id))
    }

    fn parent_of(&self, index: usize) -> Option<usize> {
        self.elements[index]
            .parent
            .as_deref()
            .and_then(|id| self.index_of(id))
    }

    fn children_of(&self, index: usize) -> Vec<usize> {
        match self.elements[index].element_id() {
            Some(id) => (0..self.elements.len())
                .filter(|&i| self.elements[i].parent.as_deref() == Some(id))
                .collect(),
            None => Vec::new(),
        }
    }

    fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(index);
        while let Some(i) = current {
            if chain.contains(&i) {
                break;
            }
            chain.push(i);
            current = self.parent_of(i);
        }
        chain
    }

    fn text_content(&self, index: usize) -> String {
        let mut parts = vec![self.elements[index].text.clone()];
        parts.extend(self.children_of(index).into_iter().map(|c| self.text_content(c)));
        normalize(&parts.join(" "))
    }

    fn is_visible(&self, index: usize) -> bool {
        self.elements[index].visible && self.ancestors(index).iter().all(|&a| self.elements[a].visible)
    }

    fn is_editable(&self, index: usize) -> bool {
        let el = &self.elements[index];
        el.enabled && !el.readonly && el.is_text_input()
    }

    fn matches_selector(&self, index: usize, selector: &Selector, css: &[Compound]) -> bool {
        let el = &self.elements[index];
        match selector {
            Selector::Id(id) => el.element_id() == Some(id.as_str()),
            Selector::Attribute { name, value } => el.attrs.get(name) == Some(value),
            Selector::Path(path) => el.path.as_deref() == Some(path.as_str()),
            Selector::Css(_) => self.matches_css(index, css),
            Selector::Text(needle) => {
                let needle = normalize(needle).to_lowercase();
                let hit = |i: usize| self.text_content(i).to_lowercase().contains(&needle);
                hit(index) && !self.children_of(index).into_iter().any(hit)
            }
        }
    }

    fn matches_css(&self, index: usize, compounds: &[Compound]) -> bool {
        let Some((last, outer)) = compounds.split_last() else {
            return false;
        };
        if !last.matches(&self.elements[index]) {
            return false;
        }

        let mut remaining = outer.iter().rev().peekable();
        for ancestor in self.ancestors(index) {
            match remaining.peek() {
                Some(compound) if compound.matches(&self.elements[ancestor]) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }

    /// Indices of every element matched by `reference`, in document order
    fn resolve(&self, reference: &ElementReference) -> Result<Vec<usize>> {
        let scopes = match &reference.parent {
            Some(parent) => Some(self.resolve(parent)?.into_iter().collect::<HashSet<_>>()),
            None => None,
        };
        let css = match &reference.selector {
            Selector::Css(selector) => parse_css(selector)?,
            _ => Vec::new(),
        };

        Ok((0..self.elements.len())
            .filter(|&i| self.matches_selector(i, &reference.selector, &css))
            .filter(|&i| match &scopes {
                Some(scopes) => self.ancestors(i).iter().any(|a| scopes.contains(a)),
                None => true,
            })
            .collect())
    }

    fn query_value(&self, index: usize, query: &DomQuery) -> serde_json::Value {
        let el = &self.elements[index];
        match query {
            DomQuery::Count => serde_json::Value::Null,
            DomQuery::Visible => self.is_visible(index).into(),
            DomQuery::Enabled => el.enabled.into(),
            DomQuery::Editable => self.is_editable(index).into(),
            DomQuery::Checked => el.checked.into(),
            DomQuery::Attribute(name) => el
                .attrs
                .get(name)
                .map(|v| serde_json::Value::String(v.clone()))
                .unwrap_or(serde_json::Value::Null),
            DomQuery::Text => self.text_content(index).into(),
            DomQuery::Value if el.has_value() => el.value.clone().into(),
            DomQuery::Value => serde_json::Value::Null,
        }
    }

    fn click(&mut self, index: usize) {
        if self.elements[index].is_toggle() {
            if self.elements[index].input_type() == "radio" {
                let group = self.elements[index].attrs.get("name").cloned();
                for el in self.elements.iter_mut() {
                    if el.is_toggle() && el.input_type() == "radio" && el.attrs.get("name") == group.as_ref() {
                        el.checked = false;
                    }
                }
                self.elements[index].checked = true;
            } else {
                self.elements[index].checked = !self.elements[index].checked;
            }
        }

        let handler = self.elements[index]
            .element_id()
            .and_then(|id| self.click_handlers.get(id))
            .cloned();
        if let Some(handler) = handler {
            handler(self);
        }
    }

    fn perform(&mut self, index: usize, action: &DomAction) -> ActionOutcome {
        if !self.is_visible(index) {
            return ActionOutcome::NotActionable("element is not visible".to_string());
        }
        if !self.elements[index].enabled {
            return ActionOutcome::NotActionable("element is disabled".to_string());
        }

        match action {
            DomAction::Fill(_) | DomAction::Clear if !self.is_editable(index) => {
                ActionOutcome::NotActionable("element is not editable".to_string())
            }
            DomAction::Fill(text) => {
                self.elements[index].value = text.clone();
                ActionOutcome::Done
            }
            DomAction::Clear => {
                self.elements[index].value.clear();
                ActionOutcome::Done
            }
            DomAction::Click => {
                self.click(index);
                ActionOutcome::Done
            }
            DomAction::SetChecked(_) if !self.elements[index].is_toggle() => {
                ActionOutcome::Rejected("element is not a checkbox or radio button".to_string())
            }
            DomAction::SetChecked(wanted) if self.elements[index].checked == *wanted => ActionOutcome::Done,
            DomAction::SetChecked(false) if self.elements[index].input_type() == "radio" => {
                ActionOutcome::Rejected("a radio button cannot be unchecked".to_string())
            }
            DomAction::SetChecked(wanted) => {
                self.click(index);
                if self.elements[index].checked != *wanted {
                    return ActionOutcome::Rejected("checked state did not change after click".to_string());
                }
                ActionOutcome::Done
            }
            DomAction::SelectOptions(_) if self.elements[index].tag != "select" => {
                ActionOutcome::NotActionable("element is not a <select>".to_string())
            }
            DomAction::SelectOptions(values) => {
                let el = &mut self.elements[index];
                let missing: Vec<&str> = values
                    .iter()
                    .filter(|v| !el.options.contains(*v))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return ActionOutcome::NotActionable(format!("no option matching {}", missing.join(", ")));
                }
                if !el.multiple && values.len() > 1 {
                    return ActionOutcome::NotActionable(
                        "element does not accept multiple selections".to_string(),
                    );
                }
                el.selected = values.clone();
                el.value = values.first().cloned().unwrap_or_default();
                ActionOutcome::Done
            }
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One compound CSS selector: `tag#id.class[attr="value"]`
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &FakeElement) -> bool {
        self.tag.as_ref().map_or(true, |t| *t == el.tag)
            && self.id.as_deref().map_or(true, |id| el.element_id() == Some(id))
            && self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|(name, value)| match value {
                Some(value) => el.attrs.get(name) == Some(value),
                None => el.attrs.contains_key(name),
            })
    }
}

/// Parse the CSS subset the fake DOM understands: compound selectors joined
/// by the descendant combinator
fn parse_css(selector: &str) -> Result<Vec<Compound>> {
    let unsupported = || Error::script_execution_failed(format!("Unsupported selector for fake DOM: {}", selector));

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in selector.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1).ok_or_else(unsupported)?,
            _ => {}
        }
        if c.is_whitespace() && depth == 0 {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if depth != 0 {
        return Err(unsupported());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if parts.is_empty() {
        return Err(unsupported());
    }

    let is_ident = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
    parts
        .iter()
        .map(|part| {
            let mut compound = Compound::default();
            let mut chars = part.chars().peekable();
            let read_ident = |chars: &mut std::iter::Peekable<std::str::Chars<'_>>| {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_ident(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                ident
            };

            let first = chars.peek().copied();
            match first {
                Some('*') => {
                    chars.next();
                }
                Some(c) if is_ident(c) => compound.tag = Some(read_ident(&mut chars).to_lowercase()),
                _ => {}
            }

            while let Some(c) = chars.next() {
                match c {
                    '#' => compound.id = Some(read_ident(&mut chars)),
                    '.' => compound.classes.push(read_ident(&mut chars)),
                    '[' => {
                        let body: String = chars.by_ref().take_while(|&c| c != ']').collect();
                        let (name, value) = match body.split_once('=') {
                            Some((name, value)) => (
                                name.trim().to_string(),
                                Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                            ),
                            None => (body.trim().to_string(), None),
                        };
                        compound.attrs.push((name, value));
                    }
                    _ => return Err(unsupported()),
                }
            }
            Ok(compound)
        })
        .collect()
}

/// Mock page session over a fake DOM
pub struct MockPage {
    id: String,
    dom: Mutex<FakeDom>,
    is_active: AtomicBool,
    options: WaitOptions,
    log: Mutex<Vec<String>>,
}

impl fmt::Debug for MockPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPage")
            .field("id", &self.id)
            .field("dom", &*self.dom())
            .finish()
    }
}

impl MockPage {
    /// Create a new mock page on `about:blank` with short waits
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dom: Mutex::new(FakeDom {
                url: "about:blank".to_string(),
                ..FakeDom::default()
            }),
            is_active: AtomicBool::new(true),
            options: WaitOptions::new(500, 10),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Register the document served at `url`
    pub fn route<S: Into<String>>(self, url: S, elements: Vec<FakeElement>) -> Self {
        self.dom().routes.insert(url.into(), elements);
        self
    }

    /// Run `mutation` whenever the element with `id` is clicked
    pub fn on_click<S, F>(self, id: S, mutation: F) -> Self
    where
        S: Into<String>,
        F: Fn(&mut FakeDom) + Send + Sync + 'static,
    {
        self.dom().click_handlers.insert(id.into(), Arc::new(mutation));
        self
    }

    /// Put `elements` on the current document without navigating
    pub fn with_elements(self, elements: Vec<FakeElement>) -> Self {
        self.dom().elements = elements;
        self
    }

    fn dom(&self) -> MutexGuard<'_, FakeDom> {
        self.dom.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, entry: String) {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// Apply a change to the document right now
    pub fn mutate<F: FnOnce(&mut FakeDom)>(&self, mutation: F) {
        let mut dom = self.dom();
        mutation(&mut *dom);
    }

    /// Apply a change once `delay` has elapsed
    pub fn schedule<F>(&self, delay: Duration, mutation: F)
    where
        F: Fn(&mut FakeDom) + Send + Sync + 'static,
    {
        self.dom().schedule(delay, mutation);
    }

    /// Snapshot of the element with `id`
    pub fn element(&self, id: &str) -> Option<FakeElement> {
        let mut dom = self.dom();
        dom.apply_due();
        dom.element(id).cloned()
    }

    /// Operations performed so far (`goto <url>`, `<action> <reference>`)
    pub fn log(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::session_closed(&self.id))
        }
    }
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSession for MockPage {
    fn id(&self) -> &str {
        &self.id
    }

    fn epoch(&self) -> u64 {
        let mut dom = self.dom();
        dom.apply_due();
        dom.navigations
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    fn wait_options(&self) -> WaitOptions {
        self.options
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.ensure_active()?;
        self.record(format!("goto {}", url));
        self.dom().load(url)
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_active()?;
        self.record("reload".to_string());
        let mut dom = self.dom();
        let url = dom.url.clone();
        if dom.routes.contains_key(&url) {
            dom.load(&url)?;
        } else {
            dom.navigations += 1;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_active()?;
        let mut dom = self.dom();
        dom.apply_due();
        Ok(dom.url.clone())
    }

    async fn content(&self) -> Result<String> {
        self.ensure_active()?;
        let mut dom = self.dom();
        dom.apply_due();
        let body: String = dom
            .elements
            .iter()
            .map(|e| format!("<{tag}>{text}</{tag}>", tag = e.tag, text = e.text))
            .collect();
        Ok(format!("<html><body>{}</body></html>", body))
    }

    async fn query(
        &self,
        reference: &ElementReference,
        selection: Selection,
        query: &DomQuery,
    ) -> Result<QueryOutcome> {
        self.ensure_active()?;
        let mut dom = self.dom();
        dom.apply_due();

        let matches = dom.resolve(reference)?;
        let count = matches.len();
        let value = match query {
            DomQuery::Count => count.into(),
            _ => match selection.pick(count) {
                Some(i) => dom.query_value(matches[i], query),
                None => serde_json::Value::Null,
            },
        };
        Ok(QueryOutcome { count, value })
    }

    async fn act(
        &self,
        reference: &ElementReference,
        selection: Selection,
        action: &DomAction,
    ) -> Result<ActionOutcome> {
        self.ensure_active()?;
        let outcome = {
            let mut dom = self.dom();
            dom.apply_due();

            let matches = dom.resolve(reference)?;
            if selection.is_ambiguous(matches.len()) {
                ActionOutcome::Ambiguous(matches.len())
            } else {
                match selection.pick(matches.len()) {
                    Some(i) => dom.perform(matches[i], action),
                    None => ActionOutcome::NotFound,
                }
            }
        };
        if outcome == ActionOutcome::Done {
            self.record(format!("{} {}{}", action, reference, selection));
        }
        Ok(outcome)
    }

    async fn close(&self) -> Result<()> {
        self.is_active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> Vec<FakeElement> {
        vec![
            FakeElement::new("form").id("register"),
            FakeElement::new("input").id("username").attr("name", "username").child_of("register"),
            FakeElement::new("input").id("male").attr("type", "radio").attr("name", "gender").child_of("register"),
            FakeElement::new("input").id("female").attr("type", "radio").attr("name", "gender").child_of("register"),
            FakeElement::new("select").id("country").options(&["usa", "canada", "uk"]).child_of("register"),
            FakeElement::new("button").attr("type", "submit").text("Register").child_of("register"),
            FakeElement::new("span").class("shopping_cart_badge").text("2").hidden(),
        ]
    }

    #[test]
    fn test_parse_css_compound_and_descendant() {
        let compounds = parse_css(r#"table tbody tr.row[data-test="x"]"#).unwrap();
        assert_eq!(compounds.len(), 3);
        assert_eq!(compounds[2].tag.as_deref(), Some("tr"));
        assert_eq!(compounds[2].classes, vec!["row"]);
        assert_eq!(compounds[2].attrs, vec![("data-test".to_string(), Some("x".to_string()))]);
    }

    #[test]
    fn test_parse_css_rejects_unsupported() {
        assert!(parse_css("a:has-text(\"Cancel\")").is_err());
        assert!(parse_css("div > p").is_err());
    }

    #[tokio::test]
    async fn test_css_descendant_query() {
        let page = MockPage::new().with_elements(form());
        let outcome = page
            .query(&ElementReference::css("form button[type=\"submit\"]"), Selection::Strict, &DomQuery::Text)
            .await
            .unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.value, serde_json::json!("Register"));
    }

    #[tokio::test]
    async fn test_radio_group_is_exclusive() {
        let page = MockPage::new().with_elements(form());
        page.act(&ElementReference::id("male"), Selection::Strict, &DomAction::SetChecked(true))
            .await
            .unwrap();
        page.act(&ElementReference::id("female"), Selection::Strict, &DomAction::Click)
            .await
            .unwrap();

        assert!(!page.element("male").unwrap().checked);
        assert!(page.element("female").unwrap().checked);
    }

    #[tokio::test]
    async fn test_hidden_element_is_not_actionable() {
        let page = MockPage::new().with_elements(form());
        let outcome = page
            .act(&ElementReference::css(".shopping_cart_badge"), Selection::Strict, &DomAction::Click)
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::NotActionable("element is not visible".to_string()));
    }

    #[tokio::test]
    async fn test_select_rejects_unknown_option() {
        let page = MockPage::new().with_elements(form());
        let outcome = page
            .act(
                &ElementReference::id("country"),
                Selection::Strict,
                &DomAction::SelectOptions(vec!["mars".to_string()]),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::NotActionable(reason) if reason.contains("mars")));
        assert_eq!(page.element("country").unwrap().value, "usa");
    }

    #[tokio::test]
    async fn test_scheduled_mutation_applies_after_delay() {
        let page = MockPage::new();
        page.schedule(Duration::from_millis(30), |dom| {
            dom.insert(FakeElement::new("div").class("alert-success").text("Registration successful"));
        });

        let reference = ElementReference::css(".alert-success");
        let before = page.query(&reference, Selection::Strict, &DomQuery::Count).await.unwrap();
        assert_eq!(before.count, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after = page.query(&reference, Selection::Strict, &DomQuery::Count).await.unwrap();
        assert_eq!(after.count, 1);
    }

    #[tokio::test]
    async fn test_goto_unknown_route_fails() {
        let page = MockPage::new();
        let err = page.goto("https://nowhere.invalid/").await.unwrap_err();
        assert!(matches!(err, Error::NavigationFailed(_)));
        assert_eq!(page.epoch(), 1);
    }
}
