//! JavaScript generation for DOM queries and actions
//!
//! References, selections, queries and actions are embedded as JSON literals
//! and interpreted by a small runtime, so no selector text is ever spliced into
//! code. Every script returns a plain object that deserializes into
//! [`QueryOutcome`](super::traits::QueryOutcome) or [`ActionReport`].

use serde::Deserialize;

use crate::error::Result;
use crate::session::traits::{ActionOutcome, DomAction, DomQuery, ElementReference, Selection};

/// Shared helpers: resolution, selection and element state
const RUNTIME: &str = r#"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const SKIP_TEXT = ['SCRIPT', 'STYLE', 'HEAD', 'TITLE', 'NOSCRIPT', 'TEMPLATE'];
const all = (scope) => Array.from(scope.querySelectorAll('*'));
const inScope = (scope, sel) => {
  switch (sel.kind) {
    case 'Id': return all(scope).filter((e) => e.getAttribute('id') === sel.value);
    case 'Attribute': return all(scope).filter((e) => e.getAttribute(sel.value.name) === sel.value.value);
    case 'Css': return Array.from(scope.querySelectorAll(sel.value));
    case 'Path': {
      const snap = document.evaluate(sel.value, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      const out = [];
      for (let i = 0; i < snap.snapshotLength; i++) {
        const node = snap.snapshotItem(i);
        if (node.nodeType === Node.ELEMENT_NODE) out.push(node);
      }
      return out;
    }
    case 'Text': {
      const needle = norm(sel.value).toLowerCase();
      const hit = (e) => !SKIP_TEXT.includes(e.tagName) && norm(e.textContent).toLowerCase().includes(needle);
      return all(scope).filter((e) => hit(e) && !Array.from(e.children).some(hit));
    }
  }
  return [];
};
const resolve = (ref) => {
  const scopes = ref.parent ? resolve(ref.parent) : [document];
  const found = new Set();
  for (const scope of scopes) for (const e of inScope(scope, ref.selector)) found.add(e);
  return Array.from(found).sort((a, b) =>
    a === b ? 0 : (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING ? -1 : 1));
};
const pick = (matches, selection) => {
  switch (selection.kind) {
    case 'Strict': return matches.length === 1 ? matches[0] : null;
    case 'First': return matches[0] || null;
    case 'Nth': return matches[selection.value] || null;
  }
  return null;
};
const isVisible = (e) => {
  const style = getComputedStyle(e);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = e.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const isEnabled = (e) => !e.disabled && !e.closest('fieldset[disabled]') && e.getAttribute('aria-disabled') !== 'true';
const isEditable = (e) => isEnabled(e) && !e.readOnly &&
  (e.isContentEditable || e.tagName === 'TEXTAREA' ||
   (e.tagName === 'INPUT' && !['button', 'submit', 'reset', 'checkbox', 'radio', 'file', 'image', 'hidden'].includes(e.type)));
const isChecked = (e) => ('checked' in e) ? e.checked : e.getAttribute('aria-checked') === 'true';
const inputValue = (e) => ('value' in e && ['INPUT', 'TEXTAREA', 'SELECT'].includes(e.tagName)) ? e.value : null;
const fire = (e) => {
  e.dispatchEvent(new Event('input', { bubbles: true }));
  e.dispatchEvent(new Event('change', { bubbles: true }));
};
"#;

/// Outcome of an action script as returned by the page
#[derive(Debug, Clone, Deserialize)]
pub struct ActionReport {
    pub status: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<ActionReport> for ActionOutcome {
    fn from(report: ActionReport) -> Self {
        match report.status.as_str() {
            "done" => ActionOutcome::Done,
            "ambiguous" => ActionOutcome::Ambiguous(report.count),
            "not_actionable" => ActionOutcome::NotActionable(
                report.reason.unwrap_or_else(|| "element is not actionable".to_string()),
            ),
            "rejected" => ActionOutcome::Rejected(
                report.reason.unwrap_or_else(|| "action was rejected".to_string()),
            ),
            _ => ActionOutcome::NotFound,
        }
    }
}

/// JavaScript builder bound to one reference and selection
#[derive(Debug, Clone)]
pub struct ScriptBuilder<'a> {
    reference: &'a ElementReference,
    selection: Selection,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(reference: &'a ElementReference, selection: Selection) -> Self {
        Self {
            reference,
            selection,
        }
    }

    fn prelude(&self) -> Result<String> {
        Ok(format!(
            "const reference = {}; const selection = {};",
            serde_json::to_string(self.reference)?,
            serde_json::to_string(&self.selection)?
        ))
    }

    /// Script answering `query` for the selected element
    pub fn query_script(&self, query: &DomQuery) -> Result<String> {
        Ok(format!(
            r#"(() => {{
{runtime}
{prelude}
const query = {query};
const matches = resolve(reference);
const el = pick(matches, selection);
if (query.kind === 'Count') return {{ count: matches.length, value: matches.length }};
if (!el) return {{ count: matches.length, value: null }};
let value = null;
switch (query.kind) {{
  case 'Visible': value = isVisible(el); break;
  case 'Enabled': value = isEnabled(el); break;
  case 'Editable': value = isEditable(el); break;
  case 'Checked': value = isChecked(el); break;
  case 'Attribute': value = el.getAttribute(query.value); break;
  case 'Text': value = el.textContent || ''; break;
  case 'Value': value = inputValue(el); break;
}}
return {{ count: matches.length, value }};
}})()"#,
            runtime = RUNTIME,
            prelude = self.prelude()?,
            query = serde_json::to_string(query)?,
        ))
    }

    /// Script attempting `action` once on the selected element
    pub fn action_script(&self, action: &DomAction) -> Result<String> {
        Ok(format!(
            r#"(() => {{
{runtime}
{prelude}
const action = {action};
const matches = resolve(reference);
const count = matches.length;
if (selection.kind === 'Strict' && count > 1) return {{ status: 'ambiguous', count }};
const el = pick(matches, selection);
if (!el) return {{ status: 'not_found', count }};
const refuse = (reason) => ({{ status: 'not_actionable', count, reason }});
const reject = (reason) => ({{ status: 'rejected', count, reason }});
if (!isVisible(el)) return refuse('element is not visible');
if (!isEnabled(el)) return refuse('element is disabled');
switch (action.kind) {{
  case 'Fill':
  case 'Clear': {{
    if (!isEditable(el)) return refuse('element is not editable');
    const text = action.kind === 'Fill' ? action.value : '';
    el.focus();
    if (el.isContentEditable) {{
      el.textContent = text;
    }} else {{
      const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
      Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, text);
    }}
    fire(el);
    break;
  }}
  case 'Click':
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    break;
  case 'SetChecked': {{
    if (!('checked' in el) || !['checkbox', 'radio'].includes(el.type)) return reject('element is not a checkbox or radio button');
    if (el.checked === action.value) break;
    if (el.type === 'radio' && !action.value) return reject('a radio button cannot be unchecked');
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    if (el.checked !== action.value) return reject('checked state did not change after click');
    break;
  }}
  case 'SelectOptions': {{
    if (el.tagName !== 'SELECT') return refuse('element is not a <select>');
    const options = Array.from(el.options);
    const wanted = action.value;
    const matchesOption = (o, w) => o.value === w || norm(o.textContent) === w;
    const missing = wanted.filter((w) => !options.some((o) => matchesOption(o, w)));
    if (missing.length) return refuse('no option matching ' + missing.join(', '));
    if (!el.multiple && wanted.length > 1) return refuse('element does not accept multiple selections');
    options.forEach((o) => {{ o.selected = wanted.some((w) => matchesOption(o, w)); }});
    fire(el);
    break;
  }}
}}
return {{ status: 'done', count }};
}})()"#,
            runtime = RUNTIME,
            prelude = self.prelude()?,
            action = serde_json::to_string(action)?,
        ))
    }
}
