//! URL patterns for location assertions and success signals

use crate::{Error, Result};
use std::fmt;

/// Pattern a page location is matched against
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Contains substring
    Contains(String),
    /// Glob pattern (e.g. "**/inventory.html")
    Glob(glob::Pattern),
    /// Regular expression, searched anywhere in the URL
    Regex(regex::Regex),
}

impl UrlPattern {
    pub fn exact<S: Into<String>>(url: S) -> Self {
        Self::Exact(url.into())
    }

    pub fn contains<S: Into<String>>(fragment: S) -> Self {
        Self::Contains(fragment.into())
    }

    /// Glob pattern; an invalid pattern falls back to exact matching
    pub fn glob(pattern: &str) -> Self {
        match glob::Pattern::new(pattern) {
            Ok(compiled) => Self::Glob(compiled),
            Err(_) => Self::Exact(pattern.to_string()),
        }
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        regex::Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| Error::configuration(format!("Invalid URL regex {}: {}", pattern, e)))
    }

    /// Check if a URL matches this pattern
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(expected) => url == expected,
            Self::Contains(fragment) => url.contains(fragment.as_str()),
            Self::Glob(pattern) => pattern.matches(url),
            Self::Regex(re) => re.is_match(url),
        }
    }
}

/// Strings containing `*` are globs, anything else is an exact URL
impl From<&str> for UrlPattern {
    fn from(pattern: &str) -> Self {
        if pattern.contains('*') {
            Self::glob(pattern)
        } else {
            Self::Exact(pattern.to_string())
        }
    }
}

impl From<String> for UrlPattern {
    fn from(pattern: String) -> Self {
        Self::from(pattern.as_str())
    }
}

impl From<regex::Regex> for UrlPattern {
    fn from(re: regex::Regex) -> Self {
        Self::Regex(re)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(url) => write!(f, "{}", url),
            Self::Contains(fragment) => write!(f, "*{}*", fragment),
            Self::Glob(pattern) => write!(f, "{}", pattern.as_str()),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}
