//! Capability interface for browser-automation backends.
use async_trait::async_trait;
use mender_common::{LocatorOptions, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Maximum number of sibling tags an [`ElementContext`] carries.
pub const MAX_SIBLING_TAGS: usize = 5;

/// How long, and how often, an adapter may poll for a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub timeout: Duration,
    pub attempts: u32,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::from(&LocatorOptions::default())
    }
}

impl From<&LocatorOptions> for FindOptions {
    fn from(options: &LocatorOptions) -> Self {
        Self {
            timeout: Duration::from_millis(options.timeout_ms),
            attempts: options.retry_attempts.max(1),
        }
    }
}

impl FindOptions {
    /// Pause between polls so that `attempts` polls span `timeout`.
    pub fn poll_interval(&self) -> Duration {
        self.timeout / self.attempts.max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What an adapter can tell about one element, used for disambiguation
/// prompts and usage events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementContext {
    pub tag: String,
    pub id: Option<String>,
    pub class: Option<String>,
    /// Visible (rendered) text.
    pub text: String,
    pub position: Position,
    /// Short descriptor of the parent, e.g. `form#login`.
    pub parent_descriptor: Option<String>,
    pub sibling_tags: Vec<String>,
    /// A subset of attributes (name, type, role, aria-*, data-*, ...).
    pub attributes: BTreeMap<String, String>,
    /// Raw `textContent`, including hidden text.
    pub text_content: String,
}

impl ElementContext {
    /// One-line, HTML-ish rendering: `<input id="user-name" type="text"> "…"`.
    pub fn describe(&self) -> String {
        let mut out = format!("<{}", self.tag.to_ascii_lowercase());
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " id=\"{id}\"");
        }
        if let Some(class) = self.class.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " class=\"{class}\"");
        }
        for (name, value) in &self.attributes {
            if name == "id" || name == "class" {
                continue;
            }
            let _ = write!(out, " {name}=\"{value}\"");
        }
        out.push('>');
        let text = self.text.trim();
        if !text.is_empty() {
            let snippet: String = text.chars().take(60).collect();
            let _ = write!(out, " \"{snippet}\"");
        }
        out
    }

    /// Enforce the sibling cap after an adapter filled the context in.
    pub fn capped(mut self) -> Self {
        self.sibling_tags.truncate(MAX_SIBLING_TAGS);
        self
    }
}

/// Browser-automation capabilities the orchestrator relies on.
///
/// `Element` is the framework's own handle; the core only passes it back to
/// the adapter and never caches it.
#[async_trait]
pub trait AutomationAdapter: Send + Sync {
    type Element: Clone + Send + Sync + 'static;

    /// All elements matching a selector-engine string.
    ///
    /// Never fails: adapter-level errors are logged and reported as no match.
    async fn find_elements(&self, selector: &str, options: FindOptions) -> Vec<Self::Element>;

    async fn page_source(&self) -> Result<String>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    async fn element_context(&self, element: &Self::Element) -> Result<ElementContext>;

    /// Hint passed to DOM analysis so selectors match the adapter's syntax.
    fn framework(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_options_follow_locator_options() {
        let opts = LocatorOptions {
            timeout_ms: 900,
            retry_attempts: 0,
            ..Default::default()
        };
        let find = FindOptions::from(&opts);
        assert_eq!(find.attempts, 1);
        assert_eq!(find.poll_interval(), Duration::from_millis(900));
    }

    #[test]
    fn describe_renders_identifying_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("type".to_string(), "text".to_string());
        let ctx = ElementContext {
            tag: "INPUT".into(),
            id: Some("user-name".into()),
            attributes,
            ..Default::default()
        };
        assert_eq!(ctx.describe(), r#"<input id="user-name" type="text">"#);
    }

    #[test]
    fn capped_limits_siblings() {
        let ctx = ElementContext {
            sibling_tags: vec!["li".to_string(); 9],
            ..Default::default()
        }
        .capped();
        assert_eq!(ctx.sibling_tags.len(), MAX_SIBLING_TAGS);
    }
}
