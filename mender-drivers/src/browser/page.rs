use crate::browser::selector::EngineLocator;
use async_trait::async_trait;
use fantoccini::{elements::Element, Client};
use mender_common::{MenderError, Result};
use mender_core::{AutomationAdapter, ElementContext, FindOptions};
use tracing::debug;

const FRAMEWORK: &str = "webdriver";

// Returns the ElementContext shape (camelCase) for arguments[0].
const ELEMENT_CONTEXT_SCRIPT: &str = r#"
const el = arguments[0];
const keep = ['name', 'type', 'role', 'href', 'placeholder', 'title', 'alt', 'value', 'for'];
const attributes = {};
for (const attr of Array.from(el.attributes)) {
  if (keep.includes(attr.name) || attr.name.startsWith('aria-') || attr.name.startsWith('data-')) {
    attributes[attr.name] = attr.value;
  }
}
const parent = el.parentElement;
let parentDescriptor = null;
if (parent) {
  parentDescriptor = parent.tagName.toLowerCase();
  if (parent.id) parentDescriptor += '#' + parent.id;
  if (parent.classList.length) parentDescriptor += '.' + Array.from(parent.classList).join('.');
}
const rect = el.getBoundingClientRect();
return {
  tag: el.tagName.toLowerCase(),
  id: el.id || null,
  class: el.getAttribute('class'),
  text: (el.innerText || '').trim(),
  position: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
  parentDescriptor: parentDescriptor,
  siblingTags: parent
    ? Array.from(parent.children).filter((c) => c !== el).slice(0, 5).map((c) => c.tagName.toLowerCase())
    : [],
  attributes: attributes,
  textContent: el.textContent || '',
};
"#;

/// [`AutomationAdapter`] over a WebDriver session.
#[derive(Clone)]
pub struct WebDriverAdapter {
    client: Client,
}

impl WebDriverAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn driver_err(e: impl Into<anyhow::Error>) -> MenderError {
    MenderError::Driver(e.into())
}

#[async_trait]
impl AutomationAdapter for WebDriverAdapter {
    type Element = Element;

    async fn find_elements(&self, selector: &str, options: FindOptions) -> Vec<Element> {
        let locator = EngineLocator::parse(selector);
        let interval = options.poll_interval();
        for attempt in 1..=options.attempts {
            match self.client.find_all(locator.as_locator()).await {
                Ok(found) if !found.is_empty() => return found,
                Ok(_) => {}
                Err(e) => {
                    debug!(%selector, error = %e, "webdriver.find_failed");
                    return Vec::new();
                }
            }
            if attempt < options.attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Vec::new()
    }

    async fn page_source(&self) -> Result<String> {
        self.client.source().await.map_err(driver_err)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client.screenshot().await.map_err(driver_err)
    }

    async fn current_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(driver_err)
    }

    async fn element_context(&self, element: &Element) -> Result<ElementContext> {
        let handle = serde_json::to_value(element).map_err(driver_err)?;
        let value = self
            .client
            .execute(ELEMENT_CONTEXT_SCRIPT, vec![handle])
            .await
            .map_err(driver_err)?;
        let context: ElementContext = serde_json::from_value(value).map_err(driver_err)?;
        Ok(context.capped())
    }

    fn framework(&self) -> &str {
        FRAMEWORK
    }
}
