use crate::browser::page::WebDriverAdapter;
use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};
use mender_common::WebDriverConfig;
use serde_json::json;
use url::Url;
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver session.
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Connect to a running WebDriver service, e.g. `http://localhost:9515`
    /// for Chromedriver.
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(browser_capabilities(headless))
            .connect(webdriver_url)
            .await
            .with_context(|| format!("connecting to WebDriver at {webdriver_url}"))?;
        tracing::info!(%webdriver_url, headless, "webdriver.connected");
        Ok(Self { client })
    }

    pub async fn from_config(config: &WebDriverConfig) -> Result<Self> {
        Self::connect(&config.url, config.headless).await
    }

    /// Navigate to an absolute URL.
    pub async fn goto(&self, target: &str) -> Result<()> {
        let url = Url::parse(target).with_context(|| format!("invalid page URL {target}"))?;
        self.client.goto(url.as_str()).await?;
        Ok(())
    }

    /// An adapter sharing this session.
    pub fn adapter(&self) -> WebDriverAdapter {
        WebDriverAdapter::new(self.client.clone())
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

fn browser_capabilities(headless: bool) -> Capabilities {
    let mut caps = Capabilities::new();
    #[cfg(feature = "chromium")]
    {
        let mut args = vec![json!("--window-size=1280,800")];
        if headless {
            args.push(json!("--headless"));
            args.push(json!("--disable-gpu"));
        }
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    }
    #[cfg(not(feature = "chromium"))]
    {
        if headless {
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless"] }),
            );
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "chromium")]
    #[test]
    fn headless_adds_chrome_arguments() {
        let caps = browser_capabilities(true);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless")));

        let caps = browser_capabilities(false);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.contains(&json!("--headless")));
    }
}
