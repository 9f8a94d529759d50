#![allow(dead_code)]

use async_trait::async_trait;
use mender_common::observability::{LogConfig, LogFormat};
use mender_common::{MenderError, Result};
use mender_core::{AiAnalysis, AiService, AutomationAdapter, ElementContext, FindOptions, Selection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "mender-tests",
            log_dir: Some(std::env::temp_dir().join("mender-tests")),
            emit_stderr: true,
            format: if std::env::var("MENDER_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
            ..LogConfig::default()
        };

        mender_common::observability::init_logging(config).unwrap_or_default()
    });
}

pub const DOM_TOKENS: u32 = 100;
pub const VISUAL_TOKENS: u32 = 150;
pub const SELECT_TOKENS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub tag: String,
    pub id: String,
}

impl FakeElement {
    pub fn new(tag: &str, id: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: id.to_string(),
        }
    }
}

/// A page is a map from selector to the elements it matches.
#[derive(Clone, Default)]
pub struct FakeAdapter {
    page: Arc<Mutex<HashMap<String, Vec<FakeElement>>>>,
    finds: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.set(selector, elements);
        self
    }

    pub fn set(&self, selector: &str, elements: Vec<FakeElement>) {
        self.page
            .lock()
            .unwrap()
            .insert(selector.to_string(), elements);
    }

    pub fn remove(&self, selector: &str) {
        self.page.lock().unwrap().remove(selector);
    }

    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AutomationAdapter for FakeAdapter {
    type Element = FakeElement;

    async fn find_elements(&self, selector: &str, _options: FindOptions) -> Vec<FakeElement> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.page
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    async fn page_source(&self) -> Result<String> {
        let page = self.page.lock().unwrap();
        let mut html = String::from("<html><body>");
        for element in page.values().flatten() {
            html.push_str(&format!("<{0} id=\"{1}\"></{0}>", element.tag, element.id));
        }
        html.push_str("</body></html>");
        Ok(html)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://example.test/login".to_string())
    }

    async fn element_context(&self, element: &FakeElement) -> Result<ElementContext> {
        Ok(ElementContext {
            tag: element.tag.clone(),
            id: Some(element.id.clone()),
            ..Default::default()
        })
    }

    fn framework(&self) -> &str {
        "fake"
    }
}

/// AI double answering from a script and counting calls.
#[derive(Default)]
pub struct ScriptedAi {
    dom: Mutex<Option<String>>,
    visual: Mutex<Option<String>>,
    pick: AtomicUsize,
    fail: AtomicBool,
    pub dom_calls: AtomicUsize,
    pub visual_calls: AtomicUsize,
    pub select_calls: AtomicUsize,
    pub last_candidates: Mutex<Vec<ElementContext>>,
}

impl ScriptedAi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dom_answers(&self, selector: &str) {
        *self.dom.lock().unwrap() = Some(selector.to_string());
    }

    pub fn visual_answers(&self, selector: &str) {
        *self.visual.lock().unwrap() = Some(selector.to_string());
    }

    pub fn picks(&self, index: usize) {
        self.pick.store(index, Ordering::SeqCst);
    }

    pub fn fail_with_network_error(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn dom_count(&self) -> usize {
        self.dom_calls.load(Ordering::SeqCst)
    }

    pub fn visual_count(&self) -> usize {
        self.visual_calls.load(Ordering::SeqCst)
    }

    pub fn select_count(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, scripted: &Mutex<Option<String>>, tokens: u32) -> Result<AiAnalysis> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MenderError::Ai("network error: connection refused".to_string()));
        }
        let selector = scripted
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| MenderError::Ai("no scripted answer".to_string()))?;
        Ok(AiAnalysis {
            selector,
            confidence: 0.9,
            reasoning: "matches the description".to_string(),
            alternatives: Vec::new(),
            tokens_used: tokens,
        })
    }
}

#[async_trait]
impl AiService for ScriptedAi {
    async fn analyze_dom(
        &self,
        _html: &str,
        _description: &str,
        _original_selector: &str,
        _framework: &str,
    ) -> Result<AiAnalysis> {
        self.dom_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.dom, DOM_TOKENS)
    }

    async fn analyze_visual(&self, _screenshot: &[u8], _description: &str) -> Result<AiAnalysis> {
        self.visual_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.visual, VISUAL_TOKENS)
    }

    async fn select_best_matching_element(
        &self,
        candidates: &[ElementContext],
        _description: &str,
    ) -> Result<Selection> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MenderError::Ai("network error: connection refused".to_string()));
        }
        *self.last_candidates.lock().unwrap() = candidates.to_vec();
        Ok(Selection {
            index: self.pick.load(Ordering::SeqCst),
            reasoning: "closest text match".to_string(),
            tokens_used: SELECT_TOKENS,
        })
    }
}
