use anyhow::Result;
use mender_common::{LocatorOptions, MenderConfig};
use mender_core::{
    CacheMetrics, HealingOrchestrator, ResolutionReport, TracingRecorder, open_cache_store,
};
use mender_drivers::{WebDriverAdapter, WebDriverSession};
use std::sync::Arc;

/// What a `locate` run needs beyond the loaded config.
pub struct LocateJob {
    pub url: String,
    pub selector: String,
    pub description: String,
    pub options: LocatorOptions,
}

pub async fn build_orchestrator(
    adapter: WebDriverAdapter,
    cfg: &MenderConfig,
    options: LocatorOptions,
) -> Result<HealingOrchestrator<WebDriverAdapter>> {
    let ai = mender_llm::ensure_ai_ready(&cfg.ai).await?;
    let cache = open_cache_store(&cfg.cache).await?;
    let orchestrator = HealingOrchestrator::builder(adapter)
        .ai(ai)
        .cache(cache)
        .recorder(Arc::new(TracingRecorder))
        .strategy(cfg.strategy)
        .options(options)
        .build()?;
    Ok(orchestrator)
}

/// Open a browser, resolve one element and close the browser again.
pub async fn run_locate(cfg: &MenderConfig, job: LocateJob) -> Result<ResolutionReport> {
    let session = WebDriverSession::from_config(&cfg.webdriver).await?;
    let outcome = locate_in(&session, cfg, job).await;
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "webdriver.close_failed");
    }
    outcome
}

async fn locate_in(
    session: &WebDriverSession,
    cfg: &MenderConfig,
    job: LocateJob,
) -> Result<ResolutionReport> {
    session.goto(&job.url).await?;
    let orchestrator = build_orchestrator(session.adapter(), cfg, job.options).await?;
    let result = orchestrator.locate(&job.selector, &job.description).await?;
    Ok(result.report())
}

pub enum CacheAction {
    Stats,
    Clear,
    Evict,
}

/// Cache maintenance without a browser session.
pub async fn run_cache(cfg: &MenderConfig, action: CacheAction) -> Result<CacheMetrics> {
    let cache = open_cache_store(&cfg.cache).await?;
    match action {
        CacheAction::Stats => {}
        CacheAction::Clear => cache.clear_all().await?,
        CacheAction::Evict => {
            let removed = cache.evict_expired().await?;
            tracing::info!(removed, "cache.evicted");
        }
    }
    Ok(cache.metrics().await)
}
