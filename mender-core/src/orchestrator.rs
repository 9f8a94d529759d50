//! The resolution pipeline: original selector, then cache, then AI healing.
use chrono::Utc;
use mender_common::{ExecutionStrategy, LocatorOptions, MenderError, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::adapter::{AutomationAdapter, ElementContext, FindOptions};
use crate::ai::AiService;
use crate::cache::{cache_key, CacheMetrics, CacheStore, CachedSelector, MemoryCacheStore};
use crate::locator::{LocatorRequest, LocatorResult, ResolutionStrategy};
use crate::recorder::{TracingRecorder, UsageEvent, UsageRecorder};
use crate::strategy::{self, HealingContext, Progress};
use crate::translator::{to_engine_format, to_native_format};

/// Finds elements, healing broken selectors through the cache and the AI.
///
/// Holds no per-request state; concurrent `locate` calls only share the
/// cache store.
pub struct HealingOrchestrator<A: AutomationAdapter> {
    adapter: A,
    ai: Arc<dyn AiService>,
    cache: Arc<dyn CacheStore>,
    recorder: Arc<dyn UsageRecorder>,
    strategy: ExecutionStrategy,
    options: LocatorOptions,
}

pub struct OrchestratorBuilder<A: AutomationAdapter> {
    adapter: A,
    ai: Option<Arc<dyn AiService>>,
    cache: Option<Arc<dyn CacheStore>>,
    recorder: Option<Arc<dyn UsageRecorder>>,
    strategy: ExecutionStrategy,
    options: LocatorOptions,
}

impl<A: AutomationAdapter> OrchestratorBuilder<A> {
    pub fn ai(mut self, ai: Arc<dyn AiService>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Options used by [`HealingOrchestrator::locate`].
    pub fn options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<HealingOrchestrator<A>> {
        let ai = self
            .ai
            .ok_or_else(|| MenderError::Config("an AI service is required".to_string()))?;
        let cache = self.cache.unwrap_or_else(|| {
            let defaults = mender_common::CacheConfig::default();
            Arc::new(MemoryCacheStore::new(defaults.capacity, defaults.ttl())) as Arc<dyn CacheStore>
        });
        let recorder = self
            .recorder
            .unwrap_or_else(|| Arc::new(TracingRecorder) as Arc<dyn UsageRecorder>);

        if self.strategy == ExecutionStrategy::Parallel {
            tracing::warn!("parallel strategy runs visual analysis only");
        }
        tracing::info!(
            framework = self.adapter.framework(),
            cache = cache.name(),
            strategy = ?self.strategy,
            "orchestrator.ready"
        );

        Ok(HealingOrchestrator {
            adapter: self.adapter,
            ai,
            cache,
            recorder,
            strategy: self.strategy,
            options: self.options,
        })
    }
}

struct Resolved<E> {
    element: E,
    selector: String,
    strategy: ResolutionStrategy,
    from_cache: bool,
    confidence: f64,
}

impl<A: AutomationAdapter> HealingOrchestrator<A> {
    pub fn builder(adapter: A) -> OrchestratorBuilder<A> {
        OrchestratorBuilder {
            adapter,
            ai: None,
            cache: None,
            recorder: None,
            strategy: ExecutionStrategy::default(),
            options: LocatorOptions::default(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    /// Resolve `selector` (native expression or raw selector) with the
    /// default options.
    pub async fn locate(
        &self,
        selector: &str,
        description: &str,
    ) -> Result<LocatorResult<A::Element>> {
        let request =
            LocatorRequest::new(selector, description).with_options(self.options.clone());
        self.locate_with(request).await
    }

    /// Resolve one request. Exactly one usage event is recorded, after
    /// success or just before the error is returned.
    pub async fn locate_with(&self, request: LocatorRequest) -> Result<LocatorResult<A::Element>> {
        let started = Instant::now();
        let selector = to_engine_format(request.selector.trim());
        let mut progress = Progress::new();

        let outcome = self.resolve(&selector, &request, &mut progress).await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(found) => {
                let element_description = match self.adapter.element_context(&found.element).await
                {
                    Ok(ctx) => Some(ctx.describe()),
                    Err(e) => {
                        tracing::debug!(error = %e, "healing.element_context_failed");
                        None
                    }
                };
                self.recorder.record(UsageEvent {
                    original_selector: to_native_format(&selector),
                    description: request.description.clone(),
                    strategy: found.strategy,
                    duration_ms: execution_time_ms,
                    success: true,
                    resolved_selector: Some(to_native_format(&found.selector)),
                    element_description,
                    reasoning: progress.reasoning.clone(),
                    tokens_used: progress.tokens_used,
                    timestamp: Utc::now(),
                });
                Ok(LocatorResult {
                    element: found.element,
                    actual_selector: found.selector,
                    strategy: found.strategy,
                    execution_time_ms,
                    from_cache: found.from_cache,
                    confidence: found.confidence,
                    reasoning: progress.reasoning,
                    tokens_used: progress.tokens_used,
                })
            }
            Err(err) => {
                tracing::warn!(
                    selector = %selector,
                    description = %request.description,
                    strategy = progress.strategy.as_str(),
                    error = %err,
                    "healing.failed"
                );
                self.recorder.record(UsageEvent {
                    original_selector: to_native_format(&selector),
                    description: request.description.clone(),
                    strategy: progress.strategy,
                    duration_ms: execution_time_ms,
                    success: false,
                    resolved_selector: progress.resolved.as_deref().map(to_native_format),
                    element_description: None,
                    reasoning: progress.reasoning,
                    tokens_used: progress.tokens_used,
                    timestamp: Utc::now(),
                });
                Err(err)
            }
        }
    }

    async fn resolve(
        &self,
        selector: &str,
        request: &LocatorRequest,
        progress: &mut Progress,
    ) -> Result<Resolved<A::Element>> {
        let description = request.description.as_str();
        let find = FindOptions::from(&request.options);
        let caching = request.options.enable_caching;
        let key = cache_key(selector, description);

        let matches = self.adapter.find_elements(selector, find).await;
        tracing::debug!(selector, matches = matches.len(), "healing.stage.original");
        if !matches.is_empty() {
            let element = self.pick(matches, selector, request, progress).await?;
            if caching {
                self.store(&key, selector).await;
            }
            return Ok(Resolved {
                element,
                selector: selector.to_string(),
                strategy: ResolutionStrategy::OriginalSelector,
                from_cache: false,
                confidence: 1.0,
            });
        }

        if caching {
            progress.strategy = ResolutionStrategy::Cached;
            if let Some(found) = self.from_cache(&key, selector, request, find, progress).await? {
                return Ok(found);
            }
        }

        let ctx = HealingContext {
            adapter: &self.adapter,
            ai: self.ai.as_ref(),
            selector,
            description,
            find,
        };
        let attempt = strategy::run(self.strategy, &ctx, progress).await?;
        let healed = attempt.analysis.selector.clone();

        let matches = match attempt.matches {
            Some(matches) => matches,
            None if healed.is_empty() => Vec::new(),
            None => self.adapter.find_elements(&healed, find).await,
        };
        tracing::debug!(
            selector = %healed,
            strategy = attempt.strategy.as_str(),
            matches = matches.len(),
            "healing.stage.ai"
        );
        if matches.is_empty() {
            return Err(MenderError::NotFound {
                description: description.to_string(),
            });
        }

        let element = self.pick(matches, &healed, request, progress).await?;
        if caching {
            self.store(&key, &healed).await;
        }
        tracing::info!(
            original = %selector,
            healed = %healed,
            strategy = attempt.strategy.as_str(),
            tokens_used = progress.tokens_used,
            "healing.healed"
        );
        Ok(Resolved {
            element,
            selector: healed,
            strategy: attempt.strategy,
            from_cache: false,
            confidence: attempt.analysis.confidence,
        })
    }

    /// Stage 2. `None` means fall through to AI healing.
    async fn from_cache(
        &self,
        key: &str,
        selector: &str,
        request: &LocatorRequest,
        find: FindOptions,
        progress: &mut Progress,
    ) -> Result<Option<Resolved<A::Element>>> {
        let Some(mut entry) = self.cache.get(key).await else {
            tracing::debug!(%key, "healing.stage.cache.miss");
            return Ok(None);
        };
        if !entry.is_trusted() {
            tracing::debug!(
                %key,
                success_rate = entry.current_success_rate(),
                "healing.stage.cache.untrusted"
            );
            return Ok(None);
        }

        progress.resolved = Some(entry.selector.clone());
        // Stage 1 just searched this selector and found nothing.
        let matches = if entry.selector == selector {
            Vec::new()
        } else {
            self.adapter.find_elements(&entry.selector, find).await
        };
        if matches.is_empty() {
            tracing::info!(%key, selector = %entry.selector, "healing.stage.cache.stale");
            self.mark(key, false).await;
            return Ok(None);
        }

        let element = match self.pick(matches, &entry.selector, request, progress).await {
            Ok(element) => element,
            Err(err) => {
                if matches!(err, MenderError::Ambiguous { .. }) {
                    self.mark(key, false).await;
                }
                return Err(err);
            }
        };
        self.mark(key, true).await;
        entry.update_success(true);
        Ok(Some(Resolved {
            element,
            confidence: entry.current_success_rate(),
            selector: entry.selector,
            strategy: ResolutionStrategy::Cached,
            from_cache: true,
        }))
    }

    /// Reduce a non-empty match list to one element.
    async fn pick(
        &self,
        matches: Vec<A::Element>,
        selector: &str,
        request: &LocatorRequest,
        progress: &mut Progress,
    ) -> Result<A::Element> {
        let count = matches.len();
        if count > 1 && request.options.strict_mode {
            return Err(MenderError::Ambiguous {
                selector: selector.to_string(),
                count,
            });
        }

        let index = if count > 1 {
            let mut candidates = Vec::with_capacity(count);
            for element in &matches {
                let ctx = match self.adapter.element_context(element).await {
                    Ok(ctx) => ctx.capped(),
                    Err(e) => {
                        tracing::debug!(error = %e, "healing.candidate_context_failed");
                        ElementContext::default()
                    }
                };
                candidates.push(ctx);
            }
            let selection = self
                .ai
                .select_best_matching_element(&candidates, &request.description)
                .await?;
            progress.add_tokens(selection.tokens_used);
            if progress.reasoning.is_none() && !selection.reasoning.is_empty() {
                progress.reasoning = Some(selection.reasoning);
            }
            if selection.index < count {
                selection.index
            } else {
                tracing::warn!(index = selection.index, count, "healing.disambiguation.out_of_range");
                0
            }
        } else {
            0
        };
        tracing::debug!(selector, count, index, "healing.picked");

        matches
            .into_iter()
            .nth(index)
            .ok_or_else(|| MenderError::NotFound {
                description: request.description.clone(),
            })
    }

    async fn store(&self, key: &str, selector: &str) {
        if let Err(e) = self.cache.put(key, CachedSelector::new(selector)).await {
            tracing::warn!(%key, error = %e, "healing.cache_write_failed");
        }
    }

    async fn mark(&self, key: &str, success: bool) {
        if let Err(e) = self.cache.update_success(key, success).await {
            tracing::warn!(%key, success, error = %e, "healing.cache_update_failed");
        }
    }

    pub async fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics().await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear_all().await
    }

    pub async fn evict_expired(&self) -> Result<usize> {
        self.cache.evict_expired().await
    }
}
