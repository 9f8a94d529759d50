//! AI healing sub-attempts and the order they run in.
//!
//! Recommended selectors are normalized to engine form. A strategy returns
//! the selector it ended up with; whether that selector
//! resolves is re-checked by the orchestrator. A fallback only triggers when
//! the first sub-attempt's selector matches nothing. An error from any
//! sub-attempt aborts the whole strategy.
use mender_common::{ExecutionStrategy, Result};

use crate::adapter::{AutomationAdapter, FindOptions};
use crate::ai::{AiAnalysis, AiService};
use crate::locator::ResolutionStrategy;
use crate::translator::to_engine_format;

/// Inputs shared by every sub-attempt of one resolution.
pub(crate) struct HealingContext<'a, A: AutomationAdapter> {
    pub adapter: &'a A,
    pub ai: &'a dyn AiService,
    pub selector: &'a str,
    pub description: &'a str,
    pub find: FindOptions,
}

/// Where a resolution stands; feeds the failure event.
///
/// Each sub-attempt updates it before the next one starts, so tokens already
/// spent survive a later sub-attempt failing.
pub(crate) struct Progress {
    pub strategy: ResolutionStrategy,
    pub tokens_used: u32,
    pub reasoning: Option<String>,
    pub resolved: Option<String>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            strategy: ResolutionStrategy::OriginalSelector,
            tokens_used: 0,
            reasoning: None,
            resolved: None,
        }
    }

    pub fn add_tokens(&mut self, tokens: u32) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
    }

    fn record(&mut self, analysis: &AiAnalysis) {
        self.add_tokens(analysis.tokens_used);
        self.reasoning = Some(analysis.reasoning.clone());
        self.resolved = Some(analysis.selector.clone());
    }
}

/// Outcome of running a strategy.
pub(crate) struct HealingAttempt<E> {
    pub analysis: AiAnalysis,
    pub strategy: ResolutionStrategy,
    /// Matches already looked up while deciding on a fallback.
    pub matches: Option<Vec<E>>,
}

pub(crate) async fn run<A: AutomationAdapter>(
    strategy: ExecutionStrategy,
    ctx: &HealingContext<'_, A>,
    progress: &mut Progress,
) -> Result<HealingAttempt<A::Element>> {
    match strategy {
        ExecutionStrategy::DomOnly => single(ctx, ResolutionStrategy::DomAnalysis, progress).await,
        ExecutionStrategy::Parallel => {
            single(ctx, ResolutionStrategy::VisualAnalysis, progress).await
        }
        ExecutionStrategy::VisualFirst => {
            with_fallback(
                ctx,
                ResolutionStrategy::VisualAnalysis,
                ResolutionStrategy::DomAnalysis,
                progress,
            )
            .await
        }
        ExecutionStrategy::SmartSequential | ExecutionStrategy::Sequential => {
            with_fallback(
                ctx,
                ResolutionStrategy::DomAnalysis,
                ResolutionStrategy::VisualAnalysis,
                progress,
            )
            .await
        }
    }
}

async fn single<A: AutomationAdapter>(
    ctx: &HealingContext<'_, A>,
    which: ResolutionStrategy,
    progress: &mut Progress,
) -> Result<HealingAttempt<A::Element>> {
    let analysis = sub_attempt(ctx, which, progress).await?;
    Ok(HealingAttempt {
        analysis,
        strategy: which,
        matches: None,
    })
}

async fn with_fallback<A: AutomationAdapter>(
    ctx: &HealingContext<'_, A>,
    primary: ResolutionStrategy,
    fallback: ResolutionStrategy,
    progress: &mut Progress,
) -> Result<HealingAttempt<A::Element>> {
    let first = sub_attempt(ctx, primary, progress).await?;
    let matches = ctx.adapter.find_elements(&first.selector, ctx.find).await;
    if !matches.is_empty() {
        return Ok(HealingAttempt {
            analysis: first,
            strategy: primary,
            matches: Some(matches),
        });
    }

    tracing::info!(
        selector = %first.selector,
        primary = primary.as_str(),
        fallback = fallback.as_str(),
        "healing.strategy.fallback"
    );
    let second = sub_attempt(ctx, fallback, progress).await?;
    Ok(HealingAttempt {
        analysis: second,
        strategy: fallback,
        matches: None,
    })
}

async fn sub_attempt<A: AutomationAdapter>(
    ctx: &HealingContext<'_, A>,
    which: ResolutionStrategy,
    progress: &mut Progress,
) -> Result<AiAnalysis> {
    progress.strategy = which;
    let analysis = match which {
        ResolutionStrategy::VisualAnalysis => visual_analysis(ctx).await?,
        _ => dom_analysis(ctx).await?,
    };
    progress.record(&analysis);
    Ok(analysis)
}

async fn dom_analysis<A: AutomationAdapter>(ctx: &HealingContext<'_, A>) -> Result<AiAnalysis> {
    let html = ctx.adapter.page_source().await?;
    let mut analysis = ctx
        .ai
        .analyze_dom(&html, ctx.description, ctx.selector, ctx.adapter.framework())
        .await?;
    analysis.selector = to_engine_format(analysis.selector.trim());
    tracing::debug!(
        selector = %analysis.selector,
        confidence = analysis.confidence,
        tokens_used = analysis.tokens_used,
        "healing.dom_analysis"
    );
    Ok(analysis)
}

async fn visual_analysis<A: AutomationAdapter>(
    ctx: &HealingContext<'_, A>,
) -> Result<AiAnalysis> {
    let png = ctx.adapter.screenshot().await?;
    let mut analysis = ctx.ai.analyze_visual(&png, ctx.description).await?;
    analysis.selector = to_engine_format(analysis.selector.trim());
    tracing::debug!(
        selector = %analysis.selector,
        confidence = analysis.confidence,
        tokens_used = analysis.tokens_used,
        "healing.visual_analysis"
    );
    Ok(analysis)
}
