//! End-to-end pipeline wiring.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use adforge_gemini::CompletionGateway;
use adforge_media::{FrameSampler, MediaDecoder};
use adforge_models::{AssetHandle, AssetId, BlueprintSet, CreativeBrief, CreativeRanking};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::generator::BlueprintGenerator;
use crate::orchestrator::{BatchOrchestrator, BatchReport};
use crate::ranker::BlueprintRanker;
use crate::ranking::select_primary;
use crate::retry::RetryConfig;
use crate::sink::{JsonDirSink, ResultSink};
use crate::tracker::{AssetSummary, AssetTracker};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub batches: Vec<BatchReport>,
    pub primary: AssetId,
    pub b_roll: Vec<AssetId>,
    pub blueprints: BlueprintSet,
    pub rankings: Vec<CreativeRanking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_error: Option<String>,
    pub assets: Vec<AssetSummary>,
}

/// The tracker and every stage, sharing one completion limiter.
pub struct AdPipeline {
    config: PipelineConfig,
    tracker: Arc<AssetTracker>,
    orchestrator: BatchOrchestrator,
    generator: BlueprintGenerator,
    ranker: BlueprintRanker,
}

impl AdPipeline {
    pub fn new(
        config: PipelineConfig,
        decoder: Arc<dyn MediaDecoder>,
        gateway: Arc<dyn CompletionGateway>,
    ) -> Self {
        let tracker = Arc::new(AssetTracker::new());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_completions.max(1)));
        let sampler = FrameSampler::new(decoder);

        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&tracker),
            sampler,
            Arc::clone(&gateway),
            Arc::clone(&permits),
            &config,
        );
        let generator = BlueprintGenerator::new(Arc::clone(&gateway), Arc::clone(&permits), &config);
        let ranker = BlueprintRanker::new(gateway, permits, &config);

        let pipeline = Self {
            config,
            tracker,
            orchestrator,
            generator,
            ranker,
        };
        match pipeline.config.output_dir.clone() {
            Some(dir) => pipeline.with_sink(Arc::new(JsonDirSink::new(dir))),
            None => pipeline,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.orchestrator = self.orchestrator.with_sink(Arc::clone(&sink));
        self.generator = self.generator.with_sink(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<AssetTracker> {
        &self.tracker
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub fn generator(&self) -> &BlueprintGenerator {
        &self.generator
    }

    pub fn ranker(&self) -> &BlueprintRanker {
        &self.ranker
    }

    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> PipelineResult<AssetHandle> {
        Ok(self.tracker.upload(file_name, bytes).await?)
    }

    /// Analyze every pending asset, pick the primary, then generate and rank
    /// blueprints for `brief`.
    ///
    /// A failed ranking call is reported in the run, not raised.
    pub async fn run(&self, brief: &CreativeBrief) -> PipelineResult<PipelineRun> {
        let retry =
            RetryConfig::new("analyze_batch").with_max_retries(self.config.completion_retries);
        let pending = self.tracker.pending().await;
        info!(assets = pending.len(), "Pipeline run started");

        let batches = self.orchestrator.analyze_with_retry(pending, &retry).await;
        let analyzed_handles: Vec<AssetHandle> = batches
            .iter()
            .flat_map(|b| b.analyzed.iter().cloned())
            .collect();
        let analyzed = self.tracker.analyzed(&analyzed_handles).await;

        let selection = select_primary(&analyzed)?;
        info!(primary = %selection.primary.id(), b_roll = selection.b_roll.len(), "Primary selected");

        let blueprints = self
            .generator
            .generate_for(&selection, brief, self.config.blueprint_count)
            .await?;

        let (rankings, ranking_error) = match self.ranker.rank(&blueprints.valid).await {
            Ok(rankings) => (rankings, None),
            Err(e) => {
                warn!("Blueprint ranking failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let assets = self
            .tracker
            .list()
            .await
            .iter()
            .map(|s| s.summary())
            .collect();

        Ok(PipelineRun {
            batches,
            primary: selection.primary.id().clone(),
            b_roll: selection.b_roll.iter().map(|a| a.id().clone()).collect(),
            blueprints,
            rankings,
            ranking_error,
            assets,
        })
    }
}
