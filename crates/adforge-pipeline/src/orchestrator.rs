//! Batch analysis orchestrator.
//!
//! Drives a batch of pending assets through sampling and one comparative
//! completion call. Assets fail individually; a batch-level completion error
//! fails only the assets submitted in that call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use adforge_gemini::{complete_typed, CompletionError, CompletionGateway, ContentPart};
use adforge_media::FrameSampler;
use adforge_models::{
    AnalysisResult, AssetFailure, AssetHandle, AssetId, BatchAnalysisResponse, FailureCategory,
};

use crate::config::PipelineConfig;
use crate::logging::BatchLogger;
use crate::metrics;
use crate::ranking::{check_permutation, RankViolation};
use crate::retry::{RetryConfig, Retryable};
use crate::sink::{spawn_persist_analysis, NullSink, ResultSink};
use crate::tracker::{AssetTracker, TransitionOutcome};

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: String,
    /// Assets that entered the batch
    pub submitted: usize,
    pub analyzed: Vec<AssetHandle>,
    pub failed: Vec<FailedAsset>,
    /// Set when the applied ranks are not a permutation of `1..=N`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_violation: Option<RankViolation>,
}

impl BatchReport {
    fn new(batch_id: String, submitted: usize) -> Self {
        Self {
            batch_id,
            submitted,
            analyzed: Vec::new(),
            failed: Vec::new(),
            rank_violation: None,
        }
    }

    /// Failed assets worth a caller-driven retry.
    pub fn retryable(&self) -> impl Iterator<Item = &FailedAsset> {
        self.failed.iter().filter(|f| f.failure.is_retryable())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedAsset {
    pub handle: AssetHandle,
    pub failure: AssetFailure,
}

impl FailedAsset {
    pub fn category(&self) -> FailureCategory {
        self.failure.category
    }
}

/// Runs batches against a shared tracker.
pub struct BatchOrchestrator {
    tracker: Arc<AssetTracker>,
    sampler: FrameSampler,
    gateway: Arc<dyn CompletionGateway>,
    completion_permits: Arc<Semaphore>,
    sampling_permits: Arc<Semaphore>,
    frames_per_asset: usize,
    max_output_tokens: u32,
    sink: Arc<dyn ResultSink>,
}

impl BatchOrchestrator {
    /// `completion_permits` is shared with every other stage that calls the
    /// gateway.
    pub fn new(
        tracker: Arc<AssetTracker>,
        sampler: FrameSampler,
        gateway: Arc<dyn CompletionGateway>,
        completion_permits: Arc<Semaphore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            tracker,
            sampler,
            gateway,
            completion_permits,
            sampling_permits: Arc::new(Semaphore::new(config.max_sampling_parallel.max(1))),
            frames_per_asset: config.frames_per_asset,
            max_output_tokens: config.analysis_max_tokens,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tracker(&self) -> &Arc<AssetTracker> {
        &self.tracker
    }

    /// Analyze every asset that is currently pending.
    pub async fn analyze_pending(&self) -> BatchReport {
        let handles = self.tracker.pending().await;
        self.analyze_batch(handles).await
    }

    /// Run one batch: sample each asset, then rank all sampled assets in a
    /// single comparative completion call.
    pub async fn analyze_batch(&self, handles: Vec<AssetHandle>) -> BatchReport {
        let batch_id = Uuid::new_v4().to_string();
        let logger = BatchLogger::new(&batch_id, "analyze_batch");
        let span = logger.create_span();

        async move {
            let mut report = BatchReport::new(batch_id, handles.len());
            logger.log_start(&format!("{} assets", handles.len()));

            let sampled = join_all(handles.iter().map(|h| self.sample_asset(h))).await;
            let mut submission = Vec::new();
            for (handle, outcome) in handles.into_iter().zip(sampled) {
                match outcome {
                    SampleOutcome::Analyzing => submission.push(handle),
                    SampleOutcome::Failed(failure) => {
                        report.failed.push(FailedAsset { handle, failure })
                    }
                    SampleOutcome::Skipped => {}
                }
            }

            if submission.is_empty() {
                logger.log_warning("no assets survived sampling");
                return report;
            }

            logger.log_progress(&format!("submitting {} assets", submission.len()));
            match self.request_analysis(&submission).await {
                Ok(response) => self.apply_results(&submission, response, &mut report).await,
                Err(e) => {
                    logger.log_error(&format!("completion failed: {}", e));
                    let failure = AssetFailure::new(e.failure_category(), e.to_string())
                        .with_retry_after(e.backoff_hint());
                    for handle in submission {
                        self.record_failure(&handle, failure.clone(), &mut report).await;
                    }
                }
            }

            logger.log_completion(&format!(
                "{} analyzed, {} failed",
                report.analyzed.len(),
                report.failed.len()
            ));
            report
        }
        .instrument(span)
        .await
    }

    /// Run a batch, then respawn and rerun retry-worthy failures until they
    /// succeed or `retry.max_retries` is spent. Respawned assets keep their
    /// frames, so a retry never decodes again.
    pub async fn analyze_with_retry(
        &self,
        handles: Vec<AssetHandle>,
        retry: &RetryConfig,
    ) -> Vec<BatchReport> {
        let mut reports = vec![self.analyze_batch(handles).await];

        for attempt in 1..=retry.max_retries {
            let Some(last) = reports.last() else { break };
            let hint = last.retryable().filter_map(|f| f.failure.backoff_hint()).max();
            let failed: Vec<AssetHandle> = last.retryable().map(|f| f.handle.clone()).collect();
            if failed.is_empty() {
                break;
            }

            let delay = retry.delay_for_attempt(attempt, hint);
            debug!(
                "{} attempt {}: retrying {} assets in {:?}",
                retry.operation_name,
                attempt,
                failed.len(),
                delay
            );
            tokio::time::sleep(delay).await;

            let mut respawned = Vec::with_capacity(failed.len());
            for handle in &failed {
                match self.tracker.respawn(handle).await {
                    Ok(replacement) => respawned.push(replacement),
                    Err(e) => warn!(asset = %handle, "Cannot retry asset: {}", e),
                }
            }
            if respawned.is_empty() {
                break;
            }
            reports.push(self.analyze_batch(respawned).await);
        }

        reports
    }

    async fn sample_asset(&self, handle: &AssetHandle) -> SampleOutcome {
        let _permit = match self.sampling_permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return SampleOutcome::Skipped,
        };

        match self.tracker.begin_sampling(handle).await {
            TransitionOutcome::Applied => {}
            other => {
                debug!(asset = %handle, ?other, "Asset not sampled");
                return SampleOutcome::Skipped;
            }
        }

        let Some(snapshot) = self.tracker.get(handle).await else {
            return SampleOutcome::Skipped;
        };

        if snapshot.has_frames() {
            debug!(asset = %handle, "Reusing cached frames");
            return match self.tracker.reuse_samples(handle).await {
                TransitionOutcome::Applied => SampleOutcome::Analyzing,
                _ => SampleOutcome::Skipped,
            };
        }

        match self.sampler.sample(&snapshot.raw, self.frames_per_asset).await {
            Ok(samples) => match self.tracker.finish_sampling(handle, samples).await {
                TransitionOutcome::Applied => SampleOutcome::Analyzing,
                _ => SampleOutcome::Skipped,
            },
            Err(e) => {
                warn!(asset = %handle, category = %e.failure_category(), "Sampling failed: {}", e);
                let failure = AssetFailure::new(e.failure_category(), e.to_string());
                match self.tracker.fail(handle, failure.clone()).await {
                    TransitionOutcome::Applied => {
                        metrics::record_asset_failed(failure.category);
                        SampleOutcome::Failed(failure)
                    }
                    _ => SampleOutcome::Skipped,
                }
            }
        }
    }

    async fn request_analysis(
        &self,
        submission: &[AssetHandle],
    ) -> Result<BatchAnalysisResponse, CompletionError> {
        let mut evidence = Vec::with_capacity(submission.len());
        for handle in submission {
            if let Some(frames) = self.tracker.get(handle).await.and_then(|s| s.frames) {
                evidence.push((handle.id.clone(), frames));
            }
        }

        let ids: Vec<&AssetId> = evidence.iter().map(|(id, _)| id).collect();
        let mut parts = vec![ContentPart::text(analysis_prompt(&ids))];
        for (id, frames) in &evidence {
            parts.push(ContentPart::text(format!("Asset \"{}\"", id)));
            parts.extend(frames.iter().map(ContentPart::frame));
        }

        let _permit = self
            .completion_permits
            .acquire()
            .await
            .map_err(|e| CompletionError::transport(format!("completion limiter closed: {}", e)))?;

        let started = Instant::now();
        let result = complete_typed::<BatchAnalysisResponse>(
            self.gateway.as_ref(),
            parts,
            self.max_output_tokens,
        )
        .await
        .map(BatchAnalysisResponse::normalized)
        .and_then(|response| {
            response
                .check_contract()
                .map_err(|v| CompletionError::schema_violation(v.to_string()))?;
            Ok(response)
        });

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::record_batch_completion(started.elapsed().as_secs_f64(), outcome);
        result
    }

    async fn apply_results(
        &self,
        submission: &[AssetHandle],
        response: BatchAnalysisResponse,
        report: &mut BatchReport,
    ) {
        let by_id: HashMap<AssetId, &AssetHandle> =
            submission.iter().map(|h| (h.id.clone(), h)).collect();
        let mut applied: HashSet<AssetId> = HashSet::new();
        let mut ranks = Vec::new();

        for result in response.results {
            let id = result.asset_id();
            let Some(handle) = by_id.get(&id) else {
                warn!(asset_id = %id, "Result for an asset outside this batch ignored");
                continue;
            };

            let rank = result.rank;
            match self.tracker.complete(handle, result).await {
                TransitionOutcome::Applied => {
                    metrics::record_asset_analyzed();
                    applied.insert(id);
                    ranks.push(rank);
                    report.analyzed.push((*handle).clone());
                    self.persist(handle).await;
                }
                other => debug!(asset = %handle, ?other, "Result not applied"),
            }
        }

        for handle in submission {
            if !applied.contains(&handle.id) {
                warn!(asset = %handle, "No result returned for asset");
                self.record_failure(handle, AssetFailure::missing_result(&handle.id), report)
                    .await;
            }
        }

        report.rank_violation = check_permutation(&ranks);
        if let Some(violation) = &report.rank_violation {
            warn!(batch_id = %report.batch_id, ?violation, "Batch ranks are not a permutation");
        }
    }

    async fn record_failure(
        &self,
        handle: &AssetHandle,
        failure: AssetFailure,
        report: &mut BatchReport,
    ) {
        if self.tracker.fail(handle, failure.clone()).await.is_applied() {
            metrics::record_asset_failed(failure.category);
            report.failed.push(FailedAsset {
                handle: handle.clone(),
                failure,
            });
        }
    }

    async fn persist(&self, handle: &AssetHandle) {
        if let Some(analysis) = self.tracker.get(handle).await.and_then(|s| s.analysis) {
            spawn_persist_analysis(Arc::clone(&self.sink), handle.id.clone(), analysis);
        }
    }
}

enum SampleOutcome {
    Analyzing,
    Failed(AssetFailure),
    /// Handle went stale or the asset was not pending
    Skipped,
}

fn analysis_prompt(ids: &[&AssetId]) -> String {
    let listed = ids
        .iter()
        .map(|id| format!("- {}", id))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a performance creative analyst. Compare the following {count} video assets as candidate footage for a short-form ad.

ASSETS:
{listed}

Each asset follows as a label line `Asset "<id>"` and then its frames in timeline order.

For every asset return one entry in `results` with:
- rank: 1 for the strongest asset, then 2, 3 and so on. Every asset gets a distinct rank from 1 to {count}.
- fileName: the asset id exactly as listed above.
- justification: why it holds this rank relative to the others.
- summary, sceneDescriptions (timestamp and description), keyObjects, emotionalTone.
- audioAnalysis when voiceover or music can be inferred.

Return ONLY the JSON object."#,
        count = ids.len(),
    )
}
