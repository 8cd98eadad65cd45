//! Blueprint generation with post-hoc reference validation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use validator::Validate;

use adforge_gemini::{complete_typed, CompletionError, CompletionGateway, ContentPart};
use adforge_models::{
    AdBlueprint, BlueprintBatchResponse, BlueprintSet, CreativeBrief, InvalidBlueprint,
};

use crate::config::PipelineConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::metrics;
use crate::ranking::{known_ids, PrimarySelection};
use crate::retry::{retry_async, RetryConfig};
use crate::sink::{spawn_persist_blueprints, NullSink, ResultSink};
use crate::tracker::AnalyzedAsset;

/// Append-only record of every blueprint kept out of the valid set.
#[derive(Debug, Default)]
pub struct BlueprintAuditLog {
    entries: Mutex<Vec<InvalidBlueprint>>,
}

impl BlueprintAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, invalid: &[InvalidBlueprint]) {
        if invalid.is_empty() {
            return;
        }
        self.entries.lock().await.extend_from_slice(invalid);
    }

    pub async fn entries(&self) -> Vec<InvalidBlueprint> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Produces ad blueprints around a primary asset.
pub struct BlueprintGenerator {
    gateway: Arc<dyn CompletionGateway>,
    completion_permits: Arc<Semaphore>,
    max_blueprints: usize,
    max_output_tokens: u32,
    retry: RetryConfig,
    audit: Arc<BlueprintAuditLog>,
    sink: Arc<dyn ResultSink>,
}

impl BlueprintGenerator {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        completion_permits: Arc<Semaphore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            completion_permits,
            max_blueprints: config.max_blueprints,
            max_output_tokens: config.blueprint_max_tokens,
            retry: RetryConfig::new("generate_blueprints").with_max_retries(config.completion_retries),
            audit: Arc::new(BlueprintAuditLog::new()),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<BlueprintAuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn audit_log(&self) -> &Arc<BlueprintAuditLog> {
        &self.audit
    }

    /// Generate from a ranking selection.
    pub async fn generate_for(
        &self,
        selection: &PrimarySelection,
        brief: &CreativeBrief,
        count: usize,
    ) -> GenerationResult<BlueprintSet> {
        self.generate(&selection.primary, &selection.b_roll, brief, count)
            .await
    }

    /// Generate `count` blueprints and split them by reference validity.
    ///
    /// Blueprints whose edit plan is empty or names an asset outside
    /// `{primary} ∪ b_roll` are excluded from `valid` and written to the
    /// audit log.
    pub async fn generate(
        &self,
        primary: &AnalyzedAsset,
        b_roll: &[AnalyzedAsset],
        brief: &CreativeBrief,
        count: usize,
    ) -> GenerationResult<BlueprintSet> {
        if count == 0 || count > self.max_blueprints {
            return Err(GenerationError::InvalidCount {
                requested: count,
                max: self.max_blueprints,
            });
        }
        brief
            .validate()
            .map_err(|e| GenerationError::InvalidBrief(e.to_string()))?;

        let parts = blueprint_parts(primary, b_roll, brief, count);
        let response = retry_async(&self.retry, || async {
            let _permit = self.completion_permits.acquire().await.map_err(|e| {
                CompletionError::transport(format!("completion limiter closed: {}", e))
            })?;
            complete_typed::<BlueprintBatchResponse>(
                self.gateway.as_ref(),
                parts.clone(),
                self.max_output_tokens,
            )
            .await
        })
        .await?;

        if response.blueprints.is_empty() {
            return Err(GenerationError::NoBlueprints);
        }
        if response.blueprints.len() != count {
            warn!(
                asset_id = %primary.id(),
                requested = count,
                returned = response.blueprints.len(),
                "Blueprint count mismatch"
            );
        }

        let known = known_ids(primary, b_roll);
        let blueprints: Vec<AdBlueprint> = response
            .blueprints
            .into_iter()
            .map(|draft| AdBlueprint::from_draft(primary.id().clone(), draft))
            .collect();
        let set = BlueprintSet::partition(blueprints, &known);

        for invalid in &set.invalid {
            warn!(
                asset_id = %primary.id(),
                title = %invalid.blueprint.variation_title,
                reason = ?invalid.reason,
                unresolved = ?invalid.unresolved,
                "Blueprint rejected"
            );
        }
        self.audit.record(&set.invalid).await;
        metrics::record_blueprints(set.valid.len(), set.invalid.len());

        info!(
            asset_id = %primary.id(),
            valid = set.valid.len(),
            invalid = set.invalid.len(),
            "Blueprints generated"
        );
        spawn_persist_blueprints(Arc::clone(&self.sink), primary.id().clone(), set.clone());
        Ok(set)
    }
}

fn blueprint_parts(
    primary: &AnalyzedAsset,
    b_roll: &[AnalyzedAsset],
    brief: &CreativeBrief,
    count: usize,
) -> Vec<ContentPart> {
    let analysis = &primary.analysis;
    let scenes = analysis
        .scene_descriptions
        .iter()
        .map(|s| format!("- {}: {}", s.timestamp, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    let b_roll_lines = if b_roll.is_empty() {
        "(none)".to_string()
    } else {
        b_roll
            .iter()
            .map(|a| format!("- {} (rank {}): {}", a.id(), a.rank(), a.analysis.summary))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let allowed = std::iter::once(primary)
        .chain(b_roll)
        .map(|a| format!("\"{}\"", a.id()))
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        r#"Create {count} distinct ad blueprint variations.

{brief}
PRIMARY ASSET: {primary}
Summary: {summary}
Emotional tone: {tone}
Key objects: {objects}
Scenes:
{scenes}

B-ROLL ASSETS:
{b_roll_lines}

For each variation write a variationTitle, headline, body, cta and an editPlan of 4-6 scenes.
Every scene needs timestamp (MM:SS in the finished ad), visual, edit, overlayText and sourceFile.
sourceFile MUST be exactly one of: {allowed}.
Make each variation take a different hook approach while targeting the same audience.
Return ONLY the JSON object."#,
        brief = brief.to_prompt(),
        primary = primary.id(),
        summary = analysis.summary,
        tone = join_set(&analysis.emotional_tone),
        objects = join_set(&analysis.key_objects),
    );

    let mut parts = vec![ContentPart::text(prompt)];
    parts.push(ContentPart::text(format!("Frames of \"{}\"", primary.id())));
    parts.extend(primary.frames.iter().map(ContentPart::frame));
    parts
}

fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}
