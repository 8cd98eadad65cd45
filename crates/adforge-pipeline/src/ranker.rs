//! Blueprint ranking.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use adforge_gemini::{complete_typed, CompletionError, CompletionGateway, CompletionResult, ContentPart};
use adforge_models::{AdBlueprint, CreativeRanking, RankingResponse};

use crate::config::PipelineConfig;
use crate::retry::{retry_async, RetryConfig};

/// Scores blueprints from their text alone. Holds no state between calls.
pub struct BlueprintRanker {
    gateway: Arc<dyn CompletionGateway>,
    completion_permits: Arc<Semaphore>,
    max_output_tokens: u32,
    retry: RetryConfig,
}

impl BlueprintRanker {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        completion_permits: Arc<Semaphore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            completion_permits,
            max_output_tokens: config.ranking_max_tokens,
            retry: RetryConfig::new("rank_blueprints").with_max_retries(config.completion_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Rank `blueprints`, best predicted return first.
    pub async fn rank(&self, blueprints: &[AdBlueprint]) -> CompletionResult<Vec<CreativeRanking>> {
        if blueprints.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = ranking_prompt(blueprints)?;
        let response = retry_async(&self.retry, || async {
            let _permit = self.completion_permits.acquire().await.map_err(|e| {
                CompletionError::transport(format!("completion limiter closed: {}", e))
            })?;
            complete_typed::<RankingResponse>(
                self.gateway.as_ref(),
                vec![ContentPart::text(prompt.clone())],
                self.max_output_tokens,
            )
            .await
        })
        .await?;

        Ok(sanitize_rankings(response.rankings, blueprints.len()))
    }
}

/// Drop out-of-range and duplicate indices, clamp scores, and sort by
/// `roiScore` descending then index.
pub fn sanitize_rankings(rankings: Vec<CreativeRanking>, len: usize) -> Vec<CreativeRanking> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rankings.len());

    for mut ranking in rankings {
        let Some(offset) = ranking.offset(len) else {
            warn!(index = ranking.index, len, "Ranking index out of range dropped");
            continue;
        };
        if !seen.insert(offset) {
            debug!(index = ranking.index, "Duplicate ranking index dropped");
            continue;
        }
        if !ranking.scores_in_range() {
            warn!(
                index = ranking.index,
                roi = ranking.roi_score,
                hook = ranking.hook_score,
                cta = ranking.cta_score,
                "Ranking scores clamped"
            );
            ranking.clamp_scores();
        }
        kept.push(ranking);
    }

    kept.sort_by(|a, b| {
        b.roi_score
            .total_cmp(&a.roi_score)
            .then_with(|| a.index.cmp(&b.index))
    });
    kept
}

fn ranking_prompt(blueprints: &[AdBlueprint]) -> CompletionResult<String> {
    let listed = blueprints
        .iter()
        .enumerate()
        .map(|(i, b)| {
            serde_json::to_string(b).map(|json| format!("[{}] {}", i, json))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CompletionError::Config(format!("blueprint encoding: {}", e)))?
        .join("\n");

    Ok(format!(
        r#"You are a direct-response media buyer. Score each ad blueprint below.

BLUEPRINTS (index in brackets):
{listed}

Return one entry in `rankings` per blueprint with:
- index: the bracketed index of the blueprint, 0-based.
- roiScore: predicted return from 0 to 100.
- hookScore: strength of the opening from 0 to 10.
- ctaScore: strength of the call to action from 0 to 10.
- reasons: short reasons for the scores.

Return ONLY the JSON object."#
    ))
}
