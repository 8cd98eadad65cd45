//! Creative ranking models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_ROI_SCORE: f64 = 100.0;
pub const MAX_HOOK_SCORE: f64 = 10.0;
pub const MAX_CTA_SCORE: f64 = 10.0;

/// Score for one blueprint, addressed by its offset in the ranked sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreativeRanking {
    /// 0-based offset into the blueprint sequence that was scored
    pub index: i64,
    /// Predicted return, 0-100
    pub roi_score: f64,
    /// Hook strength, 0-10
    pub hook_score: f64,
    /// Call-to-action strength, 0-10
    pub cta_score: f64,
    pub reasons: Vec<String>,
}

impl CreativeRanking {
    /// The index as a slice offset, if it is in range for `len` items.
    pub fn offset(&self, len: usize) -> Option<usize> {
        usize::try_from(self.index).ok().filter(|i| *i < len)
    }

    /// Whether every score lies within its declared range.
    pub fn scores_in_range(&self) -> bool {
        in_range(self.roi_score, MAX_ROI_SCORE)
            && in_range(self.hook_score, MAX_HOOK_SCORE)
            && in_range(self.cta_score, MAX_CTA_SCORE)
    }

    /// Clamp scores into their declared ranges. Non-finite scores become 0.
    pub fn clamp_scores(&mut self) {
        self.roi_score = clamp(self.roi_score, MAX_ROI_SCORE);
        self.hook_score = clamp(self.hook_score, MAX_HOOK_SCORE);
        self.cta_score = clamp(self.cta_score, MAX_CTA_SCORE);
    }
}

fn in_range(value: f64, max: f64) -> bool {
    value.is_finite() && (0.0..=max).contains(&value)
}

fn clamp(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

/// Top-level response object of the ranking call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankingResponse {
    pub rankings: Vec<CreativeRanking>,
}
