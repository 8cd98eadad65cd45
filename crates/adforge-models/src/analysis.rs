//! Comparative analysis models.
//!
//! One batch call returns an [`AnalysisResult`] per submitted asset. Results
//! carry no ordering guarantee and are matched back to assets by `file_name`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::asset::AssetId;
use crate::contract::ContractViolation;

/// A described moment inside an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    /// Timestamp in MM:SS
    pub timestamp: String,
    pub description: String,
}

/// Audio characteristics reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    pub has_voiceover: bool,
    pub has_music: bool,
    pub summary: String,
}

/// Analysis of one asset, ranked against the rest of its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// 1 is the strongest asset of the batch
    #[schemars(range(min = 1))]
    pub rank: u32,
    /// Back-reference to the analyzed asset id
    pub file_name: String,
    pub justification: String,
    pub summary: String,
    pub scene_descriptions: Vec<SceneDescription>,
    pub key_objects: BTreeSet<String>,
    pub emotional_tone: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_analysis: Option<AudioAnalysis>,
}

impl AnalysisResult {
    /// The asset this result claims to describe.
    ///
    /// Matches `file_name` exactly; run [`BatchAnalysisResponse::normalized`]
    /// first so surrounding whitespace does not hide a valid reference.
    pub fn asset_id(&self) -> AssetId {
        AssetId::from(self.file_name.as_str())
    }
}

/// Top-level response object of the comparative analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchAnalysisResponse {
    pub results: Vec<AnalysisResult>,
}

impl BatchAnalysisResponse {
    /// Strip surrounding whitespace from every `fileName`, so a stored
    /// result's back-reference equals the id of the asset it was matched to.
    pub fn normalized(mut self) -> Self {
        for result in &mut self.results {
            let trimmed = result.file_name.trim();
            if trimmed.len() != result.file_name.len() {
                result.file_name = trimmed.to_string();
            }
        }
        self
    }

    /// Checks the parts of the contract a JSON schema cannot express.
    pub fn check_contract(&self) -> Result<(), ContractViolation> {
        for result in &self.results {
            if result.file_name.trim().is_empty() {
                return Err(ContractViolation::EmptyFileName);
            }
            if result.rank == 0 {
                return Err(ContractViolation::ZeroRank(result.file_name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "results": [{
                "rank": 1,
                "fileName": "hero.mp4",
                "justification": "Strong opening",
                "summary": "Athlete sprinting",
                "sceneDescriptions": [{"timestamp": "00:01", "description": "Start line"}],
                "keyObjects": ["shoe", "track", "shoe"],
                "emotionalTone": ["energetic"]
            }]
        })
    }

    #[test]
    fn test_decode_camel_case_and_sets() {
        let response: BatchAnalysisResponse = serde_json::from_value(sample_json()).unwrap();
        let result = &response.results[0];
        assert_eq!(result.asset_id(), AssetId::from("hero.mp4"));
        assert_eq!(result.key_objects.len(), 2);
        assert!(result.audio_analysis.is_none());
        assert!(response.check_contract().is_ok());
    }

    #[test]
    fn test_normalized_file_name_equals_asset_id() {
        let mut json = sample_json();
        json["results"][0]["fileName"] = " hero.mp4\n".into();
        let response: BatchAnalysisResponse = serde_json::from_value(json).unwrap();
        assert_ne!(response.results[0].asset_id(), AssetId::from("hero.mp4"));

        let response = response.normalized();
        let result = &response.results[0];
        assert_eq!(result.file_name, "hero.mp4");
        assert_eq!(result.asset_id(), AssetId::from(result.file_name.as_str()));
        assert_eq!(result.asset_id(), AssetId::from("hero.mp4"));
    }

    #[test]
    fn test_contract_rejects_zero_rank() {
        let mut json = sample_json();
        json["results"][0]["rank"] = 0.into();
        let response: BatchAnalysisResponse = serde_json::from_value(json).unwrap();
        assert_eq!(
            response.check_contract(),
            Err(ContractViolation::ZeroRank("hero.mp4".into()))
        );
    }

    #[test]
    fn test_contract_rejects_blank_file_name() {
        let mut json = sample_json();
        json["results"][0]["fileName"] = " ".into();
        let response: BatchAnalysisResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.check_contract(), Err(ContractViolation::EmptyFileName));
    }
}
