//! Ad blueprint models and reference validation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::asset::AssetId;

/// One timed step of an edit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditScene {
    /// Timestamp in MM:SS within the finished ad
    pub timestamp: String,
    pub visual: String,
    pub edit: String,
    pub overlay_text: String,
    /// Asset the footage comes from; must be the primary or a declared B-roll id
    pub source_file: String,
}

/// Blueprint as produced by the model, before the generator attaches its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintDraft {
    pub variation_title: String,
    pub headline: String,
    pub body: String,
    pub cta: String,
    pub edit_plan: Vec<EditScene>,
}

/// Top-level response object of the blueprint generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlueprintBatchResponse {
    pub blueprints: Vec<BlueprintDraft>,
}

/// A complete ad blueprint built around one primary asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdBlueprint {
    pub source_asset_id: AssetId,
    pub variation_title: String,
    pub headline: String,
    pub body: String,
    pub cta: String,
    pub edit_plan: Vec<EditScene>,
}

impl AdBlueprint {
    /// Attach the source asset. Surrounding whitespace is stripped from every
    /// `sourceFile` so the stored reference is the asset id itself.
    pub fn from_draft(source_asset_id: AssetId, draft: BlueprintDraft) -> Self {
        let edit_plan = draft
            .edit_plan
            .into_iter()
            .map(|mut scene| {
                let trimmed = scene.source_file.trim();
                if trimmed.len() != scene.source_file.len() {
                    scene.source_file = trimmed.to_string();
                }
                scene
            })
            .collect();

        Self {
            source_asset_id,
            variation_title: draft.variation_title,
            headline: draft.headline,
            body: draft.body,
            cta: draft.cta,
            edit_plan,
        }
    }

    /// Every edit-plan reference that is not exactly a known asset id.
    pub fn unresolved_references(&self, known: &HashSet<AssetId>) -> Vec<InvalidReference> {
        self.edit_plan
            .iter()
            .enumerate()
            .filter(|(_, scene)| !known.contains(&AssetId::from(scene.source_file.as_str())))
            .map(|(scene_index, scene)| InvalidReference {
                scene_index,
                source_file: scene.source_file.clone(),
            })
            .collect()
    }
}

/// An edit scene pointing at an asset outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidReference {
    pub scene_index: usize,
    pub source_file: String,
}

/// Why a blueprint was kept out of the valid set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    UnresolvedReferences,
    EmptyEditPlan,
}

/// A blueprint excluded from the valid set, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidBlueprint {
    pub blueprint: AdBlueprint,
    pub reason: RejectionReason,
    /// Empty unless `reason` is `UnresolvedReferences`
    pub unresolved: Vec<InvalidReference>,
    pub rejected_at: DateTime<Utc>,
}

/// Output of one generation call, split by reference validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintSet {
    pub valid: Vec<AdBlueprint>,
    pub invalid: Vec<InvalidBlueprint>,
}

impl BlueprintSet {
    /// Split blueprints into valid and invalid against the known asset ids.
    ///
    /// A valid blueprint has at least one scene and every scene's
    /// `sourceFile` is a member of `known`.
    pub fn partition(blueprints: Vec<AdBlueprint>, known: &HashSet<AssetId>) -> Self {
        let mut set = Self::default();
        for blueprint in blueprints {
            let (reason, unresolved) = if blueprint.edit_plan.is_empty() {
                (RejectionReason::EmptyEditPlan, Vec::new())
            } else {
                let unresolved = blueprint.unresolved_references(known);
                if unresolved.is_empty() {
                    set.valid.push(blueprint);
                    continue;
                }
                (RejectionReason::UnresolvedReferences, unresolved)
            };
            set.invalid.push(InvalidBlueprint {
                blueprint,
                reason,
                unresolved,
                rejected_at: Utc::now(),
            });
        }
        set
    }

    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}
