//! Primary asset selection.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::error;

use adforge_models::AssetId;

use crate::error::RankingError;
use crate::tracker::AnalyzedAsset;

/// The rank-1 asset of a batch and the rest as B-roll.
#[derive(Debug, Clone)]
pub struct PrimarySelection {
    pub primary: AnalyzedAsset,
    /// Ordered by rank, then id
    pub b_roll: Vec<AnalyzedAsset>,
}

/// Ids an edit plan built around `primary` may reference.
pub fn known_ids(primary: &AnalyzedAsset, b_roll: &[AnalyzedAsset]) -> HashSet<AssetId> {
    std::iter::once(primary)
        .chain(b_roll)
        .map(|a| a.id().clone())
        .collect()
}

/// Select the single rank-1 asset.
///
/// Two assets claiming rank 1 is a contract violation; the batch is flagged
/// for review instead of picking one.
pub fn select_primary(assets: &[AnalyzedAsset]) -> Result<PrimarySelection, RankingError> {
    let mut primaries: Vec<&AnalyzedAsset> = assets.iter().filter(|a| a.rank() == 1).collect();

    match primaries.len() {
        0 => Err(RankingError::NoPrimary),
        1 => {
            let primary = primaries.remove(0).clone();
            let mut b_roll: Vec<AnalyzedAsset> = assets
                .iter()
                .filter(|a| a.handle != primary.handle)
                .cloned()
                .collect();
            b_roll.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.id().cmp(b.id())));
            Ok(PrimarySelection { primary, b_roll })
        }
        _ => {
            let mut ids: Vec<AssetId> = primaries.iter().map(|a| a.id().clone()).collect();
            ids.sort();
            error!(review = true, ids = ?ids, "Multiple assets claim rank 1");
            Err(RankingError::AmbiguousPrimary { ids })
        }
    }
}

/// How a batch's ranks deviate from the permutation `1..=N`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankViolation {
    /// Ranks claimed by more than one asset
    pub duplicates: Vec<u32>,
    /// Ranks in `1..=N` nobody claimed
    pub missing: Vec<u32>,
    /// Ranks above `N`
    pub out_of_range: Vec<u32>,
}

/// Check that `ranks` is exactly a permutation of `1..=ranks.len()`.
pub fn check_permutation(ranks: &[u32]) -> Option<RankViolation> {
    let n = ranks.len() as u32;
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for rank in ranks {
        *counts.entry(*rank).or_default() += 1;
    }

    let violation = RankViolation {
        duplicates: counts
            .iter()
            .filter(|(_, c)| **c > 1)
            .map(|(r, _)| *r)
            .collect(),
        missing: (1..=n).filter(|r| !counts.contains_key(r)).collect(),
        out_of_range: counts
            .keys()
            .copied()
            .filter(|r| *r == 0 || *r > n)
            .collect(),
    };

    if violation == RankViolation::default() {
        None
    } else {
        Some(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adforge_models::{AnalysisResult, AssetHandle, SampledFrame};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn analyzed(id: &str, rank: u32) -> AnalyzedAsset {
        AnalyzedAsset {
            handle: AssetHandle::new(AssetId::from(id)),
            analysis: Arc::new(AnalysisResult {
                rank,
                file_name: id.to_string(),
                justification: String::new(),
                summary: String::new(),
                scene_descriptions: vec![],
                key_objects: BTreeSet::new(),
                emotional_tone: BTreeSet::new(),
                audio_analysis: None,
            }),
            frames: Arc::from(Vec::<SampledFrame>::new()),
        }
    }

    #[test]
    fn test_selects_rank_one() {
        let assets = vec![analyzed("a.mp4", 2), analyzed("b.mp4", 1), analyzed("c.mp4", 3)];
        let selection = select_primary(&assets).unwrap();

        assert_eq!(selection.primary.id().as_str(), "b.mp4");
        let b_roll: Vec<_> = selection.b_roll.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(b_roll, vec!["a.mp4", "c.mp4"]);
        assert_eq!(known_ids(&selection.primary, &selection.b_roll).len(), 3);
    }

    #[test]
    fn test_b_roll_order_is_deterministic() {
        let assets = vec![analyzed("z.mp4", 2), analyzed("p.mp4", 1), analyzed("m.mp4", 2)];
        let selection = select_primary(&assets).unwrap();
        let b_roll: Vec<_> = selection.b_roll.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(b_roll, vec!["m.mp4", "z.mp4"]);
    }

    #[test]
    fn test_two_rank_ones_are_flagged() {
        let assets = vec![analyzed("b.mp4", 1), analyzed("a.mp4", 1)];
        match select_primary(&assets) {
            Err(RankingError::AmbiguousPrimary { ids }) => {
                assert_eq!(ids, vec![AssetId::from("a.mp4"), AssetId::from("b.mp4")]);
            }
            other => panic!("expected ambiguous primary, got {:?}", other),
        }
    }

    #[test]
    fn test_no_primary() {
        assert!(matches!(select_primary(&[]), Err(RankingError::NoPrimary)));
        assert!(matches!(
            select_primary(&[analyzed("a.mp4", 2)]),
            Err(RankingError::NoPrimary)
        ));
    }

    #[test]
    fn test_permutation_check() {
        assert_eq!(check_permutation(&[2, 1, 3]), None);
        assert_eq!(check_permutation(&[]), None);

        let violation = check_permutation(&[1, 1, 4]).unwrap();
        assert_eq!(violation.duplicates, vec![1]);
        assert_eq!(violation.missing, vec![2, 3]);
        assert_eq!(violation.out_of_range, vec![4]);
    }
}
