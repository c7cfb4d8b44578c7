//! Diversity pruning applied to candidate neighbour lists.
//!
//! Implements the relative-neighbourhood-graph rule used during construction:
//! a candidate edge `(owner, c)` survives only when no already-kept neighbour
//! sits strictly closer to `c` than the owner does. Pruning into dense
//! clusters is what keeps each edge list short without sacrificing recall.

use crate::{
    array::{ConcurrentNeighbourArray, NeighbourArray},
    error::Result,
    similarity::{NodeId, SimilarityOracle, validate_score},
};

/// Keeps the diverse prefix of `candidates` under the degree cap.
///
/// `candidates` must be sorted by descending similarity to `owner` and must
/// not contain the owner; each stored score is the owner-to-candidate score.
/// Kept entries are appended in candidate order, so the result stays sorted
/// and among equally-scored candidates the earlier one wins the slot. The
/// comparator is strict: a candidate equidistant between the owner and a kept
/// neighbour is retained, which avoids over-pruning cospherical clusters.
///
/// Cross-candidate scores are requested from the oracle's exact variant; an
/// approximate ranking is not sound for pruning decisions.
pub(crate) fn retain_diverse<O: SimilarityOracle>(
    owner: NodeId,
    max_degree: usize,
    oracle: &O,
    candidates: &NeighbourArray,
) -> Result<ConcurrentNeighbourArray> {
    let mut kept = NeighbourArray::with_capacity(max_degree.min(candidates.len()));
    for (candidate, owner_score) in candidates.iter() {
        if kept.len() == max_degree {
            break;
        }
        let owner_score = validate_score(owner, candidate, owner_score)?;
        if is_diverse(candidate, owner_score, &kept, oracle)? {
            kept.push_descending(candidate, owner_score)?;
        }
    }
    Ok(ConcurrentNeighbourArray::from_unique(kept))
}

fn is_diverse<O: SimilarityOracle>(
    candidate: NodeId,
    owner_score: f32,
    kept: &NeighbourArray,
    oracle: &O,
) -> Result<bool> {
    for (neighbour, _) in kept.iter() {
        let cross = validate_score(neighbour, candidate, oracle.exact_score(neighbour, candidate))?;
        if cross > owner_score {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NeighbourError;
    use engawa_test_support::oracle::{LineOracle, QuantisedOracle, RingOracle};

    fn candidates_for<O: SimilarityOracle>(
        owner: NodeId,
        others: impl IntoIterator<Item = NodeId>,
        oracle: &O,
    ) -> NeighbourArray {
        let mut candidates = NeighbourArray::new();
        for node in others {
            candidates
                .insert_sorted(node, oracle.score(owner, node))
                .expect("candidate insert");
        }
        candidates
    }

    #[test]
    fn dominated_candidates_are_rejected() {
        let oracle = LineOracle;
        let candidates = candidates_for(0, [1, 2, 3], &oracle);
        let kept = retain_diverse(0, 8, &oracle, &candidates).expect("prune");
        // 2 and 3 are both closer to 1 than to the owner
        assert_eq!(kept.nodes(), [1]);
    }

    #[test]
    fn pruning_stops_once_the_cap_is_reached() {
        struct Indifferent;
        impl SimilarityOracle for Indifferent {
            fn score(&self, _: NodeId, _: NodeId) -> f32 {
                0.0
            }
        }
        let oracle = Indifferent;
        let candidates = candidates_for(0, [1, 2, 3, 4, 5], &oracle);
        let kept = retain_diverse(0, 2, &oracle, &candidates).expect("prune");
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.nodes(), [1, 2]);
    }

    #[test]
    fn equidistant_candidates_are_kept() {
        // every pair of distinct nodes scores exactly the same, so the strict
        // comparator never fires
        struct Flat;
        impl SimilarityOracle for Flat {
            fn score(&self, source: NodeId, target: NodeId) -> f32 {
                if source == target { 1.0 } else { 0.5 }
            }
        }
        let oracle = Flat;
        let candidates = candidates_for(0, [1, 2, 3], &oracle);
        let kept = retain_diverse(0, 8, &oracle, &candidates).expect("prune");
        assert_eq!(kept.nodes(), [1, 2, 3]);
    }

    #[test]
    fn ring_candidates_reduce_to_the_adjacent_nodes() {
        let oracle = RingOracle::new(10);
        let candidates = candidates_for(7, (0..10).filter(|&n| n != 7), &oracle);
        assert_eq!(candidates.len(), 9);
        let kept = retain_diverse(7, 3, &oracle, &candidates).expect("prune");
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(6));
        assert!(kept.contains(8));
    }

    #[test]
    fn pruning_consults_the_exact_scorer() {
        // the quantised score would claim 2 is diverse; the exact score says
        // it is dominated by 1
        let oracle = QuantisedOracle::new(LineOracle, 10.0);
        assert!(oracle.score(1, 2) <= oracle.score(0, 2));
        assert!(oracle.exact_score(1, 2) > oracle.exact_score(0, 2));

        let mut candidates = NeighbourArray::new();
        candidates
            .insert_sorted(1, oracle.exact_score(0, 1))
            .expect("insert");
        candidates
            .insert_sorted(2, oracle.exact_score(0, 2))
            .expect("insert");
        let kept = retain_diverse(0, 8, &oracle, &candidates).expect("prune");
        assert_eq!(kept.nodes(), [1]);
    }

    #[test]
    fn non_finite_cross_scores_are_reported() {
        struct Poisoned;
        impl SimilarityOracle for Poisoned {
            fn score(&self, source: NodeId, target: NodeId) -> f32 {
                if source == 1 && target == 2 {
                    f32::NAN
                } else {
                    -(source.abs_diff(target) as f32)
                }
            }
        }
        let oracle = Poisoned;
        let candidates = candidates_for(0, [1, 2], &oracle);
        let err = retain_diverse(0, 8, &oracle, &candidates).expect_err("NaN must surface");
        assert_eq!(err, NeighbourError::NonFiniteScore { left: 1, right: 2 });
    }
}
