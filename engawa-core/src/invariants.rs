//! Structural invariant checks for a concurrent neighbour set.
//!
//! The checkers are surfaced via
//! [`ConcurrentNeighbourSet::invariants`](crate::ConcurrentNeighbourSet::invariants)
//! so property-based and concurrency tests can assert set health after each
//! operation without re-deriving the internal representation. Every run pins
//! one snapshot and evaluates all requested invariants against it.

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    array::ConcurrentNeighbourArray,
    set::ConcurrentNeighbourSet,
    similarity::{NodeId, SimilarityOracle},
};

/// Enumerates the structural invariants enforced on a published neighbour
/// array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetInvariant {
    /// Scores never increase along the array.
    Sortedness,
    /// Node ids are pairwise distinct.
    Uniqueness,
    /// The owner never appears in its own neighbour list.
    OwnerExclusion,
    /// The array never exceeds the degree cap.
    DegreeBound,
    /// No kept neighbour dominates a later entry under the pruning rule.
    ///
    /// Holds after bulk installs and cap-triggered eviction; a single
    /// under-cap insert does not re-prune, so callers pick this check
    /// deliberately.
    Diversity,
}

impl SetInvariant {
    /// Returns all invariants in the order they should be evaluated.
    ///
    /// # Examples
    /// ```
    /// use engawa_core::SetInvariant;
    /// let invariants = SetInvariant::all();
    /// assert_eq!(invariants.len(), 5);
    /// assert!(matches!(invariants[0], SetInvariant::Sortedness));
    /// ```
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Sortedness,
            Self::Uniqueness,
            Self::OwnerExclusion,
            Self::DegreeBound,
            Self::Diversity,
        ]
    }
}

/// Reports an invariant violation surfaced by [`SetInvariantChecker`].
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum SetInvariantViolation {
    /// A score is followed by a strictly higher score.
    #[error("entry {index} (score {score}) precedes a higher-scored entry ({next})")]
    Sortedness {
        /// Index of the offending entry.
        index: usize,
        /// Score at `index`.
        score: f32,
        /// Score at `index + 1`.
        next: f32,
    },
    /// A node id appears more than once.
    #[error("node {node} appears more than once")]
    Uniqueness {
        /// The duplicated node id.
        node: NodeId,
    },
    /// The owner is listed as its own neighbour.
    #[error("owner {owner} is listed as its own neighbour")]
    OwnerExclusion {
        /// The owning node's id.
        owner: NodeId,
    },
    /// The array exceeds the degree cap.
    #[error("set holds {len} neighbours, exceeding the cap of {max_degree}")]
    DegreeBound {
        /// Observed neighbour count.
        len: usize,
        /// Configured degree cap.
        max_degree: usize,
    },
    /// A kept neighbour dominates a later entry under the pruning rule.
    #[error("neighbour {candidate} is closer to {kept} ({cross}) than to the owner ({owner_score})")]
    Diversity {
        /// The earlier kept neighbour.
        kept: NodeId,
        /// The dominated later entry.
        candidate: NodeId,
        /// Score between the two neighbours.
        cross: f32,
        /// Owner-to-candidate score stored in the array.
        owner_score: f32,
    },
    /// The oracle failed while evaluating the diversity invariant.
    #[error("oracle returned a non-finite score for ({left}, {right})")]
    OracleFailure {
        /// Source node of the failing pair.
        left: NodeId,
        /// Target node of the failing pair.
        right: NodeId,
    },
}

/// Helper returned by
/// [`ConcurrentNeighbourSet::invariants`](crate::ConcurrentNeighbourSet::invariants)
/// to run structural checks.
pub struct SetInvariantChecker<'set, O> {
    set: &'set ConcurrentNeighbourSet<O>,
}

impl<'set, O: SimilarityOracle> SetInvariantChecker<'set, O> {
    pub(crate) fn new(set: &'set ConcurrentNeighbourSet<O>) -> Self {
        Self { set }
    }

    /// Runs every invariant, returning the first violation encountered.
    pub fn check_all(&self) -> Result<(), SetInvariantViolation> {
        self.check_many(SetInvariant::all())
    }

    /// Runs a custom subset of invariants in the provided order.
    pub fn check_many(
        &self,
        invariants: impl IntoIterator<Item = SetInvariant>,
    ) -> Result<(), SetInvariantViolation> {
        self.run_with_mode(invariants, EvaluationMode::FailFast)
    }

    /// Runs a single invariant.
    pub fn check(&self, invariant: SetInvariant) -> Result<(), SetInvariantViolation> {
        self.check_many([invariant])
    }

    /// Executes every invariant and returns the full set of violations.
    #[must_use]
    pub fn collect_all(&self) -> Vec<SetInvariantViolation> {
        self.collect_many(SetInvariant::all())
    }

    /// Executes the selected invariants and returns every violation
    /// discovered.
    #[must_use]
    pub fn collect_many(
        &self,
        invariants: impl IntoIterator<Item = SetInvariant>,
    ) -> Vec<SetInvariantViolation> {
        let mut violations = Vec::new();
        let _ = self.run_with_mode(invariants, EvaluationMode::Collect(&mut violations));
        violations
    }

    fn run_with_mode(
        &self,
        invariants: impl IntoIterator<Item = SetInvariant>,
        mut mode: EvaluationMode<'_>,
    ) -> Result<(), SetInvariantViolation> {
        let snapshot = self.set.current();
        let ctx = SnapshotContext {
            owner: self.set.owner(),
            max_degree: self.set.max_degree(),
            oracle: self.set.oracle(),
            array: &snapshot,
        };
        for invariant in invariants {
            dispatch(&ctx, invariant, &mut mode)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct SnapshotContext<'a, O> {
    owner: NodeId,
    max_degree: usize,
    oracle: &'a O,
    array: &'a ConcurrentNeighbourArray,
}

enum EvaluationMode<'a> {
    FailFast,
    Collect(&'a mut Vec<SetInvariantViolation>),
}

impl EvaluationMode<'_> {
    fn record(&mut self, violation: SetInvariantViolation) -> Result<(), SetInvariantViolation> {
        match self {
            Self::FailFast => Err(violation),
            Self::Collect(sink) => {
                sink.push(violation);
                Ok(())
            }
        }
    }
}

fn dispatch<O: SimilarityOracle>(
    ctx: &SnapshotContext<'_, O>,
    invariant: SetInvariant,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    match invariant {
        SetInvariant::Sortedness => check_sortedness(ctx.array, mode),
        SetInvariant::Uniqueness => check_uniqueness(ctx.array, mode),
        SetInvariant::OwnerExclusion => check_owner_exclusion(ctx.owner, ctx.array, mode),
        SetInvariant::DegreeBound => check_degree_bound(ctx.max_degree, ctx.array, mode),
        SetInvariant::Diversity => check_diversity(ctx, mode),
    }
}

fn check_sortedness(
    array: &ConcurrentNeighbourArray,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    for (index, window) in array.scores().windows(2).enumerate() {
        if window[0] < window[1] {
            mode.record(SetInvariantViolation::Sortedness {
                index,
                score: window[0],
                next: window[1],
            })?;
        }
    }
    Ok(())
}

fn check_uniqueness(
    array: &ConcurrentNeighbourArray,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(array.len());
    for &node in array.nodes() {
        if !seen.insert(node) {
            mode.record(SetInvariantViolation::Uniqueness { node })?;
        }
    }
    Ok(())
}

fn check_owner_exclusion(
    owner: NodeId,
    array: &ConcurrentNeighbourArray,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    if array.contains(owner) {
        mode.record(SetInvariantViolation::OwnerExclusion { owner })?;
    }
    Ok(())
}

fn check_degree_bound(
    max_degree: usize,
    array: &ConcurrentNeighbourArray,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    if array.len() > max_degree {
        mode.record(SetInvariantViolation::DegreeBound {
            len: array.len(),
            max_degree,
        })?;
    }
    Ok(())
}

fn check_diversity<O: SimilarityOracle>(
    ctx: &SnapshotContext<'_, O>,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), SetInvariantViolation> {
    let nodes = ctx.array.nodes();
    let scores = ctx.array.scores();
    for later in 1..nodes.len() {
        for earlier in 0..later {
            let cross = ctx.oracle.exact_score(nodes[earlier], nodes[later]);
            if !cross.is_finite() {
                mode.record(SetInvariantViolation::OracleFailure {
                    left: nodes[earlier],
                    right: nodes[later],
                })?;
                continue;
            }
            if cross > scores[later] {
                mode.record(SetInvariantViolation::Diversity {
                    kept: nodes[earlier],
                    candidate: nodes[later],
                    cross,
                    owner_score: scores[later],
                })?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::array::NeighbourArray;
    use engawa_test_support::oracle::{LineOracle, RingOracle};

    #[test]
    fn a_freshly_built_ring_set_passes_every_check() {
        let oracle = Arc::new(RingOracle::new(10));
        let mut candidates = NeighbourArray::new();
        for node in (0..10).filter(|&n| n != 7) {
            candidates
                .insert_sorted(node, oracle.score(7, node))
                .expect("candidate insert");
        }
        let set = ConcurrentNeighbourSet::new(7, 3, oracle);
        set.insert_diverse(&candidates, &NeighbourArray::new())
            .expect("bulk insert");
        set.invariants().check_all().expect("all invariants hold");
        assert!(set.invariants().collect_all().is_empty());
    }

    #[test]
    fn under_cap_inserts_can_fail_only_the_diversity_check() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 4, Arc::clone(&oracle));
        set.insert(1, oracle.score(0, 1)).expect("insert");
        set.insert(2, oracle.score(0, 2)).expect("insert");

        set.invariants()
            .check_many([
                SetInvariant::Sortedness,
                SetInvariant::Uniqueness,
                SetInvariant::OwnerExclusion,
                SetInvariant::DegreeBound,
            ])
            .expect("structural invariants hold below the cap");

        let err = set
            .invariants()
            .check(SetInvariant::Diversity)
            .expect_err("2 is dominated by 1");
        assert_eq!(
            err,
            SetInvariantViolation::Diversity {
                kept: 1,
                candidate: 2,
                cross: -1.0,
                owner_score: -2.0,
            },
        );
    }

    #[test]
    fn collect_many_reports_every_violation() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 8, Arc::clone(&oracle));
        for node in [1, 2, 3] {
            set.insert(node, oracle.score(0, node)).expect("insert");
        }
        let violations = set.invariants().collect_many([SetInvariant::Diversity]);
        // 2 and 3 are dominated by 1, and 3 is also dominated by 2
        assert_eq!(violations.len(), 3);
    }
}
