//! Similarity oracle abstraction consumed by the neighbour-set core.

use crate::error::{NeighbourError, Result};

/// Identifier of a stored vector within one graph.
///
/// Ordinals are assigned externally and are globally unique within a graph;
/// the core never mints them.
pub type NodeId = u32;

/// Pairwise scoring capability supplied by the embedding application.
///
/// Scores are real-valued similarities: higher means more similar. The oracle
/// must be deterministic for a given pair and must only yield finite values;
/// symmetry is not required. [`SimilarityOracle::score`] is the cheap path
/// used for candidate generation and may be approximate (for example, decoded
/// from a product-quantised representation). Diversity decisions always go
/// through [`SimilarityOracle::exact_score`], which defaults to the plain
/// score for oracles that are already exact.
///
/// # Examples
/// ```
/// use engawa_core::{NodeId, SimilarityOracle};
///
/// /// Ids sit on a line; similarity is the negated distance between them.
/// struct Line;
///
/// impl SimilarityOracle for Line {
///     fn score(&self, source: NodeId, target: NodeId) -> f32 {
///         -(source.abs_diff(target) as f32)
///     }
/// }
///
/// let line = Line;
/// assert_eq!(line.score(2, 5), -3.0);
/// assert_eq!(line.exact_score(2, 5), -3.0);
/// ```
pub trait SimilarityOracle {
    /// Scores `(source, target)`; higher means more similar.
    fn score(&self, source: NodeId, target: NodeId) -> f32;

    /// Canonical score used for diversity decisions.
    ///
    /// Oracles backed by a lossy representation should override this to
    /// consult the stored vectors; the approximate ranking is acceptable for
    /// candidate generation but not for pruning.
    fn exact_score(&self, source: NodeId, target: NodeId) -> f32 {
        self.score(source, target)
    }
}

/// Rejects non-finite scores before they can enter a neighbour structure.
pub(crate) fn validate_score(left: NodeId, right: NodeId, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NeighbourError::NonFiniteScore { left, right })
    }
}
