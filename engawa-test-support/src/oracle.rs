//! Reference similarity oracles used across the test suites.

use std::f32::consts::TAU;

use engawa_core::{NodeId, SimilarityOracle};

/// One-dimensional oracle: node ids sit on a line and similarity is the
/// negated distance between them, so higher remains better.
///
/// # Examples
/// ```
/// use engawa_core::SimilarityOracle;
/// use engawa_test_support::LineOracle;
///
/// let line = LineOracle;
/// assert_eq!(line.score(0, 3), -3.0);
/// assert!(line.score(0, 1) > line.score(0, 2));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LineOracle;

impl SimilarityOracle for LineOracle {
    fn score(&self, source: NodeId, target: NodeId) -> f32 {
        -(source.abs_diff(target) as f32)
    }
}

/// Unit-circle oracle: node `k` of `count` sits at angle `2πk / count` and
/// similarity is the dot product of the unit vectors.
///
/// Adjacent ring positions are each other's nearest neighbours, which makes
/// the expected outcome of diversity pruning easy to state exactly.
#[derive(Clone, Debug)]
pub struct RingOracle {
    points: Vec<(f32, f32)>,
}

impl RingOracle {
    /// Places `count` unit vectors evenly around the circle.
    ///
    /// # Panics
    /// Panics when `count` is zero.
    #[must_use]
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "a ring needs at least one point");
        let points = (0..count)
            .map(|index| {
                let angle = TAU * (index as f32) / (count as f32);
                (angle.cos(), angle.sin())
            })
            .collect();
        Self { points }
    }

    /// Returns the number of points on the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns whether the ring holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl SimilarityOracle for RingOracle {
    fn score(&self, source: NodeId, target: NodeId) -> f32 {
        let (ax, ay) = self.points[source as usize];
        let (bx, by) = self.points[target as usize];
        ax.mul_add(bx, ay * by)
    }
}

/// Wraps another oracle, degrading `score` to a coarse grid while leaving
/// `exact_score` untouched.
///
/// Stands in for a compressed-representation scorer: the approximate ranking
/// is cheap but lossy, and a correct diversity filter must ignore it in
/// favour of the exact variant.
#[derive(Clone, Copy, Debug)]
pub struct QuantisedOracle<O> {
    inner: O,
    step: f32,
}

impl<O> QuantisedOracle<O> {
    /// Quantises `inner`'s scores down to multiples of `step`.
    #[must_use]
    pub fn new(inner: O, step: f32) -> Self {
        Self { inner, step }
    }
}

impl<O: SimilarityOracle> SimilarityOracle for QuantisedOracle<O> {
    fn score(&self, source: NodeId, target: NodeId) -> f32 {
        (self.inner.score(source, target) / self.step).floor() * self.step
    }

    fn exact_score(&self, source: NodeId, target: NodeId) -> f32 {
        self.inner.exact_score(source, target)
    }
}
