//! Error types for the neighbour-set core.
//!
//! Every error is a synchronously surfaced contract violation; nothing here is
//! retried or recovered from inside the crate. Each variant carries a stable
//! machine-readable code so callers can classify failures without matching on
//! display strings.

use std::fmt;

use thiserror::Error;

use crate::similarity::NodeId;

/// Stable codes describing [`NeighbourError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum NeighbourErrorCode {
    /// Requested index was outside the array's logical length.
    IndexOutOfBounds,
    /// An appended score would break the descending order.
    DescendingOrderViolation,
    /// A node was asked to become its own neighbour.
    OwnerAsNeighbour,
    /// The similarity oracle produced a non-finite score.
    NonFiniteScore,
    /// A neighbour array could not grow to the requested length.
    CapacityExceeded,
}

impl NeighbourErrorCode {
    /// Return the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IndexOutOfBounds => "NEIGHBOUR_INDEX_OUT_OF_BOUNDS",
            Self::DescendingOrderViolation => "NEIGHBOUR_DESCENDING_ORDER_VIOLATION",
            Self::OwnerAsNeighbour => "NEIGHBOUR_OWNER_AS_NEIGHBOUR",
            Self::NonFiniteScore => "NEIGHBOUR_NON_FINITE_SCORE",
            Self::CapacityExceeded => "NEIGHBOUR_CAPACITY_EXCEEDED",
        }
    }
}

impl fmt::Display for NeighbourErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced by neighbour-array and neighbour-set operations.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NeighbourError {
    /// Requested index was outside the array's logical length.
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    /// An appended score would break the descending order.
    #[error("score {score} would break descending order (current floor is {floor})")]
    DescendingOrderViolation { score: f32, floor: f32 },
    /// A node was asked to become its own neighbour.
    #[error("node {owner} cannot become its own neighbour")]
    OwnerAsNeighbour { owner: NodeId },
    /// The similarity oracle produced a non-finite score.
    #[error("similarity oracle returned a non-finite score for ({left}, {right})")]
    NonFiniteScore { left: NodeId, right: NodeId },
    /// A neighbour array could not grow to the requested length.
    #[error("neighbour array could not grow to hold {requested} entries")]
    CapacityExceeded { requested: usize },
}

impl NeighbourError {
    /// Retrieve the stable [`NeighbourErrorCode`] for this error.
    ///
    /// # Examples
    /// ```
    /// use engawa_core::{NeighbourArray, NeighbourErrorCode};
    ///
    /// let mut array = NeighbourArray::new();
    /// array.push_descending(1, 1.0)?;
    /// let err = array.push_descending(2, 2.0).expect_err("rising score");
    /// assert_eq!(err.code(), NeighbourErrorCode::DescendingOrderViolation);
    /// assert_eq!(err.code().as_str(), "NEIGHBOUR_DESCENDING_ORDER_VIOLATION");
    /// # Ok::<(), engawa_core::NeighbourError>(())
    /// ```
    #[must_use]
    pub const fn code(&self) -> NeighbourErrorCode {
        match self {
            Self::IndexOutOfBounds { .. } => NeighbourErrorCode::IndexOutOfBounds,
            Self::DescendingOrderViolation { .. } => NeighbourErrorCode::DescendingOrderViolation,
            Self::OwnerAsNeighbour { .. } => NeighbourErrorCode::OwnerAsNeighbour,
            Self::NonFiniteScore { .. } => NeighbourErrorCode::NonFiniteScore,
            Self::CapacityExceeded { .. } => NeighbourErrorCode::CapacityExceeded,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, NeighbourError>;
