//! Concurrent neighbour-set core for approximate nearest-neighbour graphs.
//!
//! Each node of the graph owns a [`ConcurrentNeighbourSet`]: a bounded,
//! descending-sorted, deduplicated edge list published through an atomic
//! snapshot reference. Writers merge concurrent edge proposals, prune them
//! with the relative-neighbourhood diversity rule, and install the rebuilt
//! array with a compare-and-swap; readers iterate a pinned snapshot without
//! locks. Pair scoring is delegated to an externally supplied
//! [`SimilarityOracle`], and [`OnHeapGraph`] supplies the outer map from node
//! ordinal to set.

mod array;
mod diversity;
mod error;
mod graph;
pub mod invariants;
pub mod memory;
mod set;
mod similarity;

pub use crate::{
    array::{ConcurrentNeighbourArray, NeighbourArray},
    error::{NeighbourError, NeighbourErrorCode, Result},
    graph::OnHeapGraph,
    invariants::{SetInvariant, SetInvariantChecker, SetInvariantViolation},
    set::{ConcurrentNeighbourSet, NeighbourIter},
    similarity::{NodeId, SimilarityOracle},
};
