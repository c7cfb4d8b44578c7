//! Concurrent on-heap graph: node ordinals mapped to their neighbour sets.
//!
//! The graph adds nodes and publishes edges concurrently; neighbour-level
//! consistency is delegated entirely to each node's
//! [`ConcurrentNeighbourSet`]. Searches should iterate a node's set through
//! its snapshot iterator, which stays valid while the graph keeps mutating.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use dashmap::DashMap;
use tracing::debug;

use crate::{
    array::NeighbourArray,
    error::Result,
    memory,
    set::ConcurrentNeighbourSet,
    similarity::{NodeId, SimilarityOracle},
};

const NO_ENTRY: i64 = -1;

/// A concurrent in-memory graph keyed by node ordinal.
///
/// Nodes can be added out of order and linked from any number of threads.
/// The first node reported complete becomes the search entry point until a
/// caller promotes another one.
pub struct OnHeapGraph<O> {
    nodes: DashMap<NodeId, Arc<ConcurrentNeighbourSet<O>>>,
    entry: AtomicI64,
    max_degree: usize,
    oracle: Arc<O>,
}

impl<O: SimilarityOracle> OnHeapGraph<O> {
    /// Creates an empty graph whose sets are capped at `max_degree`
    /// neighbours.
    #[must_use]
    pub fn new(max_degree: usize, oracle: Arc<O>) -> Self {
        Self {
            nodes: DashMap::new(),
            entry: AtomicI64::new(NO_ENTRY),
            max_degree,
            oracle,
        }
    }

    /// Registers `node` with an empty neighbour set and returns the set.
    ///
    /// Insertion is atomic; re-registering a node returns its existing set.
    /// Populating the neighbours, and establishing the reciprocal links, is
    /// the caller's responsibility (see [`OnHeapGraph::link`]).
    pub fn add_node(&self, node: NodeId) -> Arc<ConcurrentNeighbourSet<O>> {
        Arc::clone(
            self.nodes
                .entry(node)
                .or_insert_with(|| {
                    Arc::new(ConcurrentNeighbourSet::new(
                        node,
                        self.max_degree,
                        Arc::clone(&self.oracle),
                    ))
                })
                .value(),
        )
    }

    /// Returns the neighbour set for `node`, if it has been registered.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<Arc<ConcurrentNeighbourSet<O>>> {
        self.nodes.get(&node).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the degree cap applied to every set.
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Returns a sorted snapshot of the registered node ids.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the current entry point, if one has been established.
    #[must_use]
    pub fn entry_node(&self) -> Option<NodeId> {
        match self.entry.load(Ordering::Acquire) {
            NO_ENTRY => None,
            node => NodeId::try_from(node).ok(),
        }
    }

    /// Marks `node` fully linked; the first completed node becomes the entry
    /// point.
    pub fn mark_complete(&self, node: NodeId) {
        if self
            .entry
            .compare_exchange(
                NO_ENTRY,
                i64::from(node),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(node, "graph entry point established");
        }
    }

    /// Promotes `node` to the entry point unconditionally.
    pub fn update_entry(&self, node: NodeId) {
        self.entry.store(i64::from(node), Ordering::Release);
        debug!(node, "graph entry point updated");
    }

    /// Installs the diverse neighbour list for `node`, then adds the
    /// reciprocal edge on every chosen neighbour's set.
    ///
    /// Registers `node` if necessary. Candidates whose sets have not been
    /// registered yet are linked one way; their reciprocal edge arrives when
    /// they are linked themselves.
    ///
    /// # Errors
    /// Propagates the errors of
    /// [`ConcurrentNeighbourSet::insert_diverse`] and
    /// [`ConcurrentNeighbourSet::backlink`].
    pub fn link(
        &self,
        node: NodeId,
        natural: &NeighbourArray,
        concurrent: &NeighbourArray,
    ) -> Result<()> {
        let set = self.add_node(node);
        set.insert_diverse(natural, concurrent)?;
        let chosen = set.current();
        for (neighbour, score) in chosen.iter() {
            if let Some(other) = self.get(neighbour) {
                set.backlink(&other, score)?;
            }
        }
        Ok(())
    }

    /// Returns the byte footprint of the graph: every set plus its map slot.
    #[must_use]
    pub fn ram_bytes_used(&self) -> u64 {
        self.nodes
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .ram_bytes_used()
                    .saturating_add(memory::MAP_SLOT_BYTES)
            })
            .sum()
    }
}
