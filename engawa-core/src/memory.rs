//! Byte accounting for neighbour structures.
//!
//! Provides the platform-constant vocabulary used to report the footprint of
//! live sets and graphs, plus a conservative pre-flight estimate so callers
//! can reject oversized builds before any allocation occurs. Estimates use
//! saturating arithmetic throughout and never panic on absurd inputs.

use crate::similarity::NodeId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Width of a reference on the target platform (8 bytes on 64-bit, 4 on
/// 32-bit).
pub const REF_BYTES: u64 = std::mem::size_of::<usize>() as u64;

/// Header of a backing vector: pointer, length, and capacity words.
pub const ARRAY_HEADER_BYTES: u64 = 3 * REF_BYTES;

/// Width of a stored node ordinal.
pub const NODE_ID_BYTES: u64 = std::mem::size_of::<NodeId>() as u64;

/// Width of a stored similarity score.
pub const SCORE_BYTES: u64 = std::mem::size_of::<f32>() as u64;

/// Estimated per-entry overhead of the concurrent map slot holding one set.
///
/// The map stores `(ordinal, shared handle)` pairs in open-addressed shards,
/// so each entry is charged the key padded to reference alignment by the
/// neighbouring pointer, the handle itself, a word of hash and control
/// metadata, and a word of load-factor headroom for the unused slots the
/// shard keeps around.
pub const MAP_SLOT_BYTES: u64 = REF_BYTES // ordinal key, padded to alignment
    + REF_BYTES // shared handle to the set
    + REF_BYTES // hash and control metadata
    + REF_BYTES; // open-addressing load-factor headroom

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

/// Bytes held by one neighbour array with room for `capacity` pairs: two
/// vector headers plus the parallel id and score entries.
#[must_use]
pub fn neighbour_array_bytes(capacity: usize) -> u64 {
    (capacity as u64)
        .saturating_mul(NODE_ID_BYTES + SCORE_BYTES)
        .saturating_add(2 * ARRAY_HEADER_BYTES)
}

/// Bytes held by one neighbour set whose current array has room for
/// `capacity` pairs: the atomic snapshot reference, the owner ordinal, the
/// degree cap, the oracle handle, and the array itself.
#[must_use]
pub fn neighbour_set_bytes(capacity: usize) -> u64 {
    let fields = REF_BYTES // atomic snapshot reference
        .saturating_add(NODE_ID_BYTES) // owner ordinal
        .saturating_add(REF_BYTES) // degree cap
        .saturating_add(REF_BYTES); // oracle handle
    neighbour_array_bytes(capacity).saturating_add(fields)
}

/// Conservative estimate of the bytes a graph of `node_count` nodes will hold
/// with the given degree cap.
///
/// Each node is charged one map slot plus a full set whose array carries the
/// one slot of insertion headroom the sets allocate.
///
/// # Examples
/// ```
/// use engawa_core::memory::estimate_graph_bytes;
///
/// let bytes = estimate_graph_bytes(1_000, 16);
/// assert!(bytes > 0, "estimate must be positive for non-empty graphs");
///
/// assert_eq!(estimate_graph_bytes(0, 16), 0, "empty graphs hold nothing");
/// ```
#[must_use]
pub fn estimate_graph_bytes(node_count: usize, max_degree: usize) -> u64 {
    if node_count == 0 {
        return 0;
    }
    let per_node =
        neighbour_set_bytes(max_degree.saturating_add(1)).saturating_add(MAP_SLOT_BYTES);
    (node_count as u64).saturating_mul(per_node)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// Selects the appropriate binary unit and divisor for a byte count.
fn binary_unit(bytes: u64) -> (&'static str, u64) {
    if bytes >= TIB {
        ("TiB", TIB)
    } else if bytes >= GIB {
        ("GiB", GIB)
    } else if bytes >= MIB {
        ("MiB", MIB)
    } else {
        ("KiB", KIB)
    }
}

/// Formats a byte count as a human-readable string using binary units.
///
/// Returns values like `"0 B"`, `"1.0 KiB"`, `"2.4 GiB"`, with one decimal
/// place for values of at least 1 KiB.
///
/// # Examples
/// ```
/// use engawa_core::memory::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < KIB {
        return format!("{bytes} B");
    }
    let (label, divisor) = binary_unit(bytes);
    format!("{:.1} {label}", bytes as f64 / divisor as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
