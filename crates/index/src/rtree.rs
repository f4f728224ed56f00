//! Bulk-loaded R-tree
//!
//! Sort-Tile-Recursive (STR) packed R-tree mapping feature ids to their
//! bounding envelopes. Built once from the full entry set, then immutable;
//! a store change is handled by building a new tree, never by mutating one
//! that queries may still be walking.
//!
//! ## Layout
//!
//! - `entries`: leaf payloads, reordered so every leaf covers a contiguous range
//! - `nodes`: arena of nodes, written level by level bottom-up; the root is last
//! - every node covers a contiguous range of either `entries` (leaf) or
//!   `nodes` (internal), so a node is just `(envelope, kind, start, len)`
//!
//! ## Determinism
//!
//! - Duplicate ids are collapsed first (last entry wins), in id order
//! - Sorting uses `f64::total_cmp` on envelope centers
//! - Ties break on id (entries) or child offset (nodes)
//!
//! Query order therefore depends only on the entry set, not on input order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use geostrata_core::{Envelope, Error, FeatureId, IndexEntry, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::RangeQuery;

/// Smallest usable node capacity
pub const MIN_NODE_CAPACITY: usize = 2;

/// R-tree configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTreeConfig {
    /// Max children per node (default: 16)
    pub node_capacity: usize,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self { node_capacity: 16 }
    }
}

impl RTreeConfig {
    /// Create a config with the given node capacity
    pub fn with_node_capacity(node_capacity: usize) -> Self {
        Self { node_capacity }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `node_capacity` is below [`MIN_NODE_CAPACITY`].
    pub fn validate(&self) -> Result<()> {
        if self.node_capacity < MIN_NODE_CAPACITY {
            return Err(Error::invalid_argument(format!(
                "node_capacity must be at least {}, got {}",
                MIN_NODE_CAPACITY, self.node_capacity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Children are ranges of `entries`
    Leaf,
    /// Children are ranges of `nodes`
    Internal,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) envelope: Envelope,
    pub(crate) kind: NodeKind,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl Node {
    pub(crate) fn children(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Index statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of indexed ids
    pub entries: usize,
    /// Number of tree nodes (leaves included)
    pub nodes: usize,
    /// Levels from root to leaves (0 for an empty tree)
    pub height: usize,
    /// Configured max children per node
    pub node_capacity: usize,
}

/// Immutable STR-packed R-tree over `(id, envelope)` entries
#[derive(Debug, Clone)]
pub struct RTree<F> {
    pub(crate) entries: Vec<IndexEntry<F>>,
    pub(crate) nodes: Vec<Node>,
    positions: BTreeMap<F, usize>,
    height: usize,
    config: RTreeConfig,
}

impl<F: FeatureId> RTree<F> {
    /// Build a tree with the default configuration
    pub fn build(entries: impl IntoIterator<Item = IndexEntry<F>>) -> Self {
        Self::pack(entries, RTreeConfig::default())
    }

    /// Build a tree with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is invalid.
    pub fn build_with_config(
        entries: impl IntoIterator<Item = IndexEntry<F>>,
        config: RTreeConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::pack(entries, config))
    }

    /// Empty tree
    pub fn empty() -> Self {
        Self::pack(std::iter::empty(), RTreeConfig::default())
    }

    fn pack(entries: impl IntoIterator<Item = IndexEntry<F>>, config: RTreeConfig) -> Self {
        let capacity = config.node_capacity;

        // Collapse duplicate ids: the last envelope seen for an id wins
        let unique: BTreeMap<F, Envelope> = entries
            .into_iter()
            .map(|entry| (entry.fid, entry.envelope))
            .collect();
        let mut entries: Vec<IndexEntry<F>> = unique
            .into_iter()
            .map(|(fid, envelope)| IndexEntry::new(fid, envelope))
            .collect();

        let mut nodes = Vec::new();
        let mut height = 0;

        if !entries.is_empty() {
            // Leaf level
            let leaf_ranges = str_tiles(
                &mut entries,
                capacity,
                |a, b| cmp_center_x(&a.envelope, &b.envelope).then_with(|| a.fid.cmp(&b.fid)),
                |a, b| cmp_center_y(&a.envelope, &b.envelope).then_with(|| a.fid.cmp(&b.fid)),
            );
            let mut level: Vec<Node> = leaf_ranges
                .into_iter()
                .map(|range| Node {
                    envelope: cover(&entries[range.clone()], |e| &e.envelope),
                    kind: NodeKind::Leaf,
                    start: range.start,
                    len: range.len(),
                })
                .collect();
            height = 1;

            // Internal levels until a single root remains
            while level.len() > 1 {
                let group_ranges = str_tiles(
                    &mut level,
                    capacity,
                    |a, b| cmp_center_x(&a.envelope, &b.envelope).then_with(|| a.start.cmp(&b.start)),
                    |a, b| cmp_center_y(&a.envelope, &b.envelope).then_with(|| a.start.cmp(&b.start)),
                );
                let base = nodes.len();
                let parents: Vec<Node> = group_ranges
                    .into_iter()
                    .map(|range| Node {
                        envelope: cover(&level[range.clone()], |n| &n.envelope),
                        kind: NodeKind::Internal,
                        start: base + range.start,
                        len: range.len(),
                    })
                    .collect();
                nodes.append(&mut level);
                level = parents;
                height += 1;
            }
            nodes.append(&mut level);
        }

        let positions = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.fid.clone(), pos))
            .collect();

        debug!(
            target: "geostrata::index",
            entries = entries.len(),
            nodes = nodes.len(),
            height,
            node_capacity = capacity,
            "R-tree built"
        );

        Self {
            entries,
            nodes,
            positions,
            height,
            config,
        }
    }

    /// Lazy range query: every id whose envelope intersects `query`
    ///
    /// Boundaries are inclusive. The returned iterator owns a reference to
    /// the tree, so it stays valid if the caller swaps in a rebuilt tree.
    pub fn query_range(self: &Arc<Self>, query: &Envelope) -> RangeQuery<F> {
        RangeQuery::new(Arc::clone(self), *query)
    }

    /// Stored envelope for an id
    pub fn get(&self, fid: &F) -> Option<&Envelope> {
        self.positions
            .get(fid)
            .map(|&pos| &self.entries[pos].envelope)
    }

    /// Check if an id is indexed
    pub fn contains(&self, fid: &F) -> bool {
        self.positions.contains_key(fid)
    }

    /// Iterate all entries in leaf order
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry<F>> {
        self.entries.iter()
    }
}

impl<F> RTree<F> {
    /// Number of distinct indexed ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of every indexed envelope, `None` when empty
    pub fn extent(&self) -> Option<Envelope> {
        self.root().map(|root| root.envelope)
    }

    /// Levels from root to leaves (0 when empty)
    pub fn height(&self) -> usize {
        self.height
    }

    /// Configuration the tree was built with
    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    /// Index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.entries.len(),
            nodes: self.nodes.len(),
            height: self.height,
            node_capacity: self.config.node_capacity,
        }
    }

    pub(crate) fn root_index(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    fn root(&self) -> Option<&Node> {
        self.nodes.last()
    }
}

/// Sort-Tile-Recursive partition of `items` into runs of at most `capacity`
///
/// Sorts by x into `ceil(sqrt(n / capacity))` vertical slices, sorts each
/// slice by y, then cuts it into consecutive runs. Items are reordered in
/// place; the returned ranges tile `0..items.len()`.
fn str_tiles<T>(
    items: &mut [T],
    capacity: usize,
    by_x: impl Fn(&T, &T) -> Ordering,
    by_y: impl Fn(&T, &T) -> Ordering,
) -> Vec<Range<usize>> {
    let n = items.len();
    // Capacity may be as large as usize::MAX: no arithmetic here may overflow
    let tile_count = n / capacity + usize::from(n % capacity != 0);
    let slice_count = (tile_count as f64).sqrt().ceil() as usize;
    let slice_len = slice_count.max(1).saturating_mul(capacity);

    items.sort_by(&by_x);

    let mut tiles = Vec::with_capacity(tile_count);
    for slice_start in (0..n).step_by(slice_len) {
        let slice_end = slice_start.saturating_add(slice_len).min(n);
        items[slice_start..slice_end].sort_by(&by_y);
        for start in (slice_start..slice_end).step_by(capacity) {
            tiles.push(start..start.saturating_add(capacity).min(slice_end));
        }
    }
    tiles
}

fn cmp_center_x(a: &Envelope, b: &Envelope) -> Ordering {
    (a.min_x() + a.max_x()).total_cmp(&(b.min_x() + b.max_x()))
}

fn cmp_center_y(a: &Envelope, b: &Envelope) -> Ordering {
    (a.min_y() + a.max_y()).total_cmp(&(b.min_y() + b.max_y()))
}

/// Union of a non-empty run of items' envelopes
fn cover<T>(items: &[T], envelope: impl Fn(&T) -> &Envelope) -> Envelope {
    let first = *envelope(&items[0]);
    items[1..]
        .iter()
        .fold(first, |acc, item| acc.union(envelope(item)))
}
