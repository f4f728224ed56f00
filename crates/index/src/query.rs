//! Lazy range queries over an [`RTree`]
//!
//! A [`RangeQuery`] walks the tree depth-first with an explicit stack,
//! pruning every subtree whose envelope misses the query, and yields ids one
//! at a time as the caller advances it.

use std::ops::Range;
use std::sync::Arc;

use geostrata_core::{Envelope, FeatureId};
use smallvec::SmallVec;

use crate::rtree::{NodeKind, RTree};

/// Lazy iterator over ids whose envelope intersects a query envelope
///
/// Owns an `Arc` of the tree it walks. Order is deterministic for a given
/// tree. Fused: once it returns `None` it keeps returning `None`.
#[derive(Debug)]
pub struct RangeQuery<F> {
    tree: Arc<RTree<F>>,
    query: Envelope,
    // Pending node offsets; trees rarely exceed a handful of levels
    stack: SmallVec<[usize; 32]>,
    // Entry offsets of the leaf currently being scanned
    leaf: Range<usize>,
    visited: usize,
}

impl<F: FeatureId> RangeQuery<F> {
    pub(crate) fn new(tree: Arc<RTree<F>>, query: Envelope) -> Self {
        let mut stack = SmallVec::new();
        if let Some(root) = tree.root_index() {
            if tree.nodes[root].envelope.intersects(&query) {
                stack.push(root);
            }
        }
        Self {
            tree,
            query,
            stack,
            leaf: 0..0,
            visited: 0,
        }
    }

    /// Query envelope
    pub fn query(&self) -> &Envelope {
        &self.query
    }

    /// Number of entries whose envelope was tested so far
    pub fn visited(&self) -> usize {
        self.visited
    }
}

impl<F: FeatureId> Iterator for RangeQuery<F> {
    type Item = F;

    fn next(&mut self) -> Option<F> {
        loop {
            for pos in self.leaf.by_ref() {
                let entry = &self.tree.entries[pos];
                self.visited += 1;
                if entry.envelope.intersects(&self.query) {
                    return Some(entry.fid.clone());
                }
            }

            let node = &self.tree.nodes[self.stack.pop()?];
            match node.kind {
                NodeKind::Leaf => self.leaf = node.children(),
                NodeKind::Internal => {
                    // Reverse so children are visited in stored order
                    for child in node.children().rev() {
                        if self.tree.nodes[child].envelope.intersects(&self.query) {
                            self.stack.push(child);
                        }
                    }
                }
            }
        }
    }
}

impl<F: FeatureId> std::iter::FusedIterator for RangeQuery<F> {}
