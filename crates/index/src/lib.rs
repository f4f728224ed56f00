//! Spatial index for GeoStrata
//!
//! This crate implements the approximate phase of every spatial query:
//! - RTree: Sort-Tile-Recursive bulk-loaded R-tree over `(id, envelope)` entries
//! - RangeQuery: lazy, owned, depth-first range query with subtree pruning
//!
//! The index never stores geometries, only envelopes. Candidates it returns
//! are exact for envelope queries and a superset for geometry queries; the
//! engine filters the latter against full geometries.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod query;
pub mod rtree;

pub use query::RangeQuery;
pub use rtree::{IndexStats, RTree, RTreeConfig, MIN_NODE_CAPACITY};
