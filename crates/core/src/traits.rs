//! Feature store abstraction
//!
//! This module defines the FeatureStore trait: the only seam through which
//! the engine touches a backing store (file, database, in-memory set).
//! Swapping implementations never affects the index or the query engine.

use std::sync::Arc;

use crate::error::Result;
use crate::feature::{Feature, IndexEntry};
use crate::types::FeatureId;
use geo_types::Geometry;

/// Backing store adapter
///
/// Resolves identifiers to geometries and features, and enumerates the
/// `(id, envelope)` pairs the spatial index is built from. Read-only from
/// the engine's point of view.
///
/// Thread safety: implementations must be `Send + Sync`; sessions may share
/// one store through an `Arc`. Errors raised by the store are propagated
/// to the caller unchanged; retry policy, if any, lives here and not in the
/// engine.
pub trait FeatureStore<F: FeatureId>: Send + Sync {
    /// Stable key identifying the backing resource for pooling
    ///
    /// Empty when pooling does not apply.
    fn connection_id(&self) -> &str;

    /// Acquire or validate the backing resource
    ///
    /// Called by `Session::open`. Any error is reported as
    /// `ConnectionFailed` and leaves the session closed.
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Release the backing resource
    fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Monotonic change counter
    ///
    /// Must advance whenever the set of features or any geometry changes,
    /// so sessions can detect a stale spatial index. Stores that never
    /// change may keep the default.
    fn generation(&self) -> u64 {
        0
    }

    /// Every `(id, envelope)` pair in the store, one per feature
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn index_entries(&self) -> Result<Vec<IndexEntry<F>>>;

    /// Geometry of one feature, `None` if the id names no feature
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn geometry(&self, fid: &F) -> Result<Option<Geometry<f64>>>;

    /// Full feature, `None` if the id names no feature
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn feature(&self, fid: &F) -> Result<Option<Feature<F>>>;

    /// Number of features in the store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn feature_count(&self) -> Result<usize>;
}

impl<F: FeatureId, S: FeatureStore<F> + ?Sized> FeatureStore<F> for Arc<S> {
    fn connection_id(&self) -> &str {
        (**self).connection_id()
    }

    fn connect(&self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&self) -> Result<()> {
        (**self).disconnect()
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }

    fn index_entries(&self) -> Result<Vec<IndexEntry<F>>> {
        (**self).index_entries()
    }

    fn geometry(&self, fid: &F) -> Result<Option<Geometry<f64>>> {
        (**self).geometry(fid)
    }

    fn feature(&self, fid: &F) -> Result<Option<Feature<F>>> {
        (**self).feature(fid)
    }

    fn feature_count(&self) -> Result<usize> {
        (**self).feature_count()
    }
}
