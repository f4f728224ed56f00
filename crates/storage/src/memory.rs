//! MemoryFeatureStore: in-memory feature store adapter
//!
//! This module implements the FeatureStore trait using:
//! - `BTreeMap<F, StoredFeature>` for ordered, id-keyed storage
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` generation counter, advanced on every mutation
//!
//! # Design Notes
//!
//! - **Envelopes computed at insert**: index entries are produced without
//!   touching geometries again
//! - **Mutation outside the contract**: `insert`/`remove`/`clear` exist for
//!   loading data; the provider itself never writes. Sessions observe
//!   mutations through `generation()`
//! - **Availability switch**: `set_available(false)` makes `connect` fail,
//!   standing in for an unreachable backing resource

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use geo_types::Geometry;
use parking_lot::RwLock;
use tracing::debug;

use geostrata_core::{Attributes, Envelope, Error, Feature, FeatureId, FeatureStore, IndexEntry, Result};

/// Feature as held by the store, with its precomputed envelope
#[derive(Debug, Clone)]
struct StoredFeature {
    geometry: Geometry<f64>,
    attributes: Attributes,
    envelope: Envelope,
}

/// In-memory feature store
///
/// Thread-safe through `parking_lot::RwLock` and atomics; share it between
/// sessions with an `Arc`.
#[derive(Debug)]
pub struct MemoryFeatureStore<F> {
    connection_id: String,
    /// Features keyed by id
    data: RwLock<BTreeMap<F, StoredFeature>>,
    /// Advanced on every mutation
    generation: AtomicU64,
    /// When false, `connect` fails
    available: AtomicBool,
    /// Outstanding `connect` calls not yet matched by `disconnect`
    connections: AtomicUsize,
}

impl<F: FeatureId> Default for MemoryFeatureStore<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FeatureId> MemoryFeatureStore<F> {
    /// Create an empty store that opts out of pooling (empty connection id)
    pub fn new() -> Self {
        Self::with_connection_id("")
    }

    /// Create an empty store with a connection id
    pub fn with_connection_id(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            data: RwLock::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            available: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-loaded with features
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a feature's geometry has no extent.
    pub fn from_features(features: impl IntoIterator<Item = Feature<F>>) -> Result<Self> {
        let store = Self::new();
        for feature in features {
            store.insert_feature(feature)?;
        }
        Ok(store)
    }

    /// Insert or replace a feature, returning the previous one
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the geometry has no extent (an empty
    /// collection); such a feature could never be found spatially.
    pub fn insert(
        &self,
        fid: F,
        geometry: impl Into<Geometry<f64>>,
        attributes: Attributes,
    ) -> Result<Option<Feature<F>>> {
        let geometry = geometry.into();
        let envelope = Envelope::from_geometry(&geometry).ok_or_else(|| {
            Error::invalid_argument(format!("geometry of feature {:?} has no extent", fid))
        })?;

        let stored = StoredFeature {
            geometry,
            attributes,
            envelope,
        };
        let previous = {
            let mut data = self.data.write();
            let previous = data.insert(fid.clone(), stored);
            self.bump_generation();
            previous
        };

        Ok(previous.map(|prev| Feature {
            fid,
            geometry: prev.geometry,
            attributes: prev.attributes,
        }))
    }

    /// Insert or replace a whole feature
    ///
    /// # Errors
    ///
    /// Same as [`MemoryFeatureStore::insert`].
    pub fn insert_feature(&self, feature: Feature<F>) -> Result<Option<Feature<F>>> {
        self.insert(feature.fid, feature.geometry, feature.attributes)
    }

    /// Remove a feature, returning it if it existed
    pub fn remove(&self, fid: &F) -> Option<Feature<F>> {
        let removed = {
            let mut data = self.data.write();
            let removed = data.remove(fid);
            if removed.is_some() {
                self.bump_generation();
            }
            removed
        };
        removed.map(|stored| Feature {
            fid: fid.clone(),
            geometry: stored.geometry,
            attributes: stored.attributes,
        })
    }

    /// Remove every feature
    pub fn clear(&self) {
        let mut data = self.data.write();
        if !data.is_empty() {
            data.clear();
            self.bump_generation();
        }
    }

    /// Make `connect` succeed (true) or fail (false)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Outstanding connections (connects not yet matched by a disconnect)
    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Called with the data write lock held, so a reader never sees new
    /// data under the old generation
    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl<F: FeatureId> FeatureStore<F> for MemoryFeatureStore<F> {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn connect(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::connection_failed(
                self.connection_id.clone(),
                "store is unavailable",
            ));
        }
        let open = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(target: "geostrata::store", connection_id = %self.connection_id, open, "Store connected");
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        // Saturating: an unmatched disconnect is harmless
        let _ = self
            .connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        debug!(target: "geostrata::store", connection_id = %self.connection_id, "Store disconnected");
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn index_entries(&self) -> Result<Vec<IndexEntry<F>>> {
        let data = self.data.read();
        Ok(data
            .iter()
            .map(|(fid, stored)| IndexEntry::new(fid.clone(), stored.envelope))
            .collect())
    }

    fn geometry(&self, fid: &F) -> Result<Option<Geometry<f64>>> {
        Ok(self.data.read().get(fid).map(|stored| stored.geometry.clone()))
    }

    fn feature(&self, fid: &F) -> Result<Option<Feature<F>>> {
        Ok(self.data.read().get(fid).map(|stored| Feature {
            fid: fid.clone(),
            geometry: stored.geometry.clone(),
            attributes: stored.attributes.clone(),
        }))
    }

    fn feature_count(&self) -> Result<usize> {
        Ok(self.data.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon, GeometryCollection};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
        .into()
    }

    #[test]
    fn test_insert_and_get() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        store
            .insert(1, square(0.0, 0.0, 10.0), Attributes::new().with("name", "A"))
            .unwrap();

        let feature = store.feature(&1).unwrap().unwrap();
        assert_eq!(feature.fid, 1);
        assert_eq!(feature.attributes.get("name").unwrap(), "A");
        assert_eq!(store.geometry(&1).unwrap(), Some(square(0.0, 0.0, 10.0)));
        assert_eq!(store.feature_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_id_is_none() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        assert!(store.feature(&9).unwrap().is_none());
        assert!(store.geometry(&9).unwrap().is_none());
    }

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        assert!(store.insert(1, square(0.0, 0.0, 1.0), Attributes::new()).unwrap().is_none());
        let prev = store
            .insert(1, square(5.0, 5.0, 1.0), Attributes::new())
            .unwrap()
            .unwrap();
        assert_eq!(prev.geometry, square(0.0, 0.0, 1.0));
        assert_eq!(store.feature_count().unwrap(), 1);
    }

    #[test]
    fn test_empty_geometry_rejected() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        let empty = Geometry::GeometryCollection(GeometryCollection::<f64>::new_from(vec![]));
        let result = store.insert(1, empty, Attributes::new());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_index_entries_match_geometry_envelopes() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        store.insert(1, square(0.0, 0.0, 10.0), Attributes::new()).unwrap();
        store.insert(2, point!(x: 3.0, y: -4.0), Attributes::new()).unwrap();

        let entries = store.index_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].fid, 1);
        assert_eq!(entries[0].envelope, Envelope::new(0.0, 0.0, 10.0, 10.0).unwrap());
        assert_eq!(entries[1].envelope, Envelope::point(3.0, -4.0).unwrap());
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        assert_eq!(store.generation(), 0);
        store.insert(1, square(0.0, 0.0, 1.0), Attributes::new()).unwrap();
        assert_eq!(store.generation(), 1);

        // Removing a missing id changes nothing
        assert!(store.remove(&2).is_none());
        assert_eq!(store.generation(), 1);

        assert!(store.remove(&1).is_some());
        assert_eq!(store.generation(), 2);

        // Clearing an empty store changes nothing
        store.clear();
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_connect_tracks_connections() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::with_connection_id("mem://a");
        assert_eq!(store.connection_id(), "mem://a");
        store.connect().unwrap();
        store.connect().unwrap();
        assert_eq!(store.active_connections(), 2);
        store.disconnect().unwrap();
        store.disconnect().unwrap();
        store.disconnect().unwrap();
        assert_eq!(store.active_connections(), 0);
    }

    #[test]
    fn test_unavailable_store_fails_connect() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::with_connection_id("mem://down");
        store.set_available(false);
        let err = store.connect().unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert_eq!(store.active_connections(), 0);
    }

    #[test]
    fn test_from_features() {
        let store = MemoryFeatureStore::from_features(vec![
            Feature::new(1u32, square(0.0, 0.0, 1.0), Attributes::new()),
            Feature::new(2u32, square(2.0, 2.0, 1.0), Attributes::new()),
        ])
        .unwrap();
        assert_eq!(store.feature_count().unwrap(), 2);
    }

    #[test]
    fn test_generation_never_lags_visible_data() {
        let store: MemoryFeatureStore<u32> = MemoryFeatureStore::new();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for fid in 0..2_000u32 {
                    let x = f64::from(fid % 100);
                    store.insert(fid, point!(x: x, y: x), Attributes::new()).unwrap();
                }
            });
            scope.spawn(|| loop {
                // Each insert adds one feature and one generation step
                let visible = store.feature_count().unwrap() as u64;
                let generation = store.generation();
                assert!(
                    generation >= visible,
                    "{} features visible at generation {}",
                    visible,
                    generation
                );
                if visible == 2_000 {
                    break;
                }
            });
        });
        assert_eq!(store.generation(), 2_000);
    }
}
