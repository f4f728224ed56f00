//! Session: the feature provider's lifecycle and query surface
//!
//! A [`Session`] wraps one backing store. `open` connects to the store and
//! bulk-builds the spatial index; `close` drops the index and disconnects.
//! Every query requires an open session.
//!
//! # Index freshness
//!
//! The index is a snapshot tagged with the store generation it was built
//! from. Each index-backed query compares that tag with the store's current
//! generation: with `auto_rebuild` the index is rebuilt first, otherwise the
//! query fails with `StaleIndex`. Cursors keep the snapshot they started
//! with, so a rebuild never disturbs an enumeration in flight.
//!
//! Closing the session ends every cursor that still needs the store: its
//! next element is an `InvalidState` error. Id cursors are answered from
//! their snapshot and run to completion.

mod config;
mod registry;

pub use config::{ProviderConfig, CONFIG_FILE_NAME};
pub use registry::StorePool;

use std::fmt;
use std::sync::Arc;

use geo_types::Geometry;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use geostrata_core::{
    CancellationToken, Envelope, Error, Feature, FeatureId, FeatureStore, Oid, Result,
};
use geostrata_index::{IndexStats, RTree};

use crate::cursor::{
    Cursor, FeatureCursor, FeatureResolver, FidCursor, FidResolver, GeometryCursor,
    GeometryResolver, OidCursor, OidResolver, SessionEpoch,
};
use crate::query::{FeatureSet, QueryRegion, QueryStats};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state; only lifecycle calls and metadata are allowed
    Closed,
    /// Store connected and index built
    Open,
}

impl SessionState {
    /// Lowercase name, as used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Closed => "closed",
            SessionState::Open => "open",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct IndexSnapshot<F> {
    tree: Arc<RTree<F>>,
    /// Store generation the tree was built from
    generation: u64,
}

/// Read-only spatial feature provider over one store
///
/// `F` is the strongly-typed feature id; untyped accessors take and return
/// [`Oid`]. `open`/`close` take `&mut self`, so a lifecycle transition can
/// never overlap another call on the same session.
pub struct Session<F: FeatureId, S: FeatureStore<F>> {
    store: Arc<S>,
    config: ProviderConfig,
    srid: i32,
    state: SessionState,
    index: RwLock<Option<IndexSnapshot<F>>>,
    epoch: SessionEpoch,
}

impl<F: FeatureId, S: FeatureStore<F>> Session<F, S> {
    /// Create a closed session with the default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::from_parts(store, ProviderConfig::default())
    }

    /// Create a closed session with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration does not validate.
    pub fn with_config(store: Arc<S>, config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(store, config))
    }

    /// Create a closed session over the pooled store for `connection_id`
    ///
    /// Sessions naming the same connection id share one store instance while
    /// any of them is alive. See [`StorePool::shared`].
    pub fn pooled<M>(connection_id: &str, make: M) -> Result<Self>
    where
        S: 'static,
        M: FnOnce() -> Result<S>,
    {
        Ok(Self::new(StorePool::shared(connection_id, make)?))
    }

    fn from_parts(store: Arc<S>, config: ProviderConfig) -> Self {
        Self {
            store,
            srid: config.srid,
            config,
            state: SessionState::Closed,
            index: RwLock::new(None),
            epoch: SessionEpoch::default(),
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Identifier of the backing resource
    pub fn connection_id(&self) -> &str {
        self.store.connection_id()
    }

    /// Spatial reference identifier (metadata only, never used in queries)
    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Set the spatial reference identifier
    pub fn set_srid(&mut self, srid: i32) {
        self.srid = srid;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is open
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Session configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Shared handle to the backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect to the store and build the spatial index
    ///
    /// No-op when already open.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the store cannot be connected or its
    /// index entries cannot be loaded. The session stays closed and the
    /// store is disconnected again.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            debug!(target: "geostrata::session", connection_id = %self.connection_id(), "Session already open");
            return Ok(());
        }

        let connection_id = self.connection_id().to_string();
        self.store
            .connect()
            .map_err(|e| acquisition_error(&connection_id, e))?;

        let snapshot = match self.build_index() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if let Err(disconnect_err) = self.store.disconnect() {
                    warn!(
                        target: "geostrata::session",
                        connection_id = %connection_id,
                        error = %disconnect_err,
                        "Disconnect after failed open also failed"
                    );
                }
                return Err(acquisition_error(&connection_id, e));
            }
        };

        let stats = snapshot.tree.stats();
        *self.index.get_mut() = Some(snapshot);
        self.state = SessionState::Open;
        info!(
            target: "geostrata::session",
            connection_id = %connection_id,
            features = stats.entries,
            height = stats.height,
            "Session opened"
        );
        Ok(())
    }

    /// Drop the spatial index and disconnect from the store
    ///
    /// No-op when already closed. The session is closed even if the store's
    /// `disconnect` fails; that error is returned.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            debug!(target: "geostrata::session", connection_id = %self.connection_id(), "Session already closed");
            return Ok(());
        }

        self.index.get_mut().take();
        self.state = SessionState::Closed;
        self.epoch.advance();
        self.store.disconnect()?;
        info!(target: "geostrata::session", connection_id = %self.connection_id(), "Session closed");
        Ok(())
    }

    // ========================================================================
    // Index maintenance
    // ========================================================================

    /// Rebuild the spatial index from the store now
    pub fn rebuild_index(&self) -> Result<()> {
        self.ensure_open("rebuild_index")?;
        let snapshot = self.build_index()?;
        info!(
            target: "geostrata::session",
            connection_id = %self.connection_id(),
            generation = snapshot.generation,
            "Spatial index rebuilt"
        );
        *self.index.write() = Some(snapshot);
        Ok(())
    }

    /// Shape of the current spatial index
    pub fn index_stats(&self) -> Result<IndexStats> {
        Ok(self.current_index("index_stats")?.stats())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn build_index(&self) -> Result<IndexSnapshot<F>> {
        // Read the generation first: a mutation racing the load is caught
        // by the next freshness check
        let generation = self.store.generation();
        let entries = self.store.index_entries()?;
        let tree = RTree::build_with_config(entries, self.config.rtree_config())?;
        Ok(IndexSnapshot {
            tree: Arc::new(tree),
            generation,
        })
    }

    /// Index snapshot matching the store's current generation
    fn current_index(&self, operation: &'static str) -> Result<Arc<RTree<F>>> {
        self.ensure_open(operation)?;
        let current = self.store.generation();

        if let Some(snapshot) = self.index.read().as_ref() {
            if snapshot.generation == current {
                return Ok(Arc::clone(&snapshot.tree));
            }
            if !self.config.auto_rebuild {
                return Err(Error::StaleIndex {
                    indexed: snapshot.generation,
                    current,
                });
            }
        }

        let snapshot = self.build_index()?;
        info!(
            target: "geostrata::session",
            connection_id = %self.connection_id(),
            generation = snapshot.generation,
            features = snapshot.tree.len(),
            "Store changed, spatial index rebuilt"
        );
        let tree = Arc::clone(&snapshot.tree);
        *self.index.write() = Some(snapshot);
        Ok(tree)
    }

    // ========================================================================
    // Dataset metadata
    // ========================================================================

    /// Number of distinct features in the index
    pub fn feature_count(&self) -> Result<usize> {
        Ok(self.current_index("feature_count")?.len())
    }

    /// Union of every feature's envelope
    ///
    /// # Errors
    ///
    /// Returns `EmptyDataset` when the store holds no features.
    pub fn extents(&self) -> Result<Envelope> {
        self.current_index("extents")?
            .extent()
            .ok_or(Error::EmptyDataset)
    }

    // ========================================================================
    // View queries
    // ========================================================================

    /// Lazy `(Oid, Geometry)` pairs for features whose envelope meets `view`
    pub fn geometries_in_view(
        &self,
        view: &Envelope,
        cancel: Option<&CancellationToken>,
    ) -> Result<GeometryCursor<F, S>> {
        let tree = self.current_index("geometries_in_view")?;
        Ok(self.cursor(&tree, view, GeometryResolver, cancel))
    }

    /// Lazy untyped ids of features whose envelope meets `view`
    ///
    /// Answered from the index alone; the store is never read.
    pub fn oids_in_view(
        &self,
        view: &Envelope,
        cancel: Option<&CancellationToken>,
    ) -> Result<OidCursor<F, S>> {
        let tree = self.current_index("oids_in_view")?;
        Ok(self.cursor(&tree, view, OidResolver, cancel))
    }

    /// Lazy typed ids of features whose envelope meets `view`
    pub fn fids_in_view(
        &self,
        view: &Envelope,
        cancel: Option<&CancellationToken>,
    ) -> Result<FidCursor<F, S>> {
        let tree = self.current_index("fids_in_view")?;
        Ok(self.cursor(&tree, view, FidResolver, cancel))
    }

    /// Lazy full features whose envelope meets `view`
    pub fn features_in_view(
        &self,
        view: &Envelope,
        cancel: Option<&CancellationToken>,
    ) -> Result<FeatureCursor<F, S>> {
        let tree = self.current_index("features_in_view")?;
        Ok(self.cursor(&tree, view, FeatureResolver::new(None), cancel))
    }

    fn cursor<R>(
        &self,
        tree: &Arc<RTree<F>>,
        view: &Envelope,
        resolver: R,
        cancel: Option<&CancellationToken>,
    ) -> Cursor<F, S, R>
    where
        R: crate::cursor::Resolve<F, S>,
    {
        Cursor::new(
            tree.query_range(view),
            Arc::clone(&self.store),
            resolver,
            cancel.cloned(),
        )
        .bound_to(self.epoch.ticket())
    }

    // ========================================================================
    // Lookups by id
    // ========================================================================

    /// Geometry of the feature with an untyped id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not a valid id for this store or no
    /// feature has it.
    pub fn geometry_by_oid(&self, oid: &Oid) -> Result<Geometry<f64>> {
        self.ensure_open("geometry_by_oid")?;
        let fid = F::from_oid(oid).ok_or_else(|| Error::not_found(oid))?;
        self.lookup_geometry(&fid)
    }

    /// Feature with an untyped id
    ///
    /// # Errors
    ///
    /// Same as [`Session::geometry_by_oid`].
    pub fn feature_by_oid(&self, oid: &Oid) -> Result<Feature<Oid>> {
        self.ensure_open("feature_by_oid")?;
        let fid = F::from_oid(oid).ok_or_else(|| Error::not_found(oid))?;
        self.lookup_feature(&fid).map(Feature::into_untyped)
    }

    /// Geometry of the feature with a typed id
    pub fn geometry_by_fid(&self, fid: &F) -> Result<Geometry<f64>> {
        self.ensure_open("geometry_by_fid")?;
        self.lookup_geometry(fid)
    }

    /// Feature with a typed id
    pub fn feature_by_fid(&self, fid: &F) -> Result<Feature<F>> {
        self.ensure_open("feature_by_fid")?;
        self.lookup_feature(fid)
    }

    fn lookup_geometry(&self, fid: &F) -> Result<Geometry<f64>> {
        self.store
            .geometry(fid)?
            .ok_or_else(|| Error::not_found(fid))
    }

    fn lookup_feature(&self, fid: &F) -> Result<Feature<F>> {
        self.store.feature(fid)?.ok_or_else(|| Error::not_found(fid))
    }

    // ========================================================================
    // Intersection queries
    // ========================================================================

    /// Lazy features intersecting `region`
    ///
    /// Envelope regions are answered by the index. Geometry regions are
    /// prefiltered by their envelope, then each candidate's geometry is
    /// tested exactly. A geometry without extent matches nothing.
    pub fn intersecting(
        &self,
        region: impl Into<QueryRegion>,
        cancel: Option<&CancellationToken>,
    ) -> Result<FeatureCursor<F, S>> {
        let tree = self.current_index("intersecting")?;
        let region = region.into();
        let Some(envelope) = region.envelope() else {
            return Ok(Cursor::empty(Arc::clone(&self.store), FeatureResolver::new(None)));
        };
        let resolver = FeatureResolver::new(region.into_exact_geometry());
        Ok(self.cursor(&tree, &envelope, resolver, cancel))
    }

    /// Collect every feature intersecting `region`
    ///
    /// A cancelled query returns the features gathered so far, with
    /// `stats().cancelled` set.
    ///
    /// # Errors
    ///
    /// Fails on the first store error; nothing is returned in that case.
    pub fn execute_intersection_query(
        &self,
        region: impl Into<QueryRegion>,
        cancel: Option<&CancellationToken>,
    ) -> Result<FeatureSet<F>> {
        let mut features = Vec::new();
        let stats = self.execute_intersection_query_into(region, &mut features, cancel)?;
        Ok(FeatureSet::new(features, stats))
    }

    /// Append every feature intersecting `region` to `sink`
    ///
    /// On error, features delivered before the failure stay in `sink`.
    pub fn execute_intersection_query_into<E>(
        &self,
        region: impl Into<QueryRegion>,
        sink: &mut E,
        cancel: Option<&CancellationToken>,
    ) -> Result<QueryStats>
    where
        E: Extend<Feature<F>>,
    {
        let mut cursor = self.intersecting(region, cancel)?;
        for feature in cursor.by_ref() {
            sink.extend(std::iter::once(feature?));
        }
        let stats = cursor.stats();
        debug!(
            target: "geostrata::session",
            candidates = stats.candidates,
            refined = stats.refined,
            matched = stats.matched,
            cancelled = stats.cancelled,
            "Intersection query finished"
        );
        Ok(stats)
    }
}

/// Failures while opening are reported as connection failures
fn acquisition_error(connection_id: &str, err: Error) -> Error {
    match err {
        err @ Error::ConnectionFailed { .. } => err,
        other => Error::connection_failed(connection_id, other),
    }
}

impl<F: FeatureId, S: FeatureStore<F>> Drop for Session<F, S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(
                target: "geostrata::session",
                connection_id = %self.connection_id(),
                error = %e,
                "Failed to close session on drop"
            );
        }
    }
}

impl<F: FeatureId, S: FeatureStore<F>> fmt::Debug for Session<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id())
            .field("srid", &self.srid)
            .field("state", &self.state)
            .finish()
    }
}
