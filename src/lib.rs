//! GeoStrata - read-only spatial feature provider
//!
//! GeoStrata answers spatial queries over a feature store. A session opens a
//! store, bulk-loads an R-tree over every feature's envelope, and serves
//! view, lookup, and intersection queries through lazy, cancellable cursors.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use geostrata::geo_types::polygon;
//! use geostrata::{Attributes, Envelope, MemoryFeatureStore, Session};
//!
//! let store = MemoryFeatureStore::with_connection_id("mem://parcels");
//! store.insert(
//!     1i64,
//!     polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.0)],
//!     Attributes::new().with("name", "A"),
//! )?;
//!
//! let mut session = Session::new(Arc::new(store));
//! session.open()?;
//!
//! let view = Envelope::new(5.0, 5.0, 25.0, 25.0)?;
//! let hits = session.execute_intersection_query(view, None)?;
//! assert_eq!(hits.len(), 1);
//!
//! session.close()?;
//! # Ok::<(), geostrata::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `geostrata-core`: envelopes, ids, features, errors, the store trait
//! - `geostrata-index`: the STR bulk-loaded R-tree and its range queries
//! - `geostrata-storage`: the in-memory store adapter
//! - `geostrata-engine`: sessions, cursors, configuration, store pooling

pub use geo_types;

pub use geostrata_core::{
    Attributes, CancellationToken, Envelope, Error, Feature, FeatureId, FeatureStore, IndexEntry,
    Oid, Result, StoreError,
};
pub use geostrata_engine::{
    Cursor, FeatureCursor, FeatureSet, FidCursor, GeometryCursor, OidCursor, ProviderConfig,
    QueryRegion, QueryStats, Session, SessionState, StorePool, CONFIG_FILE_NAME,
};
pub use geostrata_index::{IndexStats, RTree, RTreeConfig, RangeQuery};
pub use geostrata_storage::MemoryFeatureStore;
