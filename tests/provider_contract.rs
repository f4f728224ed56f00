//! Contract tests for the feature provider
//!
//! Walks the provider surface end to end:
//! 1. The two-square reference dataset
//! 2. Lifecycle: idempotent open/close, state errors, failed opens
//! 3. Store errors passing through untouched
//! 4. Index freshness after external store mutation
//! 5. Non-integer identifier kinds

use std::error::Error as _;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use geo_types::{line_string, point, polygon, Geometry};
use geostrata::{
    Attributes, CancellationToken, Envelope, Error, Feature, FeatureStore, IndexEntry,
    MemoryFeatureStore, Oid, ProviderConfig, QueryRegion, Result, Session,
};
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
    Envelope::new(min_x, min_y, max_x, max_y).unwrap()
}

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

const A: i64 = 1;
const B: i64 = 2;

fn reference_store() -> Arc<MemoryFeatureStore<i64>> {
    let store = MemoryFeatureStore::with_connection_id("mem://reference");
    store
        .insert(A, square(0.0, 0.0, 10.0), Attributes::new().with("name", "A"))
        .unwrap();
    store
        .insert(B, square(20.0, 20.0, 10.0), Attributes::new().with("name", "B"))
        .unwrap();
    Arc::new(store)
}

fn reference_session() -> Session<i64, MemoryFeatureStore<i64>> {
    let mut session = Session::new(reference_store());
    session.open().unwrap();
    session
}

fn sorted_ids<I: IntoIterator<Item = i64>>(ids: I) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort();
    ids
}

// ============================================================================
// Reference dataset
// ============================================================================

#[test]
fn test_view_covering_both_squares() {
    let session = reference_session();
    let hits = session.fids_in_view(&env(5.0, 5.0, 25.0, 25.0), None).unwrap();
    assert_eq!(sorted_ids(hits), vec![A, B]);
}

#[test]
fn test_view_outside_extent() {
    let session = reference_session();
    let result = session
        .execute_intersection_query(env(100.0, 100.0, 110.0, 110.0), None)
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.stats().candidates, 0);
}

#[test]
fn test_boundary_touching_counts() {
    let session = reference_session();
    let corner = session.fids_in_view(&env(10.0, 10.0, 15.0, 15.0), None).unwrap();
    assert_eq!(sorted_ids(corner), vec![A]);

    let between = session.fids_in_view(&env(10.0, 10.0, 20.0, 20.0), None).unwrap();
    assert_eq!(sorted_ids(between), vec![A, B]);

    let gap = session.fids_in_view(&env(10.5, 10.5, 19.5, 19.5), None).unwrap();
    assert_eq!(gap.count(), 0);
}

#[test]
fn test_reference_extent_and_count() {
    let session = reference_session();
    assert_eq!(session.feature_count().unwrap(), 2);
    assert_eq!(session.extents().unwrap(), env(0.0, 0.0, 30.0, 30.0));
}

#[test]
fn test_line_query_exact_test() {
    let session = reference_session();
    // Envelope overlaps both squares; the line itself passes below B
    let line: Geometry<f64> = line_string![(x: 5.0, y: 5.0), (x: 40.0, y: 21.0)].into();
    let result = session
        .execute_intersection_query(QueryRegion::from(line), None)
        .unwrap();
    assert_eq!(result.ids().copied().collect::<Vec<_>>(), vec![A]);
    assert_eq!(result.stats().candidates, 2);
    assert_eq!(result.stats().refined, 2);
    assert_eq!(result.iter().next().unwrap().attributes.get("name").unwrap(), "A");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_double_open_double_close() {
    let store = reference_store();
    let mut session = Session::new(Arc::clone(&store));

    session.open().unwrap();
    session.open().unwrap();
    assert_eq!(store.active_connections(), 1);

    session.close().unwrap();
    session.close().unwrap();
    assert_eq!(store.active_connections(), 0);
    assert!(!session.is_open());
}

#[test]
fn test_every_query_rejects_closed_session() {
    let session: Session<i64, _> = Session::new(reference_store());
    let view = env(0.0, 0.0, 1.0, 1.0);

    let errors = vec![
        session.feature_count().err(),
        session.extents().err(),
        session.index_stats().err(),
        session.geometries_in_view(&view, None).err(),
        session.oids_in_view(&view, None).err(),
        session.fids_in_view(&view, None).err(),
        session.features_in_view(&view, None).err(),
        session.geometry_by_oid(&Oid::Int(A)).err(),
        session.feature_by_oid(&Oid::Int(A)).err(),
        session.geometry_by_fid(&A).err(),
        session.feature_by_fid(&A).err(),
        session.intersecting(view, None).err(),
        session.execute_intersection_query(view, None).err(),
        session
            .execute_intersection_query_into(view, &mut Vec::<Feature<i64>>::new(), None)
            .err(),
        session.rebuild_index().err(),
    ];
    for err in errors {
        assert!(err.unwrap().is_invalid_state());
    }
}

#[test]
fn test_metadata_available_while_closed() {
    let mut session: Session<i64, _> = Session::new(reference_store());
    assert_eq!(session.connection_id(), "mem://reference");
    session.set_srid(4326);
    assert_eq!(session.srid(), 4326);
    assert!(!session.is_open());
}

#[test]
fn test_unavailable_store_fails_open() {
    let store = reference_store();
    store.set_available(false);
    let mut session = Session::new(Arc::clone(&store));

    match session.open() {
        Err(Error::ConnectionFailed { connection_id, .. }) => {
            assert_eq!(connection_id, "mem://reference")
        }
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert!(!session.is_open());
    assert_eq!(store.active_connections(), 0);
}

// ============================================================================
// Store errors
// ============================================================================

#[derive(Debug)]
struct DiskFault;

impl fmt::Display for DiskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sector unreadable")
    }
}

impl std::error::Error for DiskFault {}

/// Store whose reads can be made to fail on demand
struct FlakyStore {
    inner: MemoryFeatureStore<i64>,
    fail_reads: AtomicBool,
    fail_index: AtomicBool,
    disconnects: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Self {
        let inner = MemoryFeatureStore::with_connection_id("flaky://");
        for i in 0..10 {
            inner
                .insert(i, point!(x: i as f64, y: i as f64), Attributes::new())
                .unwrap();
        }
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_index: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::store(DiskFault))
        } else {
            Ok(())
        }
    }
}

impl FeatureStore<i64> for FlakyStore {
    fn connection_id(&self) -> &str {
        self.inner.connection_id()
    }

    fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }

    fn index_entries(&self) -> Result<Vec<IndexEntry<i64>>> {
        self.check(&self.fail_index)?;
        self.inner.index_entries()
    }

    fn geometry(&self, fid: &i64) -> Result<Option<Geometry<f64>>> {
        self.check(&self.fail_reads)?;
        self.inner.geometry(fid)
    }

    fn feature(&self, fid: &i64) -> Result<Option<Feature<i64>>> {
        self.check(&self.fail_reads)?;
        self.inner.feature(fid)
    }

    fn feature_count(&self) -> Result<usize> {
        self.inner.feature_count()
    }
}

#[test]
fn test_store_error_passes_through_lookup() {
    let store = Arc::new(FlakyStore::new());
    let mut session = Session::new(Arc::clone(&store));
    session.open().unwrap();
    store.fail_reads.store(true, Ordering::SeqCst);

    let err = session.geometry_by_fid(&3).unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    let source = err.source().unwrap();
    assert!(source.downcast_ref::<DiskFault>().is_some());
}

#[test]
fn test_store_error_ends_cursor() {
    let store = Arc::new(FlakyStore::new());
    let mut session = Session::new(Arc::clone(&store));
    session.open().unwrap();

    let mut cursor = session.features_in_view(&env(0.0, 0.0, 9.0, 9.0), None).unwrap();
    assert!(cursor.next().unwrap().is_ok());

    store.fail_reads.store(true, Ordering::SeqCst);
    assert!(matches!(cursor.next(), Some(Err(Error::Store(_)))));
    assert!(cursor.next().is_none());
}

#[test]
fn test_store_error_fails_collecting_query() {
    let store = Arc::new(FlakyStore::new());
    let mut session = Session::new(Arc::clone(&store));
    session.open().unwrap();
    store.fail_reads.store(true, Ordering::SeqCst);

    let result = session.execute_intersection_query(env(0.0, 0.0, 9.0, 9.0), None);
    assert!(matches!(result, Err(Error::Store(_))));

    // Index-only queries never touch the store
    assert_eq!(session.oids_in_view(&env(0.0, 0.0, 9.0, 9.0), None).unwrap().count(), 10);
}

#[test]
fn test_index_load_failure_fails_open() {
    let store = Arc::new(FlakyStore::new());
    store.fail_index.store(true, Ordering::SeqCst);
    let mut session = Session::new(Arc::clone(&store));

    let err = session.open().unwrap_err();
    assert!(matches!(err, Error::ConnectionFailed { ref reason, .. } if reason.contains("sector unreadable")));
    assert!(!session.is_open());
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);

    // Dropping a session that never opened does not disconnect again
    drop(session);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Freshness
// ============================================================================

#[test]
fn test_mutation_seen_by_next_query() {
    let store = reference_store();
    let mut session = Session::new(Arc::clone(&store));
    session.open().unwrap();

    store.remove(&B);
    let hits = session.fids_in_view(&env(5.0, 5.0, 25.0, 25.0), None).unwrap();
    assert_eq!(sorted_ids(hits), vec![A]);
    assert_eq!(session.extents().unwrap(), env(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn test_cleared_store_reports_empty_dataset() {
    let store = reference_store();
    let mut session = Session::new(Arc::clone(&store));
    session.open().unwrap();

    store.clear();
    assert_eq!(session.feature_count().unwrap(), 0);
    assert!(matches!(session.extents(), Err(Error::EmptyDataset)));
}

#[test]
fn test_stale_index_without_auto_rebuild() {
    let store = reference_store();
    let config = ProviderConfig {
        auto_rebuild: false,
        ..ProviderConfig::default()
    };
    let mut session = Session::with_config(Arc::clone(&store), config).unwrap();
    session.open().unwrap();
    store
        .insert(3, square(40.0, 40.0, 1.0), Attributes::new())
        .unwrap();

    assert!(matches!(
        session.oids_in_view(&env(0.0, 0.0, 1.0, 1.0), None),
        Err(Error::StaleIndex { .. })
    ));
    // Lookups by id read the store directly
    assert!(session.feature_by_fid(&3).is_ok());

    // Reopening rebuilds from scratch
    session.close().unwrap();
    session.open().unwrap();
    assert_eq!(session.feature_count().unwrap(), 3);
}

// ============================================================================
// Identifier kinds
// ============================================================================

#[test]
fn test_text_ids() {
    let store = MemoryFeatureStore::<String>::with_connection_id("mem://text");
    store
        .insert("parcel-7".to_string(), square(0.0, 0.0, 1.0), Attributes::new())
        .unwrap();
    let mut session = Session::new(Arc::new(store));
    session.open().unwrap();

    let oids: Vec<Oid> = session.oids_in_view(&env(0.0, 0.0, 1.0, 1.0), None).unwrap().collect();
    assert_eq!(oids, vec![Oid::from("parcel-7")]);
    assert!(session.geometry_by_oid(&Oid::from("parcel-7")).is_ok());
    assert!(session.geometry_by_oid(&Oid::Int(7)).unwrap_err().is_not_found());
}

#[test]
fn test_uuid_ids() {
    let id = Uuid::new_v4();
    let store = MemoryFeatureStore::<Uuid>::new();
    store.insert(id, square(0.0, 0.0, 1.0), Attributes::new()).unwrap();
    let mut session = Session::new(Arc::new(store));
    session.open().unwrap();

    let feature = session.feature_by_oid(&Oid::Uuid(id)).unwrap();
    assert_eq!(feature.fid, Oid::Uuid(id));
    assert_eq!(session.feature_by_fid(&id).unwrap().geometry, feature.geometry);
}

#[test]
fn test_cancellation_is_not_an_error() {
    let session = reference_session();
    let token = CancellationToken::new();
    let mut cursor = session
        .intersecting(env(-100.0, -100.0, 100.0, 100.0), Some(&token))
        .unwrap();
    let first = cursor.next().unwrap().unwrap();
    token.cancel();
    assert!(cursor.next().is_none());
    assert!(cursor.stats().cancelled);
    assert_eq!(cursor.stats().matched, 1);
    assert!([A, B].contains(&first.fid));
}
