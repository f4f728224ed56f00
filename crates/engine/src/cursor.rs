//! Lazy, cancellable cursors over query results
//!
//! A [`Cursor`] pairs a [`RangeQuery`] (phase one, envelope prefilter) with
//! a [`Resolve`] strategy that turns each candidate id into the element the
//! caller asked for. Resolvers that read the store may also run the exact
//! geometry test (phase two) and drop candidates that fail it.
//!
//! Cursors check their cancellation token before examining each candidate.
//! Cancellation ends the sequence normally. A store error is yielded once as
//! `Err`, after which the cursor is exhausted.
//!
//! A cursor created by a session is bound to that session's open epoch.
//! Once the session closes, cursors that read the store yield a single
//! `InvalidState` error and end; id cursors finish from their snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use geo::Intersects;
use geo_types::Geometry;
use tracing::debug;

use geostrata_core::{CancellationToken, Error, Feature, FeatureId, FeatureStore, Oid, Result};
use geostrata_index::RangeQuery;

use crate::query::QueryStats;

/// Outcome of resolving one candidate
#[derive(Debug)]
pub enum Step<T> {
    /// Deliver the element and keep going
    Emit(T),
    /// Candidate rejected by the exact test
    Skip,
    /// Deliver the element, then end the sequence
    Halt(T),
}

/// Turns candidate ids into cursor elements
pub trait Resolve<F: FeatureId, S: FeatureStore<F> + ?Sized> {
    /// Element type yielded by the cursor
    type Item;

    /// Resolve one candidate that passed the envelope prefilter
    fn resolve(&mut self, store: &S, fid: F) -> Step<Self::Item>;

    /// Number of exact geometry tests performed so far
    fn refined(&self) -> usize {
        0
    }

    /// Final element once the session has closed under the cursor
    ///
    /// `None` means the resolver never touches the store and the cursor may
    /// keep enumerating its index snapshot.
    fn on_session_closed(&self) -> Option<Self::Item> {
        None
    }
}

fn closed_session<T>() -> Option<Result<T>> {
    Some(Err(Error::InvalidState {
        operation: "cursor",
        state: "closed",
    }))
}

/// Open epoch shared by a session and its cursors
///
/// Advanced on every `close`.
#[derive(Debug, Default)]
pub(crate) struct SessionEpoch {
    epoch: Arc<AtomicU64>,
}

impl SessionEpoch {
    pub(crate) fn ticket(&self) -> EpochTicket {
        EpochTicket {
            epoch: Arc::clone(&self.epoch),
            issued: self.epoch.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn advance(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Epoch a cursor was created in
#[derive(Debug, Clone)]
pub(crate) struct EpochTicket {
    epoch: Arc<AtomicU64>,
    issued: u64,
}

impl EpochTicket {
    fn is_current(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) == self.issued
    }
}

/// Yields untyped ids straight from the index
#[derive(Debug, Clone, Copy, Default)]
pub struct OidResolver;

impl<F: FeatureId, S: FeatureStore<F> + ?Sized> Resolve<F, S> for OidResolver {
    type Item = Oid;

    fn resolve(&mut self, _store: &S, fid: F) -> Step<Oid> {
        Step::Emit(fid.to_oid())
    }
}

/// Yields typed ids straight from the index
#[derive(Debug, Clone, Copy, Default)]
pub struct FidResolver;

impl<F: FeatureId, S: FeatureStore<F> + ?Sized> Resolve<F, S> for FidResolver {
    type Item = F;

    fn resolve(&mut self, _store: &S, fid: F) -> Step<F> {
        Step::Emit(fid)
    }
}

/// Yields `(Oid, Geometry)` pairs read from the store
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryResolver;

impl<F: FeatureId, S: FeatureStore<F> + ?Sized> Resolve<F, S> for GeometryResolver {
    type Item = Result<(Oid, Geometry<f64>)>;

    fn resolve(&mut self, store: &S, fid: F) -> Step<Self::Item> {
        match store.geometry(&fid) {
            Ok(Some(geometry)) => Step::Emit(Ok((fid.to_oid(), geometry))),
            Ok(None) => Step::Halt(Err(Error::not_found(&fid))),
            Err(e) => Step::Halt(Err(e)),
        }
    }

    fn on_session_closed(&self) -> Option<Self::Item> {
        closed_session()
    }
}

/// Yields full features read from the store
///
/// With an exact geometry, each candidate's geometry is fetched and tested
/// first; only survivors have their feature (attributes included) loaded.
#[derive(Debug, Clone, Default)]
pub struct FeatureResolver {
    exact: Option<Geometry<f64>>,
    refined: usize,
}

impl FeatureResolver {
    pub(crate) fn new(exact: Option<Geometry<f64>>) -> Self {
        Self { exact, refined: 0 }
    }
}

impl<F: FeatureId, S: FeatureStore<F> + ?Sized> Resolve<F, S> for FeatureResolver {
    type Item = Result<Feature<F>>;

    fn resolve(&mut self, store: &S, fid: F) -> Step<Self::Item> {
        if let Some(query) = &self.exact {
            self.refined += 1;
            match store.geometry(&fid) {
                Ok(Some(geometry)) if geometry.intersects(query) => {}
                Ok(Some(_)) => return Step::Skip,
                Ok(None) => return Step::Halt(Err(Error::not_found(&fid))),
                Err(e) => return Step::Halt(Err(e)),
            }
        }

        match store.feature(&fid) {
            Ok(Some(feature)) => Step::Emit(Ok(feature)),
            Ok(None) => Step::Halt(Err(Error::not_found(&fid))),
            Err(e) => Step::Halt(Err(e)),
        }
    }

    fn refined(&self) -> usize {
        self.refined
    }

    fn on_session_closed(&self) -> Option<Self::Item> {
        closed_session()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Active,
    Cancelled,
    Done,
}

/// Lazy sequence of query results
///
/// Holds its own handles to the index snapshot and the store, so it stays
/// valid after the session that produced it rebuilds its index. It does not
/// outlive the session's open state: see the module docs. Fused.
pub struct Cursor<F, S, R>
where
    F: FeatureId,
    S: FeatureStore<F>,
    R: Resolve<F, S>,
{
    candidates: Option<RangeQuery<F>>,
    store: Arc<S>,
    resolver: R,
    cancel: Option<CancellationToken>,
    epoch: Option<EpochTicket>,
    state: CursorState,
    examined: usize,
    produced: usize,
    matched: usize,
}

/// Cursor over untyped ids
pub type OidCursor<F, S> = Cursor<F, S, OidResolver>;
/// Cursor over typed ids
pub type FidCursor<F, S> = Cursor<F, S, FidResolver>;
/// Cursor over `(Oid, Geometry)` pairs
pub type GeometryCursor<F, S> = Cursor<F, S, GeometryResolver>;
/// Cursor over full features
pub type FeatureCursor<F, S> = Cursor<F, S, FeatureResolver>;

impl<F, S, R> Cursor<F, S, R>
where
    F: FeatureId,
    S: FeatureStore<F>,
    R: Resolve<F, S>,
{
    pub(crate) fn new(
        candidates: RangeQuery<F>,
        store: Arc<S>,
        resolver: R,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            candidates: Some(candidates),
            store,
            resolver,
            cancel,
            epoch: None,
            state: CursorState::Active,
            examined: 0,
            produced: 0,
            matched: 0,
        }
    }

    /// Stop reading the store once `ticket`'s epoch has passed
    pub(crate) fn bound_to(mut self, ticket: EpochTicket) -> Self {
        self.epoch = Some(ticket);
        self
    }

    /// Cursor that yields nothing (query region without extent)
    pub(crate) fn empty(store: Arc<S>, resolver: R) -> Self {
        Self {
            candidates: None,
            store,
            resolver,
            cancel: None,
            epoch: None,
            state: CursorState::Done,
            examined: 0,
            produced: 0,
            matched: 0,
        }
    }

    /// Elements yielded so far, errors included
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Whether enumeration stopped because the token was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state == CursorState::Cancelled
    }

    /// Counters for this cursor so far
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            candidates: self.examined,
            refined: self.resolver.refined(),
            matched: self.matched,
            cancelled: self.is_cancelled(),
        }
    }
}

impl<F, S, R> Iterator for Cursor<F, S, R>
where
    F: FeatureId,
    S: FeatureStore<F>,
    R: Resolve<F, S>,
{
    type Item = R::Item;

    fn next(&mut self) -> Option<R::Item> {
        if self.state != CursorState::Active {
            return None;
        }

        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                self.state = CursorState::Cancelled;
                debug!(
                    target: "geostrata::session",
                    produced = self.produced,
                    examined = self.examined,
                    "Enumeration cancelled"
                );
                return None;
            }

            if self.epoch.as_ref().is_some_and(|ticket| !ticket.is_current()) {
                if let Some(item) = self.resolver.on_session_closed() {
                    self.state = CursorState::Done;
                    self.produced += 1;
                    debug!(
                        target: "geostrata::session",
                        produced = self.produced,
                        "Session closed under cursor"
                    );
                    return Some(item);
                }
            }

            let Some(fid) = self.candidates.as_mut().and_then(Iterator::next) else {
                self.state = CursorState::Done;
                return None;
            };
            self.examined += 1;

            match self.resolver.resolve(&*self.store, fid) {
                Step::Emit(item) => {
                    self.produced += 1;
                    self.matched += 1;
                    return Some(item);
                }
                Step::Skip => continue,
                Step::Halt(item) => {
                    self.state = CursorState::Done;
                    self.produced += 1;
                    return Some(item);
                }
            }
        }
    }
}

impl<F, S, R> std::iter::FusedIterator for Cursor<F, S, R>
where
    F: FeatureId,
    S: FeatureStore<F>,
    R: Resolve<F, S>,
{
}

impl<F, S, R> std::fmt::Debug for Cursor<F, S, R>
where
    F: FeatureId,
    S: FeatureStore<F>,
    R: Resolve<F, S>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("connection_id", &self.store.connection_id())
            .field("state", &self.state)
            .field("examined", &self.examined)
            .field("produced", &self.produced)
            .field("matched", &self.matched)
            .finish()
    }
}
