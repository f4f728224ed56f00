//! Query regions and owned query results
//!
//! - QueryRegion: what an intersection query is run against
//! - FeatureSet: owned result of an intersection query
//! - QueryStats: per-query counters for both phases

use geo_types::{Geometry, LineString, MultiPolygon, Point, Polygon};
use geostrata_core::{Envelope, Feature, FeatureId};
use serde::Serialize;

/// Region an intersection query is evaluated against
///
/// Envelope regions are answered by the spatial index alone. Geometry
/// regions use the geometry's envelope to find candidates, then test each
/// candidate's full geometry exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRegion {
    /// Axis-aligned envelope
    Envelope(Envelope),
    /// Arbitrary geometry
    Geometry(Geometry<f64>),
}

impl QueryRegion {
    /// Envelope used for the index lookup
    ///
    /// `None` for a geometry without extent; such a region matches nothing.
    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            QueryRegion::Envelope(env) => Some(*env),
            QueryRegion::Geometry(geom) => Envelope::from_geometry(geom),
        }
    }

    /// Geometry for the exact test, `None` for envelope regions
    pub fn exact_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            QueryRegion::Envelope(_) => None,
            QueryRegion::Geometry(geom) => Some(geom),
        }
    }

    pub(crate) fn into_exact_geometry(self) -> Option<Geometry<f64>> {
        match self {
            QueryRegion::Envelope(_) => None,
            QueryRegion::Geometry(geom) => Some(geom),
        }
    }
}

impl From<Envelope> for QueryRegion {
    fn from(env: Envelope) -> Self {
        QueryRegion::Envelope(env)
    }
}

impl From<Geometry<f64>> for QueryRegion {
    fn from(geom: Geometry<f64>) -> Self {
        QueryRegion::Geometry(geom)
    }
}

macro_rules! impl_region_from_geometry {
    ($($t:ty),*) => {
        $(
            impl From<$t> for QueryRegion {
                fn from(geom: $t) -> Self {
                    QueryRegion::Geometry(geom.into())
                }
            }
        )*
    };
}

impl_region_from_geometry!(Point<f64>, LineString<f64>, Polygon<f64>, MultiPolygon<f64>);

/// Counters for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Ids produced by the spatial index (approximate phase)
    pub candidates: usize,
    /// Candidates whose full geometry was tested (exact phase)
    pub refined: usize,
    /// Elements delivered to the caller
    pub matched: usize,
    /// Whether enumeration stopped because of cancellation
    pub cancelled: bool,
}

/// Owned result of an intersection query
#[derive(Debug, Clone)]
pub struct FeatureSet<F> {
    features: Vec<Feature<F>>,
    stats: QueryStats,
}

impl<F: FeatureId> FeatureSet<F> {
    pub(crate) fn new(features: Vec<Feature<F>>, stats: QueryStats) -> Self {
        Self { features, stats }
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if no feature matched
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate features in delivery order
    pub fn iter(&self) -> std::slice::Iter<'_, Feature<F>> {
        self.features.iter()
    }

    /// Ids of the matched features, in delivery order
    pub fn ids(&self) -> impl Iterator<Item = &F> {
        self.features.iter().map(|f| &f.fid)
    }

    /// Query counters
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Take the features
    pub fn into_vec(self) -> Vec<Feature<F>> {
        self.features
    }
}

/// Merging further results leaves `stats` describing the original query
impl<F> Extend<Feature<F>> for FeatureSet<F> {
    fn extend<I: IntoIterator<Item = Feature<F>>>(&mut self, iter: I) {
        self.features.extend(iter);
    }
}

impl<F> IntoIterator for FeatureSet<F> {
    type Item = Feature<F>;
    type IntoIter = std::vec::IntoIter<Feature<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a, F> IntoIterator for &'a FeatureSet<F> {
    type Item = &'a Feature<F>;
    type IntoIter = std::slice::Iter<'a, Feature<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
