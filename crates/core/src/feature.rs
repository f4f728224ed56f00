//! Features and index entries
//!
//! A [`Feature`] is produced on demand by a feature store and owned by the
//! caller that received it; the engine keeps no reference to it. An
//! [`IndexEntry`] is the compact `(id, envelope)` pair the spatial index is
//! built from.

use crate::envelope::Envelope;
use crate::types::{FeatureId, Oid};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered attribute mapping (name -> value)
///
/// Preserves insertion order, like the column order of the backing store.
/// Inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    fields: Vec<(String, Value)>,
}

impl Attributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert or replace an attribute, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Builder form of [`Attributes::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get an attribute by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Attribute names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate `(name, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no attributes
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

/// A feature: identifier, geometry and attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<F> {
    /// Feature identifier
    pub fid: F,
    /// Feature geometry
    pub geometry: Geometry<f64>,
    /// Feature attributes
    pub attributes: Attributes,
}

impl<F: FeatureId> Feature<F> {
    /// Create a feature
    pub fn new(fid: F, geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        Self {
            fid,
            geometry: geometry.into(),
            attributes,
        }
    }

    /// Minimum bounding envelope of this feature's geometry
    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_geometry(&self.geometry)
    }

    /// Untyped view of this feature
    pub fn into_untyped(self) -> Feature<Oid> {
        Feature {
            fid: self.fid.to_oid(),
            geometry: self.geometry,
            attributes: self.attributes,
        }
    }
}

/// Spatial index entry: identifier and bounding envelope
///
/// Never carries the geometry itself.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry<F> {
    /// Feature identifier
    pub fid: F,
    /// Minimum bounding envelope of the feature's geometry
    pub envelope: Envelope,
}

impl<F> IndexEntry<F> {
    /// Create an index entry
    pub fn new(fid: F, envelope: Envelope) -> Self {
        Self { fid, envelope }
    }
}
