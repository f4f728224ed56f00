//! Axis-aligned bounding envelopes
//!
//! An [`Envelope`] is the unit the spatial index works in. Intersection is
//! inclusive: envelopes that only share an edge or a corner intersect.
//! Degenerate envelopes (a point, or a horizontal/vertical segment) are valid.

use crate::error::{Error, Result};
use geo::BoundingRect;
use geo_types::{coord, Coord, Geometry, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`
///
/// Invariant: `min_x <= max_x`, `min_y <= max_y` and all coordinates are
/// finite. Enforced by [`Envelope::new`]; the union of two valid envelopes
/// is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

/// Unvalidated wire form of [`Envelope`]
#[derive(Deserialize)]
struct RawEnvelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = Error;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        Envelope::new(raw.min_x, raw.min_y, raw.max_x, raw.max_y)
    }
}

impl Envelope {
    /// Create a validated envelope
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a coordinate is NaN/infinite or if a
    /// minimum exceeds its maximum.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return Err(Error::invalid_argument(format!(
                "envelope coordinates must be finite: [{}, {}, {}, {}]",
                min_x, min_y, max_x, max_y
            )));
        }
        if min_x > max_x || min_y > max_y {
            return Err(Error::invalid_argument(format!(
                "envelope min exceeds max: [{}, {}, {}, {}]",
                min_x, min_y, max_x, max_y
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Create the smallest envelope containing two corners, in any order
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a coordinate is not finite.
    pub fn from_corners(a: Coord<f64>, b: Coord<f64>) -> Result<Self> {
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    /// Degenerate envelope covering a single point
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a coordinate is not finite.
    pub fn point(x: f64, y: f64) -> Result<Self> {
        Self::new(x, y, x, y)
    }

    /// Minimum bounding envelope of a geometry
    ///
    /// Returns `None` for geometries without extent (empty collections).
    pub fn from_geometry(geometry: &Geometry<f64>) -> Option<Self> {
        geometry.bounding_rect().and_then(|rect| Self::try_from(rect).ok())
    }

    /// Minimum x coordinate
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Minimum y coordinate
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Maximum x coordinate
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Maximum y coordinate
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Width along the x axis
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height along the y axis
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area (zero for degenerate envelopes)
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point
    pub fn center(&self) -> Coord<f64> {
        coord! {
            x: self.min_x + self.width() / 2.0,
            y: self.min_y + self.height() / 2.0,
        }
    }

    /// True when the envelope has zero width or zero height
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    /// Check if this envelope intersects another (boundaries inclusive)
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if this envelope fully contains another
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Check if this envelope contains a point (boundaries inclusive)
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Smallest envelope containing both
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow this envelope in place to include another
    pub fn expand_to_include(&mut self, other: &Envelope) {
        *self = self.union(other);
    }

    /// Union of a sequence of envelopes, `None` when the sequence is empty
    pub fn union_all<'a, I>(envelopes: I) -> Option<Envelope>
    where
        I: IntoIterator<Item = &'a Envelope>,
    {
        envelopes
            .into_iter()
            .fold(None, |acc: Option<Envelope>, env| match acc {
                Some(acc) => Some(acc.union(env)),
                None => Some(*env),
            })
    }

    /// Convert to a `geo_types::Rect`
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    /// Convert to a polygon geometry, for exact tests against other geometries
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }
}

impl TryFrom<Rect<f64>> for Envelope {
    type Error = Error;

    fn try_from(rect: Rect<f64>) -> Result<Self> {
        Envelope::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<Envelope> for Rect<f64> {
    fn from(env: Envelope) -> Self {
        env.to_rect()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
