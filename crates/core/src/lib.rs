//! Core types and traits for GeoStrata
//!
//! This crate defines the foundational types used throughout the system:
//! - Envelope: axis-aligned bounding box with inclusive intersection
//! - Oid / FeatureId: untyped and strongly-typed feature identifiers
//! - Feature, Attributes, IndexEntry: the data a store hands out
//! - CancellationToken: cooperative cancellation for lazy cursors
//! - Error: error type hierarchy
//! - Traits: FeatureStore, the backing store adapter

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod envelope;
pub mod error;
pub mod feature;
pub mod traits;
pub mod types;

// Re-export commonly used types and traits
pub use cancel::CancellationToken;
pub use envelope::Envelope;
pub use error::{Error, Result, StoreError};
pub use feature::{Attributes, Feature, IndexEntry};
pub use traits::FeatureStore;
pub use types::{FeatureId, Oid};
