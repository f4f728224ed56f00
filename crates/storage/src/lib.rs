//! Feature store adapters for GeoStrata
//!
//! This crate implements backing stores behind the FeatureStore trait:
//! - MemoryFeatureStore: BTreeMap-based storage with RwLock and a generation counter
//!
//! Any store can be shared between sessions as `Arc<S>`; the blanket
//! `FeatureStore` impl for `Arc` lives in `geostrata-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::MemoryFeatureStore;
