//! Feature provider engine for GeoStrata
//!
//! This crate ties the store adapter and the spatial index together:
//! - Session: open/close lifecycle and every provider query
//! - Cursor: lazy, cancellable result enumeration
//! - QueryRegion / FeatureSet: intersection query inputs and outputs
//! - ProviderConfig: `geostrata.toml` settings
//! - StorePool: process-wide store sharing by connection id
//!
//! Queries run in two phases. The R-tree reduces the query envelope to
//! candidate ids; geometry queries then test each candidate's full
//! geometry exactly before it is delivered.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod query;
pub mod session;

pub use cursor::{Cursor, FeatureCursor, FidCursor, GeometryCursor, OidCursor};
pub use query::{FeatureSet, QueryRegion, QueryStats};
pub use session::{ProviderConfig, Session, SessionState, StorePool, CONFIG_FILE_NAME};
