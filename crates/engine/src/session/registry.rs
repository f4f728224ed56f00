//! Process-wide store pool keyed by connection id
//!
//! Sessions that name the same backing resource share one store instance.
//! The pool holds weak references, so a store is released once the last
//! session (or caller) holding it drops its `Arc`.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use geostrata_core::{Error, Result};

type SharedStore = Weak<dyn Any + Send + Sync>;

// parking_lot::Mutex: no poisoning if a constructor panics while the lock is held
static SHARED_STORES: Lazy<Mutex<HashMap<String, SharedStore>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Handle to the process-wide store pool
#[derive(Debug, Clone, Copy, Default)]
pub struct StorePool;

impl StorePool {
    /// Return the live store registered under `connection_id`, or build one
    /// with `make` and register it.
    ///
    /// An empty connection id opts out of pooling: `make` always runs and the
    /// result is not registered. The registry lock is held while `make` runs,
    /// so two callers racing on one id end up with the same instance.
    ///
    /// # Errors
    ///
    /// - Whatever `make` returns
    /// - `InvalidArgument` if the id is already pooled with a different store type
    pub fn shared<S, M>(connection_id: &str, make: M) -> Result<Arc<S>>
    where
        S: Any + Send + Sync,
        M: FnOnce() -> Result<S>,
    {
        if connection_id.is_empty() {
            return make().map(Arc::new);
        }

        let mut registry = SHARED_STORES.lock();

        if let Some(existing) = registry.get(connection_id).and_then(Weak::upgrade) {
            return match existing.downcast::<S>() {
                Ok(store) => {
                    debug!(target: "geostrata::pool", connection_id, "Reusing pooled store");
                    Ok(store)
                }
                Err(_) => Err(Error::invalid_argument(format!(
                    "connection '{}' is pooled with a different store type",
                    connection_id
                ))),
            };
        }

        let store = Arc::new(make()?);
        let erased: Arc<dyn Any + Send + Sync> = store.clone();
        registry.insert(connection_id.to_string(), Arc::downgrade(&erased));
        info!(target: "geostrata::pool", connection_id, "Registered pooled store");
        Ok(store)
    }

    /// Check whether a live store is registered under `connection_id`
    pub fn is_registered(connection_id: &str) -> bool {
        SHARED_STORES
            .lock()
            .get(connection_id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Drop registry slots whose store has been released, returning how many
    pub fn purge_expired() -> usize {
        let mut registry = SHARED_STORES.lock();
        let before = registry.len();
        registry.retain(|_, weak| weak.strong_count() > 0);
        let purged = before - registry.len();
        if purged > 0 {
            debug!(target: "geostrata::pool", purged, "Purged released stores");
        }
        purged
    }
}
