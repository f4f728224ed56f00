//! Feature identifiers
//!
//! Two identifier flavors exist:
//! - [`Oid`]: untyped identifier, used by the untyped accessors
//! - [`FeatureId`]: trait for strongly-typed identifiers, used by the typed variant
//!
//! Every `FeatureId` converts losslessly to an `Oid`, and back, so both
//! flavors resolve to the same feature.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// Untyped feature identifier
///
/// Ordered first by variant (`Int < Text < Uuid`), then by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Oid {
    /// Integer identifier (row ids, shapefile record numbers)
    Int(i64),
    /// Textual identifier (natural keys)
    Text(String),
    /// UUID identifier
    Uuid(Uuid),
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oid::Int(v) => write!(f, "{}", v),
            Oid::Text(v) => write!(f, "{}", v),
            Oid::Uuid(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Oid {
    fn from(v: i64) -> Self {
        Oid::Int(v)
    }
}

impl From<&str> for Oid {
    fn from(v: &str) -> Self {
        Oid::Text(v.to_string())
    }
}

impl From<String> for Oid {
    fn from(v: String) -> Self {
        Oid::Text(v)
    }
}

impl From<Uuid> for Oid {
    fn from(v: Uuid) -> Self {
        Oid::Uuid(v)
    }
}

/// Strongly-typed feature identifier
///
/// Implementors must be totally ordered and hashable. `from_oid` returns
/// `None` when the untyped identifier cannot name a feature of this type;
/// lookups treat that as not found.
pub trait FeatureId: Ord + Eq + Hash + Clone + Debug + Send + Sync + 'static {
    /// Convert to the untyped identifier
    fn to_oid(&self) -> Oid;

    /// Convert from the untyped identifier
    fn from_oid(oid: &Oid) -> Option<Self>;
}

impl FeatureId for Oid {
    fn to_oid(&self) -> Oid {
        self.clone()
    }

    fn from_oid(oid: &Oid) -> Option<Self> {
        Some(oid.clone())
    }
}

impl FeatureId for i64 {
    fn to_oid(&self) -> Oid {
        Oid::Int(*self)
    }

    fn from_oid(oid: &Oid) -> Option<Self> {
        match oid {
            Oid::Int(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! impl_int_feature_id {
    ($($t:ty),*) => {
        $(
            impl FeatureId for $t {
                fn to_oid(&self) -> Oid {
                    Oid::Int(i64::from(*self))
                }

                fn from_oid(oid: &Oid) -> Option<Self> {
                    match oid {
                        Oid::Int(v) => <$t>::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_int_feature_id!(i32, u32);

// u64 ids above i64::MAX have no lossless integer Oid; they are carried as text
impl FeatureId for u64 {
    fn to_oid(&self) -> Oid {
        match i64::try_from(*self) {
            Ok(v) => Oid::Int(v),
            Err(_) => Oid::Text(self.to_string()),
        }
    }

    fn from_oid(oid: &Oid) -> Option<Self> {
        match oid {
            Oid::Int(v) => u64::try_from(*v).ok(),
            Oid::Text(s) => s
                .parse::<u64>()
                .ok()
                .filter(|v| i64::try_from(*v).is_err()),
            Oid::Uuid(_) => None,
        }
    }
}

impl FeatureId for String {
    fn to_oid(&self) -> Oid {
        Oid::Text(self.clone())
    }

    fn from_oid(oid: &Oid) -> Option<Self> {
        match oid {
            Oid::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FeatureId for Uuid {
    fn to_oid(&self) -> Oid {
        Oid::Uuid(*self)
    }

    fn from_oid(oid: &Oid) -> Option<Self> {
        match oid {
            Oid::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}
