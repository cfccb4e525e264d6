//! Identifier newtypes.
//!
//! Entity ids are allocated by the runtime and are always positive; `0` is
//! reserved as the invalid sentinel. Request ids are allocated per
//! connection, starting at 1.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `i64`.
    #[must_use]
    pub const fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw `i64` identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        self.0
    }

    /// Returns `true` if this id could have been allocated by the runtime.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

/// Identifies a request sent on a connection, echoed back by its response op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u32);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_validity() {
        assert!(EntityId::from_raw(42).is_valid());
        assert!(!EntityId::INVALID.is_valid());
        assert!(!EntityId(-3).is_valid());
        assert_eq!(EntityId(7).to_string(), "EntityId(7)");
    }

    #[test]
    fn test_entity_id_serialization_roundtrip() {
        let id = EntityId::from_raw(999);
        let bytes = rmp_serde::to_vec(&id).unwrap();
        let restored: EntityId = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(id, restored);
    }
}
