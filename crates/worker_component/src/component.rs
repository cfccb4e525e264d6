//! Component identity.
//!
//! Component ids are the numeric ids assigned by the schema compiler. The
//! [`Component`] trait ties a Rust type to its id so builders can be keyed by
//! type instead of by raw number.

use serde::{Deserialize, Serialize};

/// A component type identifier as assigned in schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Returns the raw id.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// The id of component type `C`.
    #[must_use]
    pub const fn of<C: Component>() -> Self {
        C::ID
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl From<u32> for ComponentId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A component type known at compile time.
///
/// # Examples
///
/// ```rust
/// use worker_component::{Component, ComponentId};
///
/// struct Position;
///
/// impl Component for Position {
///     const ID: ComponentId = ComponentId(54);
///     const NAME: &'static str = "improbable.Position";
/// }
///
/// assert_eq!(ComponentId::of::<Position>(), ComponentId(54));
/// ```
pub trait Component: 'static {
    /// The schema component id.
    const ID: ComponentId;

    /// The fully qualified schema name.
    const NAME: &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Metadata;

    impl Component for Metadata {
        const ID: ComponentId = ComponentId(53);
        const NAME: &'static str = "improbable.Metadata";
    }

    #[test]
    fn test_component_id_of() {
        assert_eq!(ComponentId::of::<Metadata>(), ComponentId(53));
        assert_eq!(Metadata::NAME, "improbable.Metadata");
        assert_eq!(ComponentId::from(9).id(), 9);
    }
}
