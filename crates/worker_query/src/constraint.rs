//! The [`Constraint`] value tree.
//!
//! A constraint is a predicate over entities built from three primitives
//! (entity id, component presence, sphere around a point) and three
//! combinators (and, or, not). Because children are owned, a `Constraint`
//! can never contain itself; graphs with shared or cyclic nodes are built
//! with [`ConstraintGraph`](crate::ConstraintGraph) instead.
//!
//! An empty `And` matches every entity and an empty `Or` matches none.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use worker_component::{ComponentId, EntityId};

use crate::error::QueryError;

/// The numeric type code of a constraint node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    EntityId,
    Component,
    Sphere,
    And,
    Or,
    Not,
}

impl ConstraintType {
    /// The wire code (1..=6).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::EntityId => 1,
            Self::Component => 2,
            Self::Sphere => 3,
            Self::And => 4,
            Self::Or => 5,
            Self::Not => 6,
        }
    }
}

impl TryFrom<u8> for ConstraintType {
    type Error = QueryError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::EntityId),
            2 => Ok(Self::Component),
            3 => Ok(Self::Sphere),
            4 => Ok(Self::And),
            5 => Ok(Self::Or),
            6 => Ok(Self::Not),
            other => Err(QueryError::UnknownConstraintType(other)),
        }
    }
}

/// A predicate over entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Matches exactly one entity.
    EntityId(EntityId),
    /// Matches entities that have the component.
    Component(ComponentId),
    /// Matches entities whose position lies within `radius` of `center`.
    Sphere { center: DVec3, radius: f64 },
    /// Matches when every child matches.
    And(Vec<Constraint>),
    /// Matches when at least one child matches.
    Or(Vec<Constraint>),
    /// Matches when the child does not.
    Not(Box<Constraint>),
}

impl Constraint {
    /// An entity id constraint.
    #[must_use]
    pub fn entity_id(id: EntityId) -> Self {
        Self::EntityId(id)
    }

    /// A component presence constraint.
    #[must_use]
    pub fn component(id: ComponentId) -> Self {
        Self::Component(id)
    }

    /// A sphere constraint centred on `(x, y, z)`.
    #[must_use]
    pub fn sphere(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self::Sphere {
            center: DVec3::new(x, y, z),
            radius,
        }
    }

    /// A conjunction of `children`.
    #[must_use]
    pub fn and(children: impl IntoIterator<Item = Constraint>) -> Self {
        Self::And(children.into_iter().collect())
    }

    /// A disjunction of `children`.
    #[must_use]
    pub fn or(children: impl IntoIterator<Item = Constraint>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// The negation of `child`.
    #[must_use]
    pub fn not(child: Constraint) -> Self {
        Self::Not(Box::new(child))
    }

    /// This node's type.
    #[must_use]
    pub fn constraint_type(&self) -> ConstraintType {
        match self {
            Self::EntityId(_) => ConstraintType::EntityId,
            Self::Component(_) => ConstraintType::Component,
            Self::Sphere { .. } => ConstraintType::Sphere,
            Self::And(_) => ConstraintType::And,
            Self::Or(_) => ConstraintType::Or,
            Self::Not(_) => ConstraintType::Not,
        }
    }

    /// Direct children, in order.
    #[must_use]
    pub fn children(&self) -> &[Constraint] {
        match self {
            Self::And(children) | Self::Or(children) => children,
            Self::Not(child) => std::slice::from_ref(child),
            _ => &[],
        }
    }

    /// Total number of nodes in the tree, including this one.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Self::node_count).sum::<usize>()
    }

    /// Evaluate the constraint against one entity.
    #[must_use]
    pub fn matches(&self, candidate: &impl QueryCandidate) -> bool {
        match self {
            Self::EntityId(id) => candidate.entity_id() == *id,
            Self::Component(id) => candidate.has_component(*id),
            Self::Sphere { center, radius } => candidate
                .position()
                .is_some_and(|position| position.distance(*center) <= *radius),
            Self::And(children) => children.iter().all(|c| c.matches(candidate)),
            Self::Or(children) => children.iter().any(|c| c.matches(candidate)),
            Self::Not(child) => !child.matches(candidate),
        }
    }
}

/// The view of an entity that [`Constraint::matches`] needs.
pub trait QueryCandidate {
    /// The entity's id.
    fn entity_id(&self) -> EntityId;

    /// Whether the entity has `component_id`.
    fn has_component(&self, component_id: ComponentId) -> bool;

    /// The entity's position, if it has one.
    fn position(&self) -> Option<DVec3>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Candidate {
        id: EntityId,
        components: Vec<ComponentId>,
        position: Option<DVec3>,
    }

    impl QueryCandidate for Candidate {
        fn entity_id(&self) -> EntityId {
            self.id
        }

        fn has_component(&self, component_id: ComponentId) -> bool {
            self.components.contains(&component_id)
        }

        fn position(&self) -> Option<DVec3> {
            self.position
        }
    }

    fn player() -> Candidate {
        Candidate {
            id: EntityId(5),
            components: vec![ComponentId(54), ComponentId(1000)],
            position: Some(DVec3::new(3.0, 0.0, 4.0)),
        }
    }

    #[test]
    fn test_primitives() {
        let p = player();
        assert!(Constraint::entity_id(EntityId(5)).matches(&p));
        assert!(!Constraint::entity_id(EntityId(6)).matches(&p));
        assert!(Constraint::component(ComponentId(1000)).matches(&p));
        assert!(!Constraint::component(ComponentId(1)).matches(&p));
    }

    #[test]
    fn test_sphere_is_inclusive_and_needs_a_position() {
        let p = player();
        assert!(Constraint::sphere(0.0, 0.0, 0.0, 5.0).matches(&p));
        assert!(!Constraint::sphere(0.0, 0.0, 0.0, 4.99).matches(&p));

        let nowhere = Candidate {
            position: None,
            ..player()
        };
        assert!(!Constraint::sphere(0.0, 0.0, 0.0, 1e9).matches(&nowhere));
    }

    #[test]
    fn test_empty_and_matches_everything_empty_or_nothing() {
        let p = player();
        assert!(Constraint::and([]).matches(&p));
        assert!(!Constraint::or([]).matches(&p));
        assert!(Constraint::not(Constraint::or([])).matches(&p));
    }

    #[test]
    fn test_combinators() {
        let p = player();
        let c = Constraint::and([
            Constraint::component(ComponentId(54)),
            Constraint::or([
                Constraint::entity_id(EntityId(1)),
                Constraint::not(Constraint::component(ComponentId(2))),
            ]),
        ]);
        assert!(c.matches(&p));
        assert_eq!(c.node_count(), 6);
        assert_eq!(c.constraint_type(), ConstraintType::And);
        assert_eq!(c.children().len(), 2);
    }

    #[test]
    fn test_constraint_type_codes() {
        for code in 1..=6u8 {
            assert_eq!(ConstraintType::try_from(code).unwrap().code(), code);
        }
        assert_eq!(
            ConstraintType::try_from(7),
            Err(QueryError::UnknownConstraintType(7))
        );
    }
}
