//! Flat constraint layout.
//!
//! A [`FlatConstraints`] holds a root node plus one contiguous storage block.
//! The children of an And/Or node occupy a run of adjacent slots
//! (`first..first + count`); a Not node points at a single slot. Children
//! are always stored at higher offsets than the slot that refers to them, so
//! the layout is a pre-order arrangement that can be handed to a consumer as
//! a single allocation.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use worker_component::{ComponentId, EntityId};

use crate::constraint::{Constraint, ConstraintType};
use crate::error::QueryError;
use crate::graph::{ConstraintGraph, Node, NodeId};

/// One node of a flat constraint layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FlatConstraint {
    EntityId(EntityId),
    Component(ComponentId),
    Sphere { x: f64, y: f64, z: f64, radius: f64 },
    And { first: u32, count: u32 },
    Or { first: u32, count: u32 },
    Not { child: u32 },
}

impl FlatConstraint {
    /// This node's type.
    #[must_use]
    pub fn constraint_type(&self) -> ConstraintType {
        match self {
            Self::EntityId(_) => ConstraintType::EntityId,
            Self::Component(_) => ConstraintType::Component,
            Self::Sphere { .. } => ConstraintType::Sphere,
            Self::And { .. } => ConstraintType::And,
            Self::Or { .. } => ConstraintType::Or,
            Self::Not { .. } => ConstraintType::Not,
        }
    }

    fn slots(&self) -> Option<(usize, usize)> {
        match *self {
            Self::And { first, count } | Self::Or { first, count } => {
                Some((first as usize, first as usize + count as usize))
            }
            Self::Not { child } => Some((child as usize, child as usize + 1)),
            _ => None,
        }
    }
}

/// A constraint graph laid out in one storage block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatConstraints {
    root: FlatConstraint,
    storage: Vec<FlatConstraint>,
}

impl FlatConstraints {
    /// Lay out the graph reachable from `root`.
    ///
    /// The storage block has exactly
    /// [`storage_requirement`](ConstraintGraph::storage_requirement) slots.
    /// A node shared by several parents is written once per parent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CyclicConstraint`] before writing anything if
    /// the graph is cyclic, [`QueryError::UnknownNode`] for a foreign root,
    /// or [`QueryError::TooLarge`] if an offset would not fit in `u32`.
    pub fn flatten(graph: &ConstraintGraph, root: NodeId) -> Result<Self, QueryError> {
        let required = graph.storage_requirement(root)?;
        if u32::try_from(required).is_err() {
            return Err(QueryError::TooLarge(required));
        }

        let mut writer = Writer {
            graph,
            storage: vec![FlatConstraint::And { first: 0, count: 0 }; required],
            cursor: 0,
        };
        let root = writer.write(root);
        debug_assert_eq!(writer.cursor, required);
        Ok(Self {
            root,
            storage: writer.storage,
        })
    }

    /// Lay out a constraint tree.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TooLarge`] for trees with more nodes than a
    /// `u32` offset can address.
    pub fn from_constraint(constraint: &Constraint) -> Result<Self, QueryError> {
        let (graph, root) = ConstraintGraph::from_constraint(constraint);
        Self::flatten(&graph, root)
    }

    /// Reassemble a layout received from elsewhere, validating every offset.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidOffset`] if a node points outside the
    /// storage block.
    pub fn from_parts(
        root: FlatConstraint,
        storage: Vec<FlatConstraint>,
    ) -> Result<Self, QueryError> {
        let len = storage.len();
        for node in std::iter::once(&root).chain(&storage) {
            if let Some((first, end)) = node.slots() {
                if end > len {
                    return Err(QueryError::InvalidOffset { first, end, len });
                }
            }
        }
        Ok(Self { root, storage })
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &FlatConstraint {
        &self.root
    }

    /// The storage block.
    #[must_use]
    pub fn storage(&self) -> &[FlatConstraint] {
        &self.storage
    }

    /// The children of `node`, which must come from this layout.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidOffset`] if the node points outside the
    /// storage block.
    pub fn children(&self, node: &FlatConstraint) -> Result<&[FlatConstraint], QueryError> {
        match node.slots() {
            None => Ok(&[]),
            Some((first, end)) => {
                self.storage
                    .get(first..end)
                    .ok_or(QueryError::InvalidOffset {
                        first,
                        end,
                        len: self.storage.len(),
                    })
            }
        }
    }

    /// Rebuild the constraint tree.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidOffset`] for an out-of-range reference or
    /// [`QueryError::SlotReuse`] if the layout visits more nodes than it
    /// stores, which only happens when offsets overlap or loop.
    pub fn unflatten(&self) -> Result<Constraint, QueryError> {
        let mut remaining = self.storage.len();
        self.rebuild(&self.root, &mut remaining)
    }

    fn rebuild(&self, node: &FlatConstraint, remaining: &mut usize) -> Result<Constraint, QueryError> {
        let mut children = |node: &FlatConstraint| -> Result<Vec<Constraint>, QueryError> {
            let slots = self.children(node)?;
            *remaining = remaining.checked_sub(slots.len()).ok_or(QueryError::SlotReuse)?;
            slots.iter().map(|child| self.rebuild(child, remaining)).collect()
        };
        Ok(match node {
            FlatConstraint::EntityId(id) => Constraint::EntityId(*id),
            FlatConstraint::Component(id) => Constraint::Component(*id),
            FlatConstraint::Sphere { x, y, z, radius } => Constraint::Sphere {
                center: DVec3::new(*x, *y, *z),
                radius: *radius,
            },
            FlatConstraint::And { .. } => Constraint::And(children(node)?),
            FlatConstraint::Or { .. } => Constraint::Or(children(node)?),
            FlatConstraint::Not { .. } => {
                let mut child = children(node)?;
                match child.pop() {
                    Some(child) => Constraint::not(child),
                    None => return Err(QueryError::SlotReuse),
                }
            }
        })
    }
}

struct Writer<'a> {
    graph: &'a ConstraintGraph,
    storage: Vec<FlatConstraint>,
    cursor: usize,
}

impl Writer<'_> {
    /// Flat form of `id`; its children are written at the cursor.
    fn write(&mut self, id: NodeId) -> FlatConstraint {
        let graph = self.graph;
        match &graph.nodes_ref()[id.index()] {
            Node::EntityId(entity) => FlatConstraint::EntityId(*entity),
            Node::Component(component) => FlatConstraint::Component(*component),
            Node::Sphere { center, radius } => FlatConstraint::Sphere {
                x: center.x,
                y: center.y,
                z: center.z,
                radius: *radius,
            },
            Node::And(children) => {
                let (first, count) = self.write_block(children);
                FlatConstraint::And { first, count }
            }
            Node::Or(children) => {
                let (first, count) = self.write_block(children);
                FlatConstraint::Or { first, count }
            }
            Node::Not(child) => {
                let (child, _) = self.write_block(std::slice::from_ref(child));
                FlatConstraint::Not { child }
            }
        }
    }

    // Offsets fit in u32: flatten checked the total before writing.
    #[allow(clippy::cast_possible_truncation)]
    fn write_block(&mut self, children: &[NodeId]) -> (u32, u32) {
        let first = self.cursor;
        self.cursor += children.len();
        for (slot, child) in (first..).zip(children) {
            self.storage[slot] = self.write(*child);
        }
        (first as u32, children.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Constraint {
        Constraint::and([
            Constraint::component(ComponentId(54)),
            Constraint::or([
                Constraint::entity_id(EntityId(1)),
                Constraint::entity_id(EntityId(2)),
                Constraint::sphere(1.0, 2.0, 3.0, 4.0),
            ]),
            Constraint::not(Constraint::component(ComponentId(58))),
        ])
    }

    #[test]
    fn test_storage_matches_requirement() {
        let constraint = sample();
        let flat = FlatConstraints::from_constraint(&constraint).unwrap();
        assert_eq!(flat.storage().len(), constraint.node_count() - 1);
        assert_eq!(flat.root().constraint_type(), ConstraintType::And);
    }

    #[test]
    fn test_children_are_contiguous() {
        let flat = FlatConstraints::from_constraint(&sample()).unwrap();
        let top = flat.children(flat.root()).unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0], FlatConstraint::Component(ComponentId(54)));
        assert_eq!(*flat.root(), FlatConstraint::And { first: 0, count: 3 });

        let or = flat.children(&top[1]).unwrap();
        assert_eq!(
            or.iter().map(FlatConstraint::constraint_type).collect::<Vec<_>>(),
            vec![
                ConstraintType::EntityId,
                ConstraintType::EntityId,
                ConstraintType::Sphere
            ]
        );
        assert_eq!(top[1], FlatConstraint::Or { first: 3, count: 3 });

        let not = flat.children(&top[2]).unwrap();
        assert_eq!(not, &[FlatConstraint::Component(ComponentId(58))]);
    }

    #[test]
    fn test_unflatten_restores_tree() {
        let constraint = sample();
        let flat = FlatConstraints::from_constraint(&constraint).unwrap();
        assert_eq!(flat.unflatten().unwrap(), constraint);
    }

    #[test]
    fn test_leaf_root_needs_no_storage() {
        let flat = FlatConstraints::from_constraint(&Constraint::and([])).unwrap();
        assert!(flat.storage().is_empty());
        assert_eq!(flat.unflatten().unwrap(), Constraint::and([]));
    }

    #[test]
    fn test_shared_node_is_written_per_parent() {
        let mut graph = ConstraintGraph::new();
        let shared = graph.add(Node::Component(ComponentId(9))).unwrap();
        let not = graph.add(Node::Not(shared)).unwrap();
        let root = graph.add(Node::Or(vec![shared, not])).unwrap();
        let flat = FlatConstraints::flatten(&graph, root).unwrap();
        assert_eq!(flat.storage().len(), 3);
        assert_eq!(
            flat.unflatten().unwrap(),
            Constraint::or([
                Constraint::component(ComponentId(9)),
                Constraint::not(Constraint::component(ComponentId(9))),
            ])
        );
    }

    #[test]
    fn test_cyclic_graph_is_not_flattened() {
        let mut graph = ConstraintGraph::new();
        let leaf = graph.add(Node::EntityId(EntityId(1))).unwrap();
        let root = graph.add(Node::And(vec![leaf])).unwrap();
        graph.replace(root, Node::And(vec![root])).unwrap();
        assert_eq!(
            FlatConstraints::flatten(&graph, root),
            Err(QueryError::CyclicConstraint)
        );
    }

    #[test]
    fn test_from_parts_rejects_out_of_range() {
        let err = FlatConstraints::from_parts(FlatConstraint::And { first: 1, count: 2 }, vec![
            FlatConstraint::Component(ComponentId(1)),
            FlatConstraint::Component(ComponentId(2)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidOffset {
                first: 1,
                end: 3,
                len: 2
            }
        );
    }

    #[test]
    fn test_looping_offsets_are_rejected() {
        let flat = FlatConstraints::from_parts(FlatConstraint::Not { child: 0 }, vec![
            FlatConstraint::Not { child: 0 },
        ])
        .unwrap();
        assert_eq!(flat.unflatten(), Err(QueryError::SlotReuse));
    }

    #[test]
    fn test_flat_layout_survives_messagepack() {
        let flat = FlatConstraints::from_constraint(&sample()).unwrap();
        let bytes = rmp_serde::to_vec(&flat).unwrap();
        let decoded: FlatConstraints = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, flat);
    }
}
