//! [`ConstraintGraph`]: constraints stored in an index arena.
//!
//! Nodes refer to their children by [`NodeId`]. A node can be replaced after
//! it was created, so a graph may share subtrees between parents or contain
//! a node that reaches itself. Every use that walks the graph to completion
//! (storage sizing, flattening, conversion back to a [`Constraint`]) first
//! rejects cycles.

use std::collections::HashSet;

use glam::DVec3;
use worker_component::{ComponentId, EntityId};

use crate::constraint::Constraint;
use crate::error::QueryError;

/// Index of a node in a [`ConstraintGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One constraint node; combinators refer to children by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    EntityId(EntityId),
    Component(ComponentId),
    Sphere { center: DVec3, radius: f64 },
    And(Vec<NodeId>),
    Or(Vec<NodeId>),
    Not(NodeId),
}

impl Node {
    /// Child ids in order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::And(children) | Self::Or(children) => children,
            Self::Not(child) => std::slice::from_ref(child),
            _ => &[],
        }
    }
}

/// An arena of constraint nodes.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    nodes: Vec<Node>,
}

impl ConstraintGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a constraint tree, returning it with the root id.
    #[must_use]
    pub fn from_constraint(constraint: &Constraint) -> (Self, NodeId) {
        let mut graph = Self::new();
        let root = graph.insert(constraint);
        (graph, root)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn nodes_ref(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns `true` if `id` belongs to this graph.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// The node at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownNode`] if `id` is not in the graph.
    pub fn get(&self, id: NodeId) -> Result<&Node, QueryError> {
        self.nodes.get(id.0).ok_or(QueryError::UnknownNode(id.0))
    }

    fn check_children(&self, node: &Node) -> Result<(), QueryError> {
        match node.children().iter().find(|child| !self.contains(**child)) {
            Some(missing) => Err(QueryError::UnknownNode(missing.0)),
            None => Ok(()),
        }
    }

    /// Append a node whose children already exist.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownNode`] if a child id is not in the graph.
    pub fn add(&mut self, node: Node) -> Result<NodeId, QueryError> {
        self.check_children(&node)?;
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Replace the node at `id`. This is how shared and cyclic shapes are made.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownNode`] if `id` or a child id is not in
    /// the graph.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Result<(), QueryError> {
        if !self.contains(id) {
            return Err(QueryError::UnknownNode(id.0));
        }
        self.check_children(&node)?;
        self.nodes[id.0] = node;
        Ok(())
    }

    /// Copy a constraint tree into the arena, returning its root.
    pub fn insert(&mut self, constraint: &Constraint) -> NodeId {
        let node = match constraint {
            Constraint::EntityId(id) => Node::EntityId(*id),
            Constraint::Component(id) => Node::Component(*id),
            Constraint::Sphere { center, radius } => Node::Sphere {
                center: *center,
                radius: *radius,
            },
            Constraint::And(children) => {
                Node::And(children.iter().map(|c| self.insert(c)).collect())
            }
            Constraint::Or(children) => Node::Or(children.iter().map(|c| self.insert(c)).collect()),
            Constraint::Not(child) => Node::Not(self.insert(child)),
        };
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Returns `true` if some node reachable from `root` reaches itself.
    ///
    /// Depth-first, keeping the set of nodes on the current path; a node is
    /// removed from the set when the walk backtracks past it, so siblings
    /// that share a descendant are not reported.
    #[must_use]
    pub fn is_cyclic(&self, root: NodeId) -> bool {
        if !self.contains(root) {
            return false;
        }
        let mut on_path = HashSet::new();
        self.visit_cyclic(root, &mut on_path)
    }

    fn visit_cyclic(&self, id: NodeId, on_path: &mut HashSet<NodeId>) -> bool {
        if !on_path.insert(id) {
            return true;
        }
        let cyclic = self.nodes[id.0]
            .children()
            .iter()
            .any(|child| self.visit_cyclic(*child, on_path));
        on_path.remove(&id);
        cyclic
    }

    fn ensure_acyclic(&self, root: NodeId) -> Result<(), QueryError> {
        if !self.contains(root) {
            return Err(QueryError::UnknownNode(root.0));
        }
        if self.is_cyclic(root) {
            return Err(QueryError::CyclicConstraint);
        }
        Ok(())
    }

    /// Number of non-root slots a flat layout of `root` needs.
    ///
    /// Each child of an And/Or takes one slot plus its own requirement; a Not
    /// takes one slot for its child plus the child's requirement; leaves take
    /// none. A node shared by several parents is counted once per parent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CyclicConstraint`] or [`QueryError::UnknownNode`].
    pub fn storage_requirement(&self, root: NodeId) -> Result<usize, QueryError> {
        self.ensure_acyclic(root)?;
        Ok(self.count_storage(root))
    }

    fn count_storage(&self, id: NodeId) -> usize {
        let children = self.nodes[id.0].children();
        children.len()
            + children
                .iter()
                .map(|child| self.count_storage(*child))
                .sum::<usize>()
    }

    /// Expand `root` back into an owned tree, duplicating shared nodes.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CyclicConstraint`] or [`QueryError::UnknownNode`].
    pub fn to_constraint(&self, root: NodeId) -> Result<Constraint, QueryError> {
        self.ensure_acyclic(root)?;
        Ok(self.build(root))
    }

    fn build(&self, id: NodeId) -> Constraint {
        match &self.nodes[id.0] {
            Node::EntityId(entity) => Constraint::EntityId(*entity),
            Node::Component(component) => Constraint::Component(*component),
            Node::Sphere { center, radius } => Constraint::Sphere {
                center: *center,
                radius: *radius,
            },
            Node::And(children) => Constraint::And(children.iter().map(|c| self.build(*c)).collect()),
            Node::Or(children) => Constraint::Or(children.iter().map(|c| self.build(*c)).collect()),
            Node::Not(child) => Constraint::not(self.build(*child)),
        }
    }
}
