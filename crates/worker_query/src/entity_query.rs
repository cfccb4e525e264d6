//! Entity queries: a constraint plus the kind of result wanted back.

use serde::{Deserialize, Serialize};
use worker_component::ComponentId;

use crate::constraint::Constraint;
use crate::error::QueryError;
use crate::flat::FlatConstraints;
use crate::graph::{ConstraintGraph, NodeId};

/// What the runtime returns for a matching entity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    /// Only the number of matches.
    Count,
    /// The matching entities, optionally restricted to some components.
    /// `None` returns every component.
    Snapshot {
        component_ids: Option<Vec<ComponentId>>,
    },
}

impl ResultType {
    /// A full snapshot result.
    #[must_use]
    pub fn snapshot() -> Self {
        Self::Snapshot {
            component_ids: None,
        }
    }

    /// A snapshot restricted to `component_ids`.
    #[must_use]
    pub fn filtered_snapshot(component_ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self::Snapshot {
            component_ids: Some(component_ids.into_iter().collect()),
        }
    }

    /// The wire code: Count is 1, Snapshot is 2.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::Count => 1,
            Self::Snapshot { .. } => 2,
        }
    }
}

/// An entity query over a constraint graph.
#[derive(Debug, Clone)]
pub struct EntityQuery {
    graph: ConstraintGraph,
    root: NodeId,
    result_type: ResultType,
}

impl EntityQuery {
    /// Query for entities matching `constraint`.
    #[must_use]
    pub fn new(constraint: &Constraint, result_type: ResultType) -> Self {
        let (graph, root) = ConstraintGraph::from_constraint(constraint);
        Self {
            graph,
            root,
            result_type,
        }
    }

    /// Query over a hand-built graph, which may share or cycle nodes.
    #[must_use]
    pub fn from_graph(graph: ConstraintGraph, root: NodeId, result_type: ResultType) -> Self {
        Self {
            graph,
            root,
            result_type,
        }
    }

    /// The constraint graph.
    #[must_use]
    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The requested result.
    #[must_use]
    pub fn result_type(&self) -> &ResultType {
        &self.result_type
    }

    /// Lay the query out for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CyclicConstraint`] before any storage is
    /// allocated if the constraint graph is cyclic.
    pub fn flatten(&self) -> Result<FlatEntityQuery, QueryError> {
        let constraints = FlatConstraints::flatten(&self.graph, self.root)?;
        let snapshot_component_ids = match &self.result_type {
            ResultType::Snapshot {
                component_ids: Some(ids),
            } => Some(ids.clone()),
            _ => None,
        };
        Ok(FlatEntityQuery {
            constraints,
            result_type: self.result_type.code(),
            snapshot_component_ids,
        })
    }
}

/// The flat form of an [`EntityQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEntityQuery {
    pub constraints: FlatConstraints,
    pub result_type: u8,
    pub snapshot_component_ids: Option<Vec<ComponentId>>,
}

impl FlatEntityQuery {
    /// Decode the result type.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownResultType`] for a code other than 1 or 2.
    pub fn result_type(&self) -> Result<ResultType, QueryError> {
        match self.result_type {
            1 => Ok(ResultType::Count),
            2 => Ok(ResultType::Snapshot {
                component_ids: self.snapshot_component_ids.clone(),
            }),
            other => Err(QueryError::UnknownResultType(other)),
        }
    }

    /// Rebuild the query's constraint.
    ///
    /// # Errors
    ///
    /// See [`FlatConstraints::unflatten`].
    pub fn constraint(&self) -> Result<Constraint, QueryError> {
        self.constraints.unflatten()
    }
}
