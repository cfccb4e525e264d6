//! [`InterestQuery`] and the per-component query list.

use serde::{Deserialize, Serialize};
use worker_component::ComponentId;
use worker_schema::SchemaObject;

use crate::constraint::InterestConstraint;
use crate::error::InterestError;

// Query field ids.
const CONSTRAINT: u32 = 1;
const FULL_SNAPSHOT_RESULT: u32 = 2;
const RESULT_COMPONENT_ID: u32 = 3;
const FREQUENCY: u32 = 4;

/// One interest query: which entities, which of their components, how often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestQuery {
    pub constraint: InterestConstraint,
    /// `Some(true)` asks for every component of each match.
    pub full_snapshot_result: Option<bool>,
    pub result_component_ids: Vec<ComponentId>,
    /// Maximum update rate in Hz; `None` is unthrottled.
    pub frequency: Option<f32>,
}

impl InterestQuery {
    /// A full-snapshot query over `constraint`.
    #[must_use]
    pub fn query(constraint: InterestConstraint) -> Self {
        Self {
            constraint,
            full_snapshot_result: Some(true),
            result_component_ids: Vec::new(),
            frequency: None,
        }
    }

    /// Cap the update rate.
    #[must_use]
    pub fn max_frequency_hz(mut self, frequency: f32) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Return only `component_ids` for each match.
    ///
    /// An empty list leaves the query unchanged.
    #[must_use]
    pub fn filter(mut self, component_ids: impl IntoIterator<Item = ComponentId>) -> Self {
        let component_ids: Vec<_> = component_ids.into_iter().collect();
        if !component_ids.is_empty() {
            self.full_snapshot_result = None;
            self.result_component_ids = component_ids;
        }
        self
    }

    /// Write into an empty `Query` object.
    pub fn write_schema(&self, object: &mut SchemaObject) {
        self.constraint.write_schema(object.add_object(CONSTRAINT));
        if let Some(full) = self.full_snapshot_result {
            object.add_bool(FULL_SNAPSHOT_RESULT, full);
        }
        let ids: Vec<u32> = self.result_component_ids.iter().map(|id| id.0).collect();
        object.add_uint32_list(RESULT_COMPONENT_ID, &ids);
        if let Some(frequency) = self.frequency {
            object.add_float(FREQUENCY, frequency);
        }
    }

    /// Read a `Query` object.
    ///
    /// # Errors
    ///
    /// Returns [`InterestError::Schema`] or [`InterestError::TooDeep`] if the
    /// constraint does not parse.
    pub fn read_schema(object: &SchemaObject) -> Result<Self, InterestError> {
        Ok(Self {
            constraint: InterestConstraint::read_schema(object.get_object(CONSTRAINT)?)?,
            full_snapshot_result: (object.get_bool_count(FULL_SNAPSHOT_RESULT) > 0)
                .then(|| object.get_bool(FULL_SNAPSHOT_RESULT)),
            result_component_ids: object
                .get_uint32_list(RESULT_COMPONENT_ID)
                .into_iter()
                .map(ComponentId)
                .collect(),
            frequency: (object.get_float_count(FREQUENCY) > 0)
                .then(|| object.get_float(FREQUENCY)),
        })
    }
}

/// The ordered queries registered under one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInterest {
    pub queries: Vec<InterestQuery>,
}

impl ComponentInterest {
    /// Write into an empty `ComponentInterest` object.
    pub fn write_schema(&self, object: &mut SchemaObject) {
        for query in &self.queries {
            query.write_schema(object.add_object(1));
        }
    }

    /// Read a `ComponentInterest` object.
    ///
    /// # Errors
    ///
    /// Returns [`InterestError::Schema`] if a query does not parse.
    pub fn read_schema(object: &SchemaObject) -> Result<Self, InterestError> {
        let queries = object
            .get_object_list(1)?
            .into_iter()
            .map(InterestQuery::read_schema)
            .collect::<Result<_, _>>()?;
        Ok(Self { queries })
    }
}
