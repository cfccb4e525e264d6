//! [`InterestBuilder`] and the [`InterestSnapshot`] it produces.
//!
//! `build` takes `&self`: the builder stays usable and every snapshot is an
//! independent copy, so queries added after a build never show up in an
//! earlier snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use worker_component::{Component, ComponentData, ComponentId, VtableRegistry};
use worker_schema::{MAP_KEY_FIELD_ID, MAP_VALUE_FIELD_ID, SchemaComponentData};

use crate::error::InterestError;
use crate::query::{ComponentInterest, InterestQuery};

/// The standard interest component.
pub struct Interest;

impl Component for Interest {
    const ID: ComponentId = ComponentId(58);
    const NAME: &'static str = "improbable.Interest";
}

const COMPONENT_INTEREST: u32 = 1;

/// Accumulates interest queries per component.
#[derive(Debug, Clone, Default)]
pub struct InterestBuilder {
    interest: BTreeMap<ComponentId, ComponentInterest>,
}

impl InterestBuilder {
    /// An empty builder.
    #[must_use]
    pub fn begin() -> Self {
        Self::default()
    }

    /// Append `query` to `component_id`'s list.
    pub fn add_query(&mut self, component_id: ComponentId, query: InterestQuery) -> &mut Self {
        self.interest
            .entry(component_id)
            .or_default()
            .queries
            .push(query);
        self
    }

    /// Append every query in order. An empty sequence changes nothing and
    /// does not create an entry.
    pub fn add_queries(
        &mut self,
        component_id: ComponentId,
        queries: impl IntoIterator<Item = InterestQuery>,
    ) -> &mut Self {
        let mut queries = queries.into_iter().peekable();
        if queries.peek().is_some() {
            self.interest
                .entry(component_id)
                .or_default()
                .queries
                .extend(queries);
        }
        self
    }

    /// [`add_query`](Self::add_query) keyed by `C`'s component id.
    pub fn add_query_for<C: Component>(&mut self, query: InterestQuery) -> &mut Self {
        self.add_query(C::ID, query)
    }

    /// [`add_queries`](Self::add_queries) keyed by `C`'s component id.
    pub fn add_queries_for<C: Component>(
        &mut self,
        queries: impl IntoIterator<Item = InterestQuery>,
    ) -> &mut Self {
        self.add_queries(C::ID, queries)
    }

    /// A snapshot of the accumulated interest.
    #[must_use]
    pub fn build(&self) -> InterestSnapshot {
        InterestSnapshot {
            component_interest: self.interest.clone(),
        }
    }
}

/// Immutable interest, keyed by the component whose authority activates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestSnapshot {
    component_interest: BTreeMap<ComponentId, ComponentInterest>,
}

impl InterestSnapshot {
    /// The component interest map; empty, never absent, when nothing was added.
    #[must_use]
    pub fn component_interest(&self) -> &BTreeMap<ComponentId, ComponentInterest> {
        &self.component_interest
    }

    /// Queries registered under `component_id`.
    #[must_use]
    pub fn queries(&self, component_id: ComponentId) -> &[InterestQuery] {
        self.component_interest
            .get(&component_id)
            .map(|interest| interest.queries.as_slice())
            .unwrap_or_default()
    }

    /// Encode as interest component schema data.
    #[must_use]
    pub fn to_schema(&self) -> SchemaComponentData {
        let mut data = SchemaComponentData::new(Interest::ID.0);
        let fields = data.fields_mut();
        for (component_id, interest) in &self.component_interest {
            let entry = fields.add_map_entry(COMPONENT_INTEREST);
            entry.add_uint32(MAP_KEY_FIELD_ID, component_id.0);
            interest.write_schema(entry.add_object(MAP_VALUE_FIELD_ID));
        }
        data
    }

    /// Encode as interest component data, ready to attach to an entity.
    #[must_use]
    pub fn to_component_data(&self) -> ComponentData {
        ComponentData::from_schema(self.to_schema())
    }

    /// Decode interest component schema data.
    ///
    /// # Errors
    ///
    /// Returns [`InterestError::WrongComponent`] for another component's data,
    /// [`InterestError::Schema`] if a nested object does not parse, or
    /// [`InterestError::TooDeep`] for an over-nested constraint.
    pub fn from_schema(data: &SchemaComponentData) -> Result<Self, InterestError> {
        let actual = ComponentId(data.component_id());
        if actual != Interest::ID {
            return Err(InterestError::WrongComponent {
                expected: Interest::ID,
                actual,
            });
        }
        let mut component_interest = BTreeMap::new();
        for entry in data.fields().get_object_list(COMPONENT_INTEREST)? {
            let component_id = ComponentId(entry.get_uint32(MAP_KEY_FIELD_ID));
            let interest = ComponentInterest::read_schema(entry.get_object(MAP_VALUE_FIELD_ID)?)?;
            component_interest.insert(component_id, interest);
        }
        Ok(Self { component_interest })
    }

    /// Decode interest component data, serializing a user handle first.
    ///
    /// # Errors
    ///
    /// As [`from_schema`](Self::from_schema), plus [`InterestError::Vtable`]
    /// if a handle cannot be serialized.
    pub fn from_component_data(
        data: &ComponentData,
        vtables: &VtableRegistry,
    ) -> Result<Self, InterestError> {
        Self::from_schema(&*data.to_schema(vtables)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::InterestConstraint;

    struct Position;
    impl Component for Position {
        const ID: ComponentId = ComponentId(54);
        const NAME: &'static str = "improbable.Position";
    }

    struct PlayerInfo;
    impl Component for PlayerInfo {
        const ID: ComponentId = ComponentId(1001);
        const NAME: &'static str = "playground.PlayerInfo";
    }

    struct PlayerControls;
    impl Component for PlayerControls {
        const ID: ComponentId = ComponentId(1002);
        const NAME: &'static str = "playground.PlayerControls";
    }

    fn q(radius: f64) -> InterestQuery {
        InterestQuery::query(InterestConstraint::relative_sphere(radius))
    }

    #[test]
    fn test_build_empty_is_empty_map() {
        let snapshot = InterestBuilder::begin().build();
        assert!(snapshot.component_interest().is_empty());
        assert!(snapshot.queries(Position::ID).is_empty());
    }

    #[test]
    fn test_add_queries_empty_is_noop() {
        let snapshot = InterestBuilder::begin()
            .add_queries(Position::ID, [])
            .build();
        assert!(!snapshot.component_interest().contains_key(&Position::ID));
    }

    #[test]
    fn test_order_is_preserved_across_calls() {
        let snapshot = InterestBuilder::begin()
            .add_query(Position::ID, q(1.0))
            .add_queries(Position::ID, [q(2.0), q(3.0)])
            .add_query_for::<Position>(q(4.0))
            .build();
        assert_eq!(
            snapshot.queries(Position::ID),
            &[q(1.0), q(2.0), q(3.0), q(4.0)]
        );
    }

    #[test]
    fn test_build_keeps_builder_usable() {
        let mut builder = InterestBuilder::begin();
        builder.add_query(Position::ID, q(1.0));
        let first = builder.build();
        builder.add_query(Position::ID, q(2.0));
        let second = builder.build();

        assert_eq!(first.queries(Position::ID).len(), 1);
        assert_eq!(second.queries(Position::ID).len(), 2);
    }

    #[test]
    fn test_player_interest_scenario() {
        let constraint = InterestConstraint::all([
            InterestConstraint::relative_sphere(20.0),
            InterestConstraint::component_of::<PlayerInfo>(),
        ]);
        let query = InterestQuery::query(constraint.clone()).filter([Position::ID, PlayerInfo::ID]);
        let snapshot = InterestBuilder::begin()
            .add_queries_for::<PlayerControls>([query])
            .build();

        assert_eq!(snapshot.component_interest().len(), 1);
        let queries = snapshot.queries(PlayerControls::ID);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].result_component_ids.len(), 2);
        assert_eq!(queries[0].constraint, constraint);
    }

    #[test]
    fn test_component_data_roundtrip() {
        let snapshot = InterestBuilder::begin()
            .add_query_for::<PlayerControls>(
                InterestQuery::query(InterestConstraint::all([
                    InterestConstraint::relative_sphere(20.0),
                    InterestConstraint::component_of::<PlayerInfo>(),
                ]))
                .filter([Position::ID, PlayerInfo::ID])
                .max_frequency_hz(20.0),
            )
            .add_query_for::<Position>(q(50.0))
            .build();

        let data = snapshot.to_component_data();
        assert_eq!(data.component_id(), Interest::ID);

        let bytes = data.schema().unwrap().serialize().unwrap();
        let parsed = SchemaComponentData::deserialize(Interest::ID.0, &bytes).unwrap();
        assert_eq!(InterestSnapshot::from_schema(&parsed).unwrap(), snapshot);
        assert_eq!(
            InterestSnapshot::from_component_data(&data, &VtableRegistry::new()).unwrap(),
            snapshot
        );
    }

    #[test]
    fn test_wrong_component_is_rejected() {
        let data = SchemaComponentData::new(54);
        assert_eq!(
            InterestSnapshot::from_schema(&data),
            Err(InterestError::WrongComponent {
                expected: Interest::ID,
                actual: ComponentId(54),
            })
        );
    }

    #[test]
    fn test_over_nested_interest_data_is_an_error() {
        use worker_schema::wire::{WireType, write_length_delimited, write_tag, write_varint};

        fn wrap(field_id: u32, payload: &[u8]) -> Vec<u8> {
            let mut out = Vec::with_capacity(payload.len() + 8);
            write_tag(field_id, WireType::LengthDelimited, &mut out);
            write_length_delimited(payload, &mut out);
            out
        }

        // QueryConstraint { and: [QueryConstraint { and: [...] }] }
        let mut constraint = Vec::new();
        for _ in 0..5_000 {
            constraint = wrap(9, &constraint);
        }
        let query = wrap(1, &constraint);
        let component_interest = wrap(1, &query);
        let mut entry = Vec::new();
        write_tag(MAP_KEY_FIELD_ID, WireType::Varint, &mut entry);
        write_varint(u64::from(Position::ID.0), &mut entry);
        entry.extend(wrap(MAP_VALUE_FIELD_ID, &component_interest));
        let fields = wrap(COMPONENT_INTEREST, &entry);

        let data = SchemaComponentData::deserialize(Interest::ID.0, &fields).unwrap();
        assert!(matches!(
            InterestSnapshot::from_schema(&data),
            Err(InterestError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = InterestBuilder::begin().add_query(Position::ID, q(1.0)).build();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: InterestSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
