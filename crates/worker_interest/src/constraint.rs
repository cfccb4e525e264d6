//! Interest query constraints and their `QueryConstraint` schema layout.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use worker_component::{ComponentId, EntityId};
use worker_schema::SchemaObject;

use crate::error::InterestError;

// QueryConstraint field ids.
const SPHERE: u32 = 1;
const CYLINDER: u32 = 2;
const BOX: u32 = 3;
const RELATIVE_SPHERE: u32 = 4;
const RELATIVE_CYLINDER: u32 = 5;
const RELATIVE_BOX: u32 = 6;
const ENTITY_ID: u32 = 7;
const COMPONENT: u32 = 8;
const AND: u32 = 9;
const OR: u32 = 10;

/// Deepest `QueryConstraint` nesting [`InterestConstraint::read_schema`]
/// accepts.
pub const MAX_CONSTRAINT_DEPTH: usize = 64;

/// A constraint selecting the entities an interest query returns.
///
/// Relative shapes are centred on the position of the entity that owns the
/// interest component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterestConstraint {
    Sphere { center: DVec3, radius: f64 },
    Cylinder { center: DVec3, radius: f64 },
    Box { center: DVec3, edge_length: DVec3 },
    RelativeSphere { radius: f64 },
    RelativeCylinder { radius: f64 },
    RelativeBox { edge_length: DVec3 },
    EntityId(EntityId),
    Component(ComponentId),
    /// Every child must match.
    All(Vec<InterestConstraint>),
    /// At least one child must match.
    Any(Vec<InterestConstraint>),
}

impl InterestConstraint {
    #[must_use]
    pub fn sphere(radius: f64, x: f64, y: f64, z: f64) -> Self {
        Self::Sphere {
            center: DVec3::new(x, y, z),
            radius,
        }
    }

    #[must_use]
    pub fn cylinder(radius: f64, x: f64, y: f64, z: f64) -> Self {
        Self::Cylinder {
            center: DVec3::new(x, y, z),
            radius,
        }
    }

    #[must_use]
    pub fn cube(center: DVec3, edge_length: DVec3) -> Self {
        Self::Box {
            center,
            edge_length,
        }
    }

    #[must_use]
    pub fn relative_sphere(radius: f64) -> Self {
        Self::RelativeSphere { radius }
    }

    #[must_use]
    pub fn relative_cylinder(radius: f64) -> Self {
        Self::RelativeCylinder { radius }
    }

    #[must_use]
    pub fn relative_box(x: f64, y: f64, z: f64) -> Self {
        Self::RelativeBox {
            edge_length: DVec3::new(x, y, z),
        }
    }

    #[must_use]
    pub fn entity_id(id: EntityId) -> Self {
        Self::EntityId(id)
    }

    #[must_use]
    pub fn component(id: ComponentId) -> Self {
        Self::Component(id)
    }

    /// Entities with component `C`.
    #[must_use]
    pub fn component_of<C: worker_component::Component>() -> Self {
        Self::Component(C::ID)
    }

    #[must_use]
    pub fn all(constraints: impl IntoIterator<Item = InterestConstraint>) -> Self {
        Self::All(constraints.into_iter().collect())
    }

    #[must_use]
    pub fn any(constraints: impl IntoIterator<Item = InterestConstraint>) -> Self {
        Self::Any(constraints.into_iter().collect())
    }

    /// Children of an `All`; empty for every other variant.
    #[must_use]
    pub fn and_constraints(&self) -> &[InterestConstraint] {
        match self {
            Self::All(children) => children,
            _ => &[],
        }
    }

    /// Children of an `Any`; empty for every other variant.
    #[must_use]
    pub fn or_constraints(&self) -> &[InterestConstraint] {
        match self {
            Self::Any(children) => children,
            _ => &[],
        }
    }

    /// Write this constraint into an empty `QueryConstraint` object.
    pub fn write_schema(&self, object: &mut SchemaObject) {
        match self {
            Self::Sphere { center, radius } => {
                let sphere = object.add_object(SPHERE);
                write_vec3(sphere.add_object(1), *center);
                sphere.add_double(2, *radius);
            }
            Self::Cylinder { center, radius } => {
                let cylinder = object.add_object(CYLINDER);
                write_vec3(cylinder.add_object(1), *center);
                cylinder.add_double(2, *radius);
            }
            Self::Box {
                center,
                edge_length,
            } => {
                let cube = object.add_object(BOX);
                write_vec3(cube.add_object(1), *center);
                write_vec3(cube.add_object(2), *edge_length);
            }
            Self::RelativeSphere { radius } => {
                object.add_object(RELATIVE_SPHERE).add_double(1, *radius);
            }
            Self::RelativeCylinder { radius } => {
                object.add_object(RELATIVE_CYLINDER).add_double(1, *radius);
            }
            Self::RelativeBox { edge_length } => {
                write_vec3(object.add_object(RELATIVE_BOX).add_object(1), *edge_length);
            }
            Self::EntityId(id) => object.add_entity_id(ENTITY_ID, id.0),
            Self::Component(id) => object.add_uint32(COMPONENT, id.0),
            Self::All(children) => {
                for child in children {
                    child.write_schema(object.add_object(AND));
                }
            }
            Self::Any(children) => {
                for child in children {
                    child.write_schema(object.add_object(OR));
                }
            }
        }
    }

    /// Read a `QueryConstraint` object.
    ///
    /// The first populated field wins. An object with no populated field
    /// reads as an empty `All`, which is also how an empty `Any` is written.
    ///
    /// # Errors
    ///
    /// Returns [`InterestError::Schema`] if a nested object does not parse,
    /// or [`InterestError::TooDeep`] past [`MAX_CONSTRAINT_DEPTH`] levels.
    pub fn read_schema(object: &SchemaObject) -> Result<Self, InterestError> {
        Self::read_at(object, 1)
    }

    fn read_at(object: &SchemaObject, depth: usize) -> Result<Self, InterestError> {
        if depth > MAX_CONSTRAINT_DEPTH {
            return Err(InterestError::TooDeep {
                limit: MAX_CONSTRAINT_DEPTH,
            });
        }
        if object.get_object_count(SPHERE) > 0 {
            let sphere = object.get_object(SPHERE)?;
            return Ok(Self::Sphere {
                center: read_vec3(sphere.get_object(1)?),
                radius: sphere.get_double(2),
            });
        }
        if object.get_object_count(CYLINDER) > 0 {
            let cylinder = object.get_object(CYLINDER)?;
            return Ok(Self::Cylinder {
                center: read_vec3(cylinder.get_object(1)?),
                radius: cylinder.get_double(2),
            });
        }
        if object.get_object_count(BOX) > 0 {
            let cube = object.get_object(BOX)?;
            return Ok(Self::Box {
                center: read_vec3(cube.get_object(1)?),
                edge_length: read_vec3(cube.get_object(2)?),
            });
        }
        if object.get_object_count(RELATIVE_SPHERE) > 0 {
            let radius = object.get_object(RELATIVE_SPHERE)?.get_double(1);
            return Ok(Self::RelativeSphere { radius });
        }
        if object.get_object_count(RELATIVE_CYLINDER) > 0 {
            let radius = object.get_object(RELATIVE_CYLINDER)?.get_double(1);
            return Ok(Self::RelativeCylinder { radius });
        }
        if object.get_object_count(RELATIVE_BOX) > 0 {
            let edge_length = read_vec3(object.get_object(RELATIVE_BOX)?.get_object(1)?);
            return Ok(Self::RelativeBox { edge_length });
        }
        if object.get_entity_id_count(ENTITY_ID) > 0 {
            return Ok(Self::EntityId(EntityId(object.get_entity_id(ENTITY_ID))));
        }
        if object.get_uint32_count(COMPONENT) > 0 {
            return Ok(Self::Component(ComponentId(object.get_uint32(COMPONENT))));
        }
        if object.get_object_count(OR) > 0 {
            return Ok(Self::Any(read_list(object, OR, depth)?));
        }
        Ok(Self::All(read_list(object, AND, depth)?))
    }
}

fn read_list(
    object: &SchemaObject,
    field_id: u32,
    depth: usize,
) -> Result<Vec<InterestConstraint>, InterestError> {
    object
        .get_object_list(field_id)?
        .into_iter()
        .map(|child| InterestConstraint::read_at(child, depth + 1))
        .collect()
}

fn write_vec3(object: &mut SchemaObject, value: DVec3) {
    object.add_double(1, value.x);
    object.add_double(2, value.y);
    object.add_double(3, value.z);
}

fn read_vec3(object: &SchemaObject) -> DVec3 {
    DVec3::new(object.get_double(1), object.get_double(2), object.get_double(3))
}
