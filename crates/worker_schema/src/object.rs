//! The [`SchemaObject`] field table.
//!
//! A schema object maps small positive field ids to an ordered list of
//! occurrences. Each field is expected to hold values of one declared kind;
//! accessors of a different kind simply do not see occurrences whose wire
//! representation does not match theirs.
//!
//! Reads of singular values return the **last** occurrence, or the kind's
//! zero value when the field is absent. Only nested-object reads can fail,
//! because a length-delimited occurrence received from the wire is parsed
//! lazily the first time it is read as an object.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::SchemaError;
use crate::wire::{
    Reader, WireType, write_length_delimited, write_tag, write_varint, zigzag_decode32,
    zigzag_decode64, zigzag_encode32, zigzag_encode64,
};

/// A schema field identifier.
pub type FieldId = u32;

/// Largest field id representable in a wire tag.
pub const MAX_FIELD_ID: FieldId = (1 << 29) - 1;

/// Field id of the key inside a map entry object.
pub const MAP_KEY_FIELD_ID: FieldId = 1;

/// Field id of the value inside a map entry object.
pub const MAP_VALUE_FIELD_ID: FieldId = 2;

static EMPTY_OBJECT: SchemaObject = SchemaObject::new();

/// One stored occurrence.
#[derive(Debug, Clone)]
enum Value {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    Encoded(Encoded),
    Object(SchemaObject),
}

/// A length-delimited payload that may later be read as a nested object.
#[derive(Debug, Clone)]
struct Encoded {
    bytes: Vec<u8>,
    parsed: OnceLock<Result<SchemaObject, SchemaError>>,
}

impl Encoded {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            parsed: OnceLock::new(),
        }
    }

    fn object(&self) -> Result<&SchemaObject, SchemaError> {
        self.parsed
            .get_or_init(|| SchemaObject::from_buffer(&self.bytes))
            .as_ref()
            .map_err(Clone::clone)
    }
}

/// A scalar wire kind: how a Rust value maps onto one stored occurrence.
trait ScalarKind {
    type Value: Copy + Default;

    fn encode(value: Self::Value) -> Value;
    fn decode(value: &Value) -> Option<Self::Value>;
}

macro_rules! scalar_kind {
    ($kind:ident, $ty:ty, $variant:ident, |$e:ident| $encode:expr, |$d:ident| $decode:expr) => {
        struct $kind;

        impl ScalarKind for $kind {
            type Value = $ty;

            fn encode($e: $ty) -> Value {
                Value::$variant($encode)
            }

            fn decode(value: &Value) -> Option<$ty> {
                match value {
                    Value::$variant($d) => Some($decode),
                    _ => None,
                }
            }
        }
    };
}

scalar_kind!(FloatKind, f32, Fixed32, |v| v.to_bits(), |w| f32::from_bits(*w));
scalar_kind!(DoubleKind, f64, Fixed64, |v| v.to_bits(), |w| f64::from_bits(*w));
scalar_kind!(BoolKind, bool, Varint, |v| u64::from(v), |w| *w != 0);
scalar_kind!(Int32Kind, i32, Varint, |v| i64::from(v) as u64, |w| *w as i32);
scalar_kind!(Int64Kind, i64, Varint, |v| v as u64, |w| *w as i64);
scalar_kind!(Uint32Kind, u32, Varint, |v| u64::from(v), |w| *w as u32);
scalar_kind!(Uint64Kind, u64, Varint, |v| v, |w| *w);
scalar_kind!(Sint32Kind, i32, Varint, |v| zigzag_encode32(v), |w| zigzag_decode32(*w));
scalar_kind!(Sint64Kind, i64, Varint, |v| zigzag_encode64(v), |w| zigzag_decode64(*w));
scalar_kind!(Fixed32Kind, u32, Fixed32, |v| v, |w| *w);
scalar_kind!(Fixed64Kind, u64, Fixed64, |v| v, |w| *w);
scalar_kind!(Sfixed32Kind, i32, Fixed32, |v| v as u32, |w| *w as i32);
scalar_kind!(Sfixed64Kind, i64, Fixed64, |v| v as u64, |w| *w as i64);
scalar_kind!(EntityIdKind, i64, Varint, |v| v as u64, |w| *w as i64);
scalar_kind!(EnumKind, u32, Varint, |v| u64::from(v), |w| *w as u32);

/// A table of field occurrences keyed by [`FieldId`].
///
/// Objects are always owned by a schema root (component data, update,
/// command request or response); nested objects are reached through
/// `&`/`&mut` borrows of their parent, so no view can outlive its root.
#[derive(Debug, Clone, Default)]
pub struct SchemaObject {
    fields: BTreeMap<FieldId, Vec<Value>>,
}

macro_rules! scalar_accessors {
    ($($kind:ident: $ty:ty => $add:ident, $get:ident, $count:ident, $index:ident, $add_list:ident, $get_list:ident;)*) => {
        impl SchemaObject {
            $(
                #[doc = concat!("Append one `", stringify!($ty), "` occurrence (`", stringify!($add), "`).")]
                pub fn $add(&mut self, field_id: FieldId, value: $ty) {
                    self.push(field_id, $kind::encode(value));
                }

                #[doc = concat!("Last occurrence of the field, or the zero value if absent (`", stringify!($get), "`).")]
                #[must_use]
                pub fn $get(&self, field_id: FieldId) -> $ty {
                    self.scalars::<$kind>(field_id).last().unwrap_or_default()
                }

                #[doc = concat!("Number of occurrences readable by `", stringify!($get), "`.")]
                #[must_use]
                pub fn $count(&self, field_id: FieldId) -> u32 {
                    self.scalars::<$kind>(field_id).count() as u32
                }

                #[doc = concat!("Occurrence `index` (0-based), or the zero value if out of range (`", stringify!($index), "`).")]
                #[must_use]
                pub fn $index(&self, field_id: FieldId, index: u32) -> $ty {
                    self.scalars::<$kind>(field_id)
                        .nth(index as usize)
                        .unwrap_or_default()
                }

                #[doc = concat!("Append every value in order (`", stringify!($add_list), "`).")]
                pub fn $add_list(&mut self, field_id: FieldId, values: &[$ty]) {
                    for value in values {
                        self.push(field_id, $kind::encode(*value));
                    }
                }

                #[doc = concat!("All occurrences in insertion order (`", stringify!($get_list), "`).")]
                #[must_use]
                pub fn $get_list(&self, field_id: FieldId) -> Vec<$ty> {
                    self.scalars::<$kind>(field_id).collect()
                }
            )*
        }
    };
}

scalar_accessors! {
    FloatKind: f32 => add_float, get_float, get_float_count, index_float, add_float_list, get_float_list;
    DoubleKind: f64 => add_double, get_double, get_double_count, index_double, add_double_list, get_double_list;
    BoolKind: bool => add_bool, get_bool, get_bool_count, index_bool, add_bool_list, get_bool_list;
    Int32Kind: i32 => add_int32, get_int32, get_int32_count, index_int32, add_int32_list, get_int32_list;
    Int64Kind: i64 => add_int64, get_int64, get_int64_count, index_int64, add_int64_list, get_int64_list;
    Uint32Kind: u32 => add_uint32, get_uint32, get_uint32_count, index_uint32, add_uint32_list, get_uint32_list;
    Uint64Kind: u64 => add_uint64, get_uint64, get_uint64_count, index_uint64, add_uint64_list, get_uint64_list;
    Sint32Kind: i32 => add_sint32, get_sint32, get_sint32_count, index_sint32, add_sint32_list, get_sint32_list;
    Sint64Kind: i64 => add_sint64, get_sint64, get_sint64_count, index_sint64, add_sint64_list, get_sint64_list;
    Fixed32Kind: u32 => add_fixed32, get_fixed32, get_fixed32_count, index_fixed32, add_fixed32_list, get_fixed32_list;
    Fixed64Kind: u64 => add_fixed64, get_fixed64, get_fixed64_count, index_fixed64, add_fixed64_list, get_fixed64_list;
    Sfixed32Kind: i32 => add_sfixed32, get_sfixed32, get_sfixed32_count, index_sfixed32, add_sfixed32_list, get_sfixed32_list;
    Sfixed64Kind: i64 => add_sfixed64, get_sfixed64, get_sfixed64_count, index_sfixed64, add_sfixed64_list, get_sfixed64_list;
    EntityIdKind: i64 => add_entity_id, get_entity_id, get_entity_id_count, index_entity_id, add_entity_id_list, get_entity_id_list;
    EnumKind: u32 => add_enum, get_enum, get_enum_count, index_enum, add_enum_list, get_enum_list;
}

impl SchemaObject {
    /// Create an empty object.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Parse a standalone object from its wire encoding.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if `buffer` is malformed.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self, SchemaError> {
        let mut object = Self::new();
        object.merge_from_buffer(buffer)?;
        Ok(object)
    }

    /// Returns `true` if no field has any occurrence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove every occurrence of every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Remove every occurrence of `field_id`.
    pub fn clear_field(&mut self, field_id: FieldId) {
        self.fields.remove(&field_id);
    }

    /// Field ids that currently hold at least one occurrence, ascending.
    #[must_use]
    pub fn unique_field_ids(&self) -> Vec<FieldId> {
        self.fields.keys().copied().collect()
    }

    fn push(&mut self, field_id: FieldId, value: Value) {
        self.fields.entry(field_id).or_default().push(value);
    }

    fn occurrences(&self, field_id: FieldId) -> &[Value] {
        self.fields.get(&field_id).map(Vec::as_slice).unwrap_or_default()
    }

    fn scalars<'a, K: ScalarKind + 'a>(&'a self, field_id: FieldId) -> impl Iterator<Item = K::Value> + 'a {
        self.occurrences(field_id).iter().filter_map(K::decode)
    }

    fn encoded(&self, field_id: FieldId) -> impl Iterator<Item = &Encoded> + '_ {
        self.occurrences(field_id).iter().filter_map(|value| match value {
            Value::Encoded(encoded) => Some(encoded),
            _ => None,
        })
    }

    fn objects(
        &self,
        field_id: FieldId,
    ) -> impl Iterator<Item = Result<&SchemaObject, SchemaError>> + '_ {
        self.occurrences(field_id)
            .iter()
            .filter_map(|value| match value {
                Value::Object(object) => Some(Ok(object)),
                Value::Encoded(encoded) => Some(encoded.object()),
                _ => None,
            })
    }

    // ── Bytes ────────────────────────────────────────────────────────────────

    /// Append a bytes occurrence.
    pub fn add_bytes(&mut self, field_id: FieldId, value: &[u8]) {
        self.push(field_id, Value::Encoded(Encoded::new(value.to_vec())));
    }

    /// Last bytes occurrence, or an empty slice.
    #[must_use]
    pub fn get_bytes(&self, field_id: FieldId) -> &[u8] {
        self.encoded(field_id)
            .last()
            .map_or(&[], |encoded| encoded.bytes.as_slice())
    }

    /// Number of bytes occurrences.
    #[must_use]
    pub fn get_bytes_count(&self, field_id: FieldId) -> u32 {
        self.encoded(field_id).count() as u32
    }

    /// Bytes occurrence `index`, or an empty slice if out of range.
    #[must_use]
    pub fn index_bytes(&self, field_id: FieldId, index: u32) -> &[u8] {
        self.encoded(field_id)
            .nth(index as usize)
            .map_or(&[], |encoded| encoded.bytes.as_slice())
    }

    /// Append several bytes occurrences in order.
    pub fn add_bytes_list<B: AsRef<[u8]>>(&mut self, field_id: FieldId, values: &[B]) {
        for value in values {
            self.add_bytes(field_id, value.as_ref());
        }
    }

    /// All bytes occurrences in order.
    #[must_use]
    pub fn get_bytes_list(&self, field_id: FieldId) -> Vec<&[u8]> {
        self.encoded(field_id)
            .map(|encoded| encoded.bytes.as_slice())
            .collect()
    }

    // ── String ───────────────────────────────────────────────────────────────

    /// Append a string occurrence, stored as UTF-8 bytes without a terminator.
    pub fn add_string(&mut self, field_id: FieldId, value: &str) {
        self.add_bytes(field_id, value.as_bytes());
    }

    /// Last string occurrence, or `""`. Invalid UTF-8 is replaced lossily.
    #[must_use]
    pub fn get_string(&self, field_id: FieldId) -> String {
        String::from_utf8_lossy(self.get_bytes(field_id)).into_owned()
    }

    /// Number of string occurrences.
    #[must_use]
    pub fn get_string_count(&self, field_id: FieldId) -> u32 {
        self.get_bytes_count(field_id)
    }

    /// String occurrence `index`, or `""` if out of range.
    #[must_use]
    pub fn index_string(&self, field_id: FieldId, index: u32) -> String {
        String::from_utf8_lossy(self.index_bytes(field_id, index)).into_owned()
    }

    /// Append several string occurrences in order.
    pub fn add_string_list<S: AsRef<str>>(&mut self, field_id: FieldId, values: &[S]) {
        for value in values {
            self.add_string(field_id, value.as_ref());
        }
    }

    /// All string occurrences in order.
    #[must_use]
    pub fn get_string_list(&self, field_id: FieldId) -> Vec<String> {
        self.encoded(field_id)
            .map(|encoded| String::from_utf8_lossy(&encoded.bytes).into_owned())
            .collect()
    }

    // ── Objects ──────────────────────────────────────────────────────────────

    /// Append an empty nested object and return it for writing.
    pub fn add_object(&mut self, field_id: FieldId) -> &mut SchemaObject {
        let values = self.fields.entry(field_id).or_default();
        values.push(Value::Object(SchemaObject::new()));
        match values.last_mut() {
            Some(Value::Object(object)) => object,
            _ => unreachable!("an object occurrence was pushed immediately above"),
        }
    }

    /// Append a map entry object. Write the key at [`MAP_KEY_FIELD_ID`] and
    /// the value at [`MAP_VALUE_FIELD_ID`].
    pub fn add_map_entry(&mut self, field_id: FieldId) -> &mut SchemaObject {
        self.add_object(field_id)
    }

    /// Last nested object, or an empty object if the field is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if the occurrence arrived
    /// from a buffer and does not parse as an object.
    pub fn get_object(&self, field_id: FieldId) -> Result<&SchemaObject, SchemaError> {
        self.objects(field_id).last().unwrap_or(Ok(&EMPTY_OBJECT))
    }

    /// Number of occurrences readable as objects.
    #[must_use]
    pub fn get_object_count(&self, field_id: FieldId) -> u32 {
        self.objects(field_id).count() as u32
    }

    /// Nested object `index`, or an empty object if out of range.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if the occurrence does not
    /// parse as an object.
    pub fn index_object(&self, field_id: FieldId, index: u32) -> Result<&SchemaObject, SchemaError> {
        self.objects(field_id)
            .nth(index as usize)
            .unwrap_or(Ok(&EMPTY_OBJECT))
    }

    /// All nested objects in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError::Deserialization`] encountered.
    pub fn get_object_list(&self, field_id: FieldId) -> Result<Vec<&SchemaObject>, SchemaError> {
        self.objects(field_id).collect()
    }

    // ── Serialisation ────────────────────────────────────────────────────────

    /// Encode the whole object tree.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Serialization`] if any field id in the tree is
    /// outside `1..=MAX_FIELD_ID`.
    pub fn serialize(&self) -> Result<Vec<u8>, SchemaError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), SchemaError> {
        for (&field_id, values) in &self.fields {
            if field_id == 0 || field_id > MAX_FIELD_ID {
                return Err(SchemaError::Serialization(format!(
                    "field id {field_id} outside 1..={MAX_FIELD_ID}"
                )));
            }
            for value in values {
                match value {
                    Value::Varint(v) => {
                        write_tag(field_id, WireType::Varint, out);
                        write_varint(*v, out);
                    }
                    Value::Fixed32(w) => {
                        write_tag(field_id, WireType::Fixed32, out);
                        out.extend_from_slice(&w.to_le_bytes());
                    }
                    Value::Fixed64(w) => {
                        write_tag(field_id, WireType::Fixed64, out);
                        out.extend_from_slice(&w.to_le_bytes());
                    }
                    Value::Encoded(encoded) => {
                        write_tag(field_id, WireType::LengthDelimited, out);
                        write_length_delimited(&encoded.bytes, out);
                    }
                    Value::Object(object) => {
                        let mut nested = Vec::new();
                        object.write_to(&mut nested)?;
                        write_tag(field_id, WireType::LengthDelimited, out);
                        write_length_delimited(&nested, out);
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse `buffer` and append its occurrences to this object.
    ///
    /// The object is left untouched if parsing fails.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if `buffer` is malformed.
    pub fn merge_from_buffer(&mut self, buffer: &[u8]) -> Result<(), SchemaError> {
        let mut parsed = Vec::new();
        let mut reader = Reader::new(buffer);
        while !reader.is_empty() {
            let (field_id, wire_type) = reader.read_tag()?;
            let value = match wire_type {
                WireType::Varint => Value::Varint(reader.read_varint()?),
                WireType::Fixed32 => Value::Fixed32(reader.read_fixed32()?),
                WireType::Fixed64 => Value::Fixed64(reader.read_fixed64()?),
                WireType::LengthDelimited => {
                    Value::Encoded(Encoded::new(reader.read_length_delimited()?.to_vec()))
                }
            };
            parsed.push((field_id, value));
        }
        for (field_id, value) in parsed {
            self.push(field_id, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reparse(object: &SchemaObject) -> SchemaObject {
        SchemaObject::from_buffer(&object.serialize().unwrap()).unwrap()
    }

    #[test]
    fn test_missing_fields_read_as_zero() {
        let object = SchemaObject::new();
        assert_eq!(object.get_float(1), 0.0);
        assert_eq!(object.get_int64(1), 0);
        assert!(!object.get_bool(1));
        assert_eq!(object.get_string(1), "");
        assert!(object.get_bytes(1).is_empty());
        assert_eq!(object.get_uint32_count(1), 0);
        assert!(object.get_object(1).unwrap().is_empty());
    }

    #[test]
    fn test_get_returns_last_occurrence() {
        let mut object = SchemaObject::new();
        object.add_int32(3, 10);
        object.add_int32(3, -20);
        assert_eq!(object.get_int32(3), -20);
        assert_eq!(object.get_int32_count(3), 2);
        assert_eq!(object.index_int32(3, 0), 10);
        assert_eq!(object.index_int32(3, 5), 0);
    }

    #[test]
    fn test_all_scalar_kinds_survive_serialisation() {
        let mut object = SchemaObject::new();
        object.add_float(1, 1.5);
        object.add_double(2, -2.25);
        object.add_bool(3, true);
        object.add_int32(4, -7);
        object.add_int64(5, i64::MIN);
        object.add_uint32(6, u32::MAX);
        object.add_uint64(7, u64::MAX);
        object.add_sint32(8, -123);
        object.add_sint64(9, -456_789);
        object.add_fixed32(10, 0xdead_beef);
        object.add_fixed64(11, 0x0123_4567_89ab_cdef);
        object.add_sfixed32(12, -99);
        object.add_sfixed64(13, -999);
        object.add_entity_id(14, 42);
        object.add_enum(15, 3);
        object.add_bytes(16, &[0, 1, 2]);
        object.add_string(17, "héllo");

        let restored = reparse(&object);
        assert_eq!(restored.get_float(1), 1.5);
        assert_eq!(restored.get_double(2), -2.25);
        assert!(restored.get_bool(3));
        assert_eq!(restored.get_int32(4), -7);
        assert_eq!(restored.get_int64(5), i64::MIN);
        assert_eq!(restored.get_uint32(6), u32::MAX);
        assert_eq!(restored.get_uint64(7), u64::MAX);
        assert_eq!(restored.get_sint32(8), -123);
        assert_eq!(restored.get_sint64(9), -456_789);
        assert_eq!(restored.get_fixed32(10), 0xdead_beef);
        assert_eq!(restored.get_fixed64(11), 0x0123_4567_89ab_cdef);
        assert_eq!(restored.get_sfixed32(12), -99);
        assert_eq!(restored.get_sfixed64(13), -999);
        assert_eq!(restored.get_entity_id(14), 42);
        assert_eq!(restored.get_enum(15), 3);
        assert_eq!(restored.get_bytes(16), &[0, 1, 2]);
        assert_eq!(restored.get_string(17), "héllo");
        assert_eq!(restored.unique_field_ids(), (1..=17).collect::<Vec<_>>());
    }

    #[test]
    fn test_lists_keep_order() {
        let mut object = SchemaObject::new();
        object.add_double_list(1, &[3.0, 1.0, 2.0]);
        object.add_string_list(2, &["a", "b"]);
        let restored = reparse(&object);
        assert_eq!(restored.get_double_list(1), vec![3.0, 1.0, 2.0]);
        assert_eq!(restored.get_string_list(2), vec!["a", "b"]);
        assert_eq!(restored.index_string(2, 1), "b");
    }

    #[test]
    fn test_mismatched_kind_is_invisible() {
        let mut object = SchemaObject::new();
        object.add_float(1, 2.0);
        assert_eq!(object.get_uint64_count(1), 0);
        assert_eq!(object.get_float_count(1), 1);
    }

    #[test]
    fn test_nested_objects() {
        let mut object = SchemaObject::new();
        let child = object.add_object(5);
        child.add_uint32(1, 7);
        child.add_object(2).add_string(1, "deep");
        object.add_object(5).add_uint32(1, 8);

        let restored = reparse(&object);
        assert_eq!(restored.get_object_count(5), 2);
        let first = restored.index_object(5, 0).unwrap();
        assert_eq!(first.get_uint32(1), 7);
        assert_eq!(first.get_object(2).unwrap().get_string(1), "deep");
        assert_eq!(restored.get_object(5).unwrap().get_uint32(1), 8);
    }

    #[test]
    fn test_map_entries_use_key_and_value_fields() {
        let mut object = SchemaObject::new();
        let entry = object.add_map_entry(1);
        entry.add_string(MAP_KEY_FIELD_ID, "hp");
        entry.add_int32(MAP_VALUE_FIELD_ID, 100);

        let restored = reparse(&object);
        let entries = restored.get_object_list(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get_string(MAP_KEY_FIELD_ID), "hp");
        assert_eq!(entries[0].get_int32(MAP_VALUE_FIELD_ID), 100);
    }

    #[test]
    fn test_bytes_that_are_not_an_object_fail_on_read() {
        let mut object = SchemaObject::new();
        object.add_bytes(1, &[0xff, 0xff, 0xff]);
        let err = object.get_object(1).unwrap_err();
        assert!(matches!(err, SchemaError::Deserialization(_)));
        // The failure is cached and reported again.
        assert_eq!(object.get_object(1).unwrap_err(), err);
        assert!(object.get_object_list(1).is_err());
    }

    #[test]
    fn test_invalid_field_id_fails_serialisation() {
        let mut object = SchemaObject::new();
        object.add_uint32(0, 1);
        assert!(matches!(
            object.serialize(),
            Err(SchemaError::Serialization(_))
        ));

        let mut nested = SchemaObject::new();
        nested.add_object(1).add_bool(MAX_FIELD_ID + 1, true);
        assert!(nested.serialize().is_err());
    }

    #[test]
    fn test_merge_appends_and_rejects_garbage() {
        let mut source = SchemaObject::new();
        source.add_uint32(1, 5);
        let bytes = source.serialize().unwrap();

        let mut target = SchemaObject::new();
        target.add_uint32(1, 4);
        target.merge_from_buffer(&bytes).unwrap();
        assert_eq!(target.get_uint32_list(1), vec![4, 5]);

        assert!(target.merge_from_buffer(&[0x08]).is_err());
        assert_eq!(target.get_uint32_count(1), 2);
    }

    #[test]
    fn test_clear_field() {
        let mut object = SchemaObject::new();
        object.add_bool(1, true);
        object.add_bool(2, true);
        object.clear_field(1);
        assert_eq!(object.unique_field_ids(), vec![2]);
        object.clear();
        assert!(object.is_empty());
    }
}
