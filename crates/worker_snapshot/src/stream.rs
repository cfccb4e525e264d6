//! Snapshot input and output streams.
//!
//! ## Format
//!
//! ```text
//! "WSNP"            4-byte magic
//! u32 LE            format version (1)
//! repeated:
//!   varint          record length
//!   schema object   field 1: entity id (entity_id)
//!                   field 2: component objects, each
//!                            {1: component id (uint32), 2: fields object}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use worker_component::{ComponentData, ComponentId, Entity, EntityId, VtableRegistry};
use worker_interop::{
    CallbackHandle, CallbackTable, SnapshotParameters, SnapshotParametersAbi,
    with_snapshot_parameters,
};
use worker_schema::{SchemaComponentData, SchemaObject, wire};

use crate::error::SnapshotError;

/// File magic.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"WSNP";

/// Current format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Upper bound on a single encoded entity, guarding against corrupt lengths.
pub const MAX_RECORD_BYTES: u64 = 64 * 1024 * 1024;

const ENTITY_ID_FIELD: u32 = 1;
const COMPONENT_FIELD: u32 = 2;
const COMPONENT_ID_FIELD: u32 = 1;
const COMPONENT_FIELDS_FIELD: u32 = 2;

/// The codecs a stream was opened with, registered for the stream's
/// lifetime.
#[derive(Debug)]
struct Codecs {
    table: CallbackTable,
    handles: Vec<CallbackHandle>,
    /// Resolved back out of `table` through the converted parameters.
    vtables: VtableRegistry,
}

impl Codecs {
    fn register(parameters: &SnapshotParameters) -> Self {
        let mut table = CallbackTable::new();
        let (abi, handles) = with_snapshot_parameters(parameters, &mut table, |abi| abi.clone());
        let vtables = resolve(&abi, &table);
        debug!(vtables = handles.len(), "snapshot codecs registered");
        Self {
            table,
            handles,
            vtables,
        }
    }

    fn release(&mut self) {
        self.table.release_all(std::mem::take(&mut self.handles));
    }
}

impl Drop for Codecs {
    fn drop(&mut self) {
        self.release();
    }
}

fn resolve(abi: &SnapshotParametersAbi, table: &CallbackTable) -> VtableRegistry {
    let mut vtables = VtableRegistry::new();
    for entry in &abi.component_vtables {
        if let Some(vtable) = table.get(entry.user_data) {
            vtables = vtables.with_vtable(ComponentId(entry.component_id), vtable.clone());
        }
    }
    if let Some(vtable) = abi.default_vtable.and_then(|entry| table.get(entry.user_data)) {
        vtables = vtables.with_default(vtable.clone());
    }
    vtables
}

fn format_error(message: impl Into<String>) -> SnapshotError {
    SnapshotError::Format(message.into())
}

/// Writes entities to a snapshot file.
#[derive(Debug)]
pub struct SnapshotOutputStream {
    writer: BufWriter<File>,
    codecs: Codecs,
    path: PathBuf,
    written: u64,
}

impl SnapshotOutputStream {
    /// Create (or truncate) `path` and write the header.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the file cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        parameters: &SnapshotParameters,
    ) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        info!(path = %path.display(), "snapshot output opened");
        Ok(Self {
            writer,
            codecs: Codecs::register(parameters),
            path,
            written: 0,
        })
    }

    /// Append one entity.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Format`] for a non-positive entity id or
    /// unencodable component data, [`SnapshotError::Vtable`] if a handle
    /// cannot be serialized, and [`SnapshotError::Io`] on write failure.
    pub fn write_entity(&mut self, entity_id: EntityId, entity: &Entity) -> Result<(), SnapshotError> {
        if !entity_id.is_valid() {
            return Err(format_error(format!("cannot write {entity_id}: ids must be positive")));
        }

        let mut record = SchemaObject::new();
        record.add_entity_id(ENTITY_ID_FIELD, entity_id.0);
        for data in entity.iter() {
            let schema = data.to_schema(&self.codecs.vtables)?;
            let component = record.add_object(COMPONENT_FIELD);
            component.add_uint32(COMPONENT_ID_FIELD, data.component_id().0);
            *component.add_object(COMPONENT_FIELDS_FIELD) = schema.fields().clone();
        }
        let bytes = record
            .serialize()
            .map_err(|e| format_error(format!("{entity_id}: {e}")))?;

        let mut header = Vec::with_capacity(10);
        wire::write_varint(bytes.len() as u64, &mut header);
        self.writer.write_all(&header)?;
        self.writer.write_all(&bytes)?;
        self.written += 1;
        debug!(%entity_id, components = entity.len(), "snapshot entity written");
        Ok(())
    }

    /// Number of entities written so far.
    #[must_use]
    pub fn entities_written(&self) -> u64 {
        self.written
    }

    /// Flush and close the stream.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if buffered data cannot be written.
    pub fn finish(mut self) -> Result<(), SnapshotError> {
        self.writer.flush()?;
        info!(path = %self.path.display(), entities = self.written, "snapshot output closed");
        Ok(())
    }
}

/// Reads entities back from a snapshot file.
///
/// As an [`Iterator`] the stream ends after the first error.
#[derive(Debug)]
pub struct SnapshotInputStream {
    reader: BufReader<File>,
    codecs: Codecs,
    /// Set once the reader lost its place in the file.
    misaligned: bool,
    /// Set once the iterator yielded an error.
    fused: bool,
}

impl SnapshotInputStream {
    /// Open `path` and validate the header.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the file cannot be opened and
    /// [`SnapshotError::Format`] on a bad magic or version.
    pub fn open(
        path: impl AsRef<Path>,
        parameters: &SnapshotParameters,
    ) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; 8];
        read_exact_or(&mut reader, &mut header, "truncated snapshot header")?;
        if &header[..4] != SNAPSHOT_MAGIC {
            return Err(format_error("not a snapshot file (bad magic)"));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(format_error(format!(
                "unsupported snapshot version {version}, expected {SNAPSHOT_VERSION}"
            )));
        }

        info!(path = %path.display(), "snapshot input opened");
        Ok(Self {
            reader,
            codecs: Codecs::register(parameters),
            misaligned: false,
            fused: false,
        })
    }

    /// Returns `true` if another record follows. Read errors are reported by
    /// the next [`read_entity`](Self::read_entity); after a truncated record,
    /// a bad record length or an I/O error this is always `false`.
    pub fn has_next(&mut self) -> bool {
        !self.misaligned && self.reader.fill_buf().map_or(true, |buf| !buf.is_empty())
    }

    /// Read the next entity.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Format`] on any corruption (truncated or
    /// oversized record, undecodable schema, missing or non-positive entity
    /// id, duplicated component) and [`SnapshotError::Vtable`] if a
    /// registered codec rejects a component. A record that fails to decode
    /// is skipped; once the record framing itself is broken every later call
    /// fails.
    pub fn read_entity(&mut self) -> Result<(EntityId, Entity), SnapshotError> {
        if self.misaligned {
            return Err(format_error("snapshot stream stopped after a framing error"));
        }
        let bytes = self.read_record().inspect_err(|e| {
            warn!(error = %e, "snapshot stream misaligned");
            self.misaligned = true;
        })?;
        self.decode_record(&bytes)
    }

    fn read_record(&mut self) -> Result<Vec<u8>, SnapshotError> {
        let len = read_record_length(&mut self.reader)?;
        if len > MAX_RECORD_BYTES {
            return Err(format_error(format!(
                "record of {len} bytes exceeds the {MAX_RECORD_BYTES} byte limit"
            )));
        }
        let mut bytes = vec![0u8; len as usize];
        read_exact_or(&mut self.reader, &mut bytes, "truncated entity record")?;
        Ok(bytes)
    }

    fn decode_record(&self, bytes: &[u8]) -> Result<(EntityId, Entity), SnapshotError> {
        let record = SchemaObject::from_buffer(bytes).map_err(|e| format_error(e.to_string()))?;
        let entity_id = EntityId(record.get_entity_id(ENTITY_ID_FIELD));
        if !entity_id.is_valid() {
            return Err(format_error(format!(
                "record has missing or non-positive entity id {}",
                entity_id.0
            )));
        }

        let mut entity = Entity::new();
        let components = record
            .get_object_list(COMPONENT_FIELD)
            .map_err(|e| format_error(format!("{entity_id}: {e}")))?;
        for component in components {
            let component_id = ComponentId(component.get_uint32(COMPONENT_ID_FIELD));
            let fields = component
                .get_object(COMPONENT_FIELDS_FIELD)
                .map_err(|e| format_error(format!("{entity_id} {component_id}: {e}")))?;
            let mut schema = SchemaComponentData::new(component_id.0);
            *schema.fields_mut() = fields.clone();

            let data = ComponentData::from_schema(schema);
            let vtables = &self.codecs.vtables;
            let data = if vtables.find_codec::<SchemaComponentData>(component_id).is_some() {
                ComponentData::from_user_handle(component_id, data.into_handle(vtables)?)
            } else {
                data
            };

            if entity.add(data).is_err() {
                return Err(format_error(format!(
                    "{entity_id} has {component_id} more than once"
                )));
            }
        }
        Ok((entity_id, entity))
    }
}

impl Iterator for SnapshotInputStream {
    type Item = Result<(EntityId, Entity), SnapshotError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused || !self.has_next() {
            return None;
        }
        let item = self.read_entity();
        self.fused = item.is_err();
        Some(item)
    }
}

fn read_exact_or(reader: &mut impl Read, buf: &mut [u8], message: &str) -> Result<(), SnapshotError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            format_error(message)
        } else {
            SnapshotError::Io(e)
        }
    })
}

fn read_record_length(reader: &mut impl Read) -> Result<u64, SnapshotError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let mut byte = [0u8; 1];
        read_exact_or(reader, &mut byte, "truncated record length")?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(format_error("record length varint too long"))
}
