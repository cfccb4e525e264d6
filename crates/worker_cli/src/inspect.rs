//! Snapshot inspection.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use worker_component::{Entity, EntityId, VtableRegistry};
use worker_snapshot::{SnapshotInputStream, SnapshotParameters};

#[derive(Debug, Serialize)]
struct EntityLine {
    entity_id: i64,
    components: Vec<ComponentLine>,
}

#[derive(Debug, Serialize)]
struct ComponentLine {
    component_id: u32,
    field_ids: Vec<u32>,
    encoded_bytes: usize,
}

fn entity_line(entity_id: EntityId, entity: &Entity, vtables: &VtableRegistry) -> Result<EntityLine> {
    let components = entity
        .iter()
        .map(|data| {
            let schema = data.to_schema(vtables)?;
            let fields = schema.fields();
            Ok(ComponentLine {
                component_id: data.component_id().0,
                field_ids: fields.unique_field_ids(),
                encoded_bytes: fields.serialize()?.len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(EntityLine {
        entity_id: entity_id.0,
        components,
    })
}

/// Read `path` and render each entity as one JSON object.
///
/// # Errors
///
/// Fails on the first unreadable entity.
pub fn entity_lines(path: &Path) -> Result<Vec<String>> {
    let parameters = SnapshotParameters::new();
    let input = SnapshotInputStream::open(path, &parameters)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;

    let mut lines = Vec::new();
    for entry in input {
        let (entity_id, entity) = entry?;
        lines.push(serde_json::to_string(&entity_line(entity_id, &entity, &parameters.vtables)?)?);
    }
    info!(entities = lines.len(), "snapshot inspected");
    Ok(lines)
}
