use rusqlite::Connection;

use super::named::NamedTable;
use super::query::NamedQuery;
use crate::error::ModelResult;
use crate::models::{Material, RecordId, Timestamps};

const MATERIALS: NamedTable<Material> = NamedTable {
    table: "materials",
    entity: "material",
    build: build_material,
};

fn build_material(id: RecordId, name: String, timestamps: Timestamps) -> Material {
    Material {
        id,
        name,
        timestamps,
    }
}

/// Materials matching `query`, in its order.
pub fn fetch_materials(conn: &Connection, query: &NamedQuery) -> ModelResult<Vec<Material>> {
    MATERIALS.list(conn, query)
}

/// A material by id.
pub fn fetch_material(conn: &Connection, id: RecordId) -> ModelResult<Option<Material>> {
    MATERIALS.get(conn, id)
}

/// Insert a material with a trimmed, non-empty name.
pub fn create_material(conn: &Connection, name: &str) -> ModelResult<Material> {
    MATERIALS.create(conn, name)
}

/// Rename a material.
pub fn update_material(conn: &Connection, id: RecordId, name: &str) -> ModelResult<Material> {
    MATERIALS.update(conn, id, name)
}

/// Deleting a material removes its resources and drops it from every recipe's
/// input and output sets.
pub fn delete_material(conn: &Connection, id: RecordId) -> ModelResult<()> {
    MATERIALS.delete(conn, id)
}
