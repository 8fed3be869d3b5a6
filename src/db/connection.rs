use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Table definitions in dependency order. Every foreign key cascades on delete,
/// including the property self-reference, so removing a parent takes its whole
/// subtree with it.
const TABLES: &[(&str, &str)] = &[
    (
        "kingdoms",
        "CREATE TABLE IF NOT EXISTS kingdoms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL
        )",
    ),
    (
        "territories",
        "CREATE TABLE IF NOT EXISTS territories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL,
            kingdom_id INTEGER NOT NULL,
            FOREIGN KEY(kingdom_id) REFERENCES kingdoms(id) ON DELETE CASCADE
        )",
    ),
    (
        "nodes",
        "CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL,
            territory_id INTEGER NOT NULL,
            is_hub INTEGER NOT NULL DEFAULT 0,
            contribution_cost INTEGER CHECK (contribution_cost IS NULL OR contribution_cost >= 0),
            node_manager TEXT CHECK (node_manager IS NULL OR TRIM(node_manager) <> ''),
            FOREIGN KEY(territory_id) REFERENCES territories(id) ON DELETE CASCADE
        )",
    ),
    (
        "node_links",
        "CREATE TABLE IF NOT EXISTS node_links (
            low_node_id INTEGER NOT NULL,
            high_node_id INTEGER NOT NULL,
            PRIMARY KEY (low_node_id, high_node_id),
            CHECK (low_node_id <= high_node_id),
            FOREIGN KEY(low_node_id) REFERENCES nodes(id) ON DELETE CASCADE,
            FOREIGN KEY(high_node_id) REFERENCES nodes(id) ON DELETE CASCADE
        )",
    ),
    (
        "materials",
        "CREATE TABLE IF NOT EXISTS materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL
        )",
    ),
    (
        "stations",
        "CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL
        )",
    ),
    (
        "resources",
        "CREATE TABLE IF NOT EXISTS resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            material_id INTEGER NOT NULL,
            node_id INTEGER NOT NULL,
            contribution_cost INTEGER NOT NULL CHECK (contribution_cost >= 0),
            FOREIGN KEY(material_id) REFERENCES materials(id) ON DELETE CASCADE,
            FOREIGN KEY(node_id) REFERENCES nodes(id) ON DELETE CASCADE
        )",
    ),
    (
        "properties",
        "CREATE TABLE IF NOT EXISTS properties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL,
            node_id INTEGER NOT NULL,
            parent_property_id INTEGER,
            FOREIGN KEY(node_id) REFERENCES nodes(id) ON DELETE CASCADE,
            FOREIGN KEY(parent_property_id) REFERENCES properties(id) ON DELETE CASCADE
        )",
    ),
    (
        "property_stations",
        "CREATE TABLE IF NOT EXISTS property_stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            property_id INTEGER NOT NULL,
            station_id INTEGER NOT NULL,
            max_level INTEGER NOT NULL CHECK (max_level >= 0),
            UNIQUE (property_id, station_id),
            FOREIGN KEY(property_id) REFERENCES properties(id) ON DELETE CASCADE,
            FOREIGN KEY(station_id) REFERENCES stations(id) ON DELETE CASCADE
        )",
    ),
    (
        "recipes",
        "CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            name TEXT NOT NULL,
            station_id INTEGER NOT NULL,
            FOREIGN KEY(station_id) REFERENCES stations(id) ON DELETE CASCADE
        )",
    ),
    (
        "recipe_inputs",
        "CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, material_id),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(material_id) REFERENCES materials(id) ON DELETE CASCADE
        )",
    ),
    (
        "recipe_outputs",
        "CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, material_id),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(material_id) REFERENCES materials(id) ON DELETE CASCADE
        )",
    ),
];

/// Indexes on the foreign key columns used by reverse traversals.
const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_territories_kingdom_id ON territories(kingdom_id)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_territory_id ON nodes(territory_id)",
    "CREATE INDEX IF NOT EXISTS idx_node_links_high_node_id ON node_links(high_node_id)",
    "CREATE INDEX IF NOT EXISTS idx_resources_node_id ON resources(node_id)",
    "CREATE INDEX IF NOT EXISTS idx_resources_material_id ON resources(material_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_node_id ON properties(node_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_parent_property_id ON properties(parent_property_id)",
    "CREATE INDEX IF NOT EXISTS idx_property_stations_station_id ON property_stations(station_id)",
    "CREATE INDEX IF NOT EXISTS idx_recipes_station_id ON recipes(station_id)",
    "CREATE INDEX IF NOT EXISTS idx_recipe_inputs_material_id ON recipe_inputs(material_id)",
    "CREATE INDEX IF NOT EXISTS idx_recipe_outputs_material_id ON recipe_outputs(material_id)",
];

/// Open (creating if needed) the database file at `path` and bring its schema
/// up to date.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;
    ensure_schema(&conn)?;
    info!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Scratch database used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Run lazy migrations on an open connection. Foreign keys are a per-connection
/// setting in SQLite, so this also switches them on; without it none of the
/// cascades fire.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    for (name, sql) in TABLES {
        conn.execute(sql, [])
            .with_context(|| format!("failed to create {name} table"))?;
    }

    for sql in INDEXES {
        conn.execute(sql, []).context("failed to create index")?;
    }

    debug!(tables = TABLES.len(), "schema ensured");
    Ok(())
}

/// Row count per table, in schema order. Backs the `summary` command.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    TABLES
        .iter()
        .map(|(name, _)| {
            let count = conn
                .query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))
                .with_context(|| format!("failed to count {name}"))?;
            Ok((*name, count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let counts = table_counts(&conn).unwrap();
        assert_eq!(counts.len(), TABLES.len());
        assert!(counts.iter().all(|(_, count)| *count == 0));
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_in_memory().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
