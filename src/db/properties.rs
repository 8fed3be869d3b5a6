//! Properties and their parent/child tree. The tree is a nullable
//! `parent_property_id` plus an index on it; children are always queried.
//! Deleting a property cascades through its whole subtree.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{clean_name, ensure_exists, expect_changed, now, require, timestamps_at};
use super::query::{order_clause, search_param, Direction};
use crate::error::{ModelError, ModelResult};
use crate::models::{Property, PropertyDraft, RecordId, Timestamps};

const ENTITY: &str = "property";
const SELECT: &str = "SELECT p.id, p.name, p.node_id, p.parent_property_id, p.created, p.modified
     FROM properties p
     INNER JOIN nodes n ON n.id = p.node_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PropertyOrder {
    #[default]
    Name,
    Node,
    Created,
    Modified,
}

/// Which part of the tree a property list covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    #[default]
    Any,
    /// Only properties without a parent.
    Roots,
    /// Only direct children of the given property.
    ChildrenOf(RecordId),
}

#[derive(Debug, Clone, Default)]
pub struct PropertyQuery {
    pub node_id: Option<RecordId>,
    pub parent: ParentFilter,
    pub name_contains: Option<String>,
    pub order: PropertyOrder,
    pub direction: Direction,
}

pub(crate) fn map_property(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        node_id: row.get(2)?,
        parent_property_id: row.get(3)?,
        timestamps: timestamps_at(row, 4)?,
    })
}

/// Properties matching `query`.
pub fn fetch_properties(conn: &Connection, query: &PropertyQuery) -> ModelResult<Vec<Property>> {
    let order = match query.order {
        PropertyOrder::Name => order_clause("p.name COLLATE NOCASE", query.direction, "p.id"),
        PropertyOrder::Node => order_clause(
            "n.name COLLATE NOCASE",
            query.direction,
            "p.name COLLATE NOCASE, p.id",
        ),
        PropertyOrder::Created => order_clause("p.created", query.direction, "p.id"),
        PropertyOrder::Modified => order_clause("p.modified", query.direction, "p.id"),
    };
    let (roots_only, parent_id) = match query.parent {
        ParentFilter::Any => (false, None),
        ParentFilter::Roots => (true, None),
        ParentFilter::ChildrenOf(id) => (false, Some(id)),
    };
    let sql = format!(
        "{SELECT}
         WHERE (?1 IS NULL OR p.node_id = ?1)
           AND (?2 = 0 OR p.parent_property_id IS NULL)
           AND (?3 IS NULL OR p.parent_property_id = ?3)
           AND (?4 IS NULL OR INSTR(LOWER(p.name), LOWER(?4)) > 0)
         {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let properties = stmt
        .query_map(
            params![
                query.node_id,
                roots_only,
                parent_id,
                search_param(&query.name_contains)
            ],
            map_property,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(properties)
}

/// Properties belonging to a node, by name.
pub fn fetch_properties_for_node(
    conn: &Connection,
    node_id: RecordId,
) -> ModelResult<Vec<Property>> {
    fetch_properties(
        conn,
        &PropertyQuery {
            node_id: Some(node_id),
            ..PropertyQuery::default()
        },
    )
}

/// Direct children of a property, by name.
pub fn fetch_child_properties(
    conn: &Connection,
    property_id: RecordId,
) -> ModelResult<Vec<Property>> {
    fetch_properties(
        conn,
        &PropertyQuery {
            parent: ParentFilter::ChildrenOf(property_id),
            ..PropertyQuery::default()
        },
    )
}

/// A property by id.
pub fn fetch_property(conn: &Connection, id: RecordId) -> ModelResult<Option<Property>> {
    let found = conn
        .query_row(&format!("{SELECT} WHERE p.id = ?1"), params![id], map_property)
        .optional()?;
    Ok(found)
}

/// The parent of a property, if it has one.
pub fn fetch_parent_property(
    conn: &Connection,
    property: &Property,
) -> ModelResult<Option<Property>> {
    match property.parent_property_id {
        Some(parent_id) => fetch_property(conn, parent_id),
        None => Ok(None),
    }
}

/// Walk up from `start` and report whether `target` is on the way to the root.
fn is_ancestor_or_self(
    conn: &Connection,
    start: RecordId,
    target: RecordId,
) -> ModelResult<bool> {
    let mut cursor = Some(start);
    let mut steps = 0usize;
    while let Some(current) = cursor {
        if current == target {
            return Ok(true);
        }
        steps += 1;
        if steps > 10_000 {
            // Only reachable if the table already holds a cycle.
            return Ok(true);
        }
        cursor = conn
            .query_row(
                "SELECT parent_property_id FROM properties WHERE id = ?1",
                params![current],
                |row| row.get::<_, Option<RecordId>>(0),
            )
            .optional()?
            .flatten();
    }
    Ok(false)
}

struct PropertyColumns {
    name: String,
    node_id: RecordId,
    parent_property_id: Option<RecordId>,
}

fn validate(
    conn: &Connection,
    id: Option<RecordId>,
    draft: &PropertyDraft,
) -> ModelResult<PropertyColumns> {
    let name = clean_name(ENTITY, &draft.name)?;
    let node_id = require(ENTITY, "node", draft.node_id)?;
    ensure_exists(conn, "nodes", ENTITY, "node", node_id)?;

    if let Some(parent_id) = draft.parent_property_id {
        ensure_exists(conn, "properties", ENTITY, "parent_property", parent_id)?;
        if let Some(id) = id {
            if is_ancestor_or_self(conn, parent_id, id)? {
                return Err(ModelError::ReferentialIntegrityViolation {
                    entity: ENTITY,
                    field: "parent_property",
                    reason: format!("property {parent_id} is {id} itself or one of its descendants"),
                });
            }
        }
    }

    Ok(PropertyColumns {
        name,
        node_id,
        parent_property_id: draft.parent_property_id,
    })
}

/// Insert a property under an existing node, optionally below a parent.
pub fn create_property(conn: &Connection, draft: &PropertyDraft) -> ModelResult<Property> {
    let tx = conn.unchecked_transaction()?;
    let columns = validate(&tx, None, draft)?;
    let stamp = now();
    tx.execute(
        "INSERT INTO properties (created, modified, name, node_id, parent_property_id)
         VALUES (?1, ?1, ?2, ?3, ?4)",
        params![stamp, columns.name, columns.node_id, columns.parent_property_id],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, node_id = columns.node_id, "created property");
    Ok(Property {
        id,
        name: columns.name,
        node_id: columns.node_id,
        parent_property_id: columns.parent_property_id,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Overwrite a property. A parent that would form a cycle is rejected.
pub fn update_property(
    conn: &Connection,
    id: RecordId,
    draft: &PropertyDraft,
) -> ModelResult<Property> {
    let tx = conn.unchecked_transaction()?;
    let columns = validate(&tx, Some(id), draft)?;
    let changed = tx
        .execute(
            "UPDATE properties
             SET name = ?1, node_id = ?2, parent_property_id = ?3, modified = ?4
             WHERE id = ?5",
            params![
                columns.name,
                columns.node_id,
                columns.parent_property_id,
                now(),
                id
            ],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;
    let property = fetch_property(&tx, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    tx.commit()?;

    info!(id, "updated property");
    Ok(property)
}

/// Point a property at a new parent (or detach it with `None`).
pub fn set_parent_property(
    conn: &Connection,
    id: RecordId,
    parent_property_id: Option<RecordId>,
) -> ModelResult<Property> {
    let current = fetch_property(conn, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    update_property(
        conn,
        id,
        &PropertyDraft {
            name: current.name,
            node_id: Some(current.node_id),
            parent_property_id,
        },
    )
}

/// Deletes the property, its station slots and every descendant property.
pub fn delete_property(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM properties WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted property");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_kingdom, create_node, create_territory, open_in_memory};
    use crate::models::{NodeDraft, TerritoryDraft};

    fn node(conn: &Connection) -> RecordId {
        let kingdom = create_kingdom(conn, "Calpheon").unwrap();
        let territory = create_territory(
            conn,
            &TerritoryDraft {
                name: "Calpheon".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        create_node(
            conn,
            &NodeDraft {
                name: "Calpheon City".to_string(),
                territory_id: Some(territory.id),
                is_hub: true,
                ..NodeDraft::default()
            },
        )
        .unwrap()
        .id
    }

    fn property(conn: &Connection, node_id: RecordId, name: &str, parent: Option<RecordId>) -> Property {
        create_property(
            conn,
            &PropertyDraft {
                name: name.to_string(),
                node_id: Some(node_id),
                parent_property_id: parent,
            },
        )
        .unwrap()
    }

    #[test]
    fn cycles_are_rejected() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn);
        let root = property(&conn, node_id, "2-1", None);
        let child = property(&conn, node_id, "2-2", Some(root.id));
        let grandchild = property(&conn, node_id, "2-3", Some(child.id));

        let err = set_parent_property(&conn, root.id, Some(grandchild.id)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation {
                field: "parent_property",
                ..
            }
        ));
        let err = set_parent_property(&conn, root.id, Some(root.id)).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrityViolation { .. }));
        assert!(fetch_property(&conn, root.id).unwrap().unwrap().parent_property_id.is_none());
    }

    #[test]
    fn deleting_a_parent_removes_the_subtree() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn);
        let root = property(&conn, node_id, "2-1", None);
        let child = property(&conn, node_id, "2-2", Some(root.id));
        property(&conn, node_id, "2-3", Some(child.id));
        let other = property(&conn, node_id, "3-1", None);

        delete_property(&conn, root.id).unwrap();
        let left = fetch_properties_for_node(&conn, node_id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, other.id);
    }

    #[test]
    fn roots_filter() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn);
        let root = property(&conn, node_id, "2-1", None);
        property(&conn, node_id, "2-2", Some(root.id));

        let roots = fetch_properties(
            &conn,
            &PropertyQuery {
                parent: ParentFilter::Roots,
                ..PropertyQuery::default()
            },
        )
        .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, root.id);

        let detached = set_parent_property(&conn, root.id, None).unwrap();
        assert_eq!(detached.parent_property_id, None);
    }

    #[test]
    fn dangling_parent_is_rejected() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn);
        let err = create_property(
            &conn,
            &PropertyDraft {
                name: "Lost".to_string(),
                node_id: Some(node_id),
                parent_property_id: Some(77),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrityViolation { .. }));
    }
}
