use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{
    check_non_negative, clean_name, ensure_exists, expect_changed, now, require, timestamps_at,
};
use super::query::{order_clause, search_param, Direction};
use crate::error::{ModelError, ModelResult};
use crate::models::{Node, NodeDraft, RecordId, Timestamps, MAX_NAME_LEN};

const ENTITY: &str = "node";
const SELECT: &str = "SELECT n.id, n.name, n.territory_id, n.is_hub, n.contribution_cost,
            n.node_manager, n.created, n.modified
     FROM nodes n
     INNER JOIN territories t ON t.id = n.territory_id
     INNER JOIN kingdoms k ON k.id = t.kingdom_id";

/// Orderings offered by the node list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeOrder {
    #[default]
    Name,
    Territory,
    Kingdom,
    ContributionCost,
    Created,
    Modified,
}

/// Filters mirror the admin list: territory, hub flag, name search, plus the
/// kingdom reached through the territory.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub territory_id: Option<RecordId>,
    pub kingdom_id: Option<RecordId>,
    pub is_hub: Option<bool>,
    pub name_contains: Option<String>,
    pub order: NodeOrder,
    pub direction: Direction,
}

pub(crate) fn map_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        name: row.get(1)?,
        territory_id: row.get(2)?,
        is_hub: row.get(3)?,
        contribution_cost: row.get(4)?,
        node_manager: row.get(5)?,
        timestamps: timestamps_at(row, 6)?,
    })
}

/// Blank manager names are stored as NULL, never as an empty string. Applied
/// on every node write.
pub fn normalize_node_manager(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|manager| !manager.is_empty())
        .map(str::to_string)
}

/// Nodes matching every filter set on `query`.
pub fn fetch_nodes(conn: &Connection, query: &NodeQuery) -> ModelResult<Vec<Node>> {
    let by_name = "n.name COLLATE NOCASE, n.id";
    let order = match query.order {
        NodeOrder::Name => order_clause("n.name COLLATE NOCASE", query.direction, "n.id"),
        NodeOrder::Territory => order_clause("t.name COLLATE NOCASE", query.direction, by_name),
        NodeOrder::Kingdom => order_clause("k.name COLLATE NOCASE", query.direction, by_name),
        NodeOrder::ContributionCost => {
            order_clause("n.contribution_cost", query.direction, by_name)
        }
        NodeOrder::Created => order_clause("n.created", query.direction, "n.id"),
        NodeOrder::Modified => order_clause("n.modified", query.direction, "n.id"),
    };
    let sql = format!(
        "{SELECT}
         WHERE (?1 IS NULL OR n.territory_id = ?1)
           AND (?2 IS NULL OR t.kingdom_id = ?2)
           AND (?3 IS NULL OR n.is_hub = ?3)
           AND (?4 IS NULL OR INSTR(LOWER(n.name), LOWER(?4)) > 0)
         {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let nodes = stmt
        .query_map(
            params![
                query.territory_id,
                query.kingdom_id,
                query.is_hub,
                search_param(&query.name_contains)
            ],
            map_node,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}

/// Nodes located in a territory, by name.
pub fn fetch_nodes_for_territory(
    conn: &Connection,
    territory_id: RecordId,
) -> ModelResult<Vec<Node>> {
    fetch_nodes(
        conn,
        &NodeQuery {
            territory_id: Some(territory_id),
            ..NodeQuery::default()
        },
    )
}

/// A node by id.
pub fn fetch_node(conn: &Connection, id: RecordId) -> ModelResult<Option<Node>> {
    let found = conn
        .query_row(&format!("{SELECT} WHERE n.id = ?1"), params![id], map_node)
        .optional()?;
    Ok(found)
}

/// Validated, normalised column values for a node write.
struct NodeColumns {
    name: String,
    territory_id: RecordId,
    is_hub: bool,
    contribution_cost: Option<i64>,
    node_manager: Option<String>,
}

fn validate(conn: &Connection, draft: &NodeDraft) -> ModelResult<NodeColumns> {
    let name = clean_name(ENTITY, &draft.name)?;
    if let Some(cost) = draft.contribution_cost {
        check_non_negative(ENTITY, "contribution_cost", cost)?;
    }
    let node_manager = normalize_node_manager(draft.node_manager.as_deref());
    if let Some(manager) = &node_manager {
        if manager.chars().count() > MAX_NAME_LEN {
            return Err(ModelError::out_of_range(
                ENTITY,
                "node_manager",
                format!("must be at most {MAX_NAME_LEN} characters"),
            ));
        }
    }
    let territory_id = require(ENTITY, "territory", draft.territory_id)?;
    ensure_exists(conn, "territories", ENTITY, "territory", territory_id)?;

    Ok(NodeColumns {
        name,
        territory_id,
        is_hub: draft.is_hub,
        contribution_cost: draft.contribution_cost,
        node_manager,
    })
}

/// Insert a node. The territory must exist and the contribution cost, when set, must not be negative.
pub fn create_node(conn: &Connection, draft: &NodeDraft) -> ModelResult<Node> {
    let tx = conn.unchecked_transaction()?;
    let columns = validate(&tx, draft)?;
    let stamp = now();
    tx.execute(
        "INSERT INTO nodes (created, modified, name, territory_id, is_hub, contribution_cost, node_manager)
         VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            stamp,
            columns.name,
            columns.territory_id,
            columns.is_hub,
            columns.contribution_cost,
            columns.node_manager
        ],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, territory_id = columns.territory_id, "created node");
    Ok(Node {
        id,
        name: columns.name,
        territory_id: columns.territory_id,
        is_hub: columns.is_hub,
        contribution_cost: columns.contribution_cost,
        node_manager: columns.node_manager,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Overwrite every editable column of a node.
pub fn update_node(conn: &Connection, id: RecordId, draft: &NodeDraft) -> ModelResult<Node> {
    let tx = conn.unchecked_transaction()?;
    let columns = validate(&tx, draft)?;
    let changed = tx
        .execute(
            "UPDATE nodes
             SET name = ?1, territory_id = ?2, is_hub = ?3, contribution_cost = ?4,
                 node_manager = ?5, modified = ?6
             WHERE id = ?7",
            params![
                columns.name,
                columns.territory_id,
                columns.is_hub,
                columns.contribution_cost,
                columns.node_manager,
                now(),
                id
            ],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;
    let node = fetch_node(&tx, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    tx.commit()?;

    info!(id, "updated node");
    Ok(node)
}

/// Removing a node cascades to its resources, properties and connections.
pub fn delete_node(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted node");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_kingdom, create_territory, open_in_memory};
    use crate::models::TerritoryDraft;

    fn territory(conn: &Connection, kingdom: &str, name: &str) -> RecordId {
        let kingdom = create_kingdom(conn, kingdom).unwrap();
        create_territory(
            conn,
            &TerritoryDraft {
                name: name.to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap()
        .id
    }

    fn draft(name: &str, territory_id: RecordId) -> NodeDraft {
        NodeDraft {
            name: name.to_string(),
            territory_id: Some(territory_id),
            ..NodeDraft::default()
        }
    }

    #[test]
    fn manager_normalization() {
        assert_eq!(normalize_node_manager(None), None);
        assert_eq!(normalize_node_manager(Some("")), None);
        assert_eq!(normalize_node_manager(Some("   ")), None);
        assert_eq!(
            normalize_node_manager(Some(" Moyle ")),
            Some("Moyle".to_string())
        );
    }

    #[test]
    fn blank_manager_is_stored_as_null_on_update_too() {
        let conn = open_in_memory().unwrap();
        let territory_id = territory(&conn, "Calpheon", "Calpheon Central");
        let mut draft = draft("Trent", territory_id);
        draft.node_manager = Some("Tanya".to_string());
        let node = create_node(&conn, &draft).unwrap();
        assert_eq!(node.node_manager.as_deref(), Some("Tanya"));

        draft.node_manager = Some("  ".to_string());
        update_node(&conn, node.id, &draft).unwrap();
        let stored: Option<String> = conn
            .query_row(
                "SELECT node_manager FROM nodes WHERE id = ?1",
                params![node.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, None);
    }

    #[test]
    fn negative_cost_is_rejected_before_persisting() {
        let conn = open_in_memory().unwrap();
        let territory_id = territory(&conn, "Balenos", "Balenos");
        let mut draft = draft("Velia", territory_id);
        draft.contribution_cost = Some(-3);

        let err = create_node(&conn, &draft).unwrap_err();
        assert!(matches!(
            err,
            ModelError::ValueRangeViolation {
                field: "contribution_cost",
                ..
            }
        ));
        assert!(fetch_nodes(&conn, &NodeQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn hub_and_kingdom_filters() {
        let conn = open_in_memory().unwrap();
        let serendia = territory(&conn, "Calpheon", "Serendia");
        let balenos = territory(&conn, "Balenos", "Balenos");

        let mut heidel = draft("Heidel", serendia);
        heidel.is_hub = true;
        create_node(&conn, &heidel).unwrap();
        let mut glish = draft("Glish", serendia);
        glish.contribution_cost = Some(2);
        create_node(&conn, &glish).unwrap();
        let mut velia = draft("Velia", balenos);
        velia.is_hub = true;
        create_node(&conn, &velia).unwrap();

        let hubs = fetch_nodes(
            &conn,
            &NodeQuery {
                is_hub: Some(true),
                order: NodeOrder::Kingdom,
                ..NodeQuery::default()
            },
        )
        .unwrap();
        let names: Vec<_> = hubs.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Velia", "Heidel"]);

        let in_serendia = fetch_nodes_for_territory(&conn, serendia).unwrap();
        let names: Vec<_> = in_serendia.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Glish", "Heidel"]);
    }

    #[test]
    fn missing_territory_is_an_integrity_violation() {
        let conn = open_in_memory().unwrap();
        let err = create_node(
            &conn,
            &NodeDraft {
                name: "Orphan".to_string(),
                ..NodeDraft::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation {
                field: "territory",
                ..
            }
        ));
    }
}
