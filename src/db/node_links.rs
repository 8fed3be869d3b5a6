//! The symmetric `connected_nodes` relation. Each edge is one row keyed by the
//! unordered pair `(low_node_id, high_node_id)`, so A-B and B-A are the same
//! row and neither node owns the other.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};
use tracing::info;

use super::integrity::ensure_exists;
use super::nodes::map_node;
use crate::error::{ModelError, ModelResult};
use crate::models::{Node, RecordId};

const ENTITY: &str = "node connection";

fn ordered(a: RecordId, b: RecordId) -> (RecordId, RecordId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn insert_link(conn: &Connection, a: RecordId, b: RecordId) -> ModelResult<()> {
    ensure_exists(conn, "nodes", ENTITY, "node", a)?;
    ensure_exists(conn, "nodes", ENTITY, "connected_node", b)?;
    let (low, high) = ordered(a, b);
    conn.execute(
        "INSERT OR IGNORE INTO node_links (low_node_id, high_node_id) VALUES (?1, ?2)",
        params![low, high],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    Ok(())
}

/// Connect two nodes. Idempotent, and either argument order yields the same
/// edge.
pub fn connect_nodes(conn: &Connection, a: RecordId, b: RecordId) -> ModelResult<()> {
    let tx = conn.unchecked_transaction()?;
    insert_link(&tx, a, b)?;
    tx.commit()?;
    info!(a, b, "connected nodes");
    Ok(())
}

/// Remove the edge between two nodes. Returns whether an edge existed.
pub fn disconnect_nodes(conn: &Connection, a: RecordId, b: RecordId) -> ModelResult<bool> {
    let (low, high) = ordered(a, b);
    let deleted = conn.execute(
        "DELETE FROM node_links WHERE low_node_id = ?1 AND high_node_id = ?2",
        params![low, high],
    )?;
    if deleted > 0 {
        info!(a, b, "disconnected nodes");
    }
    Ok(deleted > 0)
}

/// Whether `a` and `b` are linked, in either order.
pub fn are_connected(conn: &Connection, a: RecordId, b: RecordId) -> ModelResult<bool> {
    let (low, high) = ordered(a, b);
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM node_links WHERE low_node_id = ?1 AND high_node_id = ?2",
        params![low, high],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Every node sharing an edge with `node_id`, by name.
pub fn fetch_connected_nodes(conn: &Connection, node_id: RecordId) -> ModelResult<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.name, n.territory_id, n.is_hub, n.contribution_cost,
                n.node_manager, n.created, n.modified
         FROM nodes n
         INNER JOIN node_links l
            ON (l.low_node_id = ?1 AND l.high_node_id = n.id)
            OR (l.high_node_id = ?1 AND l.low_node_id = n.id)
         ORDER BY n.name COLLATE NOCASE, n.id",
    )?;
    let nodes = stmt
        .query_map(params![node_id], map_node)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}

/// Replace the whole connection set of `node_id` in one transaction: edges to
/// nodes missing from `connected` are dropped and new ones are added. This is
/// what saving the admin form does.
pub fn set_connected_nodes(
    conn: &Connection,
    node_id: RecordId,
    connected: &[RecordId],
) -> ModelResult<()> {
    let tx = conn.unchecked_transaction()?;
    ensure_exists(&tx, "nodes", ENTITY, "node", node_id)?;

    let wanted: BTreeSet<RecordId> = connected.iter().copied().collect();
    let current: BTreeSet<RecordId> = fetch_connected_nodes(&tx, node_id)?
        .into_iter()
        .map(|node| node.id)
        .collect();

    for stale in current.difference(&wanted) {
        let (low, high) = ordered(node_id, *stale);
        tx.execute(
            "DELETE FROM node_links WHERE low_node_id = ?1 AND high_node_id = ?2",
            params![low, high],
        )?;
    }
    for fresh in wanted.difference(&current) {
        insert_link(&tx, node_id, *fresh)?;
    }
    tx.commit()?;

    info!(node_id, connections = wanted.len(), "replaced node connections");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_kingdom, create_node, create_territory, delete_node, open_in_memory};
    use crate::models::{NodeDraft, TerritoryDraft};

    fn nodes(conn: &Connection, names: &[&str]) -> Vec<RecordId> {
        let kingdom = create_kingdom(conn, "Calpheon").unwrap();
        let territory = create_territory(
            conn,
            &TerritoryDraft {
                name: "Calpheon".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        names
            .iter()
            .map(|name| {
                create_node(
                    conn,
                    &NodeDraft {
                        name: name.to_string(),
                        territory_id: Some(territory.id),
                        ..NodeDraft::default()
                    },
                )
                .unwrap()
                .id
            })
            .collect()
    }

    fn names(conn: &Connection, id: RecordId) -> Vec<String> {
        fetch_connected_nodes(conn, id)
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect()
    }

    #[test]
    fn connecting_twice_keeps_one_edge() {
        let conn = open_in_memory().unwrap();
        let ids = nodes(&conn, &["Behr", "Keplan"]);
        connect_nodes(&conn, ids[0], ids[1]).unwrap();
        connect_nodes(&conn, ids[1], ids[0]).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM node_links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert!(are_connected(&conn, ids[1], ids[0]).unwrap());
    }

    #[test]
    fn disconnect_from_either_side() {
        let conn = open_in_memory().unwrap();
        let ids = nodes(&conn, &["Behr", "Keplan"]);
        connect_nodes(&conn, ids[0], ids[1]).unwrap();

        assert!(disconnect_nodes(&conn, ids[1], ids[0]).unwrap());
        assert!(!disconnect_nodes(&conn, ids[0], ids[1]).unwrap());
        assert!(names(&conn, ids[0]).is_empty());
    }

    #[test]
    fn set_replaces_the_connection_set() {
        let conn = open_in_memory().unwrap();
        let ids = nodes(&conn, &["Behr", "Keplan", "Trent", "Glish"]);
        connect_nodes(&conn, ids[0], ids[1]).unwrap();
        connect_nodes(&conn, ids[0], ids[2]).unwrap();

        set_connected_nodes(&conn, ids[0], &[ids[2], ids[3]]).unwrap();
        assert_eq!(names(&conn, ids[0]), ["Glish", "Trent"]);
        assert!(names(&conn, ids[1]).is_empty());
        assert_eq!(names(&conn, ids[3]), ["Behr"]);
    }

    #[test]
    fn set_with_unknown_node_changes_nothing() {
        let conn = open_in_memory().unwrap();
        let ids = nodes(&conn, &["Behr", "Keplan"]);
        connect_nodes(&conn, ids[0], ids[1]).unwrap();

        let err = set_connected_nodes(&conn, ids[0], &[404]).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrityViolation { .. }));
        assert_eq!(names(&conn, ids[0]), ["Keplan"]);
    }

    #[test]
    fn deleting_a_node_drops_its_edges() {
        let conn = open_in_memory().unwrap();
        let ids = nodes(&conn, &["Behr", "Keplan", "Trent"]);
        connect_nodes(&conn, ids[0], ids[1]).unwrap();
        connect_nodes(&conn, ids[1], ids[2]).unwrap();

        delete_node(&conn, ids[1]).unwrap();
        assert!(names(&conn, ids[0]).is_empty());
        assert!(names(&conn, ids[2]).is_empty());
    }
}
