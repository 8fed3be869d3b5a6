use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{check_non_negative, ensure_exists, expect_changed, now, require, timestamps_at};
use super::query::{order_clause, Direction};
use crate::error::{ModelError, ModelResult};
use crate::models::{RecordId, Resource, ResourceDraft, Timestamps};

const ENTITY: &str = "resource";
const SELECT: &str = "SELECT r.id, r.node_id, r.material_id, r.contribution_cost, r.created, r.modified
     FROM resources r
     INNER JOIN nodes n ON n.id = r.node_id
     INNER JOIN materials m ON m.id = r.material_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResourceOrder {
    #[default]
    Node,
    Material,
    ContributionCost,
    Created,
    Modified,
}

/// Same filters as the resource admin list: node, material and cost.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub node_id: Option<RecordId>,
    pub material_id: Option<RecordId>,
    pub contribution_cost: Option<i64>,
    pub order: ResourceOrder,
    pub direction: Direction,
}

fn map_resource(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        node_id: row.get(1)?,
        material_id: row.get(2)?,
        contribution_cost: row.get(3)?,
        timestamps: timestamps_at(row, 4)?,
    })
}

/// Resources matching `query`.
pub fn fetch_resources(conn: &Connection, query: &ResourceQuery) -> ModelResult<Vec<Resource>> {
    let tiebreak = "n.name COLLATE NOCASE, m.name COLLATE NOCASE, r.id";
    let order = match query.order {
        ResourceOrder::Node => order_clause("n.name COLLATE NOCASE", query.direction, tiebreak),
        ResourceOrder::Material => order_clause("m.name COLLATE NOCASE", query.direction, tiebreak),
        ResourceOrder::ContributionCost => {
            order_clause("r.contribution_cost", query.direction, tiebreak)
        }
        ResourceOrder::Created => order_clause("r.created", query.direction, "r.id"),
        ResourceOrder::Modified => order_clause("r.modified", query.direction, "r.id"),
    };
    let sql = format!(
        "{SELECT}
         WHERE (?1 IS NULL OR r.node_id = ?1)
           AND (?2 IS NULL OR r.material_id = ?2)
           AND (?3 IS NULL OR r.contribution_cost = ?3)
         {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let resources = stmt
        .query_map(
            params![query.node_id, query.material_id, query.contribution_cost],
            map_resource,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(resources)
}

/// Resources gathered at a node.
pub fn fetch_resources_for_node(conn: &Connection, node_id: RecordId) -> ModelResult<Vec<Resource>> {
    fetch_resources(
        conn,
        &ResourceQuery {
            node_id: Some(node_id),
            order: ResourceOrder::Material,
            ..ResourceQuery::default()
        },
    )
}

/// Resources yielding a material.
pub fn fetch_resources_for_material(
    conn: &Connection,
    material_id: RecordId,
) -> ModelResult<Vec<Resource>> {
    fetch_resources(
        conn,
        &ResourceQuery {
            material_id: Some(material_id),
            ..ResourceQuery::default()
        },
    )
}

/// A resource by id.
pub fn fetch_resource(conn: &Connection, id: RecordId) -> ModelResult<Option<Resource>> {
    let found = conn
        .query_row(&format!("{SELECT} WHERE r.id = ?1"), params![id], map_resource)
        .optional()?;
    Ok(found)
}

fn validate(conn: &Connection, draft: &ResourceDraft) -> ModelResult<(RecordId, RecordId)> {
    check_non_negative(ENTITY, "contribution_cost", draft.contribution_cost)?;
    let node_id = require(ENTITY, "node", draft.node_id)?;
    let material_id = require(ENTITY, "material", draft.material_id)?;
    ensure_exists(conn, "nodes", ENTITY, "node", node_id)?;
    ensure_exists(conn, "materials", ENTITY, "material", material_id)?;
    Ok((node_id, material_id))
}

/// A resource needs both a node and a material; either one being removed
/// later deletes the resource.
pub fn create_resource(conn: &Connection, draft: &ResourceDraft) -> ModelResult<Resource> {
    let tx = conn.unchecked_transaction()?;
    let (node_id, material_id) = validate(&tx, draft)?;
    let stamp = now();
    tx.execute(
        "INSERT INTO resources (created, modified, node_id, material_id, contribution_cost)
         VALUES (?1, ?1, ?2, ?3, ?4)",
        params![stamp, node_id, material_id, draft.contribution_cost],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, node_id, material_id, "created resource");
    Ok(Resource {
        id,
        node_id,
        material_id,
        contribution_cost: draft.contribution_cost,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Overwrite a resource; both references must exist.
pub fn update_resource(
    conn: &Connection,
    id: RecordId,
    draft: &ResourceDraft,
) -> ModelResult<Resource> {
    let tx = conn.unchecked_transaction()?;
    let (node_id, material_id) = validate(&tx, draft)?;
    let changed = tx
        .execute(
            "UPDATE resources
             SET node_id = ?1, material_id = ?2, contribution_cost = ?3, modified = ?4
             WHERE id = ?5",
            params![node_id, material_id, draft.contribution_cost, now(), id],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;
    let resource = fetch_resource(&tx, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    tx.commit()?;

    info!(id, "updated resource");
    Ok(resource)
}

/// Delete a resource.
pub fn delete_resource(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted resource");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_kingdom, create_material, create_node, create_territory, delete_material,
        open_in_memory,
    };
    use crate::models::{NodeDraft, TerritoryDraft};

    fn node(conn: &Connection, name: &str) -> RecordId {
        let kingdom = create_kingdom(conn, "Valencia").unwrap();
        let territory = create_territory(
            conn,
            &TerritoryDraft {
                name: "Valencia".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
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
    }

    #[test]
    fn negative_cost_and_missing_node() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn, "Shakatu");
        let iron = create_material(&conn, "Iron Ore").unwrap();

        let err = create_resource(
            &conn,
            &ResourceDraft {
                node_id: Some(node_id),
                material_id: Some(iron.id),
                contribution_cost: -1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ValueRangeViolation { .. }));

        let err = create_resource(
            &conn,
            &ResourceDraft {
                node_id: None,
                material_id: Some(iron.id),
                contribution_cost: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation { field: "node", .. }
        ));
    }

    #[test]
    fn filters_and_material_cascade() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn, "Shakatu");
        let iron = create_material(&conn, "Iron Ore").unwrap();
        let coal = create_material(&conn, "Coal").unwrap();
        for (material_id, cost) in [(iron.id, 2), (coal.id, 1)] {
            create_resource(
                &conn,
                &ResourceDraft {
                    node_id: Some(node_id),
                    material_id: Some(material_id),
                    contribution_cost: cost,
                },
            )
            .unwrap();
        }

        let cheap = fetch_resources(
            &conn,
            &ResourceQuery {
                contribution_cost: Some(1),
                ..ResourceQuery::default()
            },
        )
        .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].material_id, coal.id);

        let at_node = fetch_resources_for_node(&conn, node_id).unwrap();
        let materials: Vec<_> = at_node.iter().map(|r| r.material_id).collect();
        assert_eq!(materials, [coal.id, iron.id]);

        delete_material(&conn, iron.id).unwrap();
        assert_eq!(fetch_resources_for_node(&conn, node_id).unwrap().len(), 1);
    }

    #[test]
    fn update_refreshes_modified() {
        let conn = open_in_memory().unwrap();
        let node_id = node(&conn, "Shakatu");
        let iron = create_material(&conn, "Iron Ore").unwrap();
        let mut draft = ResourceDraft {
            node_id: Some(node_id),
            material_id: Some(iron.id),
            contribution_cost: 1,
        };
        let created = create_resource(&conn, &draft).unwrap();

        draft.contribution_cost = 3;
        let updated = update_resource(&conn, created.id, &draft).unwrap();
        assert_eq!(updated.contribution_cost, 3);
        assert_eq!(updated.timestamps.created, created.timestamps.created);
        assert!(updated.timestamps.modified >= created.timestamps.modified);
    }
}
