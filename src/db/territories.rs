use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{clean_name, ensure_exists, expect_changed, now, require, timestamps_at};
use super::query::{order_clause, search_param, Direction};
use crate::error::{ModelError, ModelResult};
use crate::models::{RecordId, Territory, TerritoryDraft, Timestamps};

const ENTITY: &str = "territory";
const SELECT: &str = "SELECT t.id, t.name, t.kingdom_id, t.created, t.modified
     FROM territories t
     INNER JOIN kingdoms k ON k.id = t.kingdom_id";

/// Orderings offered by the territory list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerritoryOrder {
    #[default]
    Name,
    Kingdom,
    Created,
    Modified,
}

#[derive(Debug, Clone, Default)]
pub struct TerritoryQuery {
    pub kingdom_id: Option<RecordId>,
    pub name_contains: Option<String>,
    pub order: TerritoryOrder,
    pub direction: Direction,
}

fn map_territory(row: &Row<'_>) -> rusqlite::Result<Territory> {
    Ok(Territory {
        id: row.get(0)?,
        name: row.get(1)?,
        kingdom_id: row.get(2)?,
        timestamps: timestamps_at(row, 3)?,
    })
}

/// Territories matching `query`.
pub fn fetch_territories(conn: &Connection, query: &TerritoryQuery) -> ModelResult<Vec<Territory>> {
    let order = match query.order {
        TerritoryOrder::Name => order_clause("t.name COLLATE NOCASE", query.direction, "t.id"),
        TerritoryOrder::Kingdom => order_clause(
            "k.name COLLATE NOCASE",
            query.direction,
            "t.name COLLATE NOCASE, t.id",
        ),
        TerritoryOrder::Created => order_clause("t.created", query.direction, "t.id"),
        TerritoryOrder::Modified => order_clause("t.modified", query.direction, "t.id"),
    };
    let sql = format!(
        "{SELECT}
         WHERE (?1 IS NULL OR t.kingdom_id = ?1)
           AND (?2 IS NULL OR INSTR(LOWER(t.name), LOWER(?2)) > 0)
         {order}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let territories = stmt
        .query_map(
            params![query.kingdom_id, search_param(&query.name_contains)],
            map_territory,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(territories)
}

/// Territories of one kingdom, by name.
pub fn fetch_territories_for_kingdom(
    conn: &Connection,
    kingdom_id: RecordId,
) -> ModelResult<Vec<Territory>> {
    fetch_territories(
        conn,
        &TerritoryQuery {
            kingdom_id: Some(kingdom_id),
            ..TerritoryQuery::default()
        },
    )
}

/// A territory by id.
pub fn fetch_territory(conn: &Connection, id: RecordId) -> ModelResult<Option<Territory>> {
    let found = conn
        .query_row(&format!("{SELECT} WHERE t.id = ?1"), params![id], map_territory)
        .optional()?;
    Ok(found)
}

fn validate(conn: &Connection, draft: &TerritoryDraft) -> ModelResult<(String, RecordId)> {
    let name = clean_name(ENTITY, &draft.name)?;
    let kingdom_id = require(ENTITY, "kingdom", draft.kingdom_id)?;
    ensure_exists(conn, "kingdoms", ENTITY, "kingdom", kingdom_id)?;
    Ok((name, kingdom_id))
}

/// Insert a territory under an existing kingdom.
pub fn create_territory(conn: &Connection, draft: &TerritoryDraft) -> ModelResult<Territory> {
    let tx = conn.unchecked_transaction()?;
    let (name, kingdom_id) = validate(&tx, draft)?;
    let stamp = now();
    tx.execute(
        "INSERT INTO territories (created, modified, name, kingdom_id) VALUES (?1, ?1, ?2, ?3)",
        params![stamp, name, kingdom_id],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, kingdom_id, "created territory");
    Ok(Territory {
        id,
        name,
        kingdom_id,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Rename a territory or move it to another kingdom.
pub fn update_territory(
    conn: &Connection,
    id: RecordId,
    draft: &TerritoryDraft,
) -> ModelResult<Territory> {
    let tx = conn.unchecked_transaction()?;
    let (name, kingdom_id) = validate(&tx, draft)?;
    let changed = tx
        .execute(
            "UPDATE territories SET name = ?1, kingdom_id = ?2, modified = ?3 WHERE id = ?4",
            params![name, kingdom_id, now(), id],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;
    let territory = fetch_territory(&tx, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    tx.commit()?;

    info!(id, "updated territory");
    Ok(territory)
}

/// Removing a territory cascades to its nodes.
pub fn delete_territory(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM territories WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted territory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_kingdom, fetch_kingdom, open_in_memory};

    fn draft(name: &str, kingdom_id: Option<RecordId>) -> TerritoryDraft {
        TerritoryDraft {
            name: name.to_string(),
            kingdom_id,
        }
    }

    #[test]
    fn dangling_kingdom_is_rejected() {
        let conn = open_in_memory().unwrap();
        let err = create_territory(&conn, &draft("Balenos", Some(99))).unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation { field: "kingdom", .. }
        ));
    }

    #[test]
    fn update_can_move_a_territory_between_kingdoms() {
        let conn = open_in_memory().unwrap();
        let calpheon = create_kingdom(&conn, "Calpheon").unwrap();
        let mediah = create_kingdom(&conn, "Mediah").unwrap();
        let territory = create_territory(&conn, &draft("Kamasylvia", Some(calpheon.id))).unwrap();

        let moved = update_territory(&conn, territory.id, &draft("Kamasylvia", Some(mediah.id)))
            .unwrap();
        assert_eq!(moved.kingdom_id, mediah.id);
        assert!(fetch_territories_for_kingdom(&conn, calpheon.id)
            .unwrap()
            .is_empty());

        let owner = fetch_kingdom(&conn, moved.kingdom_id).unwrap().unwrap();
        assert_eq!(owner.name, "Mediah");

        let err = update_territory(&conn, territory.id, &draft("Kamasylvia", None)).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrityViolation { .. }));
    }

    #[test]
    fn filter_and_order_by_kingdom() {
        let conn = open_in_memory().unwrap();
        let valencia = create_kingdom(&conn, "Valencia").unwrap();
        let calpheon = create_kingdom(&conn, "Calpheon").unwrap();
        create_territory(&conn, &draft("Valencia Desert", Some(valencia.id))).unwrap();
        create_territory(&conn, &draft("Calpheon Central", Some(calpheon.id))).unwrap();
        create_territory(&conn, &draft("Keplan", Some(calpheon.id))).unwrap();

        let by_kingdom = fetch_territories(
            &conn,
            &TerritoryQuery {
                order: TerritoryOrder::Kingdom,
                ..TerritoryQuery::default()
            },
        )
        .unwrap();
        let names: Vec<_> = by_kingdom.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Calpheon Central", "Keplan", "Valencia Desert"]);

        let searched = fetch_territories(
            &conn,
            &TerritoryQuery {
                kingdom_id: Some(calpheon.id),
                name_contains: Some("kep".to_string()),
                ..TerritoryQuery::default()
            },
        )
        .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].name, "Keplan");
    }
}
