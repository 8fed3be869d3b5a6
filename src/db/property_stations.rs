//! The property <-> station association with its `max_level` payload. A pair
//! appears at most once; changing the level is an update of that row.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{check_non_negative, ensure_exists, expect_changed, now, timestamps_at};
use super::properties::map_property;
use crate::error::{ModelError, ModelResult};
use crate::models::{Property, PropertyStation, RecordId, Station, Timestamps};

const ENTITY: &str = "property station";
const LINK_COLUMNS: &str = "ps.id, ps.property_id, ps.station_id, ps.max_level, ps.created, ps.modified";

/// A station available on a property, with its level cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSlot {
    pub station: Station,
    pub link: PropertyStation,
}

/// A property offering a given station, with its level cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySlot {
    pub property: Property,
    pub link: PropertyStation,
}

fn map_link_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<PropertyStation> {
    Ok(PropertyStation {
        id: row.get(offset)?,
        property_id: row.get(offset + 1)?,
        station_id: row.get(offset + 2)?,
        max_level: row.get(offset + 3)?,
        timestamps: timestamps_at(row, offset + 4)?,
    })
}

fn map_link(row: &Row<'_>) -> rusqlite::Result<PropertyStation> {
    map_link_at(row, 0)
}

/// An association row by its own id.
pub fn fetch_property_station_by_id(
    conn: &Connection,
    id: RecordId,
) -> ModelResult<Option<PropertyStation>> {
    let found = conn
        .query_row(
            &format!("SELECT {LINK_COLUMNS} FROM property_stations ps WHERE ps.id = ?1"),
            params![id],
            map_link,
        )
        .optional()?;
    Ok(found)
}

/// Look the association up from either side by its pair.
pub fn fetch_property_station(
    conn: &Connection,
    property_id: RecordId,
    station_id: RecordId,
) -> ModelResult<Option<PropertyStation>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {LINK_COLUMNS} FROM property_stations ps
                 WHERE ps.property_id = ?1 AND ps.station_id = ?2"
            ),
            params![property_id, station_id],
            map_link,
        )
        .optional()?;
    Ok(found)
}

/// Stations on a property with their level caps, by station name.
pub fn fetch_stations_for_property(
    conn: &Connection,
    property_id: RecordId,
) -> ModelResult<Vec<StationSlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT s.id, s.name, s.created, s.modified, {LINK_COLUMNS}
         FROM property_stations ps
         INNER JOIN stations s ON s.id = ps.station_id
         WHERE ps.property_id = ?1
         ORDER BY s.name COLLATE NOCASE, s.id"
    ))?;
    let slots = stmt
        .query_map(params![property_id], |row| {
            Ok(StationSlot {
                station: Station {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    timestamps: timestamps_at(row, 2)?,
                },
                link: map_link_at(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Properties offering a station with their level caps, by property name.
pub fn fetch_properties_for_station(
    conn: &Connection,
    station_id: RecordId,
) -> ModelResult<Vec<PropertySlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id, p.name, p.node_id, p.parent_property_id, p.created, p.modified, {LINK_COLUMNS}
         FROM property_stations ps
         INNER JOIN properties p ON p.id = ps.property_id
         WHERE ps.station_id = ?1
         ORDER BY p.name COLLATE NOCASE, p.id"
    ))?;
    let slots = stmt
        .query_map(params![station_id], |row| {
            Ok(PropertySlot {
                property: map_property(row)?,
                link: map_link_at(row, 6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Attach a station to a property. A second row for the same pair is a `DuplicateAssociation`.
pub fn create_property_station(
    conn: &Connection,
    property_id: RecordId,
    station_id: RecordId,
    max_level: i64,
) -> ModelResult<PropertyStation> {
    check_non_negative(ENTITY, "max_level", max_level)?;
    let tx = conn.unchecked_transaction()?;
    ensure_exists(&tx, "properties", ENTITY, "property", property_id)?;
    ensure_exists(&tx, "stations", ENTITY, "station", station_id)?;
    if fetch_property_station(&tx, property_id, station_id)?.is_some() {
        return Err(ModelError::DuplicateAssociation {
            entity: ENTITY,
            detail: format!("property {property_id} with station {station_id}"),
        });
    }

    let stamp = now();
    tx.execute(
        "INSERT INTO property_stations (created, modified, property_id, station_id, max_level)
         VALUES (?1, ?1, ?2, ?3, ?4)",
        params![stamp, property_id, station_id, max_level],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, property_id, station_id, max_level, "created property station");
    Ok(PropertyStation {
        id,
        property_id,
        station_id,
        max_level,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Change the level cap of an existing association.
pub fn update_property_station(
    conn: &Connection,
    id: RecordId,
    max_level: i64,
) -> ModelResult<PropertyStation> {
    check_non_negative(ENTITY, "max_level", max_level)?;
    let changed = conn
        .execute(
            "UPDATE property_stations SET max_level = ?1, modified = ?2 WHERE id = ?3",
            params![max_level, now(), id],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;

    info!(id, max_level, "updated property station");
    fetch_property_station_by_id(conn, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })
}

/// Remove a station slot from its property.
pub fn delete_property_station(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM property_stations WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted property station");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_kingdom, create_node, create_property, create_station, create_territory,
        delete_station, open_in_memory,
    };
    use crate::models::{NodeDraft, PropertyDraft, TerritoryDraft};

    fn property(conn: &Connection) -> RecordId {
        let kingdom = create_kingdom(conn, "Mediah").unwrap();
        let territory = create_territory(
            conn,
            &TerritoryDraft {
                name: "Mediah".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        let node = create_node(
            conn,
            &NodeDraft {
                name: "Altinova".to_string(),
                territory_id: Some(territory.id),
                is_hub: true,
                ..NodeDraft::default()
            },
        )
        .unwrap();
        create_property(
            conn,
            &PropertyDraft {
                name: "Altinova 3-2".to_string(),
                node_id: Some(node.id),
                parent_property_id: None,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn duplicate_pairs_are_rejected() {
        let conn = open_in_memory().unwrap();
        let property_id = property(&conn);
        let refinery = create_station(&conn, "Refinery").unwrap();

        create_property_station(&conn, property_id, refinery.id, 3).unwrap();
        let err = create_property_station(&conn, property_id, refinery.id, 5).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAssociation { .. }));
    }

    #[test]
    fn level_updates_and_range() {
        let conn = open_in_memory().unwrap();
        let property_id = property(&conn);
        let workshop = create_station(&conn, "Tool Workshop").unwrap();

        let err = create_property_station(&conn, property_id, workshop.id, -1).unwrap_err();
        assert!(matches!(err, ModelError::ValueRangeViolation { .. }));

        let link = create_property_station(&conn, property_id, workshop.id, 2).unwrap();
        let raised = update_property_station(&conn, link.id, 4).unwrap();
        assert_eq!(raised.max_level, 4);
        assert_eq!(
            fetch_property_station(&conn, property_id, workshop.id)
                .unwrap()
                .unwrap()
                .max_level,
            4
        );
    }

    #[test]
    fn deleting_a_station_removes_its_slots() {
        let conn = open_in_memory().unwrap();
        let property_id = property(&conn);
        let storage = create_station(&conn, "Storage").unwrap();
        create_property_station(&conn, property_id, storage.id, 1).unwrap();

        delete_station(&conn, storage.id).unwrap();
        assert!(fetch_stations_for_property(&conn, property_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn deleted_slot_leaves_both_sides() {
        let conn = open_in_memory().unwrap();
        let property_id = property(&conn);
        let refinery = create_station(&conn, "Refinery").unwrap();
        let mill = create_station(&conn, "Mill").unwrap();
        let link = create_property_station(&conn, property_id, refinery.id, 3).unwrap();
        create_property_station(&conn, property_id, mill.id, 1).unwrap();

        delete_property_station(&conn, link.id).unwrap();

        let remaining: Vec<String> = fetch_stations_for_property(&conn, property_id)
            .unwrap()
            .into_iter()
            .map(|slot| slot.station.name)
            .collect();
        assert_eq!(remaining, vec!["Mill".to_string()]);
        assert!(fetch_properties_for_station(&conn, refinery.id)
            .unwrap()
            .is_empty());
        assert!(fetch_property_station(&conn, property_id, refinery.id)
            .unwrap()
            .is_none());

        let err = delete_property_station(&conn, link.id).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }
}
