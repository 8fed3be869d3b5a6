use rusqlite::Connection;

use super::named::NamedTable;
use super::query::NamedQuery;
use crate::error::ModelResult;
use crate::models::{RecordId, Station, Timestamps};

const STATIONS: NamedTable<Station> = NamedTable {
    table: "stations",
    entity: "station",
    build: build_station,
};

fn build_station(id: RecordId, name: String, timestamps: Timestamps) -> Station {
    Station {
        id,
        name,
        timestamps,
    }
}

/// Stations matching `query`, in its order.
pub fn fetch_stations(conn: &Connection, query: &NamedQuery) -> ModelResult<Vec<Station>> {
    STATIONS.list(conn, query)
}

/// A station by id.
pub fn fetch_station(conn: &Connection, id: RecordId) -> ModelResult<Option<Station>> {
    STATIONS.get(conn, id)
}

/// Insert a station with a trimmed, non-empty name.
pub fn create_station(conn: &Connection, name: &str) -> ModelResult<Station> {
    STATIONS.create(conn, name)
}

/// Rename a station.
pub fn update_station(conn: &Connection, id: RecordId, name: &str) -> ModelResult<Station> {
    STATIONS.update(conn, id, name)
}

/// Deleting a station removes its property slots and every recipe made at it.
pub fn delete_station(conn: &Connection, id: RecordId) -> ModelResult<()> {
    STATIONS.delete(conn, id)
}
