use rusqlite::Connection;

use super::named::NamedTable;
use super::query::NamedQuery;
use crate::error::ModelResult;
use crate::models::{Kingdom, RecordId, Timestamps};

const KINGDOMS: NamedTable<Kingdom> = NamedTable {
    table: "kingdoms",
    entity: "kingdom",
    build: build_kingdom,
};

fn build_kingdom(id: RecordId, name: String, timestamps: Timestamps) -> Kingdom {
    Kingdom {
        id,
        name,
        timestamps,
    }
}

/// Kingdoms matching `query`, in its order.
pub fn fetch_kingdoms(conn: &Connection, query: &NamedQuery) -> ModelResult<Vec<Kingdom>> {
    KINGDOMS.list(conn, query)
}

/// A kingdom by id, `None` when it does not exist.
pub fn fetch_kingdom(conn: &Connection, id: RecordId) -> ModelResult<Option<Kingdom>> {
    KINGDOMS.get(conn, id)
}

/// Insert a kingdom; the name is trimmed and must be 1 to 100 characters.
pub fn create_kingdom(conn: &Connection, name: &str) -> ModelResult<Kingdom> {
    KINGDOMS.create(conn, name)
}

/// Rename a kingdom.
pub fn update_kingdom(conn: &Connection, id: RecordId, name: &str) -> ModelResult<Kingdom> {
    KINGDOMS.update(conn, id, name)
}

/// Removing a kingdom cascades to its territories and everything below them.
pub fn delete_kingdom(conn: &Connection, id: RecordId) -> ModelResult<()> {
    KINGDOMS.delete(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::ModelError;

    #[test]
    fn create_update_and_search() {
        let conn = open_in_memory().unwrap();
        let balenos = create_kingdom(&conn, "Balenos").unwrap();
        create_kingdom(&conn, "Calpheon").unwrap();

        let renamed = update_kingdom(&conn, balenos.id, " Serendia ").unwrap();
        assert_eq!(renamed.name, "Serendia");
        assert_eq!(renamed.timestamps.created, balenos.timestamps.created);
        assert!(renamed.timestamps.modified >= balenos.timestamps.modified);

        let found = fetch_kingdoms(&conn, &NamedQuery::search("SEREN")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, balenos.id);

        let all = fetch_kingdoms(&conn, &NamedQuery::default()).unwrap();
        let names: Vec<_> = all.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["Calpheon", "Serendia"]);
    }

    #[test]
    fn missing_rows() {
        let conn = open_in_memory().unwrap();
        assert!(fetch_kingdom(&conn, 42).unwrap().is_none());
        assert!(matches!(
            update_kingdom(&conn, 42, "Valencia"),
            Err(ModelError::NotFound { entity: "kingdom", id: 42 })
        ));
        assert!(matches!(
            delete_kingdom(&conn, 42),
            Err(ModelError::NotFound { .. })
        ));
    }
}
