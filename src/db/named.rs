//! CRUD shared by the tables whose only attribute is a name (kingdoms,
//! materials, stations). Each of those modules declares a `NamedTable` and
//! exposes thin typed wrappers around it.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{clean_name, expect_changed, now, timestamps_at};
use super::query::{order_clause, search_param, NamedOrder, NamedQuery};
use crate::error::{ModelError, ModelResult};
use crate::models::{RecordId, Timestamps};

pub(crate) struct NamedTable<T> {
    pub(crate) table: &'static str,
    pub(crate) entity: &'static str,
    pub(crate) build: fn(RecordId, String, Timestamps) -> T,
}

impl<T> NamedTable<T> {
    fn map_row(&self, row: &Row<'_>) -> rusqlite::Result<T> {
        Ok((self.build)(row.get(0)?, row.get(1)?, timestamps_at(row, 2)?))
    }

    pub(crate) fn list(&self, conn: &Connection, query: &NamedQuery) -> ModelResult<Vec<T>> {
        let order = match query.order {
            NamedOrder::Name => order_clause("name COLLATE NOCASE", query.direction, "id"),
            NamedOrder::Created => order_clause("created", query.direction, "id"),
            NamedOrder::Modified => order_clause("modified", query.direction, "id"),
        };
        let sql = format!(
            "SELECT id, name, created, modified FROM {}
             WHERE (?1 IS NULL OR INSTR(LOWER(name), LOWER(?1)) > 0)
             {order}",
            self.table
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![search_param(&query.name_contains)], |row| {
                self.map_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub(crate) fn get(&self, conn: &Connection, id: RecordId) -> ModelResult<Option<T>> {
        let sql = format!(
            "SELECT id, name, created, modified FROM {} WHERE id = ?1",
            self.table
        );
        let found = conn
            .query_row(&sql, params![id], |row| self.map_row(row))
            .optional()?;
        Ok(found)
    }

    pub(crate) fn create(&self, conn: &Connection, name: &str) -> ModelResult<T> {
        let name = clean_name(self.entity, name)?;
        let stamp = now();
        conn.execute(
            &format!(
                "INSERT INTO {} (created, modified, name) VALUES (?1, ?1, ?2)",
                self.table
            ),
            params![stamp, name],
        )
        .map_err(|err| ModelError::classify(err, self.entity))?;

        let id = conn.last_insert_rowid();
        info!(entity = self.entity, id, "created");
        Ok((self.build)(
            id,
            name,
            Timestamps {
                created: stamp,
                modified: stamp,
            },
        ))
    }

    pub(crate) fn update(&self, conn: &Connection, id: RecordId, name: &str) -> ModelResult<T> {
        let name = clean_name(self.entity, name)?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE {} SET name = ?1, modified = ?2 WHERE id = ?3",
                    self.table
                ),
                params![name, now(), id],
            )
            .map_err(|err| ModelError::classify(err, self.entity))?;
        expect_changed(changed, self.entity, id)?;

        info!(entity = self.entity, id, "updated");
        self.get(conn, id)?
            .ok_or(ModelError::NotFound { entity: self.entity, id })
    }

    /// Hard delete; dependents go with it through the schema's cascades.
    pub(crate) fn delete(&self, conn: &Connection, id: RecordId) -> ModelResult<()> {
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.table),
            params![id],
        )?;
        expect_changed(deleted, self.entity, id)?;
        info!(entity = self.entity, id, "deleted");
        Ok(())
    }
}
