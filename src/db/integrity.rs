//! Write-time checks shared by the entity modules. Each write validates its
//! input here before touching the store so the caller gets a precise
//! `ModelError` rather than a bare SQLite constraint message.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ModelError, ModelResult};
use crate::models::{RecordId, Timestamps, MAX_NAME_LEN};

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Trim a name and enforce the 1..=100 character window.
pub(crate) fn clean_name(entity: &'static str, raw: &str) -> ModelResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ModelError::out_of_range(entity, "name", "must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ModelError::out_of_range(
            entity,
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_string())
}

/// Unwrap a required reference or report it as missing.
pub(crate) fn require(
    entity: &'static str,
    field: &'static str,
    id: Option<RecordId>,
) -> ModelResult<RecordId> {
    id.ok_or_else(|| ModelError::missing(entity, field))
}

/// Confirm that `id` names an existing row of `table`.
pub(crate) fn ensure_exists(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    field: &'static str,
    id: RecordId,
) -> ModelResult<()> {
    if row_exists(conn, table, id)? {
        Ok(())
    } else {
        Err(ModelError::dangling(entity, field, id))
    }
}

pub(crate) fn row_exists(conn: &Connection, table: &'static str, id: RecordId) -> ModelResult<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn check_non_negative(
    entity: &'static str,
    field: &'static str,
    value: i64,
) -> ModelResult<()> {
    if value < 0 {
        Err(ModelError::out_of_range(
            entity,
            field,
            format!("must be zero or greater, got {value}"),
        ))
    } else {
        Ok(())
    }
}

/// Map a zero-row update/delete to `NotFound`.
pub(crate) fn expect_changed(changed: usize, entity: &'static str, id: RecordId) -> ModelResult<()> {
    if changed == 0 {
        Err(ModelError::NotFound { entity, id })
    } else {
        Ok(())
    }
}

/// Read the `created`, `modified` pair starting at column `index`.
pub(crate) fn timestamps_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Timestamps> {
    Ok(Timestamps {
        created: row.get(index)?,
        modified: row.get(index + 1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(clean_name("kingdom", "  Calpheon ").unwrap(), "Calpheon");
        assert!(matches!(
            clean_name("kingdom", "   "),
            Err(ModelError::ValueRangeViolation { field: "name", .. })
        ));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(clean_name("kingdom", &long).is_err());
        assert!(clean_name("kingdom", &"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn missing_reference_is_an_integrity_violation() {
        let err = require("territory", "kingdom", None).unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation {
                entity: "territory",
                field: "kingdom",
                ..
            }
        ));
    }

    #[test]
    fn negative_values_are_range_violations() {
        assert!(check_non_negative("node", "contribution_cost", 0).is_ok());
        assert!(matches!(
            check_non_negative("node", "contribution_cost", -1),
            Err(ModelError::ValueRangeViolation { .. })
        ));
    }
}
