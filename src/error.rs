//! Error kinds surfaced by the persistence layer.
//!
//! Application glue (CLI, UI) works with `anyhow`, but every write against the
//! store reports one of these variants so callers can tell an integrity problem
//! apart from a range problem without parsing message strings.

use rusqlite::ffi;
use thiserror::Error;

use crate::models::RecordId;

/// Errors produced by create/update/delete operations on the entity model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required reference is missing, points at a nonexistent row, or would
    /// break the shape of a relation (for example a property tree cycle).
    #[error("{entity}.{field}: {reason}")]
    ReferentialIntegrityViolation {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A value failed validation before it reached the store.
    #[error("{entity}.{field}: {reason}")]
    ValueRangeViolation {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },

    /// Update or delete addressed a row that does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: RecordId },

    /// An association row already exists for the given pair.
    #[error("{entity}: {detail} already exists")]
    DuplicateAssociation { entity: &'static str, detail: String },

    /// Any other SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Result alias used across the `db` module.
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub(crate) fn missing(entity: &'static str, field: &'static str) -> Self {
        ModelError::ReferentialIntegrityViolation {
            entity,
            field,
            reason: "is required".to_string(),
        }
    }

    pub(crate) fn dangling(entity: &'static str, field: &'static str, id: RecordId) -> Self {
        ModelError::ReferentialIntegrityViolation {
            entity,
            field,
            reason: format!("references missing row {id}"),
        }
    }

    pub(crate) fn out_of_range<S: Into<String>>(
        entity: &'static str,
        field: &'static str,
        reason: S,
    ) -> Self {
        ModelError::ValueRangeViolation {
            entity,
            field,
            reason: reason.into(),
        }
    }

    /// Sort SQLite constraint failures into the model's error kinds. Writes are
    /// validated up front, so this only fires when the schema catches something
    /// the validation did not.
    pub(crate) fn classify(err: rusqlite::Error, entity: &'static str) -> Self {
        let extended = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => failure.extended_code,
            _ => return ModelError::Storage(err),
        };

        match extended {
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                ModelError::ReferentialIntegrityViolation {
                    entity,
                    field: "reference",
                    reason: err.to_string(),
                }
            }
            ffi::SQLITE_CONSTRAINT_CHECK => ModelError::ValueRangeViolation {
                entity,
                field: "value",
                reason: err.to_string(),
            },
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                ModelError::DuplicateAssociation {
                    entity,
                    detail: err.to_string(),
                }
            }
            _ => ModelError::Storage(err),
        }
    }

    /// True for the two kinds a caller can fix by changing its input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModelError::ReferentialIntegrityViolation { .. } | ModelError::ValueRangeViolation { .. }
        )
    }
}
