//! Filter and ordering inputs for the list queries. Filters are bound as
//! nullable parameters (`?n IS NULL OR ...`) so each query keeps one fixed SQL
//! text; only the ORDER BY clause is assembled, and only from the static column
//! names below.

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Orderings available on every table that only carries a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamedOrder {
    #[default]
    Name,
    Created,
    Modified,
}

/// List query for kingdoms, materials and stations.
#[derive(Debug, Clone, Default)]
pub struct NamedQuery {
    /// Case-insensitive substring match on the name.
    pub name_contains: Option<String>,
    pub order: NamedOrder,
    pub direction: Direction,
}

impl NamedQuery {
    pub fn search<S: Into<String>>(text: S) -> Self {
        Self {
            name_contains: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Build `ORDER BY <column> <dir>, <tiebreak>`; `column` must be a static name.
pub(crate) fn order_clause(column: &'static str, direction: Direction, tiebreak: &str) -> String {
    format!("ORDER BY {column} {}, {tiebreak}", direction.sql())
}

/// Normalise an optional search string: blank searches match everything.
pub(crate) fn search_param(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|text| !text.is_empty())
}
