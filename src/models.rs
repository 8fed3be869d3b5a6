//! Domain records that mirror the SQLite schema. These stay plain data holders:
//! foreign keys are carried as ids and relations are resolved by the `db`
//! module on demand, so no record ever owns another.

use std::fmt;

use chrono::{DateTime, Utc};

/// Surrogate primary key shared by every table.
pub type RecordId = i64;

/// Longest name (and node manager) the store accepts.
pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Creation and last-modified instants stamped by the persistence layer.
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One of the major kingdoms, containing a set of territories.
pub struct Kingdom {
    pub id: RecordId,
    pub name: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A subdivision of a kingdom holding a set of nodes.
pub struct Territory {
    pub id: RecordId,
    pub name: String,
    pub kingdom_id: RecordId,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A point in the node network. Hub nodes are the entry points of a network;
/// the others are claimed by investing contribution points with the node
/// manager.
pub struct Node {
    pub id: RecordId,
    pub name: String,
    pub territory_id: RecordId,
    pub is_hub: bool,
    /// Absent for hubs and for nodes whose cost has not been recorded yet.
    pub contribution_cost: Option<i64>,
    /// Never an empty string: blank input is stored as `None`.
    pub node_manager: Option<String>,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A gatherable resource at a node, worked by hired workers.
pub struct Resource {
    pub id: RecordId,
    pub node_id: RecordId,
    pub material_id: RecordId,
    pub contribution_cost: i64,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A rentable plot attached to a node. Properties form a tree through
/// `parent_property_id`; children are looked up, never stored inline.
pub struct Property {
    pub id: RecordId,
    pub name: String,
    pub node_id: RecordId,
    pub parent_property_id: Option<RecordId>,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Caps how high a station of a given kind can be upgraded on a property.
pub struct PropertyStation {
    pub id: RecordId,
    pub property_id: RecordId,
    pub station_id: RecordId,
    pub max_level: i64,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A type of crafting material.
pub struct Material {
    pub id: RecordId,
    pub name: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A crafting station or method (grinding by hand counts too).
pub struct Station {
    pub id: RecordId,
    pub name: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Turns a set of input materials into a set of output materials at a station.
/// The material sets live in join tables and are fetched separately.
pub struct Recipe {
    pub id: RecordId,
    pub name: String,
    pub station_id: RecordId,
    pub timestamps: Timestamps,
}

macro_rules! display_name {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.name)
                }
            }
        )+
    };
}

display_name!(Kingdom, Territory, Node, Property, Material, Station, Recipe);

/// Input for creating or updating a territory. The kingdom is optional here so
/// a missing reference is reported as an integrity violation instead of being
/// impossible to express.
#[derive(Debug, Clone, Default)]
pub struct TerritoryDraft {
    pub name: String,
    pub kingdom_id: Option<RecordId>,
}

/// Input for creating or updating a node.
#[derive(Debug, Clone, Default)]
pub struct NodeDraft {
    pub name: String,
    pub territory_id: Option<RecordId>,
    pub is_hub: bool,
    pub contribution_cost: Option<i64>,
    pub node_manager: Option<String>,
}

/// Input for creating or updating a resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceDraft {
    pub node_id: Option<RecordId>,
    pub material_id: Option<RecordId>,
    pub contribution_cost: i64,
}

/// Input for creating or updating a property.
#[derive(Debug, Clone, Default)]
pub struct PropertyDraft {
    pub name: String,
    pub node_id: Option<RecordId>,
    pub parent_property_id: Option<RecordId>,
}

/// Input for creating or updating a recipe header. Material sets are managed
/// with `set_recipe_inputs` / `set_recipe_outputs`.
#[derive(Debug, Clone, Default)]
pub struct RecipeDraft {
    pub name: String,
    pub station_id: Option<RecordId>,
}
