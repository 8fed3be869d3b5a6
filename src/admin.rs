//! Read-only accessors for the admin screens: list rows carrying the display
//! values resolved along foreign keys (a node's kingdom, a resource's
//! material), and the selection lists the edit forms offer. Nothing here
//! writes; the storage rules all live in `db`.

use std::collections::HashMap;
use std::fmt;

use rusqlite::Connection;

use crate::db::{
    fetch_kingdom, fetch_kingdoms, fetch_materials, fetch_node, fetch_nodes, fetch_properties,
    fetch_property, fetch_recipes, fetch_resources, fetch_stations, fetch_territories, fetch_territory,
    NamedQuery, NodeQuery, PropertyQuery, RecipeQuery, ResourceQuery, TerritoryQuery,
};
use crate::error::ModelResult;
use crate::models::{Kingdom, Node, Property, Recipe, RecordId, Resource, Territory};

/// Territory list row: name and owning kingdom.
#[derive(Debug, Clone)]
pub struct TerritoryRow {
    pub territory: Territory,
    pub kingdom: String,
}

/// Node list row: name, hub flag, territory and the kingdom reached through it.
#[derive(Debug, Clone)]
pub struct NodeRow {
    pub node: Node,
    pub territory: String,
    pub kingdom: String,
}

#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub resource: Resource,
    pub node: String,
    pub material: String,
}

impl fmt::Display for ResourceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource {} at Node {}", self.material, self.node)
    }
}

/// Property list row with the node -> territory -> kingdom chain resolved.
#[derive(Debug, Clone)]
pub struct PropertyRow {
    pub property: Property,
    pub node: String,
    pub territory: String,
    pub kingdom: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecipeRow {
    pub recipe: Recipe,
    pub station: String,
}

/// Display string for a property/station association.
pub fn property_station_label(property: &str, station: &str) -> String {
    format!("Property: {property} - Station: {station}")
}

/// Id -> name lookup for the small reference tables.
struct Names {
    kingdoms: HashMap<RecordId, String>,
    territories: HashMap<RecordId, (String, RecordId)>,
}

impl Names {
    fn load(conn: &Connection) -> ModelResult<Self> {
        let kingdoms = fetch_kingdoms(conn, &NamedQuery::default())?
            .into_iter()
            .map(|k| (k.id, k.name))
            .collect();
        let territories = fetch_territories(conn, &TerritoryQuery::default())?
            .into_iter()
            .map(|t| (t.id, (t.name, t.kingdom_id)))
            .collect();
        Ok(Self {
            kingdoms,
            territories,
        })
    }

    fn kingdom(&self, id: RecordId) -> String {
        self.kingdoms.get(&id).cloned().unwrap_or_default()
    }

    /// `(territory, kingdom)` names for a territory id.
    fn territory_chain(&self, id: RecordId) -> (String, String) {
        match self.territories.get(&id) {
            Some((name, kingdom_id)) => (name.clone(), self.kingdom(*kingdom_id)),
            None => (String::new(), String::new()),
        }
    }
}

/// Territory list rows with the kingdom name resolved.
pub fn territory_rows(conn: &Connection, query: &TerritoryQuery) -> ModelResult<Vec<TerritoryRow>> {
    let names = Names::load(conn)?;
    Ok(fetch_territories(conn, query)?
        .into_iter()
        .map(|territory| TerritoryRow {
            kingdom: names.kingdom(territory.kingdom_id),
            territory,
        })
        .collect())
}

/// Node list rows with territory and kingdom names.
pub fn node_rows(conn: &Connection, query: &NodeQuery) -> ModelResult<Vec<NodeRow>> {
    let names = Names::load(conn)?;
    Ok(fetch_nodes(conn, query)?
        .into_iter()
        .map(|node| {
            let (territory, kingdom) = names.territory_chain(node.territory_id);
            NodeRow {
                node,
                territory,
                kingdom,
            }
        })
        .collect())
}

/// Resource list rows with node and material names.
pub fn resource_rows(conn: &Connection, query: &ResourceQuery) -> ModelResult<Vec<ResourceRow>> {
    let nodes: HashMap<RecordId, String> = fetch_nodes(conn, &NodeQuery::default())?
        .into_iter()
        .map(|n| (n.id, n.name))
        .collect();
    let materials: HashMap<RecordId, String> = fetch_materials(conn, &NamedQuery::default())?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    Ok(fetch_resources(conn, query)?
        .into_iter()
        .map(|resource| ResourceRow {
            node: nodes.get(&resource.node_id).cloned().unwrap_or_default(),
            material: materials
                .get(&resource.material_id)
                .cloned()
                .unwrap_or_default(),
            resource,
        })
        .collect())
}

/// Property list rows with location and parent names resolved.
pub fn property_rows(conn: &Connection, query: &PropertyQuery) -> ModelResult<Vec<PropertyRow>> {
    let names = Names::load(conn)?;
    let nodes: HashMap<RecordId, (String, RecordId)> = fetch_nodes(conn, &NodeQuery::default())?
        .into_iter()
        .map(|n| (n.id, (n.name, n.territory_id)))
        .collect();
    let properties: HashMap<RecordId, String> = fetch_properties(conn, &PropertyQuery::default())?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    Ok(fetch_properties(conn, query)?
        .into_iter()
        .map(|property| {
            let (node, territory_id) = nodes
                .get(&property.node_id)
                .cloned()
                .unwrap_or_default();
            let (territory, kingdom) = names.territory_chain(territory_id);
            let parent = property
                .parent_property_id
                .and_then(|id| properties.get(&id).cloned());
            PropertyRow {
                property,
                node,
                territory,
                kingdom,
                parent,
            }
        })
        .collect())
}

/// Recipe list rows with the station name resolved.
pub fn recipe_rows(conn: &Connection, query: &RecipeQuery) -> ModelResult<Vec<RecipeRow>> {
    let stations: HashMap<RecordId, String> = fetch_stations(conn, &NamedQuery::default())?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();
    Ok(fetch_recipes(conn, query)?
        .into_iter()
        .map(|recipe| RecipeRow {
            station: stations.get(&recipe.station_id).cloned().unwrap_or_default(),
            recipe,
        })
        .collect())
}

/// The kingdom a node belongs to, following node -> territory -> kingdom.
pub fn kingdom_of_node(conn: &Connection, node_id: RecordId) -> ModelResult<Option<Kingdom>> {
    let Some(node) = fetch_node(conn, node_id)? else {
        return Ok(None);
    };
    let Some(territory) = fetch_territory(conn, node.territory_id)? else {
        return Ok(None);
    };
    fetch_kingdom(conn, territory.kingdom_id)
}

/// The territory a property sits in, through its node.
pub fn territory_of_property(
    conn: &Connection,
    property_id: RecordId,
) -> ModelResult<Option<Territory>> {
    let Some(property) = fetch_property(conn, property_id)? else {
        return Ok(None);
    };
    let Some(node) = fetch_node(conn, property.node_id)? else {
        return Ok(None);
    };
    fetch_territory(conn, node.territory_id)
}

/// Candidates for a node's connection set. The node being edited is left out
/// so the form cannot connect a node to itself; the store would accept it.
pub fn connectable_nodes(conn: &Connection, editing: Option<RecordId>) -> ModelResult<Vec<Node>> {
    Ok(fetch_nodes(conn, &NodeQuery::default())?
        .into_iter()
        .filter(|node| Some(node.id) != editing)
        .collect())
}

/// Candidates for a property's parent: every property except the one being
/// edited.
pub fn parent_property_choices(
    conn: &Connection,
    editing: Option<RecordId>,
) -> ModelResult<Vec<Property>> {
    Ok(fetch_properties(conn, &PropertyQuery::default())?
        .into_iter()
        .filter(|property| Some(property.id) != editing)
        .collect())
}
