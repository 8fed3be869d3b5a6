//! Read-only list and detail aggregates. Each detail gathers a record together
//! with the records reachable from it in one call, so a screen can render it
//! without issuing its own queries.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::admin::{resource_rows, ResourceRow};
use crate::db::{
    fetch_child_properties, fetch_connected_nodes, fetch_kingdom, fetch_kingdoms, fetch_material,
    fetch_node, fetch_nodes, fetch_nodes_for_territory, fetch_parent_property,
    fetch_properties_for_node, fetch_properties_for_station, fetch_property, fetch_recipe,
    fetch_recipe_materials, fetch_recipes_for_material, fetch_recipes_for_station, fetch_resource,
    fetch_station, fetch_stations_for_property, fetch_territories, fetch_territories_for_kingdom,
    fetch_territory, NamedQuery, NodeQuery, PropertySlot, RecipeSide, ResourceQuery,
    StationSlot, TerritoryQuery,
};
use crate::error::ModelResult;
use crate::models::{
    Kingdom, Material, Node, Property, Recipe, RecordId, Station, Territory,
};

/// Kingdom list entry.
#[derive(Debug, Clone)]
pub struct KingdomOverview {
    pub kingdom: Kingdom,
    pub territory_count: usize,
    pub node_count: usize,
}

#[derive(Debug, Clone)]
pub struct TerritoryBranch {
    pub territory: Territory,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct KingdomDetail {
    pub kingdom: Kingdom,
    pub territories: Vec<TerritoryBranch>,
}

#[derive(Debug, Clone)]
pub struct TerritoryDetail {
    pub territory: Territory,
    pub kingdom: Kingdom,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct PropertyBranch {
    pub property: Property,
    pub stations: Vec<StationSlot>,
}

#[derive(Debug, Clone)]
pub struct NodeDetail {
    pub node: Node,
    pub territory: Territory,
    pub kingdom: Kingdom,
    pub connected: Vec<Node>,
    pub resources: Vec<ResourceRow>,
    pub properties: Vec<PropertyBranch>,
}

#[derive(Debug, Clone)]
pub struct PropertyDetail {
    pub property: Property,
    pub node: Node,
    pub territory: Territory,
    pub kingdom: Kingdom,
    pub parent: Option<Property>,
    pub children: Vec<Property>,
    pub stations: Vec<StationSlot>,
}

#[derive(Debug, Clone)]
pub struct MaterialDetail {
    pub material: Material,
    pub resources: Vec<ResourceRow>,
    /// Recipes consuming the material.
    pub used_in: Vec<Recipe>,
    /// Recipes producing the material.
    pub produced_by: Vec<Recipe>,
}

#[derive(Debug, Clone)]
pub struct StationDetail {
    pub station: Station,
    pub properties: Vec<PropertySlot>,
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub station: Station,
    pub inputs: Vec<Material>,
    pub outputs: Vec<Material>,
}

/// Every kingdom with its territory and node counts.
pub fn kingdom_overviews(conn: &Connection) -> ModelResult<Vec<KingdomOverview>> {
    let territories = fetch_territories(conn, &TerritoryQuery::default())?;
    let kingdom_of: HashMap<RecordId, RecordId> = territories
        .iter()
        .map(|t| (t.id, t.kingdom_id))
        .collect();

    let mut territory_counts: HashMap<RecordId, usize> = HashMap::new();
    for territory in &territories {
        *territory_counts.entry(territory.kingdom_id).or_default() += 1;
    }
    let mut node_counts: HashMap<RecordId, usize> = HashMap::new();
    for node in fetch_nodes(conn, &NodeQuery::default())? {
        if let Some(kingdom_id) = kingdom_of.get(&node.territory_id) {
            *node_counts.entry(*kingdom_id).or_default() += 1;
        }
    }

    Ok(fetch_kingdoms(conn, &NamedQuery::default())?
        .into_iter()
        .map(|kingdom| KingdomOverview {
            territory_count: territory_counts.get(&kingdom.id).copied().unwrap_or(0),
            node_count: node_counts.get(&kingdom.id).copied().unwrap_or(0),
            kingdom,
        })
        .collect())
}

/// A kingdom with its territories and their nodes.
pub fn kingdom_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<KingdomDetail>> {
    let Some(kingdom) = fetch_kingdom(conn, id)? else {
        return Ok(None);
    };
    let territories = fetch_territories_for_kingdom(conn, id)?
        .into_iter()
        .map(|territory| {
            let nodes = fetch_nodes_for_territory(conn, territory.id)?;
            Ok(TerritoryBranch { territory, nodes })
        })
        .collect::<ModelResult<Vec<_>>>()?;
    Ok(Some(KingdomDetail {
        kingdom,
        territories,
    }))
}

/// A territory with its kingdom and its nodes.
pub fn territory_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<TerritoryDetail>> {
    let Some(territory) = fetch_territory(conn, id)? else {
        return Ok(None);
    };
    let Some(kingdom) = fetch_kingdom(conn, territory.kingdom_id)? else {
        return Ok(None);
    };
    let nodes = fetch_nodes_for_territory(conn, id)?;
    Ok(Some(TerritoryDetail {
        territory,
        kingdom,
        nodes,
    }))
}

/// A node with its location, connections, resources and properties.
pub fn node_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<NodeDetail>> {
    let Some(node) = fetch_node(conn, id)? else {
        return Ok(None);
    };
    let Some(territory) = fetch_territory(conn, node.territory_id)? else {
        return Ok(None);
    };
    let Some(kingdom) = fetch_kingdom(conn, territory.kingdom_id)? else {
        return Ok(None);
    };

    let connected = fetch_connected_nodes(conn, id)?;
    let resources = resource_rows(
        conn,
        &ResourceQuery {
            node_id: Some(id),
            ..ResourceQuery::default()
        },
    )?;
    let properties = fetch_properties_for_node(conn, id)?
        .into_iter()
        .map(|property| {
            let stations = fetch_stations_for_property(conn, property.id)?;
            Ok(PropertyBranch { property, stations })
        })
        .collect::<ModelResult<Vec<_>>>()?;

    Ok(Some(NodeDetail {
        node,
        territory,
        kingdom,
        connected,
        resources,
        properties,
    }))
}

/// A property with its node, parent, children and station slots.
pub fn property_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<PropertyDetail>> {
    let Some(property) = fetch_property(conn, id)? else {
        return Ok(None);
    };
    let Some(node) = fetch_node(conn, property.node_id)? else {
        return Ok(None);
    };
    let Some(territory) = fetch_territory(conn, node.territory_id)? else {
        return Ok(None);
    };
    let Some(kingdom) = fetch_kingdom(conn, territory.kingdom_id)? else {
        return Ok(None);
    };

    let parent = fetch_parent_property(conn, &property)?;
    let children = fetch_child_properties(conn, id)?;
    let stations = fetch_stations_for_property(conn, id)?;
    Ok(Some(PropertyDetail {
        property,
        node,
        territory,
        kingdom,
        parent,
        children,
        stations,
    }))
}

/// A material with the resources and recipes that involve it.
pub fn material_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<MaterialDetail>> {
    let Some(material) = fetch_material(conn, id)? else {
        return Ok(None);
    };
    let resources = resource_rows(
        conn,
        &ResourceQuery {
            material_id: Some(id),
            ..ResourceQuery::default()
        },
    )?;
    Ok(Some(MaterialDetail {
        material,
        resources,
        used_in: fetch_recipes_for_material(conn, id, RecipeSide::Inputs)?,
        produced_by: fetch_recipes_for_material(conn, id, RecipeSide::Outputs)?,
    }))
}

/// A station with the properties offering it and its recipes.
pub fn station_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<StationDetail>> {
    let Some(station) = fetch_station(conn, id)? else {
        return Ok(None);
    };
    Ok(Some(StationDetail {
        station,
        properties: fetch_properties_for_station(conn, id)?,
        recipes: fetch_recipes_for_station(conn, id)?,
    }))
}

/// A recipe with its station and material sets.
pub fn recipe_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<RecipeDetail>> {
    let Some(recipe) = fetch_recipe(conn, id)? else {
        return Ok(None);
    };
    let Some(station) = fetch_station(conn, recipe.station_id)? else {
        return Ok(None);
    };
    Ok(Some(RecipeDetail {
        inputs: fetch_recipe_materials(conn, id, RecipeSide::Inputs)?,
        outputs: fetch_recipe_materials(conn, id, RecipeSide::Outputs)?,
        recipe,
        station,
    }))
}

/// A resource with its node and material names resolved.
pub fn resource_detail(conn: &Connection, id: RecordId) -> ModelResult<Option<ResourceRow>> {
    let Some(resource) = fetch_resource(conn, id)? else {
        return Ok(None);
    };
    let node = fetch_node(conn, resource.node_id)?;
    let material = fetch_material(conn, resource.material_id)?;
    Ok(Some(ResourceRow {
        node: node.map(|n| n.name).unwrap_or_default(),
        material: material.map(|m| m.name).unwrap_or_default(),
        resource,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_kingdom, create_material, create_node, create_property, create_property_station,
        create_resource, create_station, create_territory, open_in_memory,
    };
    use crate::models::{NodeDraft, PropertyDraft, ResourceDraft, TerritoryDraft};

    #[test]
    fn kingdom_overview_counts() {
        let conn = open_in_memory().unwrap();
        let calpheon = create_kingdom(&conn, "Calpheon").unwrap();
        create_kingdom(&conn, "Drieghan").unwrap();
        for territory_name in ["Serendia", "Calpheon"] {
            let territory = create_territory(
                &conn,
                &TerritoryDraft {
                    name: territory_name.to_string(),
                    kingdom_id: Some(calpheon.id),
                },
            )
            .unwrap();
            create_node(
                &conn,
                &NodeDraft {
                    name: format!("{territory_name} Hub"),
                    territory_id: Some(territory.id),
                    is_hub: true,
                    ..NodeDraft::default()
                },
            )
            .unwrap();
        }

        let overviews = kingdom_overviews(&conn).unwrap();
        assert_eq!(overviews.len(), 2);
        assert_eq!(overviews[0].kingdom.name, "Calpheon");
        assert_eq!(overviews[0].territory_count, 2);
        assert_eq!(overviews[0].node_count, 2);
        assert_eq!(overviews[1].territory_count, 0);

        let detail = kingdom_detail(&conn, calpheon.id).unwrap().unwrap();
        let names: Vec<_> = detail
            .territories
            .iter()
            .map(|b| b.territory.name.as_str())
            .collect();
        assert_eq!(names, ["Calpheon", "Serendia"]);
        assert!(kingdom_detail(&conn, 404).unwrap().is_none());
    }

    #[test]
    fn node_and_station_details() {
        let conn = open_in_memory().unwrap();
        let kingdom = create_kingdom(&conn, "Valencia").unwrap();
        let territory = create_territory(
            &conn,
            &TerritoryDraft {
                name: "Valencia".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        let node = create_node(
            &conn,
            &NodeDraft {
                name: "Valencia City".to_string(),
                territory_id: Some(territory.id),
                is_hub: true,
                ..NodeDraft::default()
            },
        )
        .unwrap();
        let property = create_property(
            &conn,
            &PropertyDraft {
                name: "Valencia 1-1".to_string(),
                node_id: Some(node.id),
                parent_property_id: None,
            },
        )
        .unwrap();
        let mill = create_station(&conn, "Costume Mill").unwrap();
        create_property_station(&conn, property.id, mill.id, 2).unwrap();

        let detail = node_detail(&conn, node.id).unwrap().unwrap();
        assert_eq!(detail.kingdom.name, "Valencia");
        assert_eq!(detail.properties.len(), 1);
        assert_eq!(detail.properties[0].stations[0].link.max_level, 2);

        let station = station_detail(&conn, mill.id).unwrap().unwrap();
        assert_eq!(station.properties[0].property.id, property.id);

        let property = property_detail(&conn, property.id).unwrap().unwrap();
        assert!(property.parent.is_none());
        assert_eq!(property.territory.name, "Valencia");
    }

    #[test]
    fn resource_detail_resolves_names() {
        let conn = open_in_memory().unwrap();
        let kingdom = create_kingdom(&conn, "Balenos").unwrap();
        let territory = create_territory(
            &conn,
            &TerritoryDraft {
                name: "Balenos".to_string(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        let node = create_node(
            &conn,
            &NodeDraft {
                name: "Toscani Farm".to_string(),
                territory_id: Some(territory.id),
                ..NodeDraft::default()
            },
        )
        .unwrap();
        let potato = create_material(&conn, "Potato").unwrap();
        let wheat = create_material(&conn, "Wheat").unwrap();
        let draft = |material_id| ResourceDraft {
            node_id: Some(node.id),
            material_id: Some(material_id),
            contribution_cost: 1,
        };
        create_resource(&conn, &draft(wheat.id)).unwrap();
        let resource = create_resource(&conn, &draft(potato.id)).unwrap();

        let row = resource_detail(&conn, resource.id).unwrap().unwrap();
        assert_eq!(row.resource.id, resource.id);
        assert_eq!(row.node, "Toscani Farm");
        assert_eq!(row.material, "Potato");
        assert_eq!(row.to_string(), "Resource Potato at Node Toscani Farm");
        assert!(resource_detail(&conn, 404).unwrap().is_none());
    }
}
