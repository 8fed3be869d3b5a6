//! Persistence layer over the embedded SQLite store. One submodule per entity
//! group; every write validates its input, runs in a single transaction and
//! reports failures as `ModelError`. Reads of missing ids return `None`.

mod connection;
mod integrity;
mod kingdoms;
mod materials;
mod named;
mod node_links;
mod nodes;
mod properties;
mod property_stations;
mod query;
mod recipes;
mod resources;
mod stations;
mod territories;

pub use connection::{ensure_schema, open_database, open_in_memory, table_counts};
pub use kingdoms::{create_kingdom, delete_kingdom, fetch_kingdom, fetch_kingdoms, update_kingdom};
pub use materials::{
    create_material, delete_material, fetch_material, fetch_materials, update_material,
};
pub use node_links::{
    are_connected, connect_nodes, disconnect_nodes, fetch_connected_nodes, set_connected_nodes,
};
pub use nodes::{
    create_node, delete_node, fetch_node, fetch_nodes, fetch_nodes_for_territory,
    normalize_node_manager, update_node, NodeOrder, NodeQuery,
};
pub use properties::{
    create_property, delete_property, fetch_child_properties, fetch_parent_property,
    fetch_properties, fetch_properties_for_node, fetch_property, set_parent_property,
    update_property, ParentFilter, PropertyOrder, PropertyQuery,
};
pub use property_stations::{
    create_property_station, delete_property_station, fetch_properties_for_station,
    fetch_property_station, fetch_property_station_by_id, fetch_stations_for_property,
    update_property_station, PropertySlot, StationSlot,
};
pub use query::{Direction, NamedOrder, NamedQuery};
pub use recipes::{
    create_recipe, delete_recipe, fetch_recipe, fetch_recipe_materials, fetch_recipes,
    fetch_recipes_for_material, fetch_recipes_for_station, set_recipe_inputs,
    set_recipe_materials, set_recipe_outputs, update_recipe, RecipeQuery, RecipeSide,
};
pub use resources::{
    create_resource, delete_resource, fetch_resource, fetch_resources,
    fetch_resources_for_material, fetch_resources_for_node, update_resource, ResourceOrder,
    ResourceQuery,
};
pub use stations::{create_station, delete_station, fetch_station, fetch_stations, update_station};
pub use territories::{
    create_territory, delete_territory, fetch_territories, fetch_territories_for_kingdom,
    fetch_territory, update_territory, TerritoryOrder, TerritoryQuery,
};
