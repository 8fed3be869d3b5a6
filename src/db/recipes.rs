use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::integrity::{clean_name, ensure_exists, expect_changed, now, require, timestamps_at};
use super::query::search_param;
use crate::error::{ModelError, ModelResult};
use crate::models::{Material, Recipe, RecipeDraft, RecordId, Timestamps};

const ENTITY: &str = "recipe";
const SELECT: &str = "SELECT r.id, r.name, r.station_id, r.created, r.modified FROM recipes r";

#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub station_id: Option<RecordId>,
    pub name_contains: Option<String>,
}

/// Which material set of a recipe an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeSide {
    Inputs,
    Outputs,
}

impl RecipeSide {
    fn table(self) -> &'static str {
        match self {
            RecipeSide::Inputs => "recipe_inputs",
            RecipeSide::Outputs => "recipe_outputs",
        }
    }
}

fn map_recipe(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        name: row.get(1)?,
        station_id: row.get(2)?,
        timestamps: timestamps_at(row, 3)?,
    })
}

/// Recipes matching `query`.
pub fn fetch_recipes(conn: &Connection, query: &RecipeQuery) -> ModelResult<Vec<Recipe>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR r.station_id = ?1)
           AND (?2 IS NULL OR INSTR(LOWER(r.name), LOWER(?2)) > 0)
         ORDER BY r.name COLLATE NOCASE, r.id"
    ))?;
    let recipes = stmt
        .query_map(
            params![query.station_id, search_param(&query.name_contains)],
            map_recipe,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(recipes)
}

/// Recipes crafted at a station.
pub fn fetch_recipes_for_station(
    conn: &Connection,
    station_id: RecordId,
) -> ModelResult<Vec<Recipe>> {
    fetch_recipes(
        conn,
        &RecipeQuery {
            station_id: Some(station_id),
            ..RecipeQuery::default()
        },
    )
}

/// A recipe by id.
pub fn fetch_recipe(conn: &Connection, id: RecordId) -> ModelResult<Option<Recipe>> {
    let found = conn
        .query_row(&format!("{SELECT} WHERE r.id = ?1"), params![id], map_recipe)
        .optional()?;
    Ok(found)
}

/// Materials on one side of a recipe, by name.
pub fn fetch_recipe_materials(
    conn: &Connection,
    recipe_id: RecordId,
    side: RecipeSide,
) -> ModelResult<Vec<Material>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT m.id, m.name, m.created, m.modified
         FROM materials m
         INNER JOIN {} x ON x.material_id = m.id
         WHERE x.recipe_id = ?1
         ORDER BY m.name COLLATE NOCASE, m.id",
        side.table()
    ))?;
    let materials = stmt
        .query_map(params![recipe_id], |row| {
            Ok(Material {
                id: row.get(0)?,
                name: row.get(1)?,
                timestamps: timestamps_at(row, 2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(materials)
}

/// Recipes that list `material_id` on the given side: `Inputs` answers "what
/// is this used in", `Outputs` answers "what produces this".
pub fn fetch_recipes_for_material(
    conn: &Connection,
    material_id: RecordId,
    side: RecipeSide,
) -> ModelResult<Vec<Recipe>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         INNER JOIN {} x ON x.recipe_id = r.id
         WHERE x.material_id = ?1
         ORDER BY r.name COLLATE NOCASE, r.id",
        side.table()
    ))?;
    let recipes = stmt
        .query_map(params![material_id], map_recipe)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(recipes)
}

fn validate(conn: &Connection, draft: &RecipeDraft) -> ModelResult<(String, RecordId)> {
    let name = clean_name(ENTITY, &draft.name)?;
    let station_id = require(ENTITY, "station", draft.station_id)?;
    ensure_exists(conn, "stations", ENTITY, "station", station_id)?;
    Ok((name, station_id))
}

/// Insert a recipe at an existing station. Material sets start empty.
pub fn create_recipe(conn: &Connection, draft: &RecipeDraft) -> ModelResult<Recipe> {
    let tx = conn.unchecked_transaction()?;
    let (name, station_id) = validate(&tx, draft)?;
    let stamp = now();
    tx.execute(
        "INSERT INTO recipes (created, modified, name, station_id) VALUES (?1, ?1, ?2, ?3)",
        params![stamp, name, station_id],
    )
    .map_err(|err| ModelError::classify(err, ENTITY))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!(id, station_id, "created recipe");
    Ok(Recipe {
        id,
        name,
        station_id,
        timestamps: Timestamps {
            created: stamp,
            modified: stamp,
        },
    })
}

/// Overwrite the name and station of a recipe.
pub fn update_recipe(conn: &Connection, id: RecordId, draft: &RecipeDraft) -> ModelResult<Recipe> {
    let tx = conn.unchecked_transaction()?;
    let (name, station_id) = validate(&tx, draft)?;
    let changed = tx
        .execute(
            "UPDATE recipes SET name = ?1, station_id = ?2, modified = ?3 WHERE id = ?4",
            params![name, station_id, now(), id],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    expect_changed(changed, ENTITY, id)?;
    let recipe = fetch_recipe(&tx, id)?.ok_or(ModelError::NotFound { entity: ENTITY, id })?;
    tx.commit()?;

    info!(id, "updated recipe");
    Ok(recipe)
}

/// Replace one material set of a recipe. Duplicate ids collapse; an unknown
/// material aborts the whole replacement.
pub fn set_recipe_materials(
    conn: &Connection,
    recipe_id: RecordId,
    side: RecipeSide,
    material_ids: &[RecordId],
) -> ModelResult<()> {
    let tx = conn.unchecked_transaction()?;
    ensure_exists(&tx, "recipes", ENTITY, "recipe", recipe_id)?;

    let table = side.table();
    tx.execute(
        &format!("DELETE FROM {table} WHERE recipe_id = ?1"),
        params![recipe_id],
    )?;
    let wanted: BTreeSet<RecordId> = material_ids.iter().copied().collect();
    for material_id in &wanted {
        ensure_exists(&tx, "materials", ENTITY, "material", *material_id)?;
        tx.execute(
            &format!("INSERT INTO {table} (recipe_id, material_id) VALUES (?1, ?2)"),
            params![recipe_id, material_id],
        )
        .map_err(|err| ModelError::classify(err, ENTITY))?;
    }
    tx.commit()?;

    info!(recipe_id, ?side, materials = wanted.len(), "replaced recipe materials");
    Ok(())
}

/// Replace the input materials of a recipe.
pub fn set_recipe_inputs(
    conn: &Connection,
    recipe_id: RecordId,
    material_ids: &[RecordId],
) -> ModelResult<()> {
    set_recipe_materials(conn, recipe_id, RecipeSide::Inputs, material_ids)
}

/// Replace the output materials of a recipe.
pub fn set_recipe_outputs(
    conn: &Connection,
    recipe_id: RecordId,
    material_ids: &[RecordId],
) -> ModelResult<()> {
    set_recipe_materials(conn, recipe_id, RecipeSide::Outputs, material_ids)
}

/// Delete a recipe and its material links.
pub fn delete_recipe(conn: &Connection, id: RecordId) -> ModelResult<()> {
    let deleted = conn.execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
    expect_changed(deleted, ENTITY, id)?;
    info!(id, "deleted recipe");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_material, create_station, delete_material, delete_station, open_in_memory};

    fn names(materials: Vec<Material>) -> Vec<String> {
        materials.into_iter().map(|m| m.name).collect()
    }

    #[test]
    fn inputs_and_outputs_traverse_both_ways() {
        let conn = open_in_memory().unwrap();
        let heating = create_station(&conn, "Heating").unwrap();
        let ore = create_material(&conn, "Iron Ore").unwrap();
        let water = create_material(&conn, "Mineral Water").unwrap();
        let ingot = create_material(&conn, "Iron Ingot").unwrap();

        let recipe = create_recipe(
            &conn,
            &RecipeDraft {
                name: "Iron Ingot".to_string(),
                station_id: Some(heating.id),
            },
        )
        .unwrap();
        set_recipe_inputs(&conn, recipe.id, &[water.id, ore.id, ore.id]).unwrap();
        set_recipe_outputs(&conn, recipe.id, &[ingot.id]).unwrap();

        assert_eq!(
            names(fetch_recipe_materials(&conn, recipe.id, RecipeSide::Inputs).unwrap()),
            ["Iron Ore", "Mineral Water"]
        );
        let used_in = fetch_recipes_for_material(&conn, ore.id, RecipeSide::Inputs).unwrap();
        assert_eq!(used_in.len(), 1);
        let produced_by = fetch_recipes_for_material(&conn, ingot.id, RecipeSide::Outputs).unwrap();
        assert_eq!(produced_by[0].id, recipe.id);
        assert!(fetch_recipes_for_material(&conn, ingot.id, RecipeSide::Inputs)
            .unwrap()
            .is_empty());

        delete_material(&conn, water.id).unwrap();
        assert_eq!(
            names(fetch_recipe_materials(&conn, recipe.id, RecipeSide::Inputs).unwrap()),
            ["Iron Ore"]
        );
    }

    #[test]
    fn unknown_material_keeps_previous_set() {
        let conn = open_in_memory().unwrap();
        let station = create_station(&conn, "Grinding").unwrap();
        let stone = create_material(&conn, "Rough Stone").unwrap();
        let recipe = create_recipe(
            &conn,
            &RecipeDraft {
                name: "Black Stone Powder".to_string(),
                station_id: Some(station.id),
            },
        )
        .unwrap();
        set_recipe_inputs(&conn, recipe.id, &[stone.id]).unwrap();

        let err = set_recipe_inputs(&conn, recipe.id, &[999]).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrityViolation { .. }));
        assert_eq!(
            names(fetch_recipe_materials(&conn, recipe.id, RecipeSide::Inputs).unwrap()),
            ["Rough Stone"]
        );
    }

    #[test]
    fn station_is_required_and_cascades() {
        let conn = open_in_memory().unwrap();
        let err = create_recipe(
            &conn,
            &RecipeDraft {
                name: "Floating".to_string(),
                station_id: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ReferentialIntegrityViolation { field: "station", .. }
        ));

        let station = create_station(&conn, "Chopping").unwrap();
        create_recipe(
            &conn,
            &RecipeDraft {
                name: "Plank".to_string(),
                station_id: Some(station.id),
            },
        )
        .unwrap();
        delete_station(&conn, station.id).unwrap();
        assert!(fetch_recipes(&conn, &RecipeQuery::default()).unwrap().is_empty());
    }
}
