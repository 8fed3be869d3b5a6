use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use rusqlite::Connection;

use crate::admin::parent_property_choices;
use crate::db::{
    create_kingdom, create_material, create_node, create_property, create_property_station,
    create_recipe, create_resource, create_station, create_territory, delete_kingdom,
    delete_material, delete_node, delete_property, delete_recipe, delete_resource, delete_station,
    delete_territory, fetch_kingdom, fetch_kingdoms, fetch_material, fetch_materials, fetch_node,
    fetch_nodes, fetch_property, fetch_property_station, fetch_recipe, fetch_resource,
    fetch_station, fetch_stations, fetch_territories, fetch_territory, update_kingdom,
    update_material, update_node, update_property, update_property_station, update_recipe,
    update_resource, update_station, update_territory, NamedQuery, NodeQuery, TerritoryQuery,
};
use crate::error::ModelResult;
use crate::models::{NodeDraft, PropertyDraft, RecipeDraft, RecordId, ResourceDraft, TerritoryDraft};

use super::screens::Section;

/// Editable value of one form field.
#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    Text(String),
    /// Raw digits; parsed on submit.
    Number(String),
    Flag(bool),
    /// Pick one of `options`; `None` means nothing chosen.
    Choice {
        options: Vec<(RecordId, String)>,
        selected: Option<usize>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct FormField {
    pub(crate) label: &'static str,
    pub(crate) required: bool,
    pub(crate) value: FieldValue,
}

impl FormField {
    fn text(label: &'static str, required: bool, value: impl Into<String>) -> Self {
        Self {
            label,
            required,
            value: FieldValue::Text(value.into()),
        }
    }

    fn number(label: &'static str, required: bool, value: Option<i64>) -> Self {
        Self {
            label,
            required,
            value: FieldValue::Number(value.map(|v| v.to_string()).unwrap_or_default()),
        }
    }

    fn flag(label: &'static str, value: bool) -> Self {
        Self {
            label,
            required: false,
            value: FieldValue::Flag(value),
        }
    }

    /// Required choices start on the first option so a fresh form is usable
    /// straight away; optional ones start empty.
    fn choice(
        label: &'static str,
        required: bool,
        options: Vec<(RecordId, String)>,
        current: Option<RecordId>,
    ) -> Self {
        let selected = match current {
            Some(id) => options.iter().position(|(option, _)| *option == id),
            None if required && !options.is_empty() => Some(0),
            None => None,
        };
        Self {
            label,
            required,
            value: FieldValue::Choice { options, selected },
        }
    }

    fn display(&self) -> (String, bool) {
        match &self.value {
            FieldValue::Text(value) | FieldValue::Number(value) => {
                if value.is_empty() {
                    (self.placeholder().to_string(), true)
                } else {
                    (value.clone(), false)
                }
            }
            FieldValue::Flag(value) => (if *value { "[x]" } else { "[ ]" }.to_string(), false),
            FieldValue::Choice { options, selected } => {
                match selected.and_then(|idx| options.get(idx)) {
                    Some((_, label)) => (format!("< {label} >"), false),
                    None if options.is_empty() => ("<nothing to choose>".to_string(), true),
                    None => (format!("< {} >", self.placeholder()), true),
                }
            }
        }
    }

    fn placeholder(&self) -> &'static str {
        if self.required {
            "<required>"
        } else {
            "<none>"
        }
    }
}

/// What a submitted form writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormTarget {
    Record {
        section: Section,
        id: Option<RecordId>,
    },
    /// Station slot on a property; saving an already linked station updates
    /// its level instead of adding a second row.
    PropertyStation { property_id: RecordId },
}

/// Outcome of a successful submit.
#[derive(Debug)]
pub(crate) struct Saved {
    pub(crate) section: Section,
    pub(crate) id: RecordId,
    pub(crate) message: String,
}

/// Modal form for adding or editing any record.
#[derive(Debug, Clone)]
pub(crate) struct RecordForm {
    pub(crate) title: String,
    pub(crate) target: FormTarget,
    pub(crate) fields: Vec<FormField>,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

fn kingdom_options(conn: &Connection) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(fetch_kingdoms(conn, &NamedQuery::default())?
        .into_iter()
        .map(|k| (k.id, k.name))
        .collect())
}

fn territory_options(conn: &Connection) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(fetch_territories(conn, &TerritoryQuery::default())?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect())
}

fn node_options(conn: &Connection) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(fetch_nodes(conn, &NodeQuery::default())?
        .into_iter()
        .map(|n| (n.id, n.name))
        .collect())
}

fn material_options(conn: &Connection) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(fetch_materials(conn, &NamedQuery::default())?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect())
}

fn station_options(conn: &Connection) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(fetch_stations(conn, &NamedQuery::default())?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect())
}

impl RecordForm {
    fn with_fields(title: String, target: FormTarget, fields: Vec<FormField>) -> Self {
        Self {
            title,
            target,
            fields,
            active: 0,
            error: None,
        }
    }

    /// Blank form for a new record of `section`.
    pub(crate) fn new_record(conn: &Connection, section: Section) -> Result<Self> {
        let fields = match section {
            Section::Kingdoms | Section::Materials | Section::Stations => {
                vec![FormField::text("Name", true, "")]
            }
            Section::Territories => vec![
                FormField::text("Name", true, ""),
                FormField::choice("Kingdom", true, kingdom_options(conn)?, None),
            ],
            Section::Nodes => vec![
                FormField::text("Name", true, ""),
                FormField::choice("Territory", true, territory_options(conn)?, None),
                FormField::flag("Hub", false),
                FormField::number("Contribution cost", false, None),
                FormField::text("Node manager", false, ""),
            ],
            Section::Resources => vec![
                FormField::choice("Node", true, node_options(conn)?, None),
                FormField::choice("Material", true, material_options(conn)?, None),
                FormField::number("Contribution cost", true, None),
            ],
            Section::Properties => vec![
                FormField::text("Name", true, ""),
                FormField::choice("Node", true, node_options(conn)?, None),
                FormField::choice("Parent property", false, parent_options(conn, None)?, None),
            ],
            Section::Recipes => vec![
                FormField::text("Name", true, ""),
                FormField::choice("Station", true, station_options(conn)?, None),
            ],
        };
        Ok(Self::with_fields(
            format!("Add {}", section.singular()),
            FormTarget::Record { section, id: None },
            fields,
        ))
    }

    /// Form seeded from an existing record; `None` when it has vanished.
    pub(crate) fn edit_record(
        conn: &Connection,
        section: Section,
        id: RecordId,
    ) -> Result<Option<Self>> {
        let fields = match section {
            Section::Kingdoms => match fetch_kingdom(conn, id)? {
                Some(kingdom) => vec![FormField::text("Name", true, kingdom.name)],
                None => return Ok(None),
            },
            Section::Materials => match fetch_material(conn, id)? {
                Some(material) => vec![FormField::text("Name", true, material.name)],
                None => return Ok(None),
            },
            Section::Stations => match fetch_station(conn, id)? {
                Some(station) => vec![FormField::text("Name", true, station.name)],
                None => return Ok(None),
            },
            Section::Territories => match fetch_territory(conn, id)? {
                Some(territory) => vec![
                    FormField::text("Name", true, territory.name),
                    FormField::choice(
                        "Kingdom",
                        true,
                        kingdom_options(conn)?,
                        Some(territory.kingdom_id),
                    ),
                ],
                None => return Ok(None),
            },
            Section::Nodes => match fetch_node(conn, id)? {
                Some(node) => vec![
                    FormField::text("Name", true, node.name),
                    FormField::choice(
                        "Territory",
                        true,
                        territory_options(conn)?,
                        Some(node.territory_id),
                    ),
                    FormField::flag("Hub", node.is_hub),
                    FormField::number("Contribution cost", false, node.contribution_cost),
                    FormField::text("Node manager", false, node.node_manager.unwrap_or_default()),
                ],
                None => return Ok(None),
            },
            Section::Resources => match fetch_resource(conn, id)? {
                Some(resource) => vec![
                    FormField::choice("Node", true, node_options(conn)?, Some(resource.node_id)),
                    FormField::choice(
                        "Material",
                        true,
                        material_options(conn)?,
                        Some(resource.material_id),
                    ),
                    FormField::number(
                        "Contribution cost",
                        true,
                        Some(resource.contribution_cost),
                    ),
                ],
                None => return Ok(None),
            },
            Section::Properties => match fetch_property(conn, id)? {
                Some(property) => vec![
                    FormField::text("Name", true, property.name),
                    FormField::choice("Node", true, node_options(conn)?, Some(property.node_id)),
                    FormField::choice(
                        "Parent property",
                        false,
                        parent_options(conn, Some(id))?,
                        property.parent_property_id,
                    ),
                ],
                None => return Ok(None),
            },
            Section::Recipes => match fetch_recipe(conn, id)? {
                Some(recipe) => vec![
                    FormField::text("Name", true, recipe.name),
                    FormField::choice(
                        "Station",
                        true,
                        station_options(conn)?,
                        Some(recipe.station_id),
                    ),
                ],
                None => return Ok(None),
            },
        };
        Ok(Some(Self::with_fields(
            format!("Edit {}", section.singular()),
            FormTarget::Record {
                section,
                id: Some(id),
            },
            fields,
        )))
    }

    /// Station slot form for one property.
    pub(crate) fn property_station(conn: &Connection, property_id: RecordId, owner: &str) -> Result<Self> {
        Ok(Self::with_fields(
            format!("Station on {owner}"),
            FormTarget::PropertyStation { property_id },
            vec![
                FormField::choice("Station", true, station_options(conn)?, None),
                FormField::number("Max level", true, None),
            ],
        ))
    }

    pub(crate) fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    pub(crate) fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Append a character to the active field, validating allowed input.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let Some(field) = self.fields.get_mut(self.active) else {
            return false;
        };
        match &mut field.value {
            FieldValue::Text(value) if !ch.is_control() => {
                value.push(ch);
                true
            }
            FieldValue::Number(value) if ch.is_ascii_digit() || (ch == '-' && value.is_empty()) => {
                value.push(ch);
                true
            }
            FieldValue::Flag(value) if ch == ' ' => {
                *value = !*value;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.active) {
            match &mut field.value {
                FieldValue::Text(value) | FieldValue::Number(value) => {
                    value.pop();
                }
                FieldValue::Choice { selected, .. } if !field.required => *selected = None,
                _ => {}
            }
        }
    }

    /// Left/Right on a choice or flag. Optional choices pass through the
    /// empty slot between the last and first option.
    pub(crate) fn cycle(&mut self, offset: isize) {
        let Some(field) = self.fields.get_mut(self.active) else {
            return;
        };
        match &mut field.value {
            FieldValue::Flag(value) => *value = !*value,
            FieldValue::Choice { options, selected } if !options.is_empty() => {
                let slots = options.len() as isize + if field.required { 0 } else { 1 };
                let current = match *selected {
                    Some(idx) => idx as isize,
                    None => options.len() as isize,
                };
                let next = (current + offset).rem_euclid(slots) as usize;
                *selected = if next < options.len() { Some(next) } else { None };
            }
            _ => {}
        }
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, idx: usize) -> Line<'static> {
        let Some(field) = self.fields.get(idx) else {
            return Line::from("");
        };
        let (display, is_placeholder) = field.display();
        let style = if idx == self.active {
            Style::default().fg(Color::Yellow)
        } else if is_placeholder {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::raw(format!("{}: ", field.label)),
            Span::styled(display, style),
        ])
    }

    /// Cursor column offset for the active field, when it takes typed input.
    pub(crate) fn cursor_offset(&self) -> Option<u16> {
        let field = self.fields.get(self.active)?;
        match &field.value {
            FieldValue::Text(value) | FieldValue::Number(value) => {
                Some((field.label.len() + 2 + value.chars().count()) as u16)
            }
            _ => None,
        }
    }

    fn text(&self, idx: usize) -> &str {
        match self.fields.get(idx).map(|field| &field.value) {
            Some(FieldValue::Text(value)) => value,
            _ => "",
        }
    }

    fn number(&self, idx: usize) -> Result<Option<i64>> {
        let Some(field) = self.fields.get(idx) else {
            return Ok(None);
        };
        let FieldValue::Number(raw) = &field.value else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            if field.required {
                return Err(anyhow!("{} is required.", field.label));
            }
            return Ok(None);
        }
        raw.parse::<i64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a whole number.", field.label))
    }

    fn flag(&self, idx: usize) -> bool {
        matches!(
            self.fields.get(idx).map(|field| &field.value),
            Some(FieldValue::Flag(true))
        )
    }

    fn choice(&self, idx: usize) -> Option<RecordId> {
        match self.fields.get(idx).map(|field| &field.value) {
            Some(FieldValue::Choice { options, selected }) => {
                selected.and_then(|i| options.get(i)).map(|(id, _)| *id)
            }
            _ => None,
        }
    }

    /// Write the form to the database. Model validation errors come back
    /// unchanged so the form can show them.
    pub(crate) fn submit(&self, conn: &Connection) -> Result<Saved> {
        let (section, id) = match self.target {
            FormTarget::Record { section, id } => (section, id),
            FormTarget::PropertyStation { property_id } => {
                return self.submit_station_slot(conn, property_id);
            }
        };

        let verb = if id.is_some() { "Updated" } else { "Added" };
        let (saved_id, label) = match section {
            Section::Kingdoms => {
                let kingdom = match id {
                    Some(id) => update_kingdom(conn, id, self.text(0))?,
                    None => create_kingdom(conn, self.text(0))?,
                };
                (kingdom.id, kingdom.name)
            }
            Section::Materials => {
                let material = match id {
                    Some(id) => update_material(conn, id, self.text(0))?,
                    None => create_material(conn, self.text(0))?,
                };
                (material.id, material.name)
            }
            Section::Stations => {
                let station = match id {
                    Some(id) => update_station(conn, id, self.text(0))?,
                    None => create_station(conn, self.text(0))?,
                };
                (station.id, station.name)
            }
            Section::Territories => {
                let draft = TerritoryDraft {
                    name: self.text(0).to_string(),
                    kingdom_id: self.choice(1),
                };
                let territory = match id {
                    Some(id) => update_territory(conn, id, &draft)?,
                    None => create_territory(conn, &draft)?,
                };
                (territory.id, territory.name)
            }
            Section::Nodes => {
                let draft = NodeDraft {
                    name: self.text(0).to_string(),
                    territory_id: self.choice(1),
                    is_hub: self.flag(2),
                    contribution_cost: self.number(3)?,
                    node_manager: Some(self.text(4).to_string()),
                };
                let node = match id {
                    Some(id) => update_node(conn, id, &draft)?,
                    None => create_node(conn, &draft)?,
                };
                (node.id, node.name)
            }
            Section::Resources => {
                let draft = ResourceDraft {
                    node_id: self.choice(0),
                    material_id: self.choice(1),
                    contribution_cost: self.number(2)?.unwrap_or_default(),
                };
                let resource = match id {
                    Some(id) => update_resource(conn, id, &draft)?,
                    None => create_resource(conn, &draft)?,
                };
                (resource.id, format!("resource #{}", resource.id))
            }
            Section::Properties => {
                let draft = PropertyDraft {
                    name: self.text(0).to_string(),
                    node_id: self.choice(1),
                    parent_property_id: self.choice(2),
                };
                let property = match id {
                    Some(id) => update_property(conn, id, &draft)?,
                    None => create_property(conn, &draft)?,
                };
                (property.id, property.name)
            }
            Section::Recipes => {
                let draft = RecipeDraft {
                    name: self.text(0).to_string(),
                    station_id: self.choice(1),
                };
                let recipe = match id {
                    Some(id) => update_recipe(conn, id, &draft)?,
                    None => create_recipe(conn, &draft)?,
                };
                (recipe.id, recipe.name)
            }
        };

        Ok(Saved {
            section,
            id: saved_id,
            message: format!("{verb} {} {label}.", section.singular().to_lowercase()),
        })
    }

    fn submit_station_slot(&self, conn: &Connection, property_id: RecordId) -> Result<Saved> {
        let station_id = self
            .choice(0)
            .ok_or_else(|| anyhow!("Choose a station first."))?;
        let max_level = self.number(1)?.unwrap_or_default();
        let link = match fetch_property_station(conn, property_id, station_id)? {
            Some(existing) => update_property_station(conn, existing.id, max_level)?,
            None => create_property_station(conn, property_id, station_id, max_level)?,
        };
        Ok(Saved {
            section: Section::Properties,
            id: property_id,
            message: format!("Station slot saved at max level {}.", link.max_level),
        })
    }
}

fn parent_options(
    conn: &Connection,
    editing: Option<RecordId>,
) -> ModelResult<Vec<(RecordId, String)>> {
    Ok(parent_property_choices(conn, editing)?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect())
}

/// Metadata needed while confirming a delete.
#[derive(Debug, Clone)]
pub(crate) struct ConfirmDelete {
    pub(crate) section: Section,
    pub(crate) id: RecordId,
    pub(crate) label: String,
}

impl ConfirmDelete {
    pub(crate) fn perform(&self, conn: &Connection) -> ModelResult<()> {
        match self.section {
            Section::Kingdoms => delete_kingdom(conn, self.id),
            Section::Territories => delete_territory(conn, self.id),
            Section::Nodes => delete_node(conn, self.id),
            Section::Resources => delete_resource(conn, self.id),
            Section::Properties => delete_property(conn, self.id),
            Section::Materials => delete_material(conn, self.id),
            Section::Stations => delete_station(conn, self.id),
            Section::Recipes => delete_recipe(conn, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch_node, open_in_memory};
    use crate::error::ModelError;

    fn type_text(form: &mut RecordForm, text: &str) {
        for ch in text.chars() {
            form.push_char(ch);
        }
    }

    #[test]
    fn number_fields_reject_letters() {
        let conn = open_in_memory().unwrap();
        let mut form = RecordForm::new_record(&conn, Section::Resources).unwrap();
        form.active = 2;
        assert!(!form.push_char('x'));
        assert!(form.push_char('-'));
        assert!(form.push_char('5'));
        assert!(!form.push_char('-'));
        assert_eq!(form.number(2).unwrap(), Some(-5));
    }

    #[test]
    fn optional_choice_cycles_through_empty_slot() {
        let conn = open_in_memory().unwrap();
        let kingdom = create_kingdom(&conn, "Calpheon").unwrap();
        let territory = create_territory(
            &conn,
            &TerritoryDraft {
                name: "Calpheon".into(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        let node = create_node(
            &conn,
            &NodeDraft {
                name: "Calpheon City".into(),
                territory_id: Some(territory.id),
                ..NodeDraft::default()
            },
        )
        .unwrap();
        create_property(
            &conn,
            &PropertyDraft {
                name: "Workshop".into(),
                node_id: Some(node.id),
                parent_property_id: None,
            },
        )
        .unwrap();

        let mut form = RecordForm::new_record(&conn, Section::Properties).unwrap();
        form.active = 2;
        assert_eq!(form.choice(2), None);
        form.cycle(1);
        assert!(form.choice(2).is_some());
        form.cycle(1);
        assert_eq!(form.choice(2), None);
    }

    #[test]
    fn submitting_a_node_stores_blank_manager_as_none() {
        let conn = open_in_memory().unwrap();
        let kingdom = create_kingdom(&conn, "Balenos").unwrap();
        create_territory(
            &conn,
            &TerritoryDraft {
                name: "Balenos".into(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();

        let mut form = RecordForm::new_record(&conn, Section::Nodes).unwrap();
        type_text(&mut form, "Velia");
        form.active = 2;
        form.push_char(' ');
        form.active = 4;
        type_text(&mut form, "   ");

        let saved = form.submit(&conn).unwrap();
        let node = fetch_node(&conn, saved.id).unwrap().unwrap();
        assert!(node.is_hub);
        assert_eq!(node.node_manager, None);
        assert_eq!(saved.message, "Added node Velia.");
    }

    #[test]
    fn missing_kingdom_surfaces_model_error() {
        let conn = open_in_memory().unwrap();
        let mut form = RecordForm::new_record(&conn, Section::Territories).unwrap();
        type_text(&mut form, "Orphan");

        let err = form.submit(&conn).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::ReferentialIntegrityViolation { .. })
        ));
    }

    #[test]
    fn station_slot_form_updates_existing_level() {
        let conn = open_in_memory().unwrap();
        let kingdom = create_kingdom(&conn, "Mediah").unwrap();
        let territory = create_territory(
            &conn,
            &TerritoryDraft {
                name: "Mediah".into(),
                kingdom_id: Some(kingdom.id),
            },
        )
        .unwrap();
        let node = create_node(
            &conn,
            &NodeDraft {
                name: "Altinova".into(),
                territory_id: Some(territory.id),
                ..NodeDraft::default()
            },
        )
        .unwrap();
        let property = create_property(
            &conn,
            &PropertyDraft {
                name: "Altinova 2-5".into(),
                node_id: Some(node.id),
                parent_property_id: None,
            },
        )
        .unwrap();
        let station = create_station(&conn, "Refinery").unwrap();

        for level in ["2", "4"] {
            let mut form = RecordForm::property_station(&conn, property.id, "Altinova 2-5").unwrap();
            form.active = 1;
            type_text(&mut form, level);
            form.submit(&conn).unwrap();
        }

        let link = fetch_property_station(&conn, property.id, station.id)
            .unwrap()
            .unwrap();
        assert_eq!(link.max_level, 4);
    }
}
