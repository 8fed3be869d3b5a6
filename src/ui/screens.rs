use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use rusqlite::Connection;

use crate::admin::{
    connectable_nodes, node_rows, property_rows, property_station_label, recipe_rows,
    resource_rows, territory_rows,
};
use crate::db::{
    delete_property_station, fetch_connected_nodes, fetch_materials, fetch_recipe_materials,
    fetch_stations, fetch_stations_for_property, set_connected_nodes, set_recipe_materials,
    NamedQuery, NodeQuery, PropertyQuery, RecipeQuery,
    RecipeSide, ResourceQuery, TerritoryQuery,
};
use crate::models::{Node, RecordId, Timestamps};
use crate::views::{
    kingdom_detail, kingdom_overviews, material_detail, node_detail, property_detail,
    recipe_detail, resource_detail, station_detail, territory_detail,
};

/// Top-level tabs, one per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Kingdoms,
    Territories,
    Nodes,
    Resources,
    Properties,
    Materials,
    Stations,
    Recipes,
}

impl Section {
    pub(crate) const ALL: [Section; 8] = [
        Section::Kingdoms,
        Section::Territories,
        Section::Nodes,
        Section::Resources,
        Section::Properties,
        Section::Materials,
        Section::Stations,
        Section::Recipes,
    ];

    pub(crate) fn title(self) -> &'static str {
        match self {
            Section::Kingdoms => "Kingdoms",
            Section::Territories => "Territories",
            Section::Nodes => "Nodes",
            Section::Resources => "Resources",
            Section::Properties => "Properties",
            Section::Materials => "Materials",
            Section::Stations => "Stations",
            Section::Recipes => "Recipes",
        }
    }

    pub(crate) fn singular(self) -> &'static str {
        match self {
            Section::Kingdoms => "Kingdom",
            Section::Territories => "Territory",
            Section::Nodes => "Node",
            Section::Resources => "Resource",
            Section::Properties => "Property",
            Section::Materials => "Material",
            Section::Stations => "Station",
            Section::Recipes => "Recipe",
        }
    }

    pub(crate) fn headers(self) -> &'static [&'static str] {
        match self {
            Section::Kingdoms => &["Name", "Territories", "Nodes"],
            Section::Territories => &["Name", "Kingdom"],
            Section::Nodes => &["Name", "Hub", "Territory", "Kingdom", "Cost"],
            Section::Resources => &["Node", "Material", "Cost"],
            Section::Properties => &["Name", "Node", "Parent", "Kingdom"],
            Section::Materials | Section::Stations => &["Name"],
            Section::Recipes => &["Name", "Station"],
        }
    }

    /// What else disappears when a record of this section is deleted.
    pub(crate) fn cascade_note(self) -> Option<&'static str> {
        match self {
            Section::Kingdoms => Some("its territories and everything in them"),
            Section::Territories => Some("its nodes and everything attached to them"),
            Section::Nodes => Some("its resources, properties and connections"),
            Section::Properties => Some("its child properties and station slots"),
            Section::Materials => Some("its resources and recipe entries"),
            Section::Stations => Some("its property slots and recipes"),
            Section::Resources | Section::Recipes => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        Section::ALL
            .iter()
            .position(|section| *section == self)
            .unwrap_or(0)
    }

    pub(crate) fn offset(self, offset: isize) -> Section {
        let len = Section::ALL.len() as isize;
        let idx = (self.index() as isize + offset).rem_euclid(len);
        Section::ALL[idx as usize]
    }
}

/// One row of a list screen.
#[derive(Debug, Clone)]
pub(crate) struct ListEntry {
    pub(crate) id: RecordId,
    /// Human-readable name used in confirmations and status messages.
    pub(crate) label: String,
    pub(crate) columns: Vec<String>,
    /// Hub flag for nodes; unused elsewhere.
    pub(crate) flagged: bool,
}

fn cost_text(cost: Option<i64>) -> String {
    cost.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

fn load_entries(conn: &Connection, section: Section) -> Result<Vec<ListEntry>> {
    let entries = match section {
        Section::Kingdoms => kingdom_overviews(conn)?
            .into_iter()
            .map(|o| ListEntry {
                id: o.kingdom.id,
                label: o.kingdom.name.clone(),
                columns: vec![
                    o.kingdom.name,
                    o.territory_count.to_string(),
                    o.node_count.to_string(),
                ],
                flagged: false,
            })
            .collect(),
        Section::Territories => territory_rows(conn, &TerritoryQuery::default())?
            .into_iter()
            .map(|row| ListEntry {
                id: row.territory.id,
                label: row.territory.name.clone(),
                columns: vec![row.territory.name, row.kingdom],
                flagged: false,
            })
            .collect(),
        Section::Nodes => node_rows(conn, &NodeQuery::default())?
            .into_iter()
            .map(|row| ListEntry {
                id: row.node.id,
                label: row.node.name.clone(),
                columns: vec![
                    row.node.name,
                    if row.node.is_hub { "yes" } else { "" }.to_string(),
                    row.territory,
                    row.kingdom,
                    cost_text(row.node.contribution_cost),
                ],
                flagged: row.node.is_hub,
            })
            .collect(),
        Section::Resources => resource_rows(conn, &ResourceQuery::default())?
            .into_iter()
            .map(|row| ListEntry {
                id: row.resource.id,
                label: row.to_string(),
                columns: vec![
                    row.node,
                    row.material,
                    row.resource.contribution_cost.to_string(),
                ],
                flagged: false,
            })
            .collect(),
        Section::Properties => property_rows(conn, &PropertyQuery::default())?
            .into_iter()
            .map(|row| ListEntry {
                id: row.property.id,
                label: row.property.name.clone(),
                columns: vec![
                    row.property.name,
                    row.node,
                    row.parent.unwrap_or_default(),
                    row.kingdom,
                ],
                flagged: false,
            })
            .collect(),
        Section::Materials => fetch_materials(conn, &NamedQuery::default())?
            .into_iter()
            .map(|m| ListEntry {
                id: m.id,
                label: m.name.clone(),
                columns: vec![m.name],
                flagged: false,
            })
            .collect(),
        Section::Stations => fetch_stations(conn, &NamedQuery::default())?
            .into_iter()
            .map(|s| ListEntry {
                id: s.id,
                label: s.name.clone(),
                columns: vec![s.name],
                flagged: false,
            })
            .collect(),
        Section::Recipes => recipe_rows(conn, &RecipeQuery::default())?
            .into_iter()
            .map(|row| ListEntry {
                id: row.recipe.id,
                label: row.recipe.name.clone(),
                columns: vec![row.recipe.name, row.station],
                flagged: false,
            })
            .collect(),
    };
    Ok(entries)
}

/// Records of one section plus the inline search and hub filter state.
pub(crate) struct ListScreen {
    pub(crate) section: Section,
    pub(crate) entries: Vec<ListEntry>,
    pub(crate) filtered: Vec<ListEntry>,
    pub(crate) filter: Option<String>,
    pub(crate) hubs_only: bool,
    pub(crate) selected: usize,
}

impl ListScreen {
    pub(crate) fn load(conn: &Connection, section: Section) -> Result<Self> {
        let entries = load_entries(conn, section)
            .with_context(|| format!("failed to load {}", section.title().to_lowercase()))?;
        Ok(Self::new(section, entries))
    }

    pub(crate) fn new(section: Section, entries: Vec<ListEntry>) -> Self {
        let mut screen = Self {
            section,
            filtered: Vec::new(),
            entries,
            filter: None,
            hubs_only: false,
            selected: 0,
        };
        screen.apply_filter();
        screen
    }

    /// Re-query the section, keeping the filter and moving the cursor to
    /// `focus` when it is still listed.
    pub(crate) fn reload(&mut self, conn: &Connection, focus: Option<RecordId>) -> Result<()> {
        self.entries = load_entries(conn, self.section)?;
        self.apply_filter();
        if let Some(id) = focus {
            if let Some(idx) = self.filtered.iter().position(|entry| entry.id == id) {
                self.selected = idx;
            }
        }
        Ok(())
    }

    pub(crate) fn apply_filter(&mut self) {
        let query = self
            .filter
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        self.filtered = self
            .entries
            .iter()
            .filter(|entry| !self.hubs_only || entry.flagged)
            .filter(|entry| match &query {
                Some(q) => entry
                    .columns
                    .iter()
                    .any(|column| column.to_lowercase().contains(q)),
                None => true,
            })
            .cloned()
            .collect();

        self.ensure_in_bounds();
    }

    pub(crate) fn set_filter(&mut self, filter: Option<String>) {
        self.filter = filter;
        self.apply_filter();
    }

    /// Only meaningful on the node list.
    pub(crate) fn toggle_hubs_only(&mut self) -> bool {
        self.hubs_only = !self.hubs_only;
        self.apply_filter();
        self.hubs_only
    }

    pub(crate) fn current(&self) -> Option<&ListEntry> {
        self.filtered.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let last = self.filtered.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.filtered.len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        if self.filtered.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.filtered.len() {
            self.selected = self.filtered.len() - 1;
        }
    }
}

/// A titled block of related records on a detail screen.
pub(crate) struct RelatedGroup {
    pub(crate) title: String,
    pub(crate) items: Vec<String>,
}

impl RelatedGroup {
    fn new<S: Into<String>>(title: S, items: Vec<String>) -> Self {
        Self {
            title: title.into(),
            items,
        }
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn node_label(node: &Node) -> String {
    if node.is_hub {
        format!("{} (hub)", node.name)
    } else {
        node.name.clone()
    }
}

/// Read-only view of one record and everything reachable from it.
pub(crate) struct DetailScreen {
    pub(crate) section: Section,
    pub(crate) id: RecordId,
    pub(crate) title: String,
    pub(crate) fields: Vec<(String, String)>,
    pub(crate) groups: Vec<RelatedGroup>,
    pub(crate) scroll: u16,
}

impl DetailScreen {
    /// `None` when the record no longer exists.
    pub(crate) fn load(conn: &Connection, section: Section, id: RecordId) -> Result<Option<Self>> {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut groups = Vec::new();
        let timestamps: Timestamps;
        let title: String;

        match section {
            Section::Kingdoms => {
                let Some(detail) = kingdom_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.kingdom.name.clone();
                timestamps = detail.kingdom.timestamps;
                fields.push(("Name".into(), detail.kingdom.name));
                if detail.territories.is_empty() {
                    groups.push(RelatedGroup::new("Territories", Vec::new()));
                }
                for branch in detail.territories {
                    groups.push(RelatedGroup::new(
                        format!("Territory: {}", branch.territory.name),
                        branch.nodes.iter().map(node_label).collect(),
                    ));
                }
            }
            Section::Territories => {
                let Some(detail) = territory_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.territory.name.clone();
                timestamps = detail.territory.timestamps;
                fields.push(("Name".into(), detail.territory.name));
                fields.push(("Kingdom".into(), detail.kingdom.name));
                groups.push(RelatedGroup::new(
                    "Nodes",
                    detail.nodes.iter().map(node_label).collect(),
                ));
            }
            Section::Nodes => {
                let Some(detail) = node_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.node.name.clone();
                timestamps = detail.node.timestamps;
                fields.push(("Name".into(), detail.node.name));
                fields.push(("Territory".into(), detail.territory.name));
                fields.push(("Kingdom".into(), detail.kingdom.name));
                fields.push((
                    "Hub".into(),
                    if detail.node.is_hub { "yes" } else { "no" }.into(),
                ));
                fields.push((
                    "Contribution cost".into(),
                    cost_text(detail.node.contribution_cost),
                ));
                fields.push((
                    "Node manager".into(),
                    detail.node.node_manager.unwrap_or_else(|| "-".into()),
                ));
                groups.push(RelatedGroup::new(
                    "Connected nodes",
                    detail.connected.iter().map(node_label).collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Resources",
                    detail
                        .resources
                        .iter()
                        .map(|row| format!("{} ({} CP)", row.material, row.resource.contribution_cost))
                        .collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Properties",
                    detail
                        .properties
                        .iter()
                        .map(|branch| {
                            if branch.stations.is_empty() {
                                branch.property.name.clone()
                            } else {
                                let stations: Vec<String> = branch
                                    .stations
                                    .iter()
                                    .map(|slot| {
                                        format!("{} max {}", slot.station.name, slot.link.max_level)
                                    })
                                    .collect();
                                format!("{}: {}", branch.property.name, stations.join(", "))
                            }
                        })
                        .collect(),
                ));
            }
            Section::Resources => {
                let Some(row) = resource_detail(conn, id)? else {
                    return Ok(None);
                };
                title = row.to_string();
                timestamps = row.resource.timestamps;
                fields.push(("Node".into(), row.node));
                fields.push(("Material".into(), row.material));
                fields.push((
                    "Contribution cost".into(),
                    row.resource.contribution_cost.to_string(),
                ));
            }
            Section::Properties => {
                let Some(detail) = property_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.property.name.clone();
                timestamps = detail.property.timestamps;
                let property_name = detail.property.name.clone();
                fields.push(("Name".into(), detail.property.name));
                fields.push(("Node".into(), detail.node.name));
                fields.push(("Territory".into(), detail.territory.name));
                fields.push(("Kingdom".into(), detail.kingdom.name));
                fields.push((
                    "Parent property".into(),
                    detail
                        .parent
                        .map(|p| p.name)
                        .unwrap_or_else(|| "-".into()),
                ));
                groups.push(RelatedGroup::new(
                    "Child properties",
                    detail.children.into_iter().map(|p| p.name).collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Stations",
                    detail
                        .stations
                        .iter()
                        .map(|slot| {
                            format!(
                                "{} (max level {})",
                                property_station_label(&property_name, &slot.station.name),
                                slot.link.max_level
                            )
                        })
                        .collect(),
                ));
            }
            Section::Materials => {
                let Some(detail) = material_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.material.name.clone();
                timestamps = detail.material.timestamps;
                fields.push(("Name".into(), detail.material.name));
                groups.push(RelatedGroup::new(
                    "Gathered at",
                    detail
                        .resources
                        .iter()
                        .map(|row| format!("{} ({} CP)", row.node, row.resource.contribution_cost))
                        .collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Used in",
                    detail.used_in.into_iter().map(|r| r.name).collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Produced by",
                    detail.produced_by.into_iter().map(|r| r.name).collect(),
                ));
            }
            Section::Stations => {
                let Some(detail) = station_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.station.name.clone();
                timestamps = detail.station.timestamps;
                fields.push(("Name".into(), detail.station.name));
                groups.push(RelatedGroup::new(
                    "Available on",
                    detail
                        .properties
                        .iter()
                        .map(|slot| format!("{} (max level {})", slot.property.name, slot.link.max_level))
                        .collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Recipes",
                    detail.recipes.into_iter().map(|r| r.name).collect(),
                ));
            }
            Section::Recipes => {
                let Some(detail) = recipe_detail(conn, id)? else {
                    return Ok(None);
                };
                title = detail.recipe.name.clone();
                timestamps = detail.recipe.timestamps;
                fields.push(("Name".into(), detail.recipe.name));
                fields.push(("Station".into(), detail.station.name));
                groups.push(RelatedGroup::new(
                    "Inputs",
                    detail.inputs.into_iter().map(|m| m.name).collect(),
                ));
                groups.push(RelatedGroup::new(
                    "Outputs",
                    detail.outputs.into_iter().map(|m| m.name).collect(),
                ));
            }
        }

        fields.push(("Created".into(), stamp(timestamps.created)));
        fields.push(("Modified".into(), stamp(timestamps.modified)));

        Ok(Some(Self {
            section,
            id,
            title,
            fields,
            groups,
            scroll: 0,
        }))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        let label_style = Style::default().fg(Color::Cyan);
        let heading_style = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();

        for (label, value) in &self.fields {
            lines.push(Line::from(vec![
                Span::styled(format!("{label}: "), label_style),
                Span::raw(value.clone()),
            ]));
        }

        for group in &self.groups {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(group.title.clone(), heading_style)));
            if group.items.is_empty() {
                lines.push(Line::from(Span::styled(
                    "  (none)",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            for item in &group.items {
                lines.push(Line::from(format!("  - {item}")));
            }
        }

        lines
    }

    pub(crate) fn scroll_by(&mut self, offset: i32) {
        let max = self.lines().len().saturating_sub(1) as i32;
        self.scroll = (self.scroll as i32 + offset).clamp(0, max) as u16;
    }
}

/// Which many-to-many set a picker edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    ConnectedNodes(RecordId),
    RecipeMaterials(RecordId, RecipeSide),
    /// Existing station slots of a property; unchecking one removes it.
    StationSlots(RecordId),
}

pub(crate) struct PickItem {
    pub(crate) id: RecordId,
    pub(crate) label: String,
    pub(crate) checked: bool,
}

/// Multi-select over the candidates of a many-to-many relation, pre-checked
/// with the current members.
pub(crate) struct LinkPicker {
    pub(crate) target: LinkTarget,
    pub(crate) title: String,
    pub(crate) items: Vec<PickItem>,
    pub(crate) selected: usize,
}

impl LinkPicker {
    pub(crate) fn load(conn: &Connection, target: LinkTarget, owner: &str) -> Result<Self> {
        let (title, candidates, current): (String, Vec<(RecordId, String)>, HashSet<RecordId>) =
            match target {
                LinkTarget::ConnectedNodes(node_id) => (
                    format!("Nodes connected to {owner}"),
                    connectable_nodes(conn, Some(node_id))?
                        .iter()
                        .map(|node| (node.id, node_label(node)))
                        .collect(),
                    fetch_connected_nodes(conn, node_id)?
                        .into_iter()
                        .map(|node| node.id)
                        .collect(),
                ),
                LinkTarget::RecipeMaterials(recipe_id, side) => (
                    match side {
                        RecipeSide::Inputs => format!("Inputs of {owner}"),
                        RecipeSide::Outputs => format!("Outputs of {owner}"),
                    },
                    fetch_materials(conn, &NamedQuery::default())?
                        .into_iter()
                        .map(|material| (material.id, material.name))
                        .collect(),
                    fetch_recipe_materials(conn, recipe_id, side)?
                        .into_iter()
                        .map(|material| material.id)
                        .collect(),
                ),
                LinkTarget::StationSlots(property_id) => {
                    let slots = fetch_stations_for_property(conn, property_id)?;
                    (
                        format!("Station slots on {owner}"),
                        slots
                            .iter()
                            .map(|slot| {
                                let label = format!(
                                    "{} (max level {})",
                                    slot.station.name, slot.link.max_level
                                );
                                (slot.link.id, label)
                            })
                            .collect(),
                        slots.iter().map(|slot| slot.link.id).collect(),
                    )
                }
            };

        let items = candidates
            .into_iter()
            .map(|(id, label)| PickItem {
                checked: current.contains(&id),
                id,
                label,
            })
            .collect();

        Ok(Self {
            target,
            title,
            items,
            selected: 0,
        })
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn toggle_current(&mut self) {
        if let Some(item) = self.items.get_mut(self.selected) {
            item.checked = !item.checked;
        }
    }

    pub(crate) fn chosen_ids(&self) -> Vec<RecordId> {
        self.items
            .iter()
            .filter(|item| item.checked)
            .map(|item| item.id)
            .collect()
    }

    /// Persist the checked set, replacing the previous members. Returns the
    /// status line to show.
    pub(crate) fn apply(&self, conn: &Connection) -> Result<String> {
        let chosen = self.chosen_ids();
        match self.target {
            LinkTarget::ConnectedNodes(node_id) => set_connected_nodes(conn, node_id, &chosen)?,
            LinkTarget::RecipeMaterials(recipe_id, side) => {
                set_recipe_materials(conn, recipe_id, side, &chosen)?
            }
            LinkTarget::StationSlots(_) => {
                let tx = conn.unchecked_transaction()?;
                let dropped: Vec<RecordId> = self
                    .items
                    .iter()
                    .filter(|item| !item.checked)
                    .map(|item| item.id)
                    .collect();
                for id in &dropped {
                    delete_property_station(&tx, *id)?;
                }
                tx.commit()?;
                return Ok(format!("Removed {} station slot(s).", dropped.len()));
            }
        }
        Ok(format!("Saved {} selected.", chosen.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: RecordId, name: &str, hub: bool) -> ListEntry {
        ListEntry {
            id,
            label: name.to_string(),
            columns: vec![name.to_string(), if hub { "yes" } else { "" }.to_string()],
            flagged: hub,
        }
    }

    #[test]
    fn filter_and_hub_toggle_compose() {
        let mut screen = ListScreen::new(
            Section::Nodes,
            vec![
                entry(1, "Heidel", true),
                entry(2, "Heidel Ranch", false),
                entry(3, "Velia", true),
            ],
        );
        screen.set_filter(Some("heid".to_string()));
        assert_eq!(screen.filtered.len(), 2);

        assert!(screen.toggle_hubs_only());
        assert_eq!(screen.filtered.len(), 1);
        assert_eq!(screen.current().map(|e| e.id), Some(1));

        screen.set_filter(None);
        assert_eq!(screen.filtered.len(), 2);
    }

    #[test]
    fn selection_is_clamped() {
        let mut screen = ListScreen::new(
            Section::Materials,
            vec![entry(1, "Coal", false), entry(2, "Flax", false)],
        );
        screen.move_selection(10);
        assert_eq!(screen.selected, 1);
        screen.move_selection(-10);
        assert_eq!(screen.selected, 0);
        screen.select_last();
        screen.set_filter(Some("coal".to_string()));
        assert_eq!(screen.selected, 0);
    }

    #[test]
    fn section_cycling_wraps() {
        assert_eq!(Section::Kingdoms.offset(-1), Section::Recipes);
        assert_eq!(Section::Recipes.offset(1), Section::Kingdoms);
        assert_eq!(Section::Nodes.offset(2), Section::Properties);
    }
}
