use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Tabs, Wrap,
};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::RecipeSide;
use crate::error::ModelError;
use crate::models::RecordId;

use super::forms::{ConfirmDelete, RecordForm, Saved};
use super::helpers::{centered_rect, key_hints, surface_error};
use super::screens::{DetailScreen, LinkPicker, LinkTarget, ListScreen, Section};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
const TABS_HEIGHT: u16 = 2;
/// Rows skipped by PageUp/PageDown.
const PAGE: isize = 10;

/// Fine-grained modes layered over the list or detail screen.
enum Mode {
    Normal,
    Editing(RecordForm),
    ConfirmDelete(ConfirmDelete),
    Picking(LinkPicker),
    Searching(SearchState),
}

/// State for an active inline search.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    list: ListScreen,
    detail: Option<DetailScreen>,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(conn: Connection) -> Result<Self> {
        let list = ListScreen::load(&conn, Section::Kingdoms)?;
        Ok(Self {
            conn,
            list,
            detail: None,
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Returns `true` once the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Editing(form) => self.handle_form(code, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Picking(picker) => self.handle_picker(code, picker)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        if self.detail.is_some() {
            self.handle_detail_key(code, exit)
        } else {
            self.handle_list_key(code, exit)
        }
    }

    fn handle_list_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let section = self.list.section;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Tab | KeyCode::Right => self.switch_section(1)?,
            KeyCode::BackTab | KeyCode::Left => self.switch_section(-1)?,
            KeyCode::Up => self.list.move_selection(-1),
            KeyCode::Down => self.list.move_selection(1),
            KeyCode::PageUp => self.list.move_selection(-PAGE),
            KeyCode::PageDown => self.list.move_selection(PAGE),
            KeyCode::Home => self.list.select_first(),
            KeyCode::End => self.list.select_last(),
            KeyCode::Enter => self.open_detail()?,
            KeyCode::Char('+') | KeyCode::Char('a') => {
                return Ok(Mode::Editing(RecordForm::new_record(&self.conn, section)?));
            }
            KeyCode::Char('e') => match self.list.current().map(|entry| entry.id) {
                Some(id) => return self.start_edit(section, id),
                None => self.set_status("Nothing selected.", StatusKind::Error),
            },
            KeyCode::Char('-') | KeyCode::Delete => match self.list.current() {
                Some(entry) => {
                    return Ok(Mode::ConfirmDelete(ConfirmDelete {
                        section,
                        id: entry.id,
                        label: entry.label.clone(),
                    }));
                }
                None => self.set_status("Nothing selected.", StatusKind::Error),
            },
            KeyCode::Char('f') | KeyCode::Char('/') => {
                let query = self.list.filter.clone().unwrap_or_default();
                return Ok(Mode::Searching(SearchState { query }));
            }
            KeyCode::Char('h') if section == Section::Nodes => {
                let message = if self.list.toggle_hubs_only() {
                    "Showing hubs only."
                } else {
                    "Showing all nodes."
                };
                self.set_status(message, StatusKind::Info);
            }
            KeyCode::Char('r') => {
                let focus = self.list.current().map(|entry| entry.id);
                self.list.reload(&self.conn, focus)?;
                self.set_status("Reloaded.", StatusKind::Info);
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_detail_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Some(detail) = self.detail.as_ref() else {
            return Ok(Mode::Normal);
        };
        let (section, id, title) = (detail.section, detail.id, detail.title.clone());

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc | KeyCode::Backspace => self.close_detail()?,
            KeyCode::Up => self.scroll_detail(-1),
            KeyCode::Down => self.scroll_detail(1),
            KeyCode::PageUp => self.scroll_detail(-(PAGE as i32)),
            KeyCode::PageDown => self.scroll_detail(PAGE as i32),
            KeyCode::Char('e') => return self.start_edit(section, id),
            KeyCode::Char('-') | KeyCode::Delete => {
                return Ok(Mode::ConfirmDelete(ConfirmDelete {
                    section,
                    id,
                    label: title,
                }));
            }
            KeyCode::Char('c') if section == Section::Nodes => {
                return self.start_picker(LinkTarget::ConnectedNodes(id), &title);
            }
            KeyCode::Char('i') if section == Section::Recipes => {
                return self.start_picker(LinkTarget::RecipeMaterials(id, RecipeSide::Inputs), &title);
            }
            KeyCode::Char('o') if section == Section::Recipes => {
                return self
                    .start_picker(LinkTarget::RecipeMaterials(id, RecipeSide::Outputs), &title);
            }
            KeyCode::Char('s') if section == Section::Properties => {
                return Ok(Mode::Editing(RecordForm::property_station(
                    &self.conn, id, &title,
                )?));
            }
            KeyCode::Char('x') if section == Section::Properties => {
                return self.start_picker(LinkTarget::StationSlots(id), &title);
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_form(&mut self, code: KeyCode, mut form: RecordForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", form.title), StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.cycle(-1),
            KeyCode::Right => form.cycle(1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match form.submit(&self.conn) {
                Ok(saved) => {
                    self.after_save(saved)?;
                    return Ok(Mode::Normal);
                }
                Err(err) => {
                    if let Some(model_err) = err.downcast_ref::<ModelError>() {
                        if !model_err.is_validation() {
                            warn!(error = %model_err, "save failed");
                        }
                    }
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Editing(form))
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmDelete) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                match confirm.perform(&self.conn) {
                    Ok(()) => {
                        let showing_deleted = self
                            .detail
                            .as_ref()
                            .is_some_and(|d| d.section == confirm.section && d.id == confirm.id);
                        if showing_deleted {
                            self.detail = None;
                        }
                        self.list.reload(&self.conn, None)?;
                        self.refresh_detail()?;
                        self.set_status(
                            format!(
                                "Deleted {} {}.",
                                confirm.section.singular().to_lowercase(),
                                confirm.label
                            ),
                            StatusKind::Info,
                        );
                    }
                    Err(err) => self.set_status(err.to_string(), StatusKind::Error),
                }
                Ok(Mode::Normal)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Delete cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_picker(&mut self, code: KeyCode, mut picker: LinkPicker) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Selection discarded.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Up => picker.move_selection(-1),
            KeyCode::Down => picker.move_selection(1),
            KeyCode::PageUp => picker.move_selection(-PAGE),
            KeyCode::PageDown => picker.move_selection(PAGE),
            KeyCode::Char(' ') => picker.toggle_current(),
            KeyCode::Enter => match picker.apply(&self.conn) {
                Ok(summary) => {
                    info!(?picker.target, %summary, "saved selection");
                    let focus = self.list.current().map(|entry| entry.id);
                    self.list.reload(&self.conn, focus)?;
                    self.refresh_detail()?;
                    self.set_status(summary, StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
            },
            _ => {}
        }
        Ok(Mode::Picking(picker))
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.list.set_filter(None);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => return Ok(Mode::Normal),
            KeyCode::Up => self.list.move_selection(-1),
            KeyCode::Down => self.list.move_selection(1),
            KeyCode::Home => self.list.select_first(),
            KeyCode::End => self.list.select_last(),
            KeyCode::Backspace => {
                state.query.pop();
                self.apply_search(&state);
            }
            KeyCode::Char(ch) => {
                state.query.push(ch);
                self.apply_search(&state);
            }
            _ => {}
        }
        Ok(Mode::Searching(state))
    }

    fn apply_search(&mut self, state: &SearchState) {
        let filter = (!state.query.is_empty()).then(|| state.query.clone());
        self.list.set_filter(filter);
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(TABS_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);
        match &self.detail {
            Some(detail) => self.draw_detail(frame, chunks[1], detail),
            None => self.draw_list(frame, chunks[1]),
        }
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::Editing(form) => self.draw_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Picking(picker) => self.draw_picker(frame, area, picker),
            Mode::Searching(state) => self.draw_search_bar(frame, chunks[1], state),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(Section::ALL.iter().map(|section| section.title()))
            .select(self.list.section.index())
            .block(Block::default().borders(Borders::BOTTOM))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .divider("|");
        frame.render_widget(tabs, area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let section = self.list.section;
        let mut title = format!("{} ({})", section.title(), self.list.filtered.len());
        if let Some(filter) = self.list.filter.as_deref().filter(|f| !f.is_empty()) {
            title.push_str(&format!(" matching \"{filter}\""));
        }
        if self.list.hubs_only {
            title.push_str(" hubs only");
        }
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.list.filtered.is_empty() {
            let message = if self.list.entries.is_empty() {
                format!(
                    "No {} yet. Press + to add one.",
                    section.title().to_lowercase()
                )
            } else {
                "Nothing matches the current filter.".to_string()
            };
            let paragraph = Paragraph::new(Span::styled(
                message,
                Style::default().fg(Color::DarkGray),
            ))
            .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(section.headers().iter().map(|h| Cell::from(*h)))
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = self
            .list
            .filtered
            .iter()
            .map(|entry| Row::new(entry.columns.iter().map(|c| Cell::from(c.clone()))));
        let widths = vec![Constraint::Fill(1); section.headers().len()];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut state = TableState::default();
        state.select(Some(self.list.selected));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect, detail: &DetailScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{}: {}", detail.section.singular(), detail.title));
        let paragraph = Paragraph::new(detail.lines())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((detail.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match &self.mode {
            Mode::Editing(_) => key_hints(&[
                ("Tab", "Next field"),
                ("←→", "Choose"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
            ]),
            Mode::ConfirmDelete(_) => key_hints(&[("y", "Delete"), ("n", "Keep")]),
            Mode::Picking(_) => key_hints(&[
                ("↑↓", "Navigate"),
                ("Space", "Toggle"),
                ("Enter", "Apply"),
                ("Esc", "Cancel"),
            ]),
            Mode::Searching(_) => key_hints(&[("Enter", "Keep filter"), ("Esc", "Clear")]),
            Mode::Normal => match &self.detail {
                Some(detail) => {
                    let mut hints = vec![("Esc", "Back"), ("↑↓", "Scroll"), ("e", "Edit")];
                    match detail.section {
                        Section::Nodes => hints.push(("c", "Connections")),
                        Section::Properties => {
                            hints.push(("s", "Station slot"));
                            hints.push(("x", "Remove slots"));
                        }
                        Section::Recipes => {
                            hints.push(("i", "Inputs"));
                            hints.push(("o", "Outputs"));
                        }
                        _ => {}
                    }
                    hints.push(("-", "Delete"));
                    hints.push(("q", "Quit"));
                    key_hints(&hints)
                }
                None => {
                    let mut hints = vec![
                        ("Tab", "Next tab"),
                        ("Enter", "Open"),
                        ("+", "Add"),
                        ("e", "Edit"),
                        ("-", "Delete"),
                        ("f", "Search"),
                    ];
                    if self.list.section == Section::Nodes {
                        hints.push(("h", "Hubs only"));
                    }
                    hints.push(("q", "Quit"));
                    key_hints(&hints)
                }
            },
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, form: &RecordForm) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(form.title.clone())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.fields.len())
            .map(|idx| form.build_line(idx))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save, Tab to switch fields, Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        if let Some(offset) = form.cursor_offset() {
            frame.set_cursor_position((inner.x + offset, inner.y + form.active as u16));
        }
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![Line::from(format!(
            "Delete {} {}?",
            confirm.section.singular().to_lowercase(),
            confirm.label
        ))];
        if let Some(note) = confirm.section.cascade_note() {
            lines.push(Line::from(format!("This also removes {note}.")));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, picker: &LinkPicker) {
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(picker.title.clone())
            .borders(Borders::ALL);

        if picker.items.is_empty() {
            let paragraph = Paragraph::new(Span::styled(
                "Nothing to choose from.",
                Style::default().fg(Color::DarkGray),
            ))
            .block(block);
            frame.render_widget(paragraph, popup_area);
            return;
        }

        let items: Vec<ListItem> = picker
            .items
            .iter()
            .map(|item| {
                let mark = if item.checked { "[x]" } else { "[ ]" };
                ListItem::new(format!("{mark} {}", item.label))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(picker.selected));
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn switch_section(&mut self, offset: isize) -> Result<()> {
        self.list = ListScreen::load(&self.conn, self.list.section.offset(offset))?;
        self.detail = None;
        self.clear_status();
        Ok(())
    }

    fn open_detail(&mut self) -> Result<()> {
        let Some(id) = self.list.current().map(|entry| entry.id) else {
            self.set_status("Nothing selected.", StatusKind::Error);
            return Ok(());
        };
        match DetailScreen::load(&self.conn, self.list.section, id)? {
            Some(detail) => {
                self.detail = Some(detail);
                self.clear_status();
            }
            None => {
                self.list.reload(&self.conn, None)?;
                self.set_status("That record no longer exists.", StatusKind::Error);
            }
        }
        Ok(())
    }

    fn close_detail(&mut self) -> Result<()> {
        let focus = self.detail.take().map(|detail| detail.id);
        self.list.reload(&self.conn, focus)
    }

    fn scroll_detail(&mut self, offset: i32) {
        if let Some(detail) = self.detail.as_mut() {
            detail.scroll_by(offset);
        }
    }

    /// Re-read the open detail screen, closing it when its record is gone.
    fn refresh_detail(&mut self) -> Result<()> {
        if let Some(current) = self.detail.take() {
            self.detail = DetailScreen::load(&self.conn, current.section, current.id)?.map(
                |mut detail| {
                    detail.scroll = current.scroll;
                    detail
                },
            );
        }
        Ok(())
    }

    fn start_edit(&mut self, section: Section, id: RecordId) -> Result<Mode> {
        match RecordForm::edit_record(&self.conn, section, id)? {
            Some(form) => Ok(Mode::Editing(form)),
            None => {
                self.set_status("That record no longer exists.", StatusKind::Error);
                Ok(Mode::Normal)
            }
        }
    }

    fn start_picker(&mut self, target: LinkTarget, owner: &str) -> Result<Mode> {
        Ok(Mode::Picking(LinkPicker::load(&self.conn, target, owner)?))
    }

    fn after_save(&mut self, saved: Saved) -> Result<()> {
        let focus = (saved.section == self.list.section).then_some(saved.id);
        self.list.reload(&self.conn, focus)?;
        self.refresh_detail()?;
        self.set_status(saved.message, StatusKind::Info);
        Ok(())
    }
}
