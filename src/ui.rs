//! Terminal admin interface: a tab per entity with list, detail and edit
//! screens drawn with ratatui on a crossterm backend.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
