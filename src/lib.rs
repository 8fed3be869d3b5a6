//! Core library surface for BDO Chronicle, a node and crafting reference for
//! Black Desert Online.
//!
//! `models` and `db` hold the entity graph and its integrity rules; `admin`
//! and `views` are read-only accessors over them; `ui` is the terminal admin
//! that ties everything together. The binary only wires configuration and
//! logging around these pieces.
pub mod admin;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod ui;
pub mod views;

/// Convenience re-exports for bootstrapping the store.
pub use db::{ensure_schema, open_database, open_in_memory, table_counts};

pub use error::{ModelError, ModelResult};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
