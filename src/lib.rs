//! cmg-migrate: one-shot migration of CMG document exports into the Bioloop schema
//!
//! The crate is organised around the migration passes:
//! - [`source`] loads the exported CMG collections
//! - [`target`] owns the Bioloop database and its queries
//! - [`resolve`] decides dataset names and re-finds migrated datasets
//! - [`convert`] holds one converter per entity pass
//! - [`commands`] wires passes into CLI commands

pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod progress;
pub mod resolve;
pub mod source;
pub mod target;
