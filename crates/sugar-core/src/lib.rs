//! Sugar core library: documentation upkeep for dbt projects.
//!
//! The crate keeps a project's `schema.yml`-style descriptor files in step
//! with the warehouse. It indexes every descriptor once, resolves a model to
//! its source and descriptor, reconciles the entry with the live table
//! columns, applies collected answers, writes a canonically ordered file,
//! verifies proposed tests (rolling back the failures) and propagates new
//! column descriptions across the project.

pub mod collector;
pub mod config;
pub mod connectors;
pub mod document;
pub mod errors;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod query;
pub mod runner;
pub mod store;
pub mod task;

pub use errors::{SugarError, SugarResult};
