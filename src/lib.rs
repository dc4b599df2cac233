//! Syncs personal finance records from a Notion database into a local CSV cache and derives the
//! figures of a monthly finance report from it.
//!
//! The pipeline runs in one direction: `api` fetches raw pages, `model::NormalizedRow` flattens
//! them, `cache::Cache` persists them when they changed, `dataset::Dataset` loads them back with
//! derived fields, and `views` computes the report tables.

pub mod api;
pub mod args;
pub mod cache;
pub mod commands;
mod config;
pub mod dataset;
mod error;
pub mod model;
mod utils;
pub mod views;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::{Config, Overrides};
pub use error::{Error, ErrorType, Result};
