//! CLI command implementations.

pub mod augment;
mod common;
pub mod config;
pub mod evaluate;
pub mod models;
pub mod query;
