//! Shared services used by client crates.

mod database;

pub use database::DatabaseService;
