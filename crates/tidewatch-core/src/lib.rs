//! tidewatch-core - Core library for Tidewatch
//!
//! This crate contains the favorite models, the libSQL-backed local store, the
//! Supabase-backed remote store and the per-domain favorites sync engine used
//! by every Tidewatch client.

pub mod auth;
pub mod config;
pub mod db;
pub mod domains;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{FavoriteDomain, FavoriteRecord, KeyStrategy, RemoteId, SyncKey};
pub use sync::{SyncEngine, SyncError, SyncResult, SyncStats};
