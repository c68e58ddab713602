//! Data models for Tidewatch

mod favorite;
mod sync_conflict;

pub use favorite::{FavoriteDomain, FavoriteRecord, KeyStrategy, RemoteId, SyncKey};
pub use sync_conflict::{NewSyncConflict, SyncConflict, Winner};
