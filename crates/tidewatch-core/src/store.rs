//! Storage seams used by the sync engine.
//!
//! The engine only talks to these traits. `DatabaseService` implements the
//! local side and `remote::PostgrestConnector` the remote side; tests plug in
//! in-memory doubles.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthSession;
use crate::models::{FavoriteDomain, FavoriteRecord, NewSyncConflict, RemoteId};

/// Outcome of a guarded write to the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalWrite {
    Written,
    /// The row no longer matches the snapshot it was planned from; nothing was written
    Changed,
    /// The row belongs to another user of this device; nothing was written
    ForeignOwner,
}

/// Local favorites store for one domain
#[async_trait]
pub trait LocalFavoriteStore<D: FavoriteDomain>: Send + Sync {
    /// All rows visible to `user_id`, favorited or not, plus unowned rows
    async fn list_all_for_user(&self, user_id: &str) -> crate::Result<Vec<FavoriteRecord<D>>>;

    /// Write a row verbatim, sync metadata included, if the stored row still
    /// has `expected_modified` as its `last_modified` (`None`: no row yet)
    /// and is not owned by a user other than `record.user_id`.
    async fn write_back(
        &self,
        record: &FavoriteRecord<D>,
        expected_modified: Option<i64>,
    ) -> crate::Result<LocalWrite>;

    /// Set only `remote_id` and `user_id` on an existing row
    async fn link(
        &self,
        key: &D::Key,
        remote_id: RemoteId,
        user_id: &str,
    ) -> crate::Result<LocalWrite>;

    /// Identifier of this installation
    async fn device_id(&self) -> crate::Result<String>;

    /// Append to the conflict log
    async fn record_conflict(&self, conflict: &NewSyncConflict) -> crate::Result<()>;
}

/// Failures reported by a remote favorites store
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Uniqueness on (user, natural key) rejected an insert
    #[error("Remote row already exists")]
    AlreadyExists,

    #[error("Remote row not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

pub type RemoteResult<T> = Result<T, RemoteStoreError>;

/// Remote favorites store for one domain, bound to an authenticated user
#[async_trait]
pub trait RemoteFavoriteStore<D: FavoriteDomain>: Send + Sync {
    /// Every row owned by `user_id`, with `remote_id` and `user_id` set
    async fn list_for_user(&self, user_id: &str) -> RemoteResult<Vec<FavoriteRecord<D>>>;

    /// Insert a new row; the server assigns its id
    async fn insert(&self, record: &FavoriteRecord<D>) -> RemoteResult<RemoteId>;

    /// Overwrite state, details and `last_modified` of an existing row
    async fn update(&self, remote_id: RemoteId, record: &FavoriteRecord<D>) -> RemoteResult<()>;

    /// Look up the row for a natural key; always `None` for remote-id keyed domains
    async fn find_by_key(
        &self,
        user_id: &str,
        key: &D::Key,
    ) -> RemoteResult<Option<FavoriteRecord<D>>>;
}

/// Opens a remote store with the credentials of a session
#[async_trait]
pub trait RemoteConnector<D: FavoriteDomain>: Send + Sync {
    async fn connect(&self, session: &AuthSession) -> RemoteResult<Arc<dyn RemoteFavoriteStore<D>>>;
}
