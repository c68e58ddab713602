//! Shared database service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlConflictRepository, LibSqlFavoriteRepository, LibSqlSettingsRepository,
};
use crate::models::{FavoriteDomain, FavoriteRecord, NewSyncConflict, RemoteId, SyncConflict};
use crate::store::{LocalFavoriteStore, LocalWrite};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening favorites database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Stable identifier of this installation.
    pub async fn device_id(&self) -> Result<String> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .device_id()
            .await
    }

    /// Favorite or un-favorite an entity from a local user action.
    pub async fn set_favorite<D: FavoriteDomain>(
        &self,
        key: D::Key,
        details: D::Details,
        is_favorite: bool,
        owner: Option<&str>,
    ) -> Result<FavoriteRecord<D>> {
        let db = self.db.lock().await;
        let device_id = LibSqlSettingsRepository::new(db.connection())
            .device_id()
            .await?;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .set_favorite(key, details, is_favorite, &device_id, owner)
            .await
    }

    /// Un-favorite an existing row, keeping its display fields.
    pub async fn unfavorite<D: FavoriteDomain>(
        &self,
        key: &D::Key,
        owner: Option<&str>,
    ) -> Result<FavoriteRecord<D>> {
        let db = self.db.lock().await;
        let device_id = LibSqlSettingsRepository::new(db.connection())
            .device_id()
            .await?;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .unfavorite(key, &device_id, owner)
            .await
    }

    /// Currently favorited rows, most recently changed first.
    pub async fn list_favorites<D: FavoriteDomain>(&self) -> Result<Vec<FavoriteRecord<D>>> {
        let db = self.db.lock().await;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .list_favorites()
            .await
    }

    pub async fn get_favorite<D: FavoriteDomain>(
        &self,
        key: &D::Key,
    ) -> Result<Option<FavoriteRecord<D>>> {
        let db = self.db.lock().await;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .get(key)
            .await
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        LibSqlConflictRepository::new(db.connection())
            .list(limit)
            .await
    }
}

#[async_trait]
impl<D: FavoriteDomain> LocalFavoriteStore<D> for DatabaseService {
    async fn list_all_for_user(&self, user_id: &str) -> Result<Vec<FavoriteRecord<D>>> {
        let db = self.db.lock().await;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .list_all_for_user(user_id)
            .await
    }

    async fn write_back(
        &self,
        record: &FavoriteRecord<D>,
        expected_modified: Option<i64>,
    ) -> Result<LocalWrite> {
        // Check and write under one lock
        let db = self.db.lock().await;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .write_back(record, expected_modified)
            .await
    }

    async fn link(&self, key: &D::Key, remote_id: RemoteId, user_id: &str) -> Result<LocalWrite> {
        let db = self.db.lock().await;
        LibSqlFavoriteRepository::<D>::new(db.connection())
            .link(key, remote_id, user_id)
            .await
    }

    async fn device_id(&self) -> Result<String> {
        Self::device_id(self).await
    }

    async fn record_conflict(&self, conflict: &NewSyncConflict) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlConflictRepository::new(db.connection())
            .record(conflict)
            .await
    }
}
