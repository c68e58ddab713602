//! In-memory stores and session providers for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use tidewatch_core::auth::{AuthError, AuthResult, AuthSession, AuthUser, SessionProvider};
use tidewatch_core::models::{
    FavoriteDomain, FavoriteRecord, KeyStrategy, NewSyncConflict, RemoteId,
};
use tidewatch_core::store::{
    LocalFavoriteStore, LocalWrite, RemoteConnector, RemoteFavoriteStore, RemoteResult,
    RemoteStoreError,
};

pub const USER: &str = "user-1";

// ============================================================================
// Sessions
// ============================================================================

pub fn active_session(user_id: &str) -> AuthSession {
    AuthSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: chrono::Utc::now().timestamp() + 3_600,
        user: AuthUser {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
        },
    }
}

pub fn expired_session(user_id: &str) -> AuthSession {
    AuthSession {
        expires_at: chrono::Utc::now().timestamp() - 3_600,
        ..active_session(user_id)
    }
}

pub enum SessionState {
    Active(AuthSession),
    Missing,
    Broken,
}

pub struct StaticSession {
    state: SessionState,
    pub calls: AtomicUsize,
}

impl StaticSession {
    pub fn new(state: SessionState) -> Arc<Self> {
        Arc::new(Self {
            state,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn signed_in() -> Arc<Self> {
        Self::new(SessionState::Active(active_session(USER)))
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.state {
            SessionState::Active(session) => Ok(Some(session.clone())),
            SessionState::Missing => Ok(None),
            SessionState::Broken => Err(AuthError::Api("keychain unavailable".to_string())),
        }
    }
}

// ============================================================================
// Local store
// ============================================================================

pub struct LocalInner<D: FavoriteDomain> {
    pub rows: BTreeMap<String, FavoriteRecord<D>>,
    pub conflicts: Vec<NewSyncConflict>,
    pub fail_writes: BTreeSet<String>,
    pub fail_list: bool,
    pub fail_device_id: bool,
    /// User edits applied right after the next snapshot is handed out
    pub edits_after_snapshot: Vec<FavoriteRecord<D>>,
    pub calls: usize,
    pub writes: usize,
}

#[derive(Clone)]
pub struct InMemoryLocal<D: FavoriteDomain> {
    pub inner: Arc<Mutex<LocalInner<D>>>,
}

impl<D: FavoriteDomain> InMemoryLocal<D> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocalInner {
                rows: BTreeMap::new(),
                conflicts: Vec::new(),
                fail_writes: BTreeSet::new(),
                fail_list: false,
                fail_device_id: false,
                edits_after_snapshot: Vec::new(),
                calls: 0,
                writes: 0,
            })),
        }
    }

    pub fn with_rows(rows: impl IntoIterator<Item = FavoriteRecord<D>>) -> Self {
        let local = Self::new();
        for record in rows {
            local.seed(record);
        }
        local
    }

    pub fn seed(&self, record: FavoriteRecord<D>) {
        self.inner.lock().rows.insert(record.key.to_string(), record);
    }

    pub fn get(&self, key: &D::Key) -> Option<FavoriteRecord<D>> {
        self.inner.lock().rows.get(&key.to_string()).cloned()
    }

    pub fn rows(&self) -> Vec<FavoriteRecord<D>> {
        self.inner.lock().rows.values().cloned().collect()
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().calls
    }

    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn conflicts(&self) -> Vec<NewSyncConflict> {
        self.inner.lock().conflicts.clone()
    }

    pub fn fail_writes_for(&self, key: &D::Key) {
        self.inner.lock().fail_writes.insert(key.to_string());
    }

    /// Simulate the user editing `record` while a pass is past its snapshot
    pub fn edit_after_snapshot(&self, record: FavoriteRecord<D>) {
        self.inner.lock().edits_after_snapshot.push(record);
    }

    fn check_writable(inner: &mut LocalInner<D>, key: &str) -> tidewatch_core::Result<()> {
        inner.calls += 1;
        if inner.fail_writes.contains(key) {
            return Err(tidewatch_core::Error::Database(format!("locked row {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl<D: FavoriteDomain> LocalFavoriteStore<D> for InMemoryLocal<D> {
    async fn list_all_for_user(&self, user_id: &str) -> tidewatch_core::Result<Vec<FavoriteRecord<D>>> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if inner.fail_list {
            return Err(tidewatch_core::Error::Database("disk I/O error".to_string()));
        }
        let snapshot: Vec<FavoriteRecord<D>> = inner
            .rows
            .values()
            .filter(|record| !record.owned_by_other_than(Some(user_id)))
            .cloned()
            .collect();
        for edit in std::mem::take(&mut inner.edits_after_snapshot) {
            inner.rows.insert(edit.key.to_string(), edit);
        }
        Ok(snapshot)
    }

    async fn write_back(
        &self,
        record: &FavoriteRecord<D>,
        expected_modified: Option<i64>,
    ) -> tidewatch_core::Result<LocalWrite> {
        let mut inner = self.inner.lock();
        let key = record.key.to_string();
        Self::check_writable(&mut inner, &key)?;
        if let Some(existing) = inner.rows.get(&key) {
            if existing.owned_by_other_than(record.user_id.as_deref()) {
                return Ok(LocalWrite::ForeignOwner);
            }
            if expected_modified != Some(existing.last_modified) {
                return Ok(LocalWrite::Changed);
            }
        } else if expected_modified.is_some() {
            return Ok(LocalWrite::Changed);
        }
        inner.writes += 1;
        inner.rows.insert(key, record.clone());
        Ok(LocalWrite::Written)
    }

    async fn link(
        &self,
        key: &D::Key,
        remote_id: RemoteId,
        user_id: &str,
    ) -> tidewatch_core::Result<LocalWrite> {
        let mut inner = self.inner.lock();
        let key = key.to_string();
        Self::check_writable(&mut inner, &key)?;
        let Some(row) = inner.rows.get_mut(&key) else {
            return Ok(LocalWrite::Changed);
        };
        if row.owned_by_other_than(Some(user_id)) {
            return Ok(LocalWrite::ForeignOwner);
        }
        row.remote_id = Some(remote_id);
        row.user_id = Some(user_id.to_string());
        inner.writes += 1;
        Ok(LocalWrite::Written)
    }

    async fn device_id(&self) -> tidewatch_core::Result<String> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if inner.fail_device_id {
            return Err(tidewatch_core::Error::Database("database is closed".to_string()));
        }
        Ok("device-local".to_string())
    }

    async fn record_conflict(&self, conflict: &NewSyncConflict) -> tidewatch_core::Result<()> {
        self.inner.lock().conflicts.push(conflict.clone());
        Ok(())
    }
}

// ============================================================================
// Remote store
// ============================================================================

pub struct RemoteInner<D: FavoriteDomain> {
    pub rows: BTreeMap<RemoteId, FavoriteRecord<D>>,
    /// Rows left out of `list_for_user`, as if written after the snapshot
    pub hidden: BTreeSet<RemoteId>,
    pub fail_inserts: BTreeSet<String>,
    pub fail_updates: bool,
    pub fail_list: bool,
    pub list_delay: Option<Duration>,
    pub connects: usize,
    pub lists: usize,
    pub inserts: usize,
    pub updates: usize,
}

#[derive(Clone)]
pub struct InMemoryRemote<D: FavoriteDomain> {
    pub inner: Arc<Mutex<RemoteInner<D>>>,
}

impl<D: FavoriteDomain> InMemoryRemote<D> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RemoteInner {
                rows: BTreeMap::new(),
                hidden: BTreeSet::new(),
                fail_inserts: BTreeSet::new(),
                fail_updates: false,
                fail_list: false,
                list_delay: None,
                connects: 0,
                lists: 0,
                inserts: 0,
                updates: 0,
            })),
        }
    }

    /// Store a row as another device would have uploaded it
    pub fn seed(&self, mut record: FavoriteRecord<D>) -> RemoteId {
        let id = record
            .remote_id
            .unwrap_or_else(|| RemoteId::from_uuid(Uuid::now_v7()));
        record.remote_id = Some(id);
        record.user_id.get_or_insert_with(|| USER.to_string());
        if let Some(key) = remote_key::<D>(id) {
            record.key = key;
        }
        self.inner.lock().rows.insert(id, record);
        id
    }

    pub fn seed_hidden(&self, record: FavoriteRecord<D>) -> RemoteId {
        let id = self.seed(record);
        self.inner.lock().hidden.insert(id);
        id
    }

    pub fn find(&self, key: &D::Key) -> Option<FavoriteRecord<D>> {
        self.inner
            .lock()
            .rows
            .values()
            .find(|record| &record.key == key)
            .cloned()
    }

    pub fn rows(&self) -> Vec<FavoriteRecord<D>> {
        self.inner.lock().rows.values().cloned().collect()
    }

    pub fn connects(&self) -> usize {
        self.inner.lock().connects
    }

    pub fn inserts(&self) -> usize {
        self.inner.lock().inserts
    }

    pub fn updates(&self) -> usize {
        self.inner.lock().updates
    }

    pub fn writes(&self) -> usize {
        let inner = self.inner.lock();
        inner.inserts + inner.updates
    }

    pub fn fail_inserts_for(&self, key: &D::Key) {
        self.inner.lock().fail_inserts.insert(key.to_string());
    }
}

fn remote_key<D: FavoriteDomain>(id: RemoteId) -> Option<D::Key> {
    match D::KEY_STRATEGY {
        KeyStrategy::Natural => None,
        KeyStrategy::RemoteId => D::key_from_remote_id(id),
    }
}

#[async_trait]
impl<D: FavoriteDomain> RemoteConnector<D> for InMemoryRemote<D> {
    async fn connect(&self, _session: &AuthSession) -> RemoteResult<Arc<dyn RemoteFavoriteStore<D>>> {
        self.inner.lock().connects += 1;
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl<D: FavoriteDomain> RemoteFavoriteStore<D> for InMemoryRemote<D> {
    async fn list_for_user(&self, user_id: &str) -> RemoteResult<Vec<FavoriteRecord<D>>> {
        let delay = self.inner.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        inner.lists += 1;
        if inner.fail_list {
            return Err(RemoteStoreError::Api {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(inner
            .rows
            .iter()
            .filter(|(id, record)| {
                !inner.hidden.contains(id) && record.user_id.as_deref() == Some(user_id)
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn insert(&self, record: &FavoriteRecord<D>) -> RemoteResult<RemoteId> {
        let mut inner = self.inner.lock();
        if inner.fail_inserts.contains(&record.key.to_string()) {
            return Err(RemoteStoreError::Api {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        let Some(user_id) = record.user_id.clone() else {
            return Err(RemoteStoreError::InvalidPayload("missing user".to_string()));
        };
        let duplicate = D::KEY_STRATEGY == KeyStrategy::Natural
            && inner
                .rows
                .values()
                .any(|row| row.key == record.key && row.user_id.as_deref() == Some(&user_id));
        if duplicate {
            return Err(RemoteStoreError::AlreadyExists);
        }

        inner.inserts += 1;
        let id = RemoteId::from_uuid(Uuid::now_v7());
        let mut stored = record.clone();
        stored.remote_id = Some(id);
        if let Some(key) = remote_key::<D>(id) {
            stored.key = key;
        }
        inner.rows.insert(id, stored);
        Ok(id)
    }

    async fn update(&self, remote_id: RemoteId, record: &FavoriteRecord<D>) -> RemoteResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_updates {
            return Err(RemoteStoreError::Api {
                status: 504,
                message: "Gateway Timeout".to_string(),
            });
        }
        inner.updates += 1;
        let Some(row) = inner.rows.get_mut(&remote_id) else {
            return Err(RemoteStoreError::NotFound(remote_id.to_string()));
        };
        row.is_favorite = record.is_favorite;
        row.details = record.details.clone();
        row.device_id.clone_from(&record.device_id);
        row.last_modified = record.last_modified;
        Ok(())
    }

    async fn find_by_key(
        &self,
        user_id: &str,
        key: &D::Key,
    ) -> RemoteResult<Option<FavoriteRecord<D>>> {
        if D::KEY_STRATEGY == KeyStrategy::RemoteId {
            return Ok(None);
        }
        Ok(self
            .inner
            .lock()
            .rows
            .values()
            .find(|row| &row.key == key && row.user_id.as_deref() == Some(user_id))
            .cloned())
    }
}
