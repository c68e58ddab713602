//! Per-domain sync orchestration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tracing::Instrument;

use crate::auth::{AuthSession, SessionProvider};
use crate::config::EngineSettings;
use crate::models::{FavoriteDomain, FavoriteRecord};
use crate::state::SyncPhase;
use crate::store::{LocalFavoriteStore, RemoteConnector, RemoteFavoriteStore, RemoteStoreError};

use super::planner::{self, RecordPair};
use super::resolver::{ConflictResolver, Resolution};
use super::result::{SyncError, SyncResult, SyncStats};

/// Reconciles one favorite domain between the local and remote store.
///
/// At most one pass runs per engine; a concurrent call returns
/// [`SyncError::AlreadyInProgress`] immediately instead of queueing.
pub struct SyncEngine<D: FavoriteDomain> {
    auth: Arc<dyn SessionProvider>,
    local: Arc<dyn LocalFavoriteStore<D>>,
    remote: Arc<dyn RemoteConnector<D>>,
    settings: EngineSettings,
    syncing: AtomicBool,
    phase: Mutex<SyncPhase>,
    last_stats: Mutex<Option<SyncStats>>,
}

/// Per-item outcome of the upload phase
enum Uploaded {
    Inserted,
    /// Already present remotely with converged state; only the link was written
    Linked,
    /// The row already existed remotely and went through conflict resolution
    Existing(Resolution),
}

/// Holds the re-entrancy flag for one pass and releases it on every exit path
struct PassGuard<'a> {
    syncing: &'a AtomicBool,
    phase: &'a Mutex<SyncPhase>,
}

impl<'a> PassGuard<'a> {
    fn acquire(syncing: &'a AtomicBool, phase: &'a Mutex<SyncPhase>) -> Option<Self> {
        syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { syncing, phase })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = SyncPhase::Idle;
        self.syncing.store(false, Ordering::Release);
    }
}

impl<D: FavoriteDomain> SyncEngine<D> {
    pub fn new(
        auth: Arc<dyn SessionProvider>,
        local: Arc<dyn LocalFavoriteStore<D>>,
        remote: Arc<dyn RemoteConnector<D>>,
    ) -> Self {
        Self {
            auth,
            local,
            remote,
            settings: EngineSettings::default(),
            syncing: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
            last_stats: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Effective tolerance window in milliseconds
    pub fn tolerance_ms(&self) -> i64 {
        self.settings.tolerance_ms.unwrap_or(D::TOLERANCE_MS).max(0)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    /// Stats of the most recent finished pass, including failed ones
    pub fn last_stats(&self) -> Option<SyncStats> {
        self.last_stats.lock().clone()
    }

    /// Run one full reconciliation pass.
    pub async fn sync(&self) -> SyncResult {
        let Some(_guard) = PassGuard::acquire(&self.syncing, &self.phase) else {
            tracing::debug!("Skipping {} sync: a pass is already running", D::NAME);
            return SyncResult::Failure(SyncError::AlreadyInProgress { domain: D::NAME });
        };

        let mut stats = SyncStats::start(D::NAME);
        let span = tracing::info_span!(
            "favorites_sync",
            domain = D::NAME,
            operation_id = %stats.operation_id
        );
        let outcome = self.run_pass(&mut stats).instrument(span).await;
        let result = match outcome {
            Ok(errors) => {
                stats.errors = errors.len();
                stats.finish();
                SyncResult::conclude(stats.clone(), errors)
            }
            Err(error) => {
                stats.errors += 1;
                stats.finish();
                tracing::warn!("{} sync aborted: {}", D::NAME, error);
                SyncResult::Failure(error)
            }
        };

        match &result {
            SyncResult::Success(_) => tracing::info!("Sync finished: {}", stats),
            SyncResult::PartialSuccess { errors, .. } => {
                tracing::warn!(
                    "Sync finished with {} failed item(s): {}",
                    errors.len(),
                    stats
                );
            }
            SyncResult::Failure(error) => tracing::warn!("Sync failed ({}): {}", error, stats),
        }
        *self.last_stats.lock() = Some(stats);
        result
    }

    /// Fatal errors come back as `Err`; per-item errors are collected in `Ok`.
    async fn run_pass(&self, stats: &mut SyncStats) -> Result<Vec<SyncError>, SyncError> {
        self.set_phase(SyncPhase::Authenticating);
        let session = self.authenticate().await?;
        let user_id = session.user_id();

        let device_id = self
            .local
            .device_id()
            .await
            .map_err(|error| SyncError::database("opening the local store", error))?;
        let remote = self
            .remote
            .connect(&session)
            .await
            .map_err(|error| SyncError::remote("connecting to the remote store", error))?;
        tracing::debug!(
            "Starting {} sync {} for user {} on device {}",
            D::NAME,
            stats.operation_id,
            user_id,
            device_id
        );

        self.set_phase(SyncPhase::FetchingSnapshots);
        let (local_rows, remote_rows) = tokio::join!(
            self.local.list_all_for_user(user_id),
            remote.list_for_user(user_id)
        );
        let local_rows = local_rows
            .map_err(|error| SyncError::database("reading the local snapshot", error))?;
        let remote_rows = remote_rows
            .map_err(|error| SyncError::remote("reading the remote snapshot", error))?;
        stats.local_found = local_rows.len();
        stats.remote_found = remote_rows.len();

        self.set_phase(SyncPhase::Planning);
        let plan = planner::plan(local_rows, remote_rows);
        stats.unchanged = plan.unchanged.len();
        tracing::debug!(
            "{} plan: {} upload, {} download, {} conflicts, {} unchanged",
            D::NAME,
            plan.upload.len(),
            plan.download.len(),
            plan.conflicts.len(),
            plan.unchanged.len()
        );

        let remote = remote.as_ref();
        let resolver = ConflictResolver::new(self.local.as_ref(), remote, self.tolerance_ms());
        let resolver = &resolver;
        let device_id = device_id.as_str();
        let mut errors = Vec::new();

        self.set_phase(SyncPhase::Uploading);
        let uploads = self
            .for_each_item(plan.upload, |record| {
                self.upload(remote, resolver, record, user_id, device_id)
            })
            .await;
        for outcome in uploads {
            match outcome {
                Ok(Uploaded::Inserted) => stats.uploaded += 1,
                Ok(Uploaded::Linked) => stats.linked += 1,
                Ok(Uploaded::Existing(resolution)) => count_resolution(stats, resolution),
                Err(error) => errors.push(error),
            }
        }

        self.set_phase(SyncPhase::Downloading);
        let downloads = self
            .for_each_item(plan.download, |record| self.download(record))
            .await;
        for outcome in downloads {
            match outcome {
                Ok(()) => stats.downloaded += 1,
                Err(error) => errors.push(error),
            }
        }

        self.set_phase(SyncPhase::ResolvingConflicts);
        let resolutions = self
            .for_each_item(plan.conflicts, |pair| async move {
                let resolution = resolver.resolve(&pair).await?;
                if resolution == Resolution::Converged && self.link(&pair, user_id).await? {
                    return Ok(None);
                }
                Ok(Some(resolution))
            })
            .await;
        for outcome in resolutions {
            match outcome {
                Ok(Some(resolution)) => count_resolution(stats, resolution),
                Ok(None) => stats.linked += 1,
                Err(error) => errors.push(error),
            }
        }

        let links = self
            .for_each_item(plan.unchanged, |pair| async move { self.link(&pair, user_id).await })
            .await;
        for outcome in links {
            match outcome {
                Ok(true) => stats.linked += 1,
                Ok(false) => {}
                Err(error) => errors.push(error),
            }
        }

        for error in &errors {
            tracing::warn!("{} sync item failed: {}", D::NAME, error);
        }
        Ok(errors)
    }

    async fn authenticate(&self) -> Result<AuthSession, SyncError> {
        match self.auth.current_session().await {
            Ok(Some(session)) if !session.is_expired() => Ok(session),
            Ok(Some(_)) => Err(SyncError::AuthenticationRequired(
                "session expired".to_string(),
            )),
            Ok(None) => Err(SyncError::AuthenticationRequired(
                "no active session".to_string(),
            )),
            Err(error) => Err(SyncError::AuthenticationRequired(error.to_string())),
        }
    }

    /// Push a row the remote side has never seen, then record its remote id locally
    async fn upload(
        &self,
        remote: &dyn RemoteFavoriteStore<D>,
        resolver: &ConflictResolver<'_, D>,
        mut record: FavoriteRecord<D>,
        user_id: &str,
        device_id: &str,
    ) -> Result<Uploaded, SyncError> {
        record.user_id = Some(user_id.to_string());
        if record.device_id.is_empty() {
            record.device_id = device_id.to_string();
        }

        match remote.insert(&record).await {
            Ok(remote_id) => {
                // Only the back-reference is written; an edit made while the
                // insert was in flight stays local and is pushed next pass
                let linked = self
                    .local
                    .link(&record.key, remote_id, user_id)
                    .await
                    .map_err(|error| {
                        SyncError::database(format!("linking uploaded {}", record.key), error)
                    })?;
                SyncError::ensure_written(&record.key, linked)?;
                Ok(Uploaded::Inserted)
            }
            Err(RemoteStoreError::AlreadyExists) => {
                tracing::debug!(
                    "{} {} already exists remotely; resolving against it",
                    D::NAME,
                    record.key
                );
                let existing = remote
                    .find_by_key(user_id, &record.key)
                    .await
                    .map_err(|error| {
                        SyncError::remote(format!("looking up existing {}", record.key), error)
                    })?
                    .ok_or_else(|| {
                        SyncError::remote(
                            format!("uploading {}", record.key),
                            "insert rejected as duplicate but no row was found",
                        )
                    })?;

                let pair = RecordPair {
                    local: record,
                    remote: existing,
                };
                let resolution = if pair.local.same_content(&pair.remote) {
                    Resolution::Converged
                } else {
                    resolver.resolve(&pair).await?
                };
                if resolution == Resolution::Converged && self.link(&pair, user_id).await? {
                    return Ok(Uploaded::Linked);
                }
                Ok(Uploaded::Existing(resolution))
            }
            Err(error) => Err(SyncError::remote(format!("uploading {}", record.key), error)),
        }
    }

    /// Store a remote row locally exactly as the remote side has it, unless a
    /// local row appeared for the same key after the snapshot
    async fn download(&self, record: FavoriteRecord<D>) -> Result<(), SyncError> {
        let written = self.local.write_back(&record, None).await.map_err(|error| {
            SyncError::database(format!("downloading {}", record.key), error)
        })?;
        SyncError::ensure_written(&record.key, written)
    }

    /// Give a local row its remote back-reference; returns whether a write happened
    async fn link(&self, pair: &RecordPair<D>, user_id: &str) -> Result<bool, SyncError> {
        if !pair.needs_link() {
            return Ok(false);
        }

        let key = &pair.local.key;
        let remote_id = pair.remote.remote_id.ok_or_else(|| {
            SyncError::remote(format!("linking {key}"), "remote row has no id")
        })?;
        let linked = self
            .local
            .link(key, remote_id, user_id)
            .await
            .map_err(|error| SyncError::database(format!("linking {key}"), error))?;
        SyncError::ensure_written(key, linked)?;
        Ok(true)
    }

    async fn for_each_item<T, R, F, Fut>(&self, items: Vec<T>, operation: F) -> Vec<R>
    where
        F: FnMut(T) -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        stream::iter(items)
            .map(operation)
            .buffer_unordered(self.settings.item_concurrency.max(1))
            .collect()
            .await
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
    }
}

fn count_resolution(stats: &mut SyncStats, resolution: Resolution) {
    match resolution {
        Resolution::LocalWins | Resolution::RemoteWins => stats.resolved += 1,
        Resolution::Converged => stats.unchanged += 1,
    }
}
