//! Engine behaviour against in-memory stores.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use support::{
    active_session, expired_session, InMemoryLocal, InMemoryRemote, SessionState, StaticSession,
    USER,
};
use tidewatch_core::auth::AuthSession;
use tidewatch_core::config::EngineSettings;
use tidewatch_core::domains::{
    LocationId, StationId, TideStationDetails, TideStations, WeatherLocationDetails,
    WeatherLocations,
};
use tidewatch_core::models::Winner;
use tidewatch_core::services::DatabaseService;
use tidewatch_core::state::SyncPhase;
use tidewatch_core::store::{
    RemoteConnector, RemoteFavoriteStore, RemoteResult, RemoteStoreError,
};
use tidewatch_core::{FavoriteRecord, RemoteId, SyncEngine, SyncError, SyncResult};

const TOLERANCE_MS: i64 = 10;

fn tide(key: &str, is_favorite: bool, last_modified: i64) -> FavoriteRecord<TideStations> {
    FavoriteRecord::new(
        StationId::new(key),
        TideStationDetails {
            name: format!("Station {key}"),
            latitude: 42.0,
            longitude: -71.0,
        },
        is_favorite,
        "device-other",
        last_modified,
    )
}

/// Local row that has already been through a sync with `remote`
fn linked_tide(
    remote: &InMemoryRemote<TideStations>,
    key: &str,
    is_favorite: bool,
    last_modified: i64,
) -> (FavoriteRecord<TideStations>, FavoriteRecord<TideStations>) {
    let remote_record = tide(key, is_favorite, last_modified);
    let id = remote.seed(remote_record);
    let mut local = tide(key, is_favorite, last_modified);
    local.remote_id = Some(id);
    local.user_id = Some(USER.to_string());
    let remote_record = remote.find(&local.key).unwrap();
    (local, remote_record)
}

fn tide_engine(
    session: Arc<StaticSession>,
    local: &InMemoryLocal<TideStations>,
    remote: &InMemoryRemote<TideStations>,
) -> SyncEngine<TideStations> {
    SyncEngine::<TideStations>::new(session, Arc::new(local.clone()), Arc::new(remote.clone()))
        .with_settings(EngineSettings::default().with_tolerance_ms(TOLERANCE_MS))
}

fn stats(result: &SyncResult) -> &tidewatch_core::SyncStats {
    match result {
        SyncResult::Success(stats) => stats,
        other => panic!("expected success, got {other:?}"),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn local_only_favorite_is_uploaded_once() {
    let local = InMemoryLocal::with_rows([tide("A", true, 100)]);
    let remote = InMemoryRemote::new();
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let first = engine.sync().await;
    assert_eq!(stats(&first).uploaded, 1);
    assert_eq!(stats(&first).local_found, 1);
    assert_eq!(stats(&first).remote_found, 0);

    let uploaded = remote.find(&StationId::new("A")).unwrap();
    assert!(uploaded.is_favorite);
    assert_eq!(uploaded.last_modified, 100);
    assert_eq!(uploaded.user_id.as_deref(), Some(USER));

    let linked = local.get(&StationId::new("A")).unwrap();
    assert_eq!(linked.remote_id, uploaded.remote_id);
    assert_eq!(linked.user_id.as_deref(), Some(USER));

    let writes_before = local.writes();
    let second = engine.sync().await;
    assert_eq!(stats(&second).writes(), 0);
    assert_eq!(stats(&second).unchanged, 1);
    assert_eq!(remote.writes(), 1);
    assert_eq!(local.writes(), writes_before);
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_local_unfavorite_wins() {
    let remote = InMemoryRemote::new();
    let (mut local_row, _) = linked_tide(&remote, "A", true, 100);
    local_row.is_favorite = false;
    local_row.last_modified = 200;
    local_row.device_id = "device-local".to_string();
    let local = InMemoryLocal::with_rows([local_row]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).resolved, 1);

    let pushed = remote.find(&StationId::new("A")).unwrap();
    assert!(!pushed.is_favorite);
    assert_eq!(pushed.last_modified, 200);
    assert_eq!(pushed.device_id, "device-local");

    let conflicts = local.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].winner, Winner::Local);
    assert_eq!(conflicts[0].local_modified, 200);
    assert_eq!(conflicts[0].remote_modified, 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_synced_rows_cause_no_writes() {
    let remote = InMemoryRemote::new();
    let (local_row, _) = linked_tide(&remote, "A", true, 100);
    let local = InMemoryLocal::with_rows([local_row]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).unchanged, 1);
    assert_eq!(stats(&result).writes(), 0);
    assert_eq!(remote.writes(), 0);
    assert_eq!(local.writes(), 0);
}

// ============================================================================
// Last-write-wins properties
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn difference_of_exactly_the_tolerance_is_left_alone() {
    let remote = InMemoryRemote::new();
    let (mut local_row, _) = linked_tide(&remote, "A", true, 1_000);
    local_row.is_favorite = false;
    local_row.last_modified = 1_000 + TOLERANCE_MS;
    let local = InMemoryLocal::with_rows([local_row.clone()]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).resolved, 0);
    assert_eq!(remote.writes(), 0);
    assert_eq!(local.writes(), 0);
    assert_eq!(local.get(&local_row.key), Some(local_row));
    assert!(local.conflicts().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn difference_just_past_the_tolerance_picks_a_winner() {
    let remote = InMemoryRemote::new();
    let (mut local_row, _) = linked_tide(&remote, "A", true, 1_000);
    local_row.is_favorite = false;
    local_row.last_modified = 1_000 + TOLERANCE_MS + 1;
    let local = InMemoryLocal::with_rows([local_row]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).resolved, 1);
    assert_eq!(remote.updates(), 1);
    assert!(!remote.find(&StationId::new("A")).unwrap().is_favorite);
}

#[tokio::test(flavor = "multi_thread")]
async fn local_win_does_not_oscillate() {
    let remote = InMemoryRemote::new();
    let (mut local_row, _) = linked_tide(&remote, "A", true, 100);
    local_row.details.name = "Boston Harbor".to_string();
    local_row.last_modified = 5_000;
    let local = InMemoryLocal::with_rows([local_row]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let first = engine.sync().await;
    assert_eq!(stats(&first).resolved, 1);
    let after = remote.find(&StationId::new("A")).unwrap();
    assert_eq!(after.last_modified, 5_000);
    assert_eq!(after.details.name, "Boston Harbor");

    let second = engine.sync().await;
    assert_eq!(stats(&second).resolved, 0);
    assert_eq!(stats(&second).unchanged, 1);
    assert_eq!(remote.updates(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_win_keeps_the_remote_timestamp() {
    let remote = InMemoryRemote::new();
    let (local_row, _) = linked_tide(&remote, "A", true, 100);
    let mut newer = remote.find(&local_row.key).unwrap();
    newer.is_favorite = false;
    newer.last_modified = 9_000;
    newer.device_id = "device-phone".to_string();
    remote.seed(newer);
    let local = InMemoryLocal::with_rows([local_row]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let first = engine.sync().await;
    assert_eq!(stats(&first).resolved, 1);
    let pulled = local.get(&StationId::new("A")).unwrap();
    assert!(!pulled.is_favorite);
    assert_eq!(pulled.last_modified, 9_000);
    assert_eq!(pulled.device_id, "device-phone");
    assert_eq!(local.conflicts()[0].winner, Winner::Remote);

    let second = engine.sync().await;
    assert_eq!(stats(&second).writes(), 0);
    assert_eq!(remote.writes(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_pass_is_idempotent() {
    let remote = InMemoryRemote::new();
    let (mut conflicting, _) = linked_tide(&remote, "C", true, 100);
    conflicting.is_favorite = false;
    conflicting.last_modified = 300;
    let (unchanged, _) = linked_tide(&remote, "D", true, 100);
    remote.seed(tide("E", true, 50));
    let local = InMemoryLocal::with_rows([
        tide("A", true, 10),
        tide("B", false, 20),
        conflicting,
        unchanged,
    ]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let first = engine.sync().await;
    let first = stats(&first);
    assert_eq!(
        (first.uploaded, first.downloaded, first.resolved, first.unchanged),
        (2, 1, 1, 1)
    );

    let remote_writes = remote.writes();
    let local_writes = local.writes();
    let second = engine.sync().await;
    let second = stats(&second);
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 5);
    assert_eq!(remote.writes(), remote_writes);
    assert_eq!(local.writes(), local_writes);
}

#[tokio::test(flavor = "multi_thread")]
async fn downloads_copy_remote_rows_verbatim() {
    let remote = InMemoryRemote::new();
    let id = remote.seed(tide("B", false, 777));
    let local = InMemoryLocal::new();
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).downloaded, 1);
    let downloaded = local.get(&StationId::new("B")).unwrap();
    assert_eq!(downloaded, remote.find(&StationId::new("B")).unwrap());
    assert_eq!(downloaded.remote_id, Some(id));
    assert_eq!(downloaded.last_modified, 777);
}

#[tokio::test(flavor = "multi_thread")]
async fn same_content_missing_link_is_backfilled() {
    let remote = InMemoryRemote::new();
    let id = remote.seed(tide("A", true, 100));
    let local = InMemoryLocal::with_rows([tide("A", true, 40_000)]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).linked, 1);
    assert_eq!(remote.writes(), 0);
    let linked = local.get(&StationId::new("A")).unwrap();
    assert_eq!(linked.remote_id, Some(id));
    assert_eq!(linked.last_modified, 40_000);
}

// ============================================================================
// Authentication gate
// ============================================================================

async fn assert_auth_gate(state: SessionState) {
    let local = InMemoryLocal::with_rows([tide("A", true, 100)]);
    let remote = InMemoryRemote::new();
    let engine = tide_engine(StaticSession::new(state), &local, &remote);

    let result = engine.sync().await;
    assert!(
        matches!(result, SyncResult::Failure(SyncError::AuthenticationRequired(_))),
        "unexpected result {result:?}"
    );
    assert_eq!(local.calls(), 0);
    assert_eq!(remote.connects(), 0);
    assert_eq!(remote.inner.lock().lists, 0);
    assert!(!engine.is_syncing());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_session_touches_no_store() {
    assert_auth_gate(SessionState::Missing).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_session_touches_no_store() {
    assert_auth_gate(SessionState::Active(expired_session(USER))).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn session_lookup_error_touches_no_store() {
    assert_auth_gate(SessionState::Broken).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_of_other_users_are_never_fetched_or_claimed() {
    let local = InMemoryLocal::new();
    let mut foreign = tide("X", true, 1);
    foreign.user_id = Some("user-2".to_string());
    local.seed(foreign.clone());
    let remote = InMemoryRemote::new();
    let mut theirs = tide("Y", true, 1);
    theirs.user_id = Some("user-2".to_string());
    remote.seed(theirs);

    let session = StaticSession::new(SessionState::Active(active_session(USER)));
    let engine = tide_engine(session.clone(), &local, &remote);
    let result = engine.sync().await;

    assert_eq!(stats(&result).writes(), 0);
    assert_eq!(local.get(&foreign.key), Some(foreign));
    assert_eq!(session.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Re-entrancy and fatal errors
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_pass_is_refused() {
    let local = InMemoryLocal::with_rows([tide("A", true, 100)]);
    let remote = InMemoryRemote::new();
    remote.inner.lock().list_delay = Some(Duration::from_millis(50));
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let (first, second) = tokio::join!(engine.sync(), engine.sync());
    let refused = [&first, &second]
        .into_iter()
        .filter(|result| {
            matches!(
                result,
                SyncResult::Failure(SyncError::AlreadyInProgress { domain: "tide_stations" })
            )
        })
        .count();
    assert_eq!(refused, 1);
    assert_eq!(remote.inserts(), 1);

    assert!(!engine.is_syncing());
    assert_eq!(engine.phase(), SyncPhase::Idle);
    assert!(engine.sync().await.is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_snapshot_failure_is_fatal_and_releases_the_guard() {
    let local = InMemoryLocal::with_rows([tide("A", true, 100)]);
    let remote = InMemoryRemote::new();
    remote.inner.lock().fail_list = true;
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert!(matches!(
        result,
        SyncResult::Failure(SyncError::RemoteStore { .. })
    ));
    assert_eq!(remote.inserts(), 0);
    assert_eq!(local.writes(), 0);
    assert!(!engine.is_syncing());
    assert_eq!(engine.last_stats().map(|s| s.errors), Some(1));

    remote.inner.lock().fail_list = false;
    assert_eq!(stats(&engine.sync().await).uploaded, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn local_snapshot_failure_is_fatal() {
    let local = InMemoryLocal::with_rows([tide("A", true, 100)]);
    local.inner.lock().fail_list = true;
    let remote = InMemoryRemote::new();
    remote.seed(tide("B", true, 100));
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert!(matches!(result, SyncResult::Failure(SyncError::Database { .. })));
    assert_eq!(remote.writes(), 0);
    assert_eq!(local.writes(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unusable_local_store_aborts_before_remote_io() {
    let local = InMemoryLocal::<TideStations>::new();
    local.inner.lock().fail_device_id = true;
    let remote = InMemoryRemote::new();
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert!(matches!(result, SyncResult::Failure(SyncError::Database { .. })));
    assert_eq!(remote.connects(), 0);
}

// ============================================================================
// Per-item failures
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn item_failures_with_progress_are_partial_success() {
    let local = InMemoryLocal::with_rows([tide("A", true, 100), tide("B", true, 100)]);
    let remote = InMemoryRemote::new();
    remote.fail_inserts_for(&StationId::new("B"));
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    match engine.sync().await {
        SyncResult::PartialSuccess { stats, errors } => {
            assert_eq!(stats.uploaded, 1);
            assert_eq!(stats.errors, 1);
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], SyncError::RemoteStore { .. }));
        }
        other => panic!("expected partial success, got {other:?}"),
    }
    assert!(local.get(&StationId::new("B")).unwrap().remote_id.is_none());

    // The failed item stays divergent and is picked up by the next pass
    remote.inner.lock().fail_inserts.clear();
    assert_eq!(stats(&engine.sync().await).uploaded, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failures_without_any_write_are_failure() {
    let remote = InMemoryRemote::new();
    let (mut a, _) = linked_tide(&remote, "A", true, 100);
    a.is_favorite = false;
    a.last_modified = 900;
    let (mut b, _) = linked_tide(&remote, "B", true, 100);
    b.is_favorite = false;
    b.last_modified = 900;
    remote.inner.lock().fail_updates = true;
    let local = InMemoryLocal::with_rows([a, b]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    match engine.sync().await {
        SyncResult::Failure(SyncError::Failed {
            failed_items,
            first,
        }) => {
            assert_eq!(failed_items, 2);
            assert!(matches!(*first, SyncError::ConflictResolutionFailed { .. }));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(local.conflicts().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_win_that_cannot_be_stored_is_reported_per_item() {
    let remote = InMemoryRemote::new();
    let (local_row, _) = linked_tide(&remote, "A", true, 100);
    let mut newer = remote.find(&local_row.key).unwrap();
    newer.is_favorite = false;
    newer.last_modified = 9_000;
    remote.seed(newer);
    remote.seed(tide("B", true, 5));
    let local = InMemoryLocal::with_rows([local_row]);
    local.fail_writes_for(&StationId::new("A"));
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    match engine.sync().await {
        SyncResult::PartialSuccess { stats, errors } => {
            assert_eq!(stats.downloaded, 1);
            assert_eq!(
                errors,
                vec![SyncError::ConflictResolutionFailed {
                    key: "A".to_string(),
                    reason: "Database error: locked row A".to_string(),
                }]
            );
        }
        other => panic!("expected partial success, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_insert_is_resolved_against_the_existing_row() {
    let remote = InMemoryRemote::new();
    let existing = remote.seed_hidden(tide("A", true, 500));
    let local = InMemoryLocal::with_rows([tide("A", false, 900)]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    let stats = stats(&result);
    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.resolved, 1);
    assert_eq!(remote.inserts(), 0);
    assert_eq!(remote.rows().len(), 1);

    let updated = remote.find(&StationId::new("A")).unwrap();
    assert!(!updated.is_favorite);
    assert_eq!(updated.last_modified, 900);
    assert_eq!(
        local.get(&StationId::new("A")).unwrap().remote_id,
        Some(existing)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_insert_with_same_state_only_links() {
    let remote = InMemoryRemote::new();
    let existing = remote.seed_hidden(tide("A", true, 500));
    let local = InMemoryLocal::with_rows([tide("A", true, 900)]);
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    let result = engine.sync().await;
    assert_eq!(stats(&result).linked, 1);
    assert_eq!(remote.writes(), 0);
    assert_eq!(
        local.get(&StationId::new("A")).unwrap().remote_id,
        Some(existing)
    );
}

// ============================================================================
// Remote-id keyed domain
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn weather_locations_match_by_remote_id() {
    let key = LocationId::new();
    let local = InMemoryLocal::with_rows([FavoriteRecord::<WeatherLocations>::new(
        key,
        WeatherLocationDetails {
            name: "Home".to_string(),
            latitude: 41.5,
            longitude: -70.6,
        },
        true,
        "device-local",
        100,
    )]);
    let remote = InMemoryRemote::<WeatherLocations>::new();
    let elsewhere = remote.seed(FavoriteRecord::new(
        LocationId::new(),
        WeatherLocationDetails {
            name: "Cabin".to_string(),
            ..WeatherLocationDetails::default()
        },
        true,
        "device-other",
        50,
    ));
    let engine = SyncEngine::<WeatherLocations>::new(
        StaticSession::signed_in(),
        Arc::new(local.clone()),
        Arc::new(remote.clone()),
    );
    assert_eq!(engine.tolerance_ms(), 10);

    let first = engine.sync().await;
    let first = stats(&first);
    assert_eq!((first.uploaded, first.downloaded), (1, 1));

    let home = local.get(&key).unwrap();
    assert!(home.remote_id.is_some());
    let cabin = local
        .rows()
        .into_iter()
        .find(|record| record.remote_id == Some(elsewhere))
        .unwrap();
    assert_eq!(cabin.key.to_string(), elsewhere.to_string());

    let second = engine.sync().await;
    assert_eq!(stats(&second).writes(), 0);
    assert_eq!(stats(&second).unchanged, 2);
    assert_eq!(remote.inserts(), 1);
}

// ============================================================================
// libSQL-backed local store
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn database_service_round_trip() {
    let service = DatabaseService::open_in_memory().await.unwrap();
    service
        .set_favorite::<TideStations>(
            StationId::new("8443970"),
            TideStationDetails {
                name: "Boston".to_string(),
                latitude: 42.354,
                longitude: -71.05,
            },
            true,
            None,
        )
        .await
        .unwrap();
    let remote = InMemoryRemote::<TideStations>::new();
    let id = remote.seed(tide("9414290", false, 1));

    // Local edits land within milliseconds of each other here
    let engine = SyncEngine::<TideStations>::new(
        StaticSession::signed_in(),
        Arc::new(service.clone()),
        Arc::new(remote.clone()),
    )
    .with_settings(EngineSettings::default().with_tolerance_ms(0));

    let first = engine.sync().await;
    assert_eq!(
        (stats(&first).uploaded, stats(&first).downloaded),
        (1, 1)
    );
    let downloaded = service
        .get_favorite::<TideStations>(&StationId::new("9414290"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(downloaded.remote_id, Some(id));
    assert!(!downloaded.is_favorite);

    // Un-favorite locally, then push it
    let unfavorited = service
        .unfavorite::<TideStations>(&StationId::new("8443970"), Some(USER))
        .await
        .unwrap();
    let second = engine.sync().await;
    assert_eq!(stats(&second).resolved, 1);
    let pushed = remote.find(&StationId::new("8443970")).unwrap();
    assert!(!pushed.is_favorite);
    assert_eq!(pushed.last_modified, unfavorited.last_modified);

    let conflicts = service.list_conflicts(10).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].winner, Winner::Local);

    let third = engine.sync().await;
    assert_eq!(stats(&third).writes(), 0);
}

// ============================================================================
// Local edits made while a pass is running
// ============================================================================

/// Remote store that un-favorites the row locally while its insert is in flight
#[derive(Clone)]
struct UnfavoriteDuringInsert {
    remote: InMemoryRemote<TideStations>,
    service: DatabaseService,
}

#[async_trait]
impl RemoteConnector<TideStations> for UnfavoriteDuringInsert {
    async fn connect(
        &self,
        _session: &AuthSession,
    ) -> RemoteResult<Arc<dyn RemoteFavoriteStore<TideStations>>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl RemoteFavoriteStore<TideStations> for UnfavoriteDuringInsert {
    async fn list_for_user(&self, user_id: &str) -> RemoteResult<Vec<FavoriteRecord<TideStations>>> {
        self.remote.list_for_user(user_id).await
    }

    async fn insert(&self, record: &FavoriteRecord<TideStations>) -> RemoteResult<RemoteId> {
        let id = self.remote.insert(record).await?;
        self.service
            .unfavorite::<TideStations>(&record.key, None)
            .await
            .map_err(|error| RemoteStoreError::InvalidPayload(error.to_string()))?;
        Ok(id)
    }

    async fn update(
        &self,
        remote_id: RemoteId,
        record: &FavoriteRecord<TideStations>,
    ) -> RemoteResult<()> {
        self.remote.update(remote_id, record).await
    }

    async fn find_by_key(
        &self,
        user_id: &str,
        key: &StationId,
    ) -> RemoteResult<Option<FavoriteRecord<TideStations>>> {
        self.remote.find_by_key(user_id, key).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unfavorite_made_while_uploading_survives_the_pass() {
    let service = DatabaseService::open_in_memory().await.unwrap();
    service
        .set_favorite::<TideStations>(StationId::new("A"), TideStationDetails::default(), true, None)
        .await
        .unwrap();
    let remote = InMemoryRemote::<TideStations>::new();
    let connector = UnfavoriteDuringInsert {
        remote: remote.clone(),
        service: service.clone(),
    };
    let engine = SyncEngine::<TideStations>::new(
        StaticSession::signed_in(),
        Arc::new(service.clone()),
        Arc::new(connector),
    )
    .with_settings(EngineSettings::default().with_tolerance_ms(0));

    let first = engine.sync().await;
    assert_eq!(stats(&first).uploaded, 1);
    let after = service
        .get_favorite::<TideStations>(&StationId::new("A"))
        .await
        .unwrap()
        .unwrap();
    assert!(!after.is_favorite);
    assert_eq!(after.user_id.as_deref(), Some(USER));
    assert_eq!(
        after.remote_id,
        remote.find(&StationId::new("A")).unwrap().remote_id
    );

    let second = engine.sync().await;
    assert_eq!(stats(&second).resolved, 1);
    let pushed = remote.find(&StationId::new("A")).unwrap();
    assert!(!pushed.is_favorite);
    assert_eq!(pushed.last_modified, after.last_modified);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_win_does_not_overwrite_a_newer_local_edit() {
    let remote = InMemoryRemote::new();
    let (local_row, _) = linked_tide(&remote, "A", true, 100);
    let mut newer = remote.find(&local_row.key).unwrap();
    newer.is_favorite = false;
    newer.last_modified = 9_000;
    remote.seed(newer);
    let local = InMemoryLocal::with_rows([local_row.clone()]);
    let mut edited = local_row;
    edited.details.name = "Renamed".to_string();
    edited.last_modified = 9_500;
    local.edit_after_snapshot(edited.clone());
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    match engine.sync().await {
        SyncResult::Failure(SyncError::Failed {
            failed_items: 1,
            first,
        }) => assert_eq!(
            *first,
            SyncError::ChangedDuringSync {
                key: "A".to_string()
            }
        ),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(local.get(&edited.key), Some(edited.clone()));
    assert!(local.conflicts().is_empty());

    // The next pass plans from the edited row
    let second = engine.sync().await;
    assert_eq!(stats(&second).resolved, 1);
    let pushed = remote.find(&edited.key).unwrap();
    assert!(pushed.is_favorite);
    assert_eq!(pushed.details.name, "Renamed");
    assert_eq!(pushed.last_modified, 9_500);
}

#[tokio::test(flavor = "multi_thread")]
async fn download_does_not_replace_a_row_created_during_the_pass() {
    let remote = InMemoryRemote::new();
    remote.seed(tide("B", false, 100));
    let local = InMemoryLocal::new();
    local.edit_after_snapshot(tide("B", true, 5_000));
    let engine = tide_engine(StaticSession::signed_in(), &local, &remote);

    match engine.sync().await {
        SyncResult::Failure(SyncError::Failed { first, .. }) => assert_eq!(
            *first,
            SyncError::ChangedDuringSync {
                key: "B".to_string()
            }
        ),
        other => panic!("expected failure, got {other:?}"),
    }
    let kept = local.get(&StationId::new("B")).unwrap();
    assert!(kept.is_favorite);
    assert_eq!(kept.last_modified, 5_000);

    let second = engine.sync().await;
    assert_eq!(stats(&second).resolved, 1);
    assert!(remote.find(&StationId::new("B")).unwrap().is_favorite);
}

#[tokio::test(flavor = "multi_thread")]
async fn another_users_local_row_is_never_taken_over() {
    let service = DatabaseService::open_in_memory().await.unwrap();
    let theirs = service
        .set_favorite::<TideStations>(
            StationId::new("X"),
            TideStationDetails {
                name: "Saved by user-2".to_string(),
                ..TideStationDetails::default()
            },
            true,
            Some("user-2"),
        )
        .await
        .unwrap();
    let remote = InMemoryRemote::<TideStations>::new();
    remote.seed(tide("X", false, 1));
    remote.seed(tide("Y", true, 1));
    let engine = SyncEngine::<TideStations>::new(
        StaticSession::signed_in(),
        Arc::new(service.clone()),
        Arc::new(remote.clone()),
    );

    match engine.sync().await {
        SyncResult::PartialSuccess { stats, errors } => {
            assert_eq!(stats.downloaded, 1);
            assert_eq!(
                errors,
                vec![SyncError::ForeignOwner {
                    key: "X".to_string()
                }]
            );
        }
        other => panic!("expected partial success, got {other:?}"),
    }
    assert_eq!(
        service
            .get_favorite::<TideStations>(&StationId::new("X"))
            .await
            .unwrap(),
        Some(theirs)
    );
    assert!(service
        .get_favorite::<TideStations>(&StationId::new("Y"))
        .await
        .unwrap()
        .is_some());
}

// ============================================================================
// Independent domains
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn different_domains_sync_side_by_side() {
    let service = DatabaseService::open_in_memory().await.unwrap();
    service
        .set_favorite::<TideStations>(
            StationId::new("8443970"),
            TideStationDetails::default(),
            true,
            None,
        )
        .await
        .unwrap();
    let home = service
        .set_favorite::<WeatherLocations>(
            LocationId::new(),
            WeatherLocationDetails {
                name: "Home".to_string(),
                ..WeatherLocationDetails::default()
            },
            true,
            None,
        )
        .await
        .unwrap();

    let tides = InMemoryRemote::<TideStations>::new();
    let weather = InMemoryRemote::<WeatherLocations>::new();
    tides.inner.lock().list_delay = Some(Duration::from_millis(100));
    weather.inner.lock().list_delay = Some(Duration::from_millis(100));
    let tides_engine = SyncEngine::<TideStations>::new(
        StaticSession::signed_in(),
        Arc::new(service.clone()),
        Arc::new(tides.clone()),
    );
    let weather_engine = SyncEngine::<WeatherLocations>::new(
        StaticSession::signed_in(),
        Arc::new(service.clone()),
        Arc::new(weather.clone()),
    );

    let (tide_result, weather_result, both_in_flight) = tokio::join!(
        tides_engine.sync(),
        weather_engine.sync(),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tides_engine.is_syncing() && weather_engine.is_syncing()
        }
    );

    assert!(both_in_flight);
    assert_eq!(stats(&tide_result).uploaded, 1);
    assert_eq!(stats(&weather_result).uploaded, 1);
    assert_eq!(tides.inserts(), 1);
    assert_eq!(weather.inserts(), 1);
    assert!(!tides_engine.is_syncing());
    assert!(!weather_engine.is_syncing());

    let linked = service
        .get_favorite::<WeatherLocations>(&home.key)
        .await
        .unwrap()
        .unwrap();
    assert!(linked.remote_id.is_some());
}
