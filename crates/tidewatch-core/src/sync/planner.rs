//! Reconciliation planning: pure partitioning of two snapshots

use std::collections::BTreeMap;

use crate::models::{FavoriteDomain, FavoriteRecord, SyncKey};

/// The same logical favorite as seen on both sides
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPair<D: FavoriteDomain> {
    pub local: FavoriteRecord<D>,
    pub remote: FavoriteRecord<D>,
}

impl<D: FavoriteDomain> RecordPair<D> {
    /// Whether the local row is missing or disagrees on its remote back-reference
    pub fn needs_link(&self) -> bool {
        self.local.remote_id != self.remote.remote_id || self.local.user_id != self.remote.user_id
    }
}

/// Disjoint partition of `local ∪ remote` produced before any write happens
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan<D: FavoriteDomain> {
    /// Local rows the remote side has never seen
    pub upload: Vec<FavoriteRecord<D>>,
    /// Remote rows missing locally
    pub download: Vec<FavoriteRecord<D>>,
    /// Present on both sides with different favorite state or details
    pub conflicts: Vec<RecordPair<D>>,
    /// Present on both sides with identical content
    pub unchanged: Vec<RecordPair<D>>,
}

impl<D: FavoriteDomain> SyncPlan<D> {
    pub fn is_empty(&self) -> bool {
        self.upload.is_empty()
            && self.download.is_empty()
            && self.conflicts.is_empty()
            && self.unchanged.is_empty()
    }
}

/// Partition two snapshots of one user's favorites.
///
/// Rows are matched by [`FavoriteRecord::sync_key`]. Local rows without a key
/// yet (remote-id keyed domains before their first upload) always upload. If a
/// key occurs twice on one side the most recently modified row is used.
pub fn plan<D: FavoriteDomain>(
    local: Vec<FavoriteRecord<D>>,
    remote: Vec<FavoriteRecord<D>>,
) -> SyncPlan<D> {
    let mut upload = Vec::new();
    let mut local_by_key = BTreeMap::new();
    for record in local {
        match record.sync_key() {
            Some(key) => keep_newest(&mut local_by_key, key, record),
            None => upload.push(record),
        }
    }

    let mut remote_by_key = BTreeMap::new();
    for record in remote {
        if let Some(key) = record.sync_key() {
            keep_newest(&mut remote_by_key, key, record);
        }
    }

    let mut download = Vec::new();
    let mut conflicts = Vec::new();
    let mut unchanged = Vec::new();

    for (key, remote) in remote_by_key {
        match local_by_key.remove(&key) {
            None => download.push(remote),
            Some(local) => {
                let pair = RecordPair { local, remote };
                if pair.local.same_content(&pair.remote) {
                    unchanged.push(pair);
                } else {
                    conflicts.push(pair);
                }
            }
        }
    }
    upload.extend(local_by_key.into_values());

    SyncPlan {
        upload,
        download,
        conflicts,
        unchanged,
    }
}

fn keep_newest<D: FavoriteDomain>(
    map: &mut BTreeMap<SyncKey<D::Key>, FavoriteRecord<D>>,
    key: SyncKey<D::Key>,
    record: FavoriteRecord<D>,
) {
    match map.get(&key) {
        Some(existing) if existing.last_modified >= record.last_modified => {
            tracing::debug!("Ignoring older duplicate {} row for {}", D::NAME, key);
        }
        _ => {
            map.insert(key, record);
        }
    }
}
