//! Last-write-wins conflict resolution

use std::fmt;

use crate::models::{FavoriteDomain, FavoriteRecord, NewSyncConflict, Winner};
use crate::store::{LocalFavoriteStore, LocalWrite, RemoteFavoriteStore};

use super::planner::RecordPair;
use super::result::SyncError;

/// Outcome of arbitrating one conflicting pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Timestamps within tolerance; nothing is written
    Converged,
    LocalWins,
    RemoteWins,
}

impl Resolution {
    pub const fn winner(self) -> Option<Winner> {
        match self {
            Self::Converged => None,
            Self::LocalWins => Some(Winner::Local),
            Self::RemoteWins => Some(Winner::Remote),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converged => "converged",
            Self::LocalWins => "local wins",
            Self::RemoteWins => "remote wins",
        })
    }
}

/// Compare two `last_modified` values.
///
/// A difference of exactly `tolerance_ms` still counts as converged. A
/// negative tolerance is treated as zero.
pub const fn arbitrate(local_ms: i64, remote_ms: i64, tolerance_ms: i64) -> Resolution {
    let tolerance_ms = if tolerance_ms < 0 { 0 } else { tolerance_ms };
    let delta = local_ms.saturating_sub(remote_ms);
    if delta > tolerance_ms {
        Resolution::LocalWins
    } else if delta < -tolerance_ms {
        Resolution::RemoteWins
    } else {
        Resolution::Converged
    }
}

/// Writes the winner of a conflicting pair onto the losing side.
///
/// The winner's own `last_modified` travels with its state; the losing side is
/// never stamped with the resolution time.
pub struct ConflictResolver<'a, D: FavoriteDomain> {
    local: &'a dyn LocalFavoriteStore<D>,
    remote: &'a dyn RemoteFavoriteStore<D>,
    tolerance_ms: i64,
}

impl<'a, D: FavoriteDomain> ConflictResolver<'a, D> {
    pub fn new(
        local: &'a dyn LocalFavoriteStore<D>,
        remote: &'a dyn RemoteFavoriteStore<D>,
        tolerance_ms: i64,
    ) -> Self {
        Self {
            local,
            remote,
            tolerance_ms: tolerance_ms.max(0),
        }
    }

    pub async fn resolve(&self, pair: &RecordPair<D>) -> Result<Resolution, SyncError> {
        let RecordPair { local, remote } = pair;
        let resolution = arbitrate(local.last_modified, remote.last_modified, self.tolerance_ms);
        tracing::debug!(
            "{} {}: local={} remote={} -> {}",
            D::NAME,
            local.key,
            local.last_modified,
            remote.last_modified,
            resolution
        );

        match resolution {
            Resolution::Converged => return Ok(resolution),
            Resolution::LocalWins => self.push_local(local, remote).await?,
            Resolution::RemoteWins => self.pull_remote(local, remote).await?,
        }

        if let Some(winner) = resolution.winner() {
            self.log_conflict(local, remote, winner).await;
        }
        Ok(resolution)
    }

    async fn push_local(
        &self,
        local: &FavoriteRecord<D>,
        remote: &FavoriteRecord<D>,
    ) -> Result<(), SyncError> {
        let remote_id = remote
            .remote_id
            .ok_or_else(|| failed(local, "remote row has no id"))?;

        let mut payload = local.clone();
        payload.user_id.clone_from(&remote.user_id);
        payload.remote_id = Some(remote_id);
        self.remote
            .update(remote_id, &payload)
            .await
            .map_err(|error| failed(local, error))?;

        let Some(user_id) = payload.user_id.as_deref() else {
            return Ok(());
        };
        if local.remote_id != payload.remote_id || local.user_id != payload.user_id {
            match self.local.link(&local.key, remote_id, user_id).await {
                Ok(LocalWrite::Written) => {}
                Ok(skipped) => tracing::warn!(
                    "Left {} {} unlinked after pushing it: {:?}",
                    D::NAME,
                    local.key,
                    skipped
                ),
                Err(error) => tracing::warn!(
                    "Failed to link {} {} after pushing it: {}",
                    D::NAME,
                    local.key,
                    error
                ),
            }
        }
        Ok(())
    }

    /// Copy the remote state onto the local row, provided the local row is
    /// still the one that lost arbitration
    async fn pull_remote(
        &self,
        local: &FavoriteRecord<D>,
        remote: &FavoriteRecord<D>,
    ) -> Result<(), SyncError> {
        let mut merged = local.clone();
        merged.adopt_state_of(remote);
        merged.remote_id = remote.remote_id;
        merged.user_id.clone_from(&remote.user_id);

        let written = self
            .local
            .write_back(&merged, Some(local.last_modified))
            .await
            .map_err(|error| failed(local, error))?;
        SyncError::ensure_written(&local.key, written)
    }

    async fn log_conflict(
        &self,
        local: &FavoriteRecord<D>,
        remote: &FavoriteRecord<D>,
        winner: Winner,
    ) {
        let conflict = NewSyncConflict {
            domain: D::NAME,
            natural_key: local.key.to_string(),
            local_modified: local.last_modified,
            remote_modified: remote.last_modified,
            winner,
        };
        if let Err(error) = self.local.record_conflict(&conflict).await {
            tracing::warn!("Failed to record {} conflict for {}: {}", D::NAME, local.key, error);
        }
    }
}

fn failed<D: FavoriteDomain>(record: &FavoriteRecord<D>, reason: impl fmt::Display) -> SyncError {
    SyncError::ConflictResolutionFailed {
        key: record.key.to_string(),
        reason: reason.to_string(),
    }
}
