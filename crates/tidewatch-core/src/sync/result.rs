//! Sync pass outcome types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::LocalWrite;

/// Why a sync pass, or one item within it, failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No usable session; the pass never touched either store
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("A {domain} sync is already in progress")]
    AlreadyInProgress { domain: &'static str },

    #[error("Local store error while {context}: {reason}")]
    Database { context: String, reason: String },

    #[error("Remote store error while {context}: {reason}")]
    RemoteStore { context: String, reason: String },

    /// The winner of a conflict could not be written to the losing side
    #[error("Could not resolve conflict for {key}: {reason}")]
    ConflictResolutionFailed { key: String, reason: String },

    /// The local row was edited after the snapshot; the next pass re-plans it
    #[error("{key} changed locally during sync; left for the next pass")]
    ChangedDuringSync { key: String },

    /// The local row belongs to another user signed in on this device
    #[error("{key} is stored locally for another user")]
    ForeignOwner { key: String },

    /// Every attempted write in the pass failed
    #[error("Sync failed for {failed_items} item(s); first error: {first}")]
    Failed {
        failed_items: usize,
        first: Box<SyncError>,
    },
}

impl SyncError {
    pub(crate) fn database(context: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::Database {
            context: context.into(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn remote(context: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::RemoteStore {
            context: context.into(),
            reason: error.to_string(),
        }
    }

    /// Turn a skipped guarded local write into the per-item error for `key`
    pub(crate) fn ensure_written(key: impl fmt::Display, write: LocalWrite) -> Result<(), Self> {
        match write {
            LocalWrite::Written => Ok(()),
            LocalWrite::Changed => Err(Self::ChangedDuringSync {
                key: key.to_string(),
            }),
            LocalWrite::ForeignOwner => Err(Self::ForeignOwner {
                key: key.to_string(),
            }),
        }
    }

    /// Whether a later pass may succeed without user action
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AuthenticationRequired(_) | Self::ForeignOwner { .. }
        )
    }
}

/// Counters and timing for one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub operation_id: Uuid,
    pub domain: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub local_found: usize,
    pub remote_found: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    /// Conflicts settled by writing the winner to the losing side
    pub resolved: usize,
    /// Local rows that only gained their remote back-reference
    pub linked: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl SyncStats {
    pub fn start(domain: &'static str) -> Self {
        Self {
            operation_id: Uuid::now_v7(),
            domain,
            started_at: Utc::now(),
            finished_at: None,
            local_found: 0,
            remote_found: 0,
            uploaded: 0,
            downloaded: 0,
            resolved: 0,
            linked: 0,
            unchanged: 0,
            errors: 0,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Elapsed time, up to now for a pass still running
    pub fn duration(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// Writes issued to either store
    pub const fn writes(&self) -> usize {
        self.uploaded + self.downloaded + self.resolved + self.linked
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} local, {} remote, {} uploaded, {} downloaded, {} resolved, {} linked, {} unchanged, {} errors in {} ms",
            self.domain,
            self.local_found,
            self.remote_found,
            self.uploaded,
            self.downloaded,
            self.resolved,
            self.linked,
            self.unchanged,
            self.errors,
            self.duration().as_millis()
        )
    }
}

/// Outcome of `SyncEngine::sync`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Success(SyncStats),
    /// Some items failed; everything else is already live on both sides
    PartialSuccess {
        stats: SyncStats,
        errors: Vec<SyncError>,
    },
    Failure(SyncError),
}

impl SyncResult {
    /// Classify a completed pass from its stats and per-item errors
    pub fn conclude(stats: SyncStats, errors: Vec<SyncError>) -> Self {
        let failed_items = errors.len();
        let mut errors_iter = errors.into_iter();
        let Some(first) = errors_iter.next() else {
            return Self::Success(stats);
        };

        if stats.writes() > 0 {
            let mut errors = vec![first];
            errors.extend(errors_iter);
            Self::PartialSuccess { stats, errors }
        } else {
            Self::Failure(SyncError::Failed {
                failed_items,
                first: Box::new(first),
            })
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn stats(&self) -> Option<&SyncStats> {
        match self {
            Self::Success(stats) | Self::PartialSuccess { stats, .. } => Some(stats),
            Self::Failure(_) => None,
        }
    }

    pub fn errors(&self) -> &[SyncError] {
        match self {
            Self::Success(_) => &[],
            Self::PartialSuccess { errors, .. } => errors,
            Self::Failure(error) => std::slice::from_ref(error),
        }
    }
}
