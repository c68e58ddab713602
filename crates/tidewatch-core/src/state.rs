//! Shared sync state types.

use serde::Serialize;

/// Step a sync engine is currently executing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Authenticating,
    /// Local and remote snapshots are fetched concurrently
    FetchingSnapshots,
    Planning,
    Uploading,
    Downloading,
    ResolvingConflicts,
}

impl SyncPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::FetchingSnapshots => "fetching_snapshots",
            Self::Planning => "planning",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::ResolvingConflicts => "resolving_conflicts",
        }
    }
}
