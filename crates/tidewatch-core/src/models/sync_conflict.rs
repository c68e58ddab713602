//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side whose state was kept when a conflict was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
}

impl Winner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Winner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown conflict winner '{other}'")),
        }
    }
}

/// Conflict resolution about to be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncConflict {
    pub domain: &'static str,
    pub natural_key: String,
    pub local_modified: i64,
    pub remote_modified: i64,
    pub winner: Winner,
}

/// Recorded sync conflict resolved by strategy (LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Favorite domain name
    pub domain: String,
    /// Natural key of the favorite involved
    pub natural_key: String,
    /// Local `last_modified` when the conflict was detected
    pub local_modified: i64,
    /// Remote `last_modified` when the conflict was detected
    pub remote_modified: i64,
    /// Side whose state was kept
    pub winner: Winner,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
