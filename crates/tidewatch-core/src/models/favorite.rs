//! Favorite record model shared by every favorite domain

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Server-assigned identifier of a remote favorite row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(Uuid);

impl RemoteId {
    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How records of a domain are matched between the local and remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The natural key is stable across devices and stored remotely
    Natural,
    /// No stable natural key; rows are matched by the server-assigned id
    RemoteId,
}

/// A category of favoritable entity.
///
/// Implemented by zero-sized marker types; the sync engine is generic over it.
pub trait FavoriteDomain: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Local identity of a favorite within the domain
    type Key: Clone + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync;

    /// Denormalized display fields copied verbatim during sync
    type Details: Clone
        + PartialEq
        + fmt::Debug
        + Default
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;

    /// Short stable name used in logs and the conflict log
    const NAME: &'static str;

    /// Local libSQL table
    const LOCAL_TABLE: &'static str;

    /// Remote table (PostgREST resource)
    const REMOTE_TABLE: &'static str;

    /// Timestamps closer than this (ms) are treated as equal
    const TOLERANCE_MS: i64;

    const KEY_STRATEGY: KeyStrategy = KeyStrategy::Natural;

    /// Parse a key from its `Display` form
    fn parse_key(raw: &str) -> Option<Self::Key>;

    /// Local key for a row first seen remotely, for remote-id keyed domains
    fn key_from_remote_id(_id: RemoteId) -> Option<Self::Key> {
        None
    }
}

/// Identity used to match a local record with its remote counterpart
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncKey<K> {
    Natural(K),
    Remote(RemoteId),
}

impl<K: fmt::Display> fmt::Display for SyncKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural(key) => write!(f, "{key}"),
            Self::Remote(id) => write!(f, "remote:{id}"),
        }
    }
}

/// "This entity is marked favorite by this user", with sync metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord<D: FavoriteDomain> {
    /// Domain natural key (local identity)
    pub key: D::Key,
    /// Favorite state; `false` is an un-favorite, not a deletion
    pub is_favorite: bool,
    /// Owning account, `None` until claimed by a signed-in user
    pub user_id: Option<String>,
    /// Installation that made the last write (diagnostics only)
    pub device_id: String,
    /// Last state-changing write (Unix ms)
    pub last_modified: i64,
    /// Server-assigned id once the row exists remotely
    pub remote_id: Option<RemoteId>,
    /// Display fields
    pub details: D::Details,
}

impl<D: FavoriteDomain> FavoriteRecord<D> {
    /// Create an unsynced, unowned record
    #[must_use]
    pub fn new(
        key: D::Key,
        details: D::Details,
        is_favorite: bool,
        device_id: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self {
            key,
            is_favorite,
            user_id: None,
            device_id: device_id.into(),
            last_modified,
            remote_id: None,
            details,
        }
    }

    /// Key used to match this record against the other side, if it has one yet
    pub fn sync_key(&self) -> Option<SyncKey<D::Key>> {
        match D::KEY_STRATEGY {
            KeyStrategy::Natural => Some(SyncKey::Natural(self.key.clone())),
            KeyStrategy::RemoteId => self.remote_id.map(SyncKey::Remote),
        }
    }

    /// Whether favorite state and display fields are identical
    pub fn same_content(&self, other: &Self) -> bool {
        self.is_favorite == other.is_favorite && self.details == other.details
    }

    /// Copy the winning side's state, keeping this record's identity.
    ///
    /// The winner's `last_modified` is carried over unchanged.
    pub fn adopt_state_of(&mut self, winner: &Self) {
        self.is_favorite = winner.is_favorite;
        self.details = winner.details.clone();
        self.device_id.clone_from(&winner.device_id);
        self.last_modified = winner.last_modified;
    }

    /// Whether the row is owned by someone other than `user_id`; unowned rows never are
    pub fn owned_by_other_than(&self, user_id: Option<&str>) -> bool {
        matches!(self.user_id.as_deref(), Some(owner) if Some(owner) != user_id)
    }

    /// Remote natural key column value
    pub fn remote_natural_key(&self) -> Option<String> {
        match D::KEY_STRATEGY {
            KeyStrategy::Natural => Some(self.key.to_string()),
            KeyStrategy::RemoteId => None,
        }
    }
}
