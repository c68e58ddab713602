//! Weather location favorites
//!
//! Weather locations are arbitrary coordinates, so two devices never agree on a
//! natural key. Rows are matched by the server-assigned id instead; locally
//! created rows get a fresh [`LocationId`] until their first upload.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{FavoriteDomain, KeyStrategy, RemoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(Uuid);

impl LocationId {
    /// Create a new time-sortable location id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherLocationDetails {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeatherLocations;

impl FavoriteDomain for WeatherLocations {
    type Key = LocationId;
    type Details = WeatherLocationDetails;

    const NAME: &'static str = "weather_locations";
    const LOCAL_TABLE: &'static str = "weather_location_favorites";
    const REMOTE_TABLE: &'static str = "user_weather_favorites";
    const TOLERANCE_MS: i64 = 10;
    const KEY_STRATEGY: KeyStrategy = KeyStrategy::RemoteId;

    fn parse_key(raw: &str) -> Option<LocationId> {
        Uuid::parse_str(raw.trim()).ok().map(LocationId)
    }

    fn key_from_remote_id(id: RemoteId) -> Option<LocationId> {
        Some(LocationId(id.as_uuid()))
    }
}
