//! Tide station favorites

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::FavoriteDomain;

/// Tide prediction station identifier (e.g. `8443970`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TideStationDetails {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TideStations;

impl FavoriteDomain for TideStations {
    type Key = StationId;
    type Details = TideStationDetails;

    const NAME: &'static str = "tide_stations";
    const LOCAL_TABLE: &'static str = "tide_station_favorites";
    const REMOTE_TABLE: &'static str = "user_tide_favorites";
    const TOLERANCE_MS: i64 = 1_000;

    fn parse_key(raw: &str) -> Option<StationId> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| StationId::new(raw))
    }
}
