//! Current station favorites
//!
//! Current stations report at several depth bins, and each bin is favorited
//! separately, so the natural key is the station id plus the bin number.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::FavoriteDomain;

/// `station_id` + depth bin, rendered as `ACT4176_3`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrentStationKey {
    pub station_id: String,
    pub bin: u32,
}

impl CurrentStationKey {
    #[must_use]
    pub fn new(station_id: impl Into<String>, bin: u32) -> Self {
        Self {
            station_id: station_id.into(),
            bin,
        }
    }
}

impl fmt::Display for CurrentStationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.station_id, self.bin)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentStationDetails {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Bin depth, in the unit named by `depth_type`
    pub depth: Option<f64>,
    pub depth_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentStations;

impl FavoriteDomain for CurrentStations {
    type Key = CurrentStationKey;
    type Details = CurrentStationDetails;

    const NAME: &'static str = "current_stations";
    const LOCAL_TABLE: &'static str = "current_station_favorites";
    const REMOTE_TABLE: &'static str = "user_current_favorites";
    const TOLERANCE_MS: i64 = 1_000;

    fn parse_key(raw: &str) -> Option<CurrentStationKey> {
        let (station_id, bin) = raw.trim().rsplit_once('_')?;
        if station_id.is_empty() {
            return None;
        }
        let bin = bin.parse().ok()?;
        Some(CurrentStationKey::new(station_id, bin))
    }
}
