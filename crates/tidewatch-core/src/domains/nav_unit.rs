//! Navigation unit favorites (ports, marinas, terminals)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::FavoriteDomain;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavUnitId(String);

impl NavUnitId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NavUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavUnitDetails {
    pub name: String,
    pub facility_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavUnits;

impl FavoriteDomain for NavUnits {
    type Key = NavUnitId;
    type Details = NavUnitDetails;

    const NAME: &'static str = "nav_units";
    const LOCAL_TABLE: &'static str = "nav_unit_favorites";
    const REMOTE_TABLE: &'static str = "user_nav_unit_favorites";
    const TOLERANCE_MS: i64 = 100;

    fn parse_key(raw: &str) -> Option<NavUnitId> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| NavUnitId::new(raw))
    }
}
