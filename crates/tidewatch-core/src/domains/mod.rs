//! The four favorite domains and a runtime selector over them

mod current;
mod nav_unit;
mod tide;
mod weather;

use std::fmt;
use std::str::FromStr;

pub use current::{CurrentStationDetails, CurrentStationKey, CurrentStations};
pub use nav_unit::{NavUnitDetails, NavUnitId, NavUnits};
pub use tide::{StationId, TideStationDetails, TideStations};
pub use weather::{LocationId, WeatherLocationDetails, WeatherLocations};

use crate::models::FavoriteDomain;

/// Runtime name of a favorite domain, for clients that pick one dynamically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainKind {
    Tide,
    Current,
    Weather,
    NavUnit,
}

impl DomainKind {
    pub const ALL: [Self; 4] = [Self::Tide, Self::Current, Self::Weather, Self::NavUnit];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tide => TideStations::NAME,
            Self::Current => CurrentStations::NAME,
            Self::Weather => WeatherLocations::NAME,
            Self::NavUnit => NavUnits::NAME,
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tide" | "tides" | "tide_stations" => Ok(Self::Tide),
            "current" | "currents" | "current_stations" => Ok(Self::Current),
            "weather" | "weather_locations" => Ok(Self::Weather),
            "nav" | "nav_unit" | "nav_units" => Ok(Self::NavUnit),
            other => Err(format!("unknown favorite domain '{other}'")),
        }
    }
}
