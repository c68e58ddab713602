use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tidewatch_core::domains::{
    CurrentStationDetails, CurrentStations, DomainKind, LocationId, NavUnitDetails, NavUnits,
    TideStationDetails, TideStations, WeatherLocationDetails, WeatherLocations,
};
use tidewatch_core::{FavoriteDomain, FavoriteRecord};

use crate::auth::current_owner;
use crate::cli::DetailArgs;
use crate::commands::common::{format_relative_time, load_config, open_database};
use crate::error::CliError;

/// Command-line glue for one favorite domain
pub trait CliDomain: FavoriteDomain {
    /// Key for `favorite add`; weather mints a fresh id when none is given
    fn key_for_add(raw: Option<&str>) -> Result<Self::Key, CliError> {
        let raw = raw.ok_or(CliError::MissingKey(Self::NAME))?;
        parse_key::<Self>(raw)
    }

    fn details_from_args(args: &DetailArgs) -> Self::Details;

    fn display_name(details: &Self::Details) -> &str;
}

impl CliDomain for TideStations {
    fn details_from_args(args: &DetailArgs) -> TideStationDetails {
        TideStationDetails {
            name: args.name.clone().unwrap_or_default(),
            latitude: args.latitude.unwrap_or_default(),
            longitude: args.longitude.unwrap_or_default(),
        }
    }

    fn display_name(details: &TideStationDetails) -> &str {
        &details.name
    }
}

impl CliDomain for CurrentStations {
    fn details_from_args(args: &DetailArgs) -> CurrentStationDetails {
        CurrentStationDetails {
            name: args.name.clone().unwrap_or_default(),
            latitude: args.latitude.unwrap_or_default(),
            longitude: args.longitude.unwrap_or_default(),
            depth: args.depth,
            depth_type: args.depth_type.clone(),
        }
    }

    fn display_name(details: &CurrentStationDetails) -> &str {
        &details.name
    }
}

impl CliDomain for WeatherLocations {
    fn key_for_add(raw: Option<&str>) -> Result<LocationId, CliError> {
        raw.map_or_else(|| Ok(LocationId::new()), parse_key::<Self>)
    }

    fn details_from_args(args: &DetailArgs) -> WeatherLocationDetails {
        WeatherLocationDetails {
            name: args.name.clone().unwrap_or_default(),
            latitude: args.latitude.unwrap_or_default(),
            longitude: args.longitude.unwrap_or_default(),
        }
    }

    fn display_name(details: &WeatherLocationDetails) -> &str {
        &details.name
    }
}

impl CliDomain for NavUnits {
    fn details_from_args(args: &DetailArgs) -> NavUnitDetails {
        NavUnitDetails {
            name: args.name.clone().unwrap_or_default(),
            facility_type: args.facility_type.clone(),
            latitude: args.latitude,
            longitude: args.longitude,
        }
    }

    fn display_name(details: &NavUnitDetails) -> &str {
        &details.name
    }
}

pub fn parse_key<D: FavoriteDomain>(raw: &str) -> Result<D::Key, CliError> {
    D::parse_key(raw).ok_or_else(|| CliError::InvalidKey {
        domain: D::NAME,
        key: raw.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct FavoriteListItem {
    pub key: String,
    pub name: String,
    pub last_modified: i64,
    pub relative_time: String,
    pub synced: bool,
    pub details: serde_json::Value,
}

pub fn favorite_to_list_item<D: CliDomain>(
    record: &FavoriteRecord<D>,
    now_ms: i64,
) -> Result<FavoriteListItem, CliError> {
    Ok(FavoriteListItem {
        key: record.key.to_string(),
        name: D::display_name(&record.details).to_string(),
        last_modified: record.last_modified,
        relative_time: format_relative_time(record.last_modified, now_ms),
        synced: record.remote_id.is_some(),
        details: serde_json::to_value(&record.details)?,
    })
}

pub fn format_favorite_lines<D: CliDomain>(records: &[FavoriteRecord<D>], now_ms: i64) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let key = record.key.to_string();
            let name = D::display_name(&record.details);
            let relative_time = format_relative_time(record.last_modified, now_ms);
            let marker = if record.remote_id.is_some() { "" } else { "  (not synced)" };
            format!("{key:<20}  {name:<32}  {relative_time}{marker}")
        })
        .collect()
}

pub async fn run_favorite_add(
    domain: DomainKind,
    key: Option<&str>,
    details: &DetailArgs,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    match domain {
        DomainKind::Tide => {
            add::<TideStations>(key, details, db_path, config_path).await.map(drop)
        }
        DomainKind::Current => {
            add::<CurrentStations>(key, details, db_path, config_path).await.map(drop)
        }
        DomainKind::Weather => {
            add::<WeatherLocations>(key, details, db_path, config_path).await.map(drop)
        }
        DomainKind::NavUnit => {
            add::<NavUnits>(key, details, db_path, config_path).await.map(drop)
        }
    }
}

pub async fn run_favorite_remove(
    domain: DomainKind,
    key: &str,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    match domain {
        DomainKind::Tide => {
            remove::<TideStations>(key, db_path, config_path).await.map(drop)
        }
        DomainKind::Current => {
            remove::<CurrentStations>(key, db_path, config_path).await.map(drop)
        }
        DomainKind::Weather => {
            remove::<WeatherLocations>(key, db_path, config_path).await.map(drop)
        }
        DomainKind::NavUnit => {
            remove::<NavUnits>(key, db_path, config_path).await.map(drop)
        }
    }
}

pub async fn run_favorite_list(
    domain: DomainKind,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    match domain {
        DomainKind::Tide => list::<TideStations>(as_json, db_path).await,
        DomainKind::Current => list::<CurrentStations>(as_json, db_path).await,
        DomainKind::Weather => list::<WeatherLocations>(as_json, db_path).await,
        DomainKind::NavUnit => list::<NavUnits>(as_json, db_path).await,
    }
}

/// Favorite `key`, keeping stored display fields when none are given
pub async fn add<D: CliDomain>(
    key: Option<&str>,
    args: &DetailArgs,
    db_path: &Path,
    config_path: &Path,
) -> Result<FavoriteRecord<D>, CliError> {
    let key = D::key_for_add(key)?;
    let owner = current_owner(&load_config(config_path)?);
    let db = open_database(db_path).await?;

    let details = match db.get_favorite::<D>(&key).await? {
        Some(existing) if args.is_empty() => existing.details,
        _ => D::details_from_args(args),
    };
    let record = db
        .set_favorite::<D>(key, details, true, owner.as_deref())
        .await?;

    println!("Favorited {} {}", D::NAME, record.key);
    Ok(record)
}

pub async fn remove<D: CliDomain>(
    key: &str,
    db_path: &Path,
    config_path: &Path,
) -> Result<FavoriteRecord<D>, CliError> {
    let parsed = parse_key::<D>(key)?;
    let owner = current_owner(&load_config(config_path)?);
    let db = open_database(db_path).await?;

    let record = match db.unfavorite::<D>(&parsed, owner.as_deref()).await {
        Ok(record) => record,
        Err(tidewatch_core::Error::NotFound(_)) => {
            return Err(CliError::FavoriteNotFound(format!("{}:{key}", D::NAME)));
        }
        Err(error) => return Err(error.into()),
    };

    println!("Removed {} {} from favorites", D::NAME, record.key);
    Ok(record)
}

pub async fn list<D: CliDomain>(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let records = db.list_favorites::<D>().await?;
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let items = records
            .iter()
            .map(|record| favorite_to_list_item(record, now_ms))
            .collect::<Result<Vec<_>, _>>()?;
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No {} favorites.", D::NAME);
        return Ok(());
    }

    for line in format_favorite_lines(&records, now_ms) {
        println!("{line}");
    }
    Ok(())
}
