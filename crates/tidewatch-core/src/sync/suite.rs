//! All four domain engines wired to one database and one remote project

use std::sync::Arc;

use crate::auth::SessionProvider;
use crate::config::TidewatchConfig;
use crate::domains::{CurrentStations, DomainKind, NavUnits, TideStations, WeatherLocations};
use crate::remote::PostgrestConnector;
use crate::services::DatabaseService;

use super::engine::SyncEngine;
use super::result::SyncResult;

/// One engine per favorite domain.
///
/// Engines touch disjoint tables, so different domains sync concurrently.
pub struct SyncSuite {
    pub tide: SyncEngine<TideStations>,
    pub current: SyncEngine<CurrentStations>,
    pub weather: SyncEngine<WeatherLocations>,
    pub nav_unit: SyncEngine<NavUnits>,
}

/// Results of a multi-domain sync, in `DomainKind::ALL` order
#[derive(Debug, Clone)]
pub struct SyncSuiteReport {
    pub results: Vec<(DomainKind, SyncResult)>,
}

impl SyncSuiteReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_success())
    }
}

impl SyncSuite {
    pub fn new(
        auth: Arc<dyn SessionProvider>,
        database: &DatabaseService,
        connector: &PostgrestConnector,
        config: &TidewatchConfig,
    ) -> Self {
        let local = Arc::new(database.clone());
        let remote = Arc::new(connector.clone());

        Self {
            tide: SyncEngine::<TideStations>::new(auth.clone(), local.clone(), remote.clone())
                .with_settings(config.engine_settings(DomainKind::Tide)),
            current: SyncEngine::<CurrentStations>::new(auth.clone(), local.clone(), remote.clone())
                .with_settings(config.engine_settings(DomainKind::Current)),
            weather: SyncEngine::<WeatherLocations>::new(auth.clone(), local.clone(), remote.clone())
                .with_settings(config.engine_settings(DomainKind::Weather)),
            nav_unit: SyncEngine::<NavUnits>::new(auth, local, remote)
                .with_settings(config.engine_settings(DomainKind::NavUnit)),
        }
    }

    pub async fn sync_domain(&self, domain: DomainKind) -> SyncResult {
        match domain {
            DomainKind::Tide => self.tide.sync().await,
            DomainKind::Current => self.current.sync().await,
            DomainKind::Weather => self.weather.sync().await,
            DomainKind::NavUnit => self.nav_unit.sync().await,
        }
    }

    /// Sync every domain concurrently
    pub async fn sync_all(&self) -> SyncSuiteReport {
        let (tide, current, weather, nav_unit) = tokio::join!(
            self.tide.sync(),
            self.current.sync(),
            self.weather.sync(),
            self.nav_unit.sync()
        );

        SyncSuiteReport {
            results: vec![
                (DomainKind::Tide, tide),
                (DomainKind::Current, current),
                (DomainKind::Weather, weather),
                (DomainKind::NavUnit, nav_unit),
            ],
        }
    }
}
