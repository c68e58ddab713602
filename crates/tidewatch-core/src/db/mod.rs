//! Database layer for Tidewatch

mod conflict_repository;
mod connection;
mod favorite_repository;
mod migrations;
mod settings_repository;

pub use conflict_repository::LibSqlConflictRepository;
pub use connection::Database;
pub use favorite_repository::LibSqlFavoriteRepository;
pub use settings_repository::LibSqlSettingsRepository;
