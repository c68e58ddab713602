//! Per-installation settings stored in `local_settings`

use crate::error::Result;
use libsql::Connection;
use uuid::Uuid;

const DEVICE_ID_KEY: &str = "device_id";

/// libSQL repository for local key/value settings
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stable identifier of this installation, created on first use
    pub async fn device_id(&self) -> Result<String> {
        if let Some(existing) = self.get_setting(DEVICE_ID_KEY).await? {
            return Ok(existing);
        }

        let device_id = Uuid::now_v7().to_string();
        // A concurrent writer may have won; re-read instead of overwriting
        self.conn
            .execute(
                "INSERT OR IGNORE INTO local_settings (key, value) VALUES (?, ?)",
                [DEVICE_ID_KEY, device_id.as_str()],
            )
            .await?;
        Ok(self.get_setting(DEVICE_ID_KEY).await?.unwrap_or(device_id))
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM local_settings WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO local_settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
