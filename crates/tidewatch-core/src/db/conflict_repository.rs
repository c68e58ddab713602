//! LWW conflict log

use libsql::params::Params;
use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{NewSyncConflict, SyncConflict};
use crate::util::unix_millis_now;

const STRATEGY_LWW: &str = "lww";

/// libSQL repository for the `sync_conflicts` table
pub struct LibSqlConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one resolved conflict
    pub async fn record(&self, conflict: &NewSyncConflict) -> Result<()> {
        let params = Params::Positional(vec![
            Value::Text(conflict.domain.to_string()),
            Value::Text(conflict.natural_key.clone()),
            Value::Integer(conflict.local_modified),
            Value::Integer(conflict.remote_modified),
            Value::Text(conflict.winner.as_str().to_string()),
            Value::Integer(unix_millis_now()),
            Value::Text(STRATEGY_LWW.to_string()),
        ]);
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (
                    domain, natural_key, local_modified, remote_modified,
                    winner, resolved_at, strategy
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params,
            )
            .await?;
        Ok(())
    }

    /// Most recently resolved conflicts first
    pub async fn list(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id, domain, natural_key, local_modified, remote_modified,
                        winner, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                [limit],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(Self::parse_conflict(&row)?);
        }
        Ok(conflicts)
    }

    fn parse_conflict(row: &Row) -> Result<SyncConflict> {
        let winner: String = row.get(5)?;
        Ok(SyncConflict {
            id: row.get(0)?,
            domain: row.get(1)?,
            natural_key: row.get(2)?,
            local_modified: row.get(3)?,
            remote_modified: row.get(4)?,
            winner: winner.parse().map_err(Error::Database)?,
            resolved_at: row.get(6)?,
            strategy: row.get(7)?,
        })
    }
}
