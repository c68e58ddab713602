//! Favorite repository implementation, generic over the favorite domain

use std::marker::PhantomData;

use libsql::params::Params;
use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{FavoriteDomain, FavoriteRecord, RemoteId};
use crate::store::LocalWrite;
use crate::util::{next_modified_millis, unix_millis_now};

const COLUMNS: &str = "natural_key, is_favorite, user_id, device_id, last_modified, remote_id, details";

/// libSQL repository for one domain's favorites table
pub struct LibSqlFavoriteRepository<'a, D> {
    conn: &'a Connection,
    _domain: PhantomData<fn() -> D>,
}

impl<'a, D: FavoriteDomain> LibSqlFavoriteRepository<'a, D> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _domain: PhantomData,
        }
    }

    /// Every row visible to `user_id`, favorited or not, including unowned rows
    pub async fn list_all_for_user(&self, user_id: &str) -> Result<Vec<FavoriteRecord<D>>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE user_id = ? OR user_id IS NULL ORDER BY natural_key",
            D::LOCAL_TABLE
        );
        let rows = self.conn.query(&sql, [user_id]).await?;
        Self::collect(rows).await
    }

    /// Currently favorited rows, most recently changed first
    pub async fn list_favorites(&self) -> Result<Vec<FavoriteRecord<D>>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE is_favorite = 1 ORDER BY last_modified DESC",
            D::LOCAL_TABLE
        );
        let rows = self.conn.query(&sql, ()).await?;
        Self::collect(rows).await
    }

    pub async fn get(&self, key: &D::Key) -> Result<Option<FavoriteRecord<D>>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE natural_key = ?",
            D::LOCAL_TABLE
        );
        let mut rows = self.conn.query(&sql, [key.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a row verbatim, sync metadata included
    pub async fn upsert(&self, record: &FavoriteRecord<D>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(natural_key) DO UPDATE SET
                is_favorite = excluded.is_favorite,
                user_id = excluded.user_id,
                device_id = excluded.device_id,
                last_modified = excluded.last_modified,
                remote_id = excluded.remote_id,
                details = excluded.details",
            D::LOCAL_TABLE
        );
        let details = serde_json::to_string(&record.details)?;
        let params = Params::Positional(vec![
            Value::Text(record.key.to_string()),
            Value::Integer(i64::from(record.is_favorite)),
            optional_text(record.user_id.clone()),
            Value::Text(record.device_id.clone()),
            Value::Integer(record.last_modified),
            optional_text(record.remote_id.map(|id| id.to_string())),
            Value::Text(details),
        ]);
        self.conn.execute(&sql, params).await?;
        Ok(())
    }

    /// Sync write path: replace the row only if it is still the one the pass
    /// planned from.
    ///
    /// `expected_modified` is the `last_modified` seen in the snapshot, or
    /// `None` when the snapshot had no row. Rows owned by another user are
    /// never replaced.
    pub async fn write_back(
        &self,
        record: &FavoriteRecord<D>,
        expected_modified: Option<i64>,
    ) -> Result<LocalWrite> {
        if let Some(existing) = self.get(&record.key).await? {
            if existing.owned_by_other_than(record.user_id.as_deref()) {
                return Ok(LocalWrite::ForeignOwner);
            }
            if expected_modified != Some(existing.last_modified) {
                return Ok(LocalWrite::Changed);
            }
        } else if expected_modified.is_some() {
            return Ok(LocalWrite::Changed);
        }

        self.upsert(record).await?;
        Ok(LocalWrite::Written)
    }

    /// Record the remote back-reference without touching favorite state
    pub async fn link(&self, key: &D::Key, remote_id: RemoteId, user_id: &str) -> Result<LocalWrite> {
        let Some(existing) = self.get(key).await? else {
            return Ok(LocalWrite::Changed);
        };
        if existing.owned_by_other_than(Some(user_id)) {
            return Ok(LocalWrite::ForeignOwner);
        }

        let sql = format!(
            "UPDATE {} SET remote_id = ?, user_id = ? WHERE natural_key = ?",
            D::LOCAL_TABLE
        );
        self.conn
            .execute(
                &sql,
                [remote_id.to_string(), user_id.to_string(), key.to_string()],
            )
            .await?;
        Ok(LocalWrite::Written)
    }

    /// Local user write path: favorite or un-favorite `key`.
    ///
    /// Bumps `last_modified` monotonically and keeps existing sync metadata.
    /// `owner` claims the row for a signed-in user; an existing owner is kept
    /// when `owner` is `None`.
    pub async fn set_favorite(
        &self,
        key: D::Key,
        details: D::Details,
        is_favorite: bool,
        device_id: &str,
        owner: Option<&str>,
    ) -> Result<FavoriteRecord<D>> {
        let existing = self.get(&key).await?;
        let last_modified = next_modified_millis(
            existing.as_ref().map(|record| record.last_modified),
            unix_millis_now(),
        );

        let mut record = FavoriteRecord::new(key, details, is_favorite, device_id, last_modified);
        if let Some(existing) = existing {
            record.remote_id = existing.remote_id;
            record.user_id = existing.user_id;
        }
        if let Some(owner) = owner {
            record.user_id = Some(owner.to_string());
        }

        self.upsert(&record).await?;
        Ok(record)
    }

    /// Un-favorite an existing row, keeping its display fields
    pub async fn unfavorite(
        &self,
        key: &D::Key,
        device_id: &str,
        owner: Option<&str>,
    ) -> Result<FavoriteRecord<D>> {
        let existing = self
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{}:{key}", D::NAME)))?;
        self.set_favorite(key.clone(), existing.details, false, device_id, owner)
            .await
    }

    async fn collect(mut rows: libsql::Rows) -> Result<Vec<FavoriteRecord<D>>> {
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    fn parse_record(row: &Row) -> Result<FavoriteRecord<D>> {
        let raw_key: String = row.get(0)?;
        let key = D::parse_key(&raw_key).ok_or_else(|| {
            Error::Database(format!("invalid {} key '{raw_key}'", D::NAME))
        })?;
        let remote_id = read_optional_text(row, 5)?
            .map(|raw| {
                raw.parse()
                    .map_err(|_| Error::Database(format!("invalid remote id '{raw}'")))
            })
            .transpose()?;
        let details: String = row.get(6)?;

        Ok(FavoriteRecord {
            key,
            is_favorite: row.get::<i64>(1)? != 0,
            user_id: read_optional_text(row, 2)?,
            device_id: row.get(3)?,
            last_modified: row.get(4)?,
            remote_id,
            details: serde_json::from_str(&details)?,
        })
    }
}

pub(crate) fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

pub(crate) fn read_optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}
