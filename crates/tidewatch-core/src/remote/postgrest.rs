//! PostgREST implementation of the remote favorites store.
//!
//! Each domain maps to one table (`FavoriteDomain::REMOTE_TABLE`) with the
//! columns `id`, `user_id`, `device_id`, `natural_key`, `is_favorite`,
//! `last_modified` plus the domain's detail columns. Row level security scopes
//! every request to the session's user.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{normalize_supabase_base_url, AuthSession};
use crate::models::{FavoriteDomain, FavoriteRecord, KeyStrategy, RemoteId};
use crate::store::{RemoteConnector, RemoteFavoriteStore, RemoteResult, RemoteStoreError};

const UNIQUE_VIOLATION: &str = "23505";

/// Opens per-session PostgREST stores for any favorite domain
#[derive(Clone)]
pub struct PostgrestConnector {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl PostgrestConnector {
    pub fn new(
        supabase_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base = normalize_supabase_base_url(supabase_url)
            .map_err(|error| RemoteStoreError::InvalidConfiguration(error.to_string()))?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteStoreError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url: rest_url(&base),
            anon_key,
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl<D: FavoriteDomain> RemoteConnector<D> for PostgrestConnector {
    async fn connect(
        &self,
        session: &AuthSession,
    ) -> RemoteResult<Arc<dyn RemoteFavoriteStore<D>>> {
        Ok(Arc::new(PostgrestFavoriteStore::<D> {
            table_url: format!("{}/{}", self.rest_url, D::REMOTE_TABLE),
            anon_key: self.anon_key.clone(),
            access_token: session.access_token.clone(),
            client: self.client.clone(),
            _domain: PhantomData,
        }))
    }
}

/// Remote store for one domain, authenticated as one user
pub struct PostgrestFavoriteStore<D> {
    table_url: String,
    anon_key: String,
    access_token: String,
    client: Client,
    _domain: PhantomData<fn() -> D>,
}

impl<D: FavoriteDomain> PostgrestFavoriteStore<D> {
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    async fn fetch_rows(&self, filters: &[(&str, String)]) -> RemoteResult<Vec<FavoriteRecord<D>>> {
        let response = self
            .authorized(self.client.get(&self.table_url))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?;
        let rows = checked(response)
            .await?
            .json::<Vec<RemoteRow<D::Details>>>()
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                let record = row.into_record::<D>();
                if record.is_none() {
                    tracing::warn!("Skipping {} row {} without a usable key", D::NAME, id);
                }
                record
            })
            .collect())
    }
}

#[async_trait]
impl<D: FavoriteDomain> RemoteFavoriteStore<D> for PostgrestFavoriteStore<D> {
    async fn list_for_user(&self, user_id: &str) -> RemoteResult<Vec<FavoriteRecord<D>>> {
        self.fetch_rows(&[("user_id", format!("eq.{user_id}"))])
            .await
    }

    async fn insert(&self, record: &FavoriteRecord<D>) -> RemoteResult<RemoteId> {
        let payload = RemotePayload::from_record(record)?;
        let response = self
            .authorized(self.client.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;
        let rows = checked(response)
            .await?
            .json::<Vec<RowId>>()
            .await?;

        rows.first()
            .map(|row| RemoteId::from_uuid(row.id))
            .ok_or_else(|| {
                RemoteStoreError::InvalidPayload("insert returned no rows".to_string())
            })
    }

    async fn update(&self, remote_id: RemoteId, record: &FavoriteRecord<D>) -> RemoteResult<()> {
        let payload = RemotePayload::from_record(record)?;
        let response = self
            .authorized(self.client.patch(&self.table_url))
            .query(&[("id", format!("eq.{remote_id}"))])
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;
        let rows = checked(response)
            .await?
            .json::<Vec<RowId>>()
            .await?;

        if rows.is_empty() {
            return Err(RemoteStoreError::NotFound(format!(
                "{}:{remote_id}",
                D::REMOTE_TABLE
            )));
        }
        Ok(())
    }

    async fn find_by_key(
        &self,
        user_id: &str,
        key: &D::Key,
    ) -> RemoteResult<Option<FavoriteRecord<D>>> {
        if D::KEY_STRATEGY == KeyStrategy::RemoteId {
            return Ok(None);
        }

        let rows = self
            .fetch_rows(&[
                ("user_id", format!("eq.{user_id}")),
                ("natural_key", format!("eq.{key}")),
                ("limit", "1".to_string()),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }
}

fn rest_url(base: &str) -> String {
    if base.ends_with("/rest/v1") {
        base.to_string()
    } else {
        format!("{base}/rest/v1")
    }
}

/// Map non-2xx responses to store errors, keeping unique violations distinct
async fn checked(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

fn classify_failure(status: StatusCode, body: &str) -> RemoteStoreError {
    let parsed = serde_json::from_str::<PostgrestError>(body).ok();
    let is_unique_violation = parsed
        .as_ref()
        .and_then(|error| error.code.as_deref())
        .is_some_and(|code| code == UNIQUE_VIOLATION);

    if status == StatusCode::CONFLICT || is_unique_violation {
        return RemoteStoreError::AlreadyExists;
    }

    let message = parsed
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    RemoteStoreError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowId {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RemoteRow<T> {
    id: Uuid,
    user_id: String,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    natural_key: Option<String>,
    is_favorite: bool,
    last_modified: i64,
    #[serde(flatten)]
    details: T,
}

impl<T> RemoteRow<T> {
    fn into_record<D: FavoriteDomain<Details = T>>(self) -> Option<FavoriteRecord<D>> {
        let remote_id = RemoteId::from_uuid(self.id);
        let key = self
            .natural_key
            .as_deref()
            .and_then(D::parse_key)
            .or_else(|| D::key_from_remote_id(remote_id))?;

        Some(FavoriteRecord {
            key,
            is_favorite: self.is_favorite,
            user_id: Some(self.user_id),
            device_id: self.device_id.unwrap_or_default(),
            last_modified: self.last_modified,
            remote_id: Some(remote_id),
            details: self.details,
        })
    }
}

#[derive(Debug, Serialize)]
struct RemotePayload<'a, T> {
    user_id: &'a str,
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    natural_key: Option<String>,
    is_favorite: bool,
    last_modified: i64,
    #[serde(flatten)]
    details: &'a T,
}

impl<'a, T: Serialize> RemotePayload<'a, T> {
    fn from_record<D: FavoriteDomain<Details = T>>(
        record: &'a FavoriteRecord<D>,
    ) -> RemoteResult<Self> {
        let user_id = record.user_id.as_deref().ok_or_else(|| {
            RemoteStoreError::InvalidPayload(format!(
                "{}:{} has no owning user",
                D::NAME,
                record.key
            ))
        })?;

        Ok(Self {
            user_id,
            device_id: &record.device_id,
            natural_key: record.remote_natural_key(),
            is_favorite: record.is_favorite,
            last_modified: record.last_modified,
            details: &record.details,
        })
    }
}
