// src/client/mod.rs

pub mod types;

use indexmap::IndexMap;
use reqwest::{header::ACCEPT, Client, Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, Credentials};
use crate::error::{Result, SyncError};
use types::{
    ColumnPatch, ColumnsConfig, Envelope, ReloadRequest, RemoteColumn, SchemaConfig, TablePatch,
};

/// A patch the service refused, or that never got an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFailure {
    /// `None` when the request failed before a status came back.
    pub status: Option<u16>,
    /// Raw response body, or the transport error text.
    pub body: String,
}

impl fmt::Display for PatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

impl From<SyncError> for PatchFailure {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Remote { status, body, .. } => Self {
                status: Some(status),
                body,
            },
            other => Self {
                status: None,
                body: other.to_string(),
            },
        }
    }
}

/// Body of a failed response; a body that cannot be read is replaced by the
/// read error so the failure still says something.
fn error_body(read: reqwest::Result<String>) -> String {
    match read {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "could not read error body");
            format!("<unreadable response body: {}>", e)
        }
    }
}

/// Authenticated access to the schema endpoints of one account.
pub struct SchemaClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
}

impl SchemaClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
            credentials: config.credentials,
        })
    }

    /// Append escaped path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(
                &self.credentials.api_key,
                Some(self.credentials.api_secret.expose_secret()),
            )
            .header(ACCEPT, "application/json")
    }

    /// Send and turn any status >= 400 into [`SyncError::Remote`].
    async fn execute(&self, method: Method, url: Url, body: Option<serde_json::Value>) -> Result<Response> {
        debug!(%method, %url, "schema request");
        let mut builder = self.request(method.clone(), url.clone());
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = error_body(resp.text().await);
            return Err(SyncError::Remote {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_data<T: DeserializeOwned + Default>(&self, url: Url) -> Result<T> {
        let resp = self.execute(Method::GET, url, None).await?;
        let env: Envelope<T> = resp.json().await?;
        Ok(env.data)
    }

    /// Ask the service to refresh its schema cache, keeping existing
    /// inclusion/exclusion choices.
    pub async fn reload_schema(&self, connection_id: &str) -> Result<()> {
        let url = self.endpoint(&["connections", connection_id, "schemas", "reload"])?;
        let body = serde_json::to_value(ReloadRequest::PRESERVE)?;
        self.execute(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    /// Like [`Self::reload_schema`], but a failure is only logged; later reads
    /// still see the service's last known schema.
    pub(crate) async fn reload_schema_or_warn(&self, connection_id: &str) {
        if let Err(e) = self.reload_schema(connection_id).await {
            warn!(connection_id, error = %e, "schema reload failed, continuing with cached schema");
        }
    }

    /// Key of the connection's first schema.
    pub async fn get_schema_name(&self, connection_id: &str) -> Result<String> {
        self.reload_schema_or_warn(connection_id).await;
        let config = self.get_connection_schema(connection_id).await?;
        config
            .schemas
            .into_keys()
            .next()
            .ok_or_else(|| SyncError::SchemaNotFound {
                connection_id: connection_id.to_string(),
            })
    }

    /// Full schema metadata: every schema, its tables and their capability flags.
    pub async fn get_connection_schema(&self, connection_id: &str) -> Result<SchemaConfig> {
        let url = self.endpoint(&["connections", connection_id, "schemas"])?;
        self.get_data(url).await
    }

    /// Column metadata for one table, or `None` when the service answers 404
    /// (the table has no column-level configuration).
    pub async fn get_table_columns_config(
        &self,
        connection_id: &str,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Option<IndexMap<String, RemoteColumn>>> {
        let url = self.endpoint(&[
            "connections",
            connection_id,
            "schemas",
            schema_name,
            "tables",
            table_name,
            "columns",
        ])?;
        match self.get_data::<ColumnsConfig>(url).await {
            Ok(config) => Ok(Some(config.columns)),
            Err(SyncError::Remote { status: 404, .. }) => {
                debug!(schema_name, table_name, "column config not supported");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn patch_table_config(
        &self,
        connection_id: &str,
        schema_name: &str,
        table_name: &str,
        patch: &TablePatch,
    ) -> Result<(), PatchFailure> {
        let url = self
            .endpoint(&["connections", connection_id, "schemas", schema_name, "tables", table_name])?;
        let body = serde_json::to_value(patch).map_err(SyncError::from)?;
        self.execute(Method::PATCH, url, Some(body)).await?;
        Ok(())
    }

    pub async fn patch_column_config(
        &self,
        connection_id: &str,
        schema_name: &str,
        table_name: &str,
        column_name: &str,
        patch: &ColumnPatch,
    ) -> Result<(), PatchFailure> {
        let url = self.endpoint(&[
            "connections",
            connection_id,
            "schemas",
            schema_name,
            "tables",
            table_name,
            "columns",
            column_name,
        ])?;
        let body = serde_json::to_value(patch).map_err(SyncError::from)?;
        self.execute(Method::PATCH, url, Some(body)).await?;
        Ok(())
    }
}
