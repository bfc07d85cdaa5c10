//! Spreadsheet-backed store (Google Sheets values API).
//!
//! Reads fetch the configured range, discover the column layout from its
//! first row and parse the remaining rows into records. A row that fails to
//! parse is logged and skipped; the rest of the sheet is still served.
//!
//! Fetching a whole sheet is slow, so parsed rows are kept as a snapshot
//! until [`StorageAdapter::reload`] replaces it. That makes this the one
//! refresh-capable backend.

pub mod schema;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{DraftRecord, Record, RecordId, SheetsConfig};
use crate::storage::{RefreshCapability, StorageAdapter, sort_by_name};
use crate::utils::http::ensure_success;
use crate::utils::non_empty;

pub use schema::{Field, SheetSchema};

const BACKEND: &str = "sheets";

/// Parsed sheet contents.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Live records, name-ascending
    pub records: Vec<Record>,
    /// Highest id on the sheet, hidden rows included
    pub max_id: RecordId,
    /// Rows skipped because they failed to parse
    pub skipped: usize,
}

impl Snapshot {
    /// Parse a values grid whose first row is the header.
    pub fn from_values(values: Vec<Vec<String>>) -> Result<(SheetSchema, Self)> {
        let mut rows = values.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| AppError::config("spreadsheet range is empty"))?;
        let schema = SheetSchema::from_header(&header)?;

        let mut snapshot = Self::default();
        // Sheet row numbers are 1-based and the header is row 1.
        for (i, cells) in rows.enumerate() {
            match schema.parse_row(i + 2, &cells) {
                Ok(Some(record)) => {
                    snapshot.max_id = snapshot.max_id.max(record.id);
                    if record.live {
                        snapshot.records.push(record);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    snapshot.skipped += 1;
                    log::warn!("sheets: skipping row: {}", e);
                }
            }
        }

        sort_by_name(&mut snapshot.records);
        Ok((schema, snapshot))
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Render a cell as text whether the API sent a string or a number.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Bookshops stored as rows of a spreadsheet.
pub struct SpreadsheetStore {
    client: Client,
    config: SheetsConfig,
    spreadsheet_id: String,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Serializes sheet fetches so concurrent cold reads share one download
    load_lock: Mutex<()>,
}

impl SpreadsheetStore {
    /// Create a store. Fails when no spreadsheet id or credential is set.
    pub fn new(config: SheetsConfig, client: Client) -> Result<Self> {
        if !config.has_credentials() {
            return Err(AppError::unavailable(
                BACKEND,
                "spreadsheet id and an api key or access token are required",
            ));
        }
        let spreadsheet_id = non_empty(config.spreadsheet_id.as_deref()).unwrap_or_default();

        Ok(Self {
            client,
            config,
            spreadsheet_id,
            snapshot: RwLock::new(None),
            load_lock: Mutex::new(()),
        })
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?;
        url.path_segments_mut()
            .map_err(|_| AppError::config("sheets.base_url cannot be a base"))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", self.config.range, suffix));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (
            non_empty(self.config.access_token.as_deref()),
            non_empty(self.config.api_key.as_deref()),
        ) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(key)) => request.query(&[("key", key)]),
            (None, None) => request,
        }
    }

    /// Download the configured range as a text grid.
    async fn fetch_values(&self) -> Result<Vec<Vec<String>>> {
        let request = self.client.get(self.values_url("")?);
        let response = self.authorize(request).send().await?;
        let range: ValueRange = ensure_success(BACKEND, response).await?.json().await?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn fetch_snapshot(&self) -> Result<(SheetSchema, Snapshot)> {
        let values = self.fetch_values().await?;
        Snapshot::from_values(values)
    }

    fn cached(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }

    fn store(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = Some(Arc::clone(&snapshot));
        }
        snapshot
    }

    /// The cached snapshot, loading it on first use.
    async fn current(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let (_, snapshot) = self.fetch_snapshot().await?;
        log::info!(
            "sheets: loaded {} live records ({} rows skipped)",
            snapshot.records.len(),
            snapshot.skipped
        );
        Ok(self.store(snapshot))
    }
}

#[async_trait]
impl StorageAdapter for SpreadsheetStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn refresh_capability(&self) -> RefreshCapability {
        RefreshCapability::RefreshCapable
    }

    async fn reload(&self) -> Result<usize> {
        let _guard = self.load_lock.lock().await;
        let (_, snapshot) = self.fetch_snapshot().await?;
        let count = snapshot.records.len();
        log::info!(
            "sheets: reloaded {} live records ({} rows skipped)",
            count,
            snapshot.skipped
        );
        self.store(snapshot);
        Ok(count)
    }

    async fn try_list(&self) -> Result<Vec<Record>> {
        Ok(self.current().await?.records.clone())
    }

    async fn try_get_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self
            .current()
            .await?
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn create(&self, draft: DraftRecord) -> Result<Record> {
        draft.validate()?;
        if non_empty(self.config.access_token.as_deref()).is_none() {
            return Err(AppError::config(
                "appending to the spreadsheet requires sheets.access_token",
            ));
        }

        // Read the sheet fresh so the id is assigned against current data.
        let (schema, snapshot) = self.fetch_snapshot().await?;
        // Without a liveness column every row reads back as published, so an
        // appended submission would skip review.
        if !schema.has_column(Field::Live) {
            return Err(AppError::config(
                "spreadsheet has no live column; appended rows would be published",
            ));
        }
        let record = draft.into_record(snapshot.max_id + 1);
        let body = serde_json::json!({ "values": [schema.render_row(&record)] });

        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self.authorize(self.client.post(url)).json(&body).send().await?;
        ensure_success(BACKEND, response).await?;

        log::info!("sheets: appended record {} ({})", record.id, record.name);
        Ok(record)
    }
}
