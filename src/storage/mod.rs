//! Storage abstractions for bookshop records.
//!
//! Three interchangeable backends implement [`StorageAdapter`]:
//!
//! ```text
//! PrimaryStore      REST table, row-capped pages       AlwaysCurrent
//! SpreadsheetStore  Sheets values API, cached snapshot RefreshCapable
//! InMemoryStore     fixed seed data                    AlwaysCurrent
//! ```
//!
//! The active backend is chosen once at startup by [`BackendKind::select`]
//! and handed to the directory as a trait object.
//!
//! ## Failure semantics
//!
//! Every read has a fallible `try_*` flavor and an infallible public flavor.
//! The public reads log the failure and degrade to an empty result, so an
//! unreachable backend looks like an empty directory rather than a crash.
//! Writes always surface their errors.

pub mod memory;
pub mod paging;
pub mod primary;
pub mod sheets;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Config, DraftRecord, FilterCriteria, Record, RecordId};
use crate::utils::http::create_async_client;
use crate::utils::slug;

// Re-export for convenience
pub use memory::InMemoryStore;
pub use paging::{PageRequest, fetch_all_pages};
pub use primary::PrimaryStore;
pub use sheets::SpreadsheetStore;

/// Whether a backend keeps a cached view that can go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCapability {
    /// Holds a snapshot; [`StorageAdapter::reload`] replaces it
    RefreshCapable,
    /// Every read hits the source of truth; nothing to reload
    AlwaysCurrent,
}

/// Trait for bookshop storage backends.
///
/// Implementors provide the fallible reads; the public reads are derived.
/// Every read must exclude records whose `live` flag is false.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    fn refresh_capability(&self) -> RefreshCapability {
        RefreshCapability::AlwaysCurrent
    }

    /// Bulk reload of the cached view. Returns the number of live records.
    async fn reload(&self) -> Result<usize> {
        Ok(0)
    }

    /// All live records, paging past any backend row cap.
    async fn try_list(&self) -> Result<Vec<Record>>;

    async fn try_get_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.try_list().await?.into_iter().find(|r| r.id == id))
    }

    /// Slug lookup by scanning every live record.
    async fn try_get_by_slug(&self, slug: &str) -> Result<Option<Record>> {
        Ok(find_by_slug(self.try_list().await?, slug))
    }

    async fn try_filter(&self, criteria: &FilterCriteria) -> Result<Vec<Record>> {
        let records = self.try_list().await?;
        Ok(records.into_iter().filter(|r| criteria.matches(r)).collect())
    }

    /// Persist a new, hidden record and return it with its assigned id.
    async fn create(&self, draft: DraftRecord) -> Result<Record>;

    async fn list(&self) -> Vec<Record> {
        or_empty(self.name(), "list", self.try_list().await)
    }

    async fn get_by_id(&self, id: RecordId) -> Option<Record> {
        or_empty(self.name(), "get_by_id", self.try_get_by_id(id).await)
    }

    async fn get_by_slug(&self, slug: &str) -> Option<Record> {
        or_empty(self.name(), "get_by_slug", self.try_get_by_slug(slug).await)
    }

    async fn filter(&self, criteria: &FilterCriteria) -> Vec<Record> {
        or_empty(self.name(), "filter", self.try_filter(criteria).await)
    }
}

/// Degrade a failed read to its empty value.
fn or_empty<T: Default>(backend: &str, op: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        log::warn!("{} {} failed, serving empty result: {}", backend, op, e);
        T::default()
    })
}

/// Stable listing order: case-insensitive name, then id.
pub(crate) fn sort_by_name(records: &mut [Record]) {
    records.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
}

/// Pick the record a slug refers to out of a full scan.
///
/// Several records may share a slug; the highest id wins, matching the
/// slug index tie-break.
pub fn find_by_slug(records: impl IntoIterator<Item = Record>, slug: &str) -> Option<Record> {
    records
        .into_iter()
        .filter(|r| r.live && slug::matches(slug, r))
        .max_by_key(|r| r.id)
}

/// Which backend serves this process. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Primary,
    Spreadsheet,
    InMemory,
}

impl BackendKind {
    /// Backend precedence: a configured primary store, then spreadsheet
    /// credentials, then the built-in seed data.
    pub fn select(config: &Config) -> Self {
        if config.primary.is_configured() {
            Self::Primary
        } else if config.sheets.has_credentials() {
            Self::Spreadsheet
        } else {
            Self::InMemory
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Spreadsheet => "sheets",
            Self::InMemory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construct the adapter for a backend kind.
pub fn open(kind: BackendKind, config: &Config) -> Result<Arc<dyn StorageAdapter>> {
    let adapter: Arc<dyn StorageAdapter> = match kind {
        BackendKind::Primary => {
            let client = create_async_client(&config.http)?;
            Arc::new(PrimaryStore::new(&config.primary, config.paging, client)?)
        }
        BackendKind::Spreadsheet => {
            let client = create_async_client(&config.http)?;
            Arc::new(SpreadsheetStore::new(config.sheets.clone(), client)?)
        }
        BackendKind::InMemory => Arc::new(InMemoryStore::seeded()),
    };
    log::info!("Using {} storage backend", kind);
    Ok(adapter)
}
