//! The directory: composition root for storage, slug index, county
//! enrichment and refresh control.
//!
//! One `Directory` is built per process from configuration and shared by
//! every request handler. Its read operations never fail; an unreachable
//! backend reads as an empty directory and an unknown slug as `None`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Config, DraftRecord, FilterCriteria, Record, RecordId, RefreshConfig, county_matches};
use crate::services::{
    CountyEnricher, RefreshController, RefreshOutcome, RefreshStatus, SlugEntry, SlugIndex,
};
use crate::storage::{self, BackendKind, StorageAdapter};
use crate::utils::slug;

pub struct Directory {
    adapter: Arc<dyn StorageAdapter>,
    index: Arc<SlugIndex>,
    enricher: CountyEnricher,
    refresh: RefreshController,
    init_timeout: Duration,
}

impl Directory {
    /// Wire a directory around an already-constructed adapter.
    pub fn new(adapter: Arc<dyn StorageAdapter>, config: &RefreshConfig) -> Self {
        let index = Arc::new(SlugIndex::new());
        let refresh = RefreshController::new(Arc::clone(&adapter), Arc::clone(&index), config.clone());
        Self {
            adapter,
            index,
            enricher: CountyEnricher,
            refresh,
            init_timeout: config.init_timeout(),
        }
    }

    /// Select and open the backend named by configuration precedence.
    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = BackendKind::select(config);
        let adapter = storage::open(kind, config)?;
        Ok(Self::new(adapter, &config.refresh))
    }

    pub fn backend(&self) -> &'static str {
        self.adapter.name()
    }

    /// Build the slug index up front, bounded by the configured timeout.
    ///
    /// Returns the number of indexed slugs.
    pub async fn warm_up(&self) -> Result<usize> {
        match tokio::time::timeout(
            self.init_timeout,
            self.index.ensure_ready(self.adapter.as_ref()),
        )
        .await
        {
            Ok(result) => {
                result?;
                log::info!("Directory ready: {} slugs indexed", self.index.len());
                Ok(self.index.len())
            }
            Err(_) => Err(AppError::Timeout {
                context: format!("building slug index from {} backend", self.backend()),
                millis: u64::try_from(self.init_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    pub async fn list(&self) -> Vec<Record> {
        self.refresh.refresh_if_due().await;
        self.enricher.enrich_all(self.adapter.list().await)
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<Record> {
        self.refresh.refresh_if_due().await;
        self.adapter.get_by_id(id).await.map(|r| self.enricher.enrich(r))
    }

    /// Resolve a public slug.
    ///
    /// Tries the index first. A miss, or an entry whose record is gone or
    /// renamed, falls back to a direct scan; a hit there is remembered.
    pub async fn get_by_slug(&self, slug: &str) -> Option<Record> {
        let slug = slug.trim();
        if slug.is_empty() {
            return None;
        }

        self.refresh.refresh_if_due().await;
        if let Err(e) = self.index.ensure_ready(self.adapter.as_ref()).await {
            log::warn!("Slug index unavailable, scanning instead: {}", e);
        }

        if let Some(id) = self.index.resolve(slug) {
            match self.adapter.get_by_id(id).await {
                Some(record) if slug::matches(slug, &record) => {
                    return Some(self.enricher.enrich(record));
                }
                _ => {
                    log::debug!("Slug '{}' pointed at stale record {}", slug, id);
                    self.index.forget(slug);
                }
            }
        }

        let record = self.adapter.get_by_slug(slug).await?;
        if slug::matches(slug, &record) {
            self.index.remember(slug, record.id);
        }
        Some(self.enricher.enrich(record))
    }

    /// Filter records. County is matched after enrichment so derived
    /// counties count.
    pub async fn filter(&self, criteria: &FilterCriteria) -> Vec<Record> {
        self.refresh.refresh_if_due().await;
        let (rest, county) = criteria.split_county();
        let records = self.enricher.enrich_all(self.adapter.filter(&rest).await);

        match county {
            Some(wanted) => records
                .into_iter()
                .filter(|r| {
                    r.county
                        .as_deref()
                        .is_some_and(|actual| county_matches(&wanted, actual))
                })
                .collect(),
            None => records,
        }
    }

    /// Submit a new record. It stays hidden until published.
    pub async fn create(&self, draft: DraftRecord) -> Result<Record> {
        self.adapter.create(draft).await
    }

    /// One slug per live record, using the index tie-break.
    pub async fn slug_entries(&self) -> Vec<SlugEntry> {
        SlugIndex::canonical_entries(&self.list().await)
    }

    pub fn status(&self) -> RefreshStatus {
        self.refresh.status()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh.manual_refresh().await
    }

    /// Administrative refresh. `true` when a reload actually ran.
    pub async fn manual_refresh(&self) -> bool {
        self.refresh().await.is_refreshed()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.refresh.set_enabled(enabled);
    }
}
