//! Slug → record id cache.
//!
//! Built from one full scan of the active backend. When several live records
//! share a slug, the highest id wins: `build` visits records in ascending id
//! order and overwrites, and [`SlugIndex::canonical_entries`] applies the
//! same rule from the other direction (id descending, first occurrence
//! kept). Anything else that needs one record per slug (sitemaps, exports)
//! must go through `canonical_entries` so the choices agree.
//!
//! The index is never invalidated by time. It is replaced wholesale by an
//! explicit [`SlugIndex::build`], which the refresh controller triggers.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::OnceCell;

use crate::error::{AppError, Result};
use crate::models::{Record, RecordId};
use crate::storage::StorageAdapter;
use crate::utils::slug::slugify;

/// One canonical slug per record, as published to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlugEntry {
    pub slug: String,
    pub id: RecordId,
}

#[derive(Debug, Default)]
pub struct SlugIndex {
    entries: RwLock<HashMap<String, RecordId>>,
    /// Set once the first build has succeeded
    ready: OnceCell<()>,
}

impl SlugIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index unless a build has already succeeded.
    ///
    /// Concurrent callers share one in-flight build. A failed build leaves
    /// the index not-ready, so the next caller tries again.
    pub async fn ensure_ready(&self, adapter: &dyn StorageAdapter) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                self.rebuild(adapter).await?;
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Replace the whole index from a fresh scan. Returns the record count.
    pub async fn build(&self, adapter: &dyn StorageAdapter) -> Result<usize> {
        let count = self.rebuild(adapter).await?;
        let _ = self.ready.set(());
        Ok(count)
    }

    async fn rebuild(&self, adapter: &dyn StorageAdapter) -> Result<usize> {
        let records = adapter.try_list().await?;
        let count = records.len();
        self.replace(&records);
        log::info!("Slug index built: {} slugs from {} records", self.len(), count);
        Ok(count)
    }

    /// Swap in entries computed from `records`.
    pub fn replace(&self, records: &[Record]) {
        let mut ordered: Vec<&Record> = records.iter().filter(|r| r.live).collect();
        ordered.sort_by_key(|r| r.id);

        let mut entries = HashMap::with_capacity(ordered.len());
        for record in ordered {
            let slug = slugify(&record.name);
            if slug.is_empty() {
                continue;
            }
            if let Some(previous) = entries.insert(slug.clone(), record.id) {
                log::debug!(
                    "Slug '{}' shared by records {} and {}; keeping {}",
                    slug,
                    previous,
                    record.id,
                    record.id
                );
            }
        }

        if let Ok(mut current) = self.entries.write() {
            *current = entries;
        }
    }

    /// Map lookup only; a miss does not mean the record is absent.
    pub fn resolve(&self, slug: &str) -> Option<RecordId> {
        self.entries.read().ok()?.get(slug).copied()
    }

    /// Record a slug learned from a fallback scan.
    ///
    /// An existing entry with a higher id is kept so lookups stay consistent
    /// with the tie-break.
    pub fn remember(&self, slug: &str, id: RecordId) {
        if slug.is_empty() {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            let entry = entries.entry(slug.to_string()).or_insert(id);
            if *entry < id {
                *entry = id;
            }
        }
    }

    /// Drop an entry that pointed at a record which no longer resolves.
    pub fn forget(&self, slug: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(slug);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick one record per slug from `records`, highest id first.
    pub fn canonical_entries(records: &[Record]) -> Vec<SlugEntry> {
        let mut ordered: Vec<&Record> = records.iter().filter(|r| r.live).collect();
        ordered.sort_by(|a, b| b.id.cmp(&a.id));

        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for record in ordered {
            let slug = slugify(&record.name);
            if !slug.is_empty() && seen.insert(slug.clone()) {
                entries.push(SlugEntry {
                    slug,
                    id: record.id,
                });
            }
        }
        entries.sort_by(|a, b| a.slug.cmp(&b.slug));
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::RefreshCapability;
    use crate::storage::testing::CountingStore;

    fn fables() -> Vec<Record> {
        vec![
            Record::new(108, "Fables Books"),
            Record::new(42, "Fables Books"),
            Record::new(7, "Skylight Books"),
        ]
    }

    #[tokio::test]
    async fn test_duplicate_slug_resolves_to_highest_id() {
        let store = CountingStore::new(fables(), RefreshCapability::AlwaysCurrent);
        let index = SlugIndex::new();
        index.build(&store).await.unwrap();

        assert_eq!(index.resolve("fables-books"), Some(108));
        assert_eq!(index.resolve("skylight-books"), Some(7));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_canonical_entries_agree_with_index() {
        let records = fables();
        let index = SlugIndex::new();
        index.replace(&records);

        let entries = SlugIndex::canonical_entries(&records);
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(index.resolve(&entry.slug), Some(entry.id));
        }
    }

    #[test]
    fn test_every_record_resolves_unless_outranked() {
        let records = vec![
            Record::new(3, "Book Nook"),
            Record::new(9, "book nook!"),
            Record::new(5, "Story Time"),
            Record::new(1, "Page One"),
        ];
        let index = SlugIndex::new();
        index.replace(&records);

        for record in &records {
            let resolved = index.resolve(&record.slug()).unwrap();
            let outranked = records
                .iter()
                .any(|other| other.slug() == record.slug() && other.id > record.id);
            assert_eq!(resolved == record.id, !outranked);
        }
    }

    #[test]
    fn test_hidden_records_are_not_indexed() {
        let index = SlugIndex::new();
        index.replace(&[Record::new(1, "Closed Shop").hidden()]);
        assert!(index.resolve("closed-shop").is_none());
    }

    #[test]
    fn test_remember_keeps_higher_id() {
        let index = SlugIndex::new();
        index.remember("fables-books", 108);
        index.remember("fables-books", 42);
        assert_eq!(index.resolve("fables-books"), Some(108));
        index.remember("fables-books", 200);
        assert_eq!(index.resolve("fables-books"), Some(200));
        index.forget("fables-books");
        assert!(index.resolve("fables-books").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_ready_scans_once() {
        let store = Arc::new(CountingStore::new(fables(), RefreshCapability::AlwaysCurrent));
        let index = Arc::new(SlugIndex::new());

        let calls = (0..8).map(|_| {
            let store = Arc::clone(&store);
            let index = Arc::clone(&index);
            async move { index.ensure_ready(store.as_ref()).await }
        });
        for result in futures::future::join_all(calls).await {
            result.unwrap();
        }

        assert_eq!(store.lists(), 1);
        assert!(index.is_ready());

        index.ensure_ready(store.as_ref()).await.unwrap();
        assert_eq!(store.lists(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_stays_not_ready() {
        let store = CountingStore::new(fables(), RefreshCapability::AlwaysCurrent);
        store.set_failing(true);
        let index = SlugIndex::new();

        assert!(index.ensure_ready(&store).await.is_err());
        assert!(!index.is_ready());

        store.set_failing(false);
        index.ensure_ready(&store).await.unwrap();
        assert!(index.is_ready());
        assert_eq!(store.lists(), 2);
    }
}
