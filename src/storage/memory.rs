//! In-memory storage implementation.
//!
//! Serves a fixed seed list when no external backend is configured, so the
//! directory is usable for local development and tests.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{DraftRecord, Record, RecordId};
use crate::storage::{StorageAdapter, sort_by_name};

/// Process-local bookshop store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<Record>>,
}

impl InMemoryStore {
    /// Store holding exactly these records, hidden ones included.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Store holding the built-in sample bookshops.
    pub fn seeded() -> Self {
        Self::with_records(seed())
    }

    /// Add or replace a record by id.
    pub fn insert(&self, record: Record) {
        if let Ok(mut records) = self.records.write() {
            records.retain(|r| r.id != record.id);
            records.push(record);
        }
    }

    fn snapshot(&self) -> Result<Vec<Record>> {
        self.records
            .read()
            .map(|records| records.clone())
            .map_err(|_| AppError::unavailable("memory", "record lock poisoned"))
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn try_list(&self) -> Result<Vec<Record>> {
        let mut live: Vec<Record> = self.snapshot()?.into_iter().filter(|r| r.live).collect();
        sort_by_name(&mut live);
        Ok(live)
    }

    async fn create(&self, draft: DraftRecord) -> Result<Record> {
        draft.validate()?;
        let mut records = self
            .records
            .write()
            .map_err(|_| AppError::unavailable("memory", "record lock poisoned"))?;

        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = draft.into_record(next_id);
        records.push(record.clone());
        log::info!("memory: created record {} ({})", record.id, record.name);
        Ok(record)
    }
}

fn seed() -> Vec<Record> {
    let mut fables = Record::new(1, "Fables Books")
        .located("Goshen", "IN")
        .in_county("Elkhart County")
        .with_features(vec![1, 3]);
    fables.street_address = Some("215 S Main St".into());
    fables.zip = Some("46526".into());
    fables.website = Some("https://fablesbooks.example".into());

    let mut underground = Record::new(4, "The Underground Bookshop")
        .located("Springfield", "MA")
        .with_features(vec![2]);
    underground.description = Some("Used and rare books below street level.".into());

    vec![
        fables,
        Record::new(2, "Green Apple Books")
            .located("San Francisco", "CA")
            .in_county("San Francisco County")
            .with_features(vec![1, 2]),
        Record::new(3, "Skylight Books")
            .located("Los Angeles", "California")
            .in_county("Los Angeles")
            .with_features(vec![3]),
        underground,
        Record::new(5, "Powell's City of Books")
            .located("Portland", "Oregon")
            .with_features(vec![1, 2, 4]),
        Record::new(6, "Brookline Booksmith")
            .located("Brookline", "Massachusetts")
            .in_county("Norfolk County")
            .with_features(vec![3, 4]),
        Record::new(7, "Parnassus Books")
            .located("Nashville", "TN")
            .with_features(vec![4]),
        Record::new(8, "Closed Chapter Books")
            .located("Austin", "TX")
            .hidden(),
    ]
}
