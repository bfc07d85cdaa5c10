//! Bookshop records as served by every storage backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::slug::slugify;

/// Identifier assigned by the backing store. Immutable once created.
pub type RecordId = i64;

/// A bookshop listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Record {
    /// Store-assigned identifier
    pub id: RecordId,

    /// Display name, not guaranteed unique
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// Two-letter code or full state name; both spellings compare equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    /// Administrative county, possibly derived by the county enricher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Feature tag identifiers (e.g. "used books", "café")
    #[serde(default)]
    pub feature_ids: Vec<i64>,

    /// Opening hours keyed by weekday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<BTreeMap<String, String>>,

    /// Third-party listing data, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<ProviderEnrichment>,

    /// Slug persisted by the backend, if any. Only a lookup hint: the
    /// name-derived slug is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_slug: Option<String>,

    /// Visibility gate for every public read path
    #[serde(default)]
    pub live: bool,
}

impl Record {
    /// Create a live record with just an id and a name.
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            live: true,
            ..Self::default()
        }
    }

    /// Set city and state.
    pub fn located(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    /// Set the feature tags.
    pub fn with_features(mut self, feature_ids: impl Into<Vec<i64>>) -> Self {
        self.feature_ids = feature_ids.into();
        self
    }

    /// Set the county.
    pub fn in_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    /// Mark the record hidden from public reads.
    pub fn hidden(mut self) -> Self {
        self.live = false;
        self
    }

    /// The canonical slug for this record.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Provider listing data (ratings, review counts, photo references).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderEnrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,

    /// Photo references in whatever shape the provider returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<serde_json::Value>,
}

impl ProviderEnrichment {
    /// `None` when every field is empty.
    pub fn non_empty(self) -> Option<Self> {
        if self == Self::default() {
            None
        } else {
            Some(self)
        }
    }
}

/// A new bookshop submitted for review.
///
/// Drafts never carry an id or a liveness flag: the store assigns the id and
/// every created record starts hidden until an administrator publishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DraftRecord {
    pub name: String,
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub feature_ids: Vec<i64>,
    #[serde(default)]
    pub hours: Option<BTreeMap<String, String>>,
}

impl DraftRecord {
    /// Create a draft with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reject drafts that could never be listed.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("bookshop name is empty"));
        }
        if slugify(&self.name).is_empty() {
            return Err(AppError::validation(format!(
                "bookshop name {:?} produces an empty slug",
                self.name
            )));
        }
        Ok(())
    }

    /// Materialize the draft under a store-assigned id. Always hidden.
    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            name: self.name.trim().to_string(),
            street_address: self.street_address,
            city: self.city,
            state: self.state,
            zip: self.zip,
            county: self.county,
            phone: self.phone,
            website: self.website,
            description: self.description,
            image_url: self.image_url,
            latitude: self.latitude,
            longitude: self.longitude,
            feature_ids: self.feature_ids,
            hours: self.hours,
            enrichment: None,
            native_slug: None,
            live: false,
        }
    }
}
