//! Filter criteria shared by every storage backend.

use serde::{Deserialize, Serialize};

use crate::models::Record;
use crate::models::states::same_state;
use crate::utils::{eq_ignore_case, non_empty};

/// Criteria for [`StorageAdapter::filter`](crate::storage::StorageAdapter::filter).
///
/// Absent (or blank) fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Two-letter code or full name
    #[serde(default)]
    pub state: Option<String>,

    /// Case-insensitive exact match
    #[serde(default)]
    pub city: Option<String>,

    /// Tolerant of a trailing "County" and of containment either way
    #[serde(default)]
    pub county: Option<String>,

    /// Matches when the record carries any of these features
    #[serde(default)]
    pub feature_ids: Vec<i64>,
}

impl FilterCriteria {
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    pub fn features(mut self, feature_ids: impl Into<Vec<i64>>) -> Self {
        self.feature_ids = feature_ids.into();
        self
    }

    /// Whether no criterion is set.
    pub fn is_empty(&self) -> bool {
        non_empty(self.state.as_deref()).is_none()
            && non_empty(self.city.as_deref()).is_none()
            && non_empty(self.county.as_deref()).is_none()
            && self.feature_ids.is_empty()
    }

    /// Copy of these criteria with the county constraint split off.
    pub fn split_county(&self) -> (Self, Option<String>) {
        let rest = Self {
            county: None,
            ..self.clone()
        };
        (rest, non_empty(self.county.as_deref()))
    }

    /// Check a record against every criterion.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(state) = non_empty(self.state.as_deref()) {
            match record.state.as_deref() {
                Some(s) if same_state(s, &state) => {}
                _ => return false,
            }
        }

        if let Some(city) = non_empty(self.city.as_deref()) {
            match record.city.as_deref() {
                Some(c) if eq_ignore_case(c, &city) => {}
                _ => return false,
            }
        }

        if let Some(county) = non_empty(self.county.as_deref()) {
            match record.county.as_deref() {
                Some(c) if county_matches(&county, c) => {}
                _ => return false,
            }
        }

        if !self.feature_ids.is_empty()
            && !record
                .feature_ids
                .iter()
                .any(|id| self.feature_ids.contains(id))
        {
            return false;
        }

        true
    }
}

/// Lowercase and drop a trailing "county".
fn normalize_county(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    lowered
        .strip_suffix("county")
        .map(str::trim_end)
        .unwrap_or(lowered.as_str())
        .to_string()
}

/// County comparison tolerant of the "County" suffix and of partial names.
pub fn county_matches(wanted: &str, actual: &str) -> bool {
    let wanted = normalize_county(wanted);
    let actual = normalize_county(actual);
    if wanted.is_empty() || actual.is_empty() {
        return false;
    }
    wanted.contains(&actual) || actual.contains(&wanted)
}
