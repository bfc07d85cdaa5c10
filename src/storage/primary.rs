//! Primary REST store (PostgREST-style table API).
//!
//! Rows live in `{url}/rest/v1/{table}`. The API caps rows per request, so
//! listings go through [`fetch_all_pages`] with `limit`/`offset`.
//! Provider enrichment columns are passed through with field-name
//! normalization only.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::states::{normalize_state, state_name};
use crate::models::{
    DraftRecord, FilterCriteria, PagingConfig, PrimaryConfig, ProviderEnrichment, Record,
    RecordId,
};
use crate::storage::paging::{Page, PageRequest, fetch_all_pages};
use crate::storage::{StorageAdapter, find_by_slug};
use crate::utils::http::ensure_success;
use crate::utils::{non_empty, slug};

const BACKEND: &str = "primary";

/// Query parameters in PostgREST syntax, e.g. `("live", "eq.true")`.
type Params = Vec<(String, String)>;

/// PostgREST-backed bookshop table.
pub struct PrimaryStore {
    client: Client,
    endpoint: Url,
    api_key: String,
    slug_column: Option<String>,
    paging: PagingConfig,
}

impl PrimaryStore {
    /// Create a store from configuration. Fails when URL or key is missing.
    pub fn new(config: &PrimaryConfig, paging: PagingConfig, client: Client) -> Result<Self> {
        let url = non_empty(config.url.as_deref())
            .ok_or_else(|| AppError::unavailable(BACKEND, "primary.url is not set"))?;
        let api_key = non_empty(config.api_key.as_deref())
            .ok_or_else(|| AppError::unavailable(BACKEND, "primary.api_key is not set"))?;

        let endpoint = Url::parse(&format!(
            "{}/rest/v1/{}",
            url.trim_end_matches('/'),
            config.table.trim()
        ))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            slug_column: non_empty(config.slug_column.as_deref()),
            paging,
        })
    }

    /// The table endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run one select and return the rows as sent.
    async fn select_raw(&self, params: &[(String, String)]) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(params)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(ensure_success(BACKEND, response).await?.json().await?)
    }

    /// Run one select and parse the rows, skipping malformed ones.
    async fn select(&self, params: &[(String, String)]) -> Result<Vec<Record>> {
        Ok(parse_rows(self.select_raw(params).await?))
    }

    /// One page. `received` counts the rows the API sent, so rows dropped
    /// by parsing do not make a full page look short.
    async fn select_page(
        &self,
        params: &[(String, String)],
        page: PageRequest,
    ) -> Result<Page<Record>> {
        let mut params = params.to_vec();
        params.push(("order".into(), "name.asc,id.asc".into()));
        params.push(("limit".into(), page.limit.to_string()));
        params.push(("offset".into(), page.offset.to_string()));
        let rows = self.select_raw(&params).await?;
        Ok(Page {
            received: rows.len(),
            rows: parse_rows(rows),
        })
    }

    /// Page through every live row matching `params`.
    async fn select_all(&self, params: Params) -> Result<Vec<Record>> {
        fetch_all_pages(self.paging, |page| self.select_page(&params, page)).await
    }

    /// Lookup through the persisted slug column, if there is one.
    async fn native_slug_lookup(&self, column: &str, slug: &str) -> Result<Option<Record>> {
        let mut params = live_params();
        params.push((column.to_string(), format!("eq.{slug}")));
        params.push(("order".into(), "id.desc".into()));
        params.push(("limit".into(), "1".into()));
        Ok(self.select(&params).await?.into_iter().next())
    }
}

fn live_params() -> Params {
    vec![
        ("select".into(), "*".into()),
        ("live".into(), "eq.true".into()),
    ]
}

/// `(state.ilike."CA",state.ilike."California")`, the value of an `or`
/// filter matching either spelling in any case. `ilike` without wildcards
/// is a case-insensitive equality, so wildcard characters are stripped.
fn state_filter(state: &str) -> String {
    let spellings: Vec<String> = match normalize_state(state) {
        Some(code) => std::iter::once(code)
            .chain(state_name(code))
            .map(str::to_string)
            .collect(),
        None => vec![state.trim().to_string()],
    };

    let clauses: Vec<String> = spellings
        .iter()
        .map(|s| {
            let literal: String = s.chars().filter(|c| !matches!(c, '"' | '*' | '%')).collect();
            format!("state.ilike.\"{literal}\"")
        })
        .collect();
    format!("({})", clauses.join(","))
}

#[async_trait]
impl StorageAdapter for PrimaryStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn try_list(&self) -> Result<Vec<Record>> {
        let records = self.select_all(live_params()).await?;
        log::debug!("primary: listed {} live records", records.len());
        Ok(records)
    }

    async fn try_get_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        let mut params = live_params();
        params.push(("id".into(), format!("eq.{id}")));
        params.push(("limit".into(), "1".into()));
        Ok(self.select(&params).await?.into_iter().next())
    }

    async fn try_get_by_slug(&self, slug: &str) -> Result<Option<Record>> {
        if let Some(column) = &self.slug_column {
            match self.native_slug_lookup(column, slug).await {
                Ok(Some(record)) if slug::matches(slug, &record) => return Ok(Some(record)),
                Ok(Some(record)) => log::debug!(
                    "primary: {} = {:?} names record {} whose name slugs differently, scanning",
                    column,
                    slug,
                    record.id
                ),
                Ok(None) => log::debug!("primary: no {} = {:?}, scanning", column, slug),
                Err(e) => log::debug!("primary: slug column lookup failed ({}), scanning", e),
            }
        }
        Ok(find_by_slug(self.try_list().await?, slug))
    }

    async fn try_filter(&self, criteria: &FilterCriteria) -> Result<Vec<Record>> {
        let mut params = live_params();
        if let Some(state) = non_empty(criteria.state.as_deref()) {
            params.push(("or".into(), state_filter(&state)));
        }
        if let Some(city) = non_empty(criteria.city.as_deref()) {
            params.push(("city".into(), format!("ilike.{city}")));
        }

        // The pushed-down filters only narrow the scan; every criterion is
        // rechecked locally.
        let records = self.select_all(params).await?;
        Ok(records.into_iter().filter(|r| criteria.matches(r)).collect())
    }

    async fn create(&self, draft: DraftRecord) -> Result<Record> {
        draft.validate()?;
        let body = PrimaryInsert::from(draft);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let rows: Vec<Value> = ensure_success(BACKEND, response).await?.json().await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::unavailable(BACKEND, "insert returned no row"))?;
        let record: Record = serde_json::from_value::<PrimaryRow>(row)?.into();
        log::info!("primary: created record {} ({})", record.id, record.name);
        Ok(record)
    }
}

/// Parse raw rows, logging and skipping any that do not fit the schema.
fn parse_rows(rows: Vec<Value>) -> Vec<Record> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value::<PrimaryRow>(row) {
            Ok(row) => Some(Record::from(row)),
            Err(e) => {
                log::warn!("{}", AppError::parse(i, e));
                None
            }
        })
        .filter(|r| r.live)
        .collect()
}

/// Row shape as stored in the table. Aliases cover the column spellings
/// seen across deployments.
#[derive(Debug, Deserialize)]
struct PrimaryRow {
    id: RecordId,
    name: String,
    #[serde(default, alias = "street", alias = "address")]
    street_address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default, alias = "zip_code", alias = "postal_code")]
    zip: Option<String>,
    #[serde(default)]
    county: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "image")]
    image_url: Option<String>,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon")]
    longitude: Option<f64>,
    #[serde(default, alias = "features")]
    feature_ids: Option<Vec<i64>>,
    #[serde(default)]
    hours: Option<Value>,
    #[serde(default, alias = "google_place_id")]
    place_id: Option<String>,
    #[serde(default, alias = "google_rating")]
    rating: Option<f64>,
    #[serde(default, alias = "google_review_count")]
    review_count: Option<u64>,
    #[serde(default, alias = "google_photos")]
    photos: Option<Value>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    live: Option<bool>,
}

impl From<PrimaryRow> for Record {
    fn from(row: PrimaryRow) -> Self {
        let enrichment = ProviderEnrichment {
            place_id: row.place_id,
            rating: row.rating,
            review_count: row.review_count,
            photos: row.photos.filter(|p| !p.is_null()),
        }
        .non_empty();

        Self {
            id: row.id,
            name: row.name,
            street_address: row.street_address,
            city: row.city,
            state: row.state,
            zip: row.zip,
            county: non_empty(row.county.as_deref()),
            phone: row.phone,
            website: row.website,
            description: row.description,
            image_url: row.image_url,
            latitude: row.latitude,
            longitude: row.longitude,
            feature_ids: row.feature_ids.unwrap_or_default(),
            hours: row.hours.and_then(hours_from_value),
            enrichment,
            native_slug: non_empty(row.slug.as_deref()),
            live: row.live.unwrap_or(false),
        }
    }
}

/// Accept an object of weekday → text; anything else is dropped.
fn hours_from_value(value: Value) -> Option<BTreeMap<String, String>> {
    let Value::Object(map) = value else {
        return None;
    };
    let hours: BTreeMap<String, String> = map
        .into_iter()
        .filter_map(|(day, v)| match v {
            Value::String(s) => Some((day, s)),
            Value::Null => None,
            other => Some((day, other.to_string())),
        })
        .collect();
    (!hours.is_empty()).then_some(hours)
}

/// Insert body. New rows are always hidden pending review.
#[derive(Debug, Serialize)]
struct PrimaryInsert {
    name: String,
    street_address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
    county: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    feature_ids: Vec<i64>,
    hours: Option<BTreeMap<String, String>>,
    live: bool,
}

impl From<DraftRecord> for PrimaryInsert {
    fn from(draft: DraftRecord) -> Self {
        Self {
            name: draft.name.trim().to_string(),
            street_address: draft.street_address,
            city: draft.city,
            state: draft.state,
            zip: draft.zip,
            county: draft.county,
            phone: draft.phone,
            website: draft.website,
            description: draft.description,
            image_url: draft.image_url,
            latitude: draft.latitude,
            longitude: draft.longitude,
            feature_ids: draft.feature_ids,
            hours: draft.hours,
            live: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::HttpConfig;
    use crate::utils::http::create_async_client;
    use crate::utils::http::testing::{self, Captured, FakeBackend};

    fn configured(url: &str) -> PrimaryConfig {
        PrimaryConfig {
            url: Some(url.into()),
            api_key: Some("anon".into()),
            ..PrimaryConfig::default()
        }
    }

    fn client() -> Client {
        create_async_client(&HttpConfig::default()).unwrap()
    }

    fn paging(page_size: usize) -> PagingConfig {
        PagingConfig {
            page_size,
            max_pages: 10,
        }
    }

    fn fake_store(backend: &FakeBackend, page_size: usize) -> PrimaryStore {
        PrimaryStore::new(&configured(&backend.base_url), paging(page_size), testing::client())
            .unwrap()
    }

    /// Answer selects from `rows`, honoring `limit` and `offset`.
    fn table(rows: Vec<Value>) -> impl Fn(&Captured) -> (u16, String) + Send + Sync + 'static {
        move |req| {
            let offset = req.query("offset").and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            let limit = req.query("limit").and_then(|v| v.parse::<usize>().ok()).unwrap_or(rows.len());
            let page: Vec<&Value> = rows.iter().skip(offset).take(limit).collect();
            (200, serde_json::to_string(&page).unwrap())
        }
    }

    fn five_rows_second_malformed() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Alpha Books", "live": true}),
            json!({"id": "bad", "name": "Broken Books", "live": true}),
            json!({"id": 3, "name": "Gamma Books", "live": true}),
            json!({"id": 4, "name": "Delta Books", "live": true}),
            json!({"id": 5, "name": "Epsilon Books", "live": true}),
        ]
    }

    fn ids(records: &[Record]) -> Vec<RecordId> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_new_requires_url_and_key() {
        let err = PrimaryStore::new(&PrimaryConfig::default(), PagingConfig::default(), client());
        assert!(matches!(err, Err(AppError::BackendUnavailable { .. })));
    }

    #[test]
    fn test_endpoint_joins_table() {
        let store = PrimaryStore::new(
            &configured("https://db.example.com/"),
            PagingConfig::default(),
            client(),
        )
        .unwrap();
        assert_eq!(
            store.endpoint().as_str(),
            "https://db.example.com/rest/v1/bookshops"
        );
    }

    #[test]
    fn test_state_filter_covers_both_spellings() {
        let both = "(state.ilike.\"CA\",state.ilike.\"California\")";
        assert_eq!(state_filter("CA"), both);
        assert_eq!(state_filter("ca"), both);
        assert_eq!(state_filter("california"), both);
        assert_eq!(state_filter(" CALIFORNIA "), both);
        assert_eq!(
            state_filter("new york"),
            "(state.ilike.\"NY\",state.ilike.\"New York\")"
        );
        assert_eq!(state_filter("Ontario"), "(state.ilike.\"Ontario\")");
        assert_eq!(state_filter("On*ta%rio"), "(state.ilike.\"Ontario\")");
        assert!(!state_filter("CA").contains("in."));
    }

    #[test]
    fn test_row_normalization() {
        let row = json!({
            "id": 12,
            "name": "Fables Books",
            "street": "1 Main St",
            "city": "Goshen",
            "state": "Indiana",
            "zip_code": "46526",
            "lat": 41.58,
            "lng": -85.83,
            "features": [1, 3],
            "hours": {"monday": "10-6", "tuesday": null},
            "google_rating": 4.9,
            "google_review_count": 212,
            "google_photos": [{"ref": "abc"}],
            "slug": "fables",
            "live": true
        });
        let record: Record = serde_json::from_value::<PrimaryRow>(row).unwrap().into();

        assert_eq!(record.street_address.as_deref(), Some("1 Main St"));
        assert_eq!(record.zip.as_deref(), Some("46526"));
        assert_eq!(record.latitude, Some(41.58));
        assert_eq!(record.feature_ids, vec![1, 3]);
        assert_eq!(record.hours.unwrap().len(), 1);
        let enrichment = record.enrichment.unwrap();
        assert_eq!(enrichment.rating, Some(4.9));
        assert_eq!(enrichment.review_count, Some(212));
        assert_eq!(record.native_slug.as_deref(), Some("fables"));
        assert!(record.live);
    }

    #[test]
    fn test_parse_rows_skips_bad_and_hidden_rows() {
        let rows = vec![
            json!({"id": 1, "name": "Good", "live": true}),
            json!({"id": "not-a-number", "name": "Bad", "live": true}),
            json!({"id": 3, "name": "Hidden", "live": false}),
            json!({"id": 4, "name": "Unflagged"}),
        ];
        let records = parse_rows(rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
    }

    #[test]
    fn test_insert_is_hidden() {
        let insert = PrimaryInsert::from(DraftRecord::named(" New Shop "));
        let body = serde_json::to_value(&insert).unwrap();
        assert_eq!(body["live"], json!(false));
        assert_eq!(body["name"], json!("New Shop"));
    }

    #[tokio::test]
    async fn test_malformed_row_keeps_page_full() {
        let rows = five_rows_second_malformed();
        let mut calls = 0;
        let records = fetch_all_pages(paging(2), |page| {
            calls += 1;
            let raw: Vec<Value> = rows.iter().skip(page.offset).take(page.limit).cloned().collect();
            async move {
                Ok(Page {
                    received: raw.len(),
                    rows: parse_rows(raw),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(ids(&records), vec![1, 3, 4, 5]);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_list_pages_past_malformed_row() {
        let backend = FakeBackend::start(table(five_rows_second_malformed())).await;
        let store = fake_store(&backend, 2);

        let records = store.try_list().await.unwrap();
        assert_eq!(ids(&records), vec![1, 3, 4, 5]);

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        let offsets: Vec<_> = requests.iter().filter_map(|r| r.query("offset")).collect();
        assert_eq!(offsets, vec!["0", "2", "4"]);
        for req in &requests {
            assert_eq!(req.method, "GET");
            assert_eq!(req.url.path(), "/rest/v1/bookshops");
            assert_eq!(req.query("live").as_deref(), Some("eq.true"));
            assert_eq!(req.query("order").as_deref(), Some("name.asc,id.asc"));
            assert_eq!(req.query("limit").as_deref(), Some("2"));
        }
    }

    #[tokio::test]
    async fn test_filter_pushes_case_insensitive_state() {
        let backend = FakeBackend::start(table(vec![
            json!({"id": 1, "name": "Lower Books", "state": "ca", "city": "Oakland", "live": true}),
            json!({"id": 2, "name": "Upper Books", "state": "CALIFORNIA", "city": "Oakland", "live": true}),
            json!({"id": 3, "name": "Reno Books", "state": "NV", "city": "Reno", "live": true}),
        ]))
        .await;
        let store = fake_store(&backend, 50);

        let records = store
            .try_filter(&FilterCriteria::default().state("CA"))
            .await
            .unwrap();
        // The server narrows; the local recheck keeps both spellings.
        assert_eq!(ids(&records), vec![1, 2]);

        let requests = backend.requests();
        let req = &requests[0];
        assert_eq!(
            req.query("or").as_deref(),
            Some("(state.ilike.\"CA\",state.ilike.\"California\")")
        );
        assert!(req.query("state").is_none());
        assert!(req.query("city").is_none());
    }

    #[tokio::test]
    async fn test_create_posts_hidden_row() {
        let backend = FakeBackend::start(|req| {
            let mut row = req.body_json();
            row["id"] = json!(77);
            (201, json!([row]).to_string())
        })
        .await;
        let store = fake_store(&backend, 50);

        let record = store.create(DraftRecord::named("New Shop")).await.unwrap();
        assert_eq!(record.id, 77);
        assert_eq!(record.name, "New Shop");
        assert!(!record.live);
        let requests = backend.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].body_json()["live"], json!(false));
    }

    #[tokio::test]
    async fn test_api_error_degrades_reads() {
        let backend = FakeBackend::start(|_| (500, r#"{"message":"boom"}"#.into())).await;
        let store = fake_store(&backend, 50);

        assert!(matches!(
            store.try_list().await,
            Err(AppError::Api { status: 500, .. })
        ));
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_reads_empty_writes_fail() {
        // Nothing listens on the discard port.
        let store = PrimaryStore::new(
            &configured("http://127.0.0.1:9"),
            PagingConfig::default(),
            client(),
        )
        .unwrap();

        assert!(store.list().await.is_empty());
        assert!(store.get_by_id(1).await.is_none());
        assert!(store.get_by_slug("fables-books").await.is_none());
        assert!(store.create(DraftRecord::named("New Shop")).await.is_err());
    }
}
