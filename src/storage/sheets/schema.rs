//! Header-driven row parsing for the spreadsheet store.
//!
//! The column layout is discovered from the header row on every read, so
//! reordering, renaming (within the known synonyms) or inserting columns
//! upstream does not break parsing. Unknown columns are ignored.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{ProviderEnrichment, Record, RecordId};
use crate::utils::non_empty;

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// A record field a sheet column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Name,
    StreetAddress,
    City,
    State,
    Zip,
    County,
    Phone,
    Website,
    Description,
    ImageUrl,
    Latitude,
    Longitude,
    Features,
    /// A JSON object of weekday → hours
    Hours,
    /// A single weekday column
    Weekday(&'static str),
    PlaceId,
    Rating,
    ReviewCount,
    Photos,
    Slug,
    Live,
}

impl Field {
    /// Map a header cell to a field. Matching ignores case, spaces and
    /// punctuation, so "Street Address", "street_address" and "STREET-ADDRESS"
    /// are the same column.
    pub fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let field = match key.as_str() {
            "id" | "shopid" | "bookshopid" => Self::Id,
            "name" | "shopname" | "bookshopname" | "storename" => Self::Name,
            "street" | "address" | "streetaddress" | "address1" => Self::StreetAddress,
            "city" | "town" => Self::City,
            "state" | "stateprovince" => Self::State,
            "zip" | "zipcode" | "postal" | "postalcode" => Self::Zip,
            "county" => Self::County,
            "phone" | "phonenumber" => Self::Phone,
            "website" | "url" | "web" => Self::Website,
            "description" | "about" => Self::Description,
            "image" | "imageurl" | "photo" | "photourl" => Self::ImageUrl,
            "lat" | "latitude" => Self::Latitude,
            "lng" | "lon" | "long" | "longitude" => Self::Longitude,
            "features" | "featureids" | "tags" => Self::Features,
            "hours" | "hoursjson" => Self::Hours,
            "placeid" | "googleplaceid" => Self::PlaceId,
            "rating" | "googlerating" => Self::Rating,
            "reviewcount" | "googlereviewcount" | "reviews" => Self::ReviewCount,
            "photos" | "googlephotos" => Self::Photos,
            "slug" => Self::Slug,
            "live" | "published" | "approved" | "visible" => Self::Live,
            other => {
                let day = other.strip_prefix("hours").unwrap_or(other);
                return WEEKDAYS
                    .iter()
                    .find(|d| **d == day)
                    .map(|d| Self::Weekday(*d));
            }
        };
        Some(field)
    }
}

/// Column layout discovered from a header row.
#[derive(Debug, Clone)]
pub struct SheetSchema {
    columns: Vec<Option<Field>>,
}

impl SheetSchema {
    /// Build the layout from the header row. `id` and `name` are required.
    pub fn from_header(header: &[String]) -> Result<Self> {
        let columns: Vec<Option<Field>> = header.iter().map(|h| Field::from_header(h)).collect();
        let schema = Self { columns };

        for required in [Field::Id, Field::Name] {
            if schema.position(required).is_none() {
                return Err(AppError::config(format!(
                    "spreadsheet header has no {required:?} column"
                )));
            }
        }
        Ok(schema)
    }

    fn position(&self, field: Field) -> Option<usize> {
        self.columns.iter().position(|c| *c == Some(field))
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.position(field).is_some()
    }

    /// Parse one data row. Blank rows yield `Ok(None)`.
    ///
    /// `row` is the 1-based sheet row number, used in error messages.
    pub fn parse_row(&self, row: usize, cells: &[String]) -> Result<Option<Record>> {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return Ok(None);
        }

        // Sheets without a liveness column publish every row.
        let mut record = Record {
            live: self.position(Field::Live).is_none(),
            ..Record::default()
        };
        let mut enrichment = ProviderEnrichment::default();
        let mut hours = BTreeMap::new();
        let mut has_id = false;

        for (field, cell) in self.columns.iter().zip(cells) {
            let Some(field) = field else { continue };
            let Some(value) = non_empty(Some(cell.as_str())) else {
                continue;
            };

            match field {
                Field::Id => {
                    record.id = parse_number::<RecordId>(row, "id", &value)?;
                    has_id = true;
                }
                Field::Name => record.name = value,
                Field::StreetAddress => record.street_address = Some(value),
                Field::City => record.city = Some(value),
                Field::State => record.state = Some(value),
                Field::Zip => record.zip = Some(value),
                Field::County => record.county = Some(value),
                Field::Phone => record.phone = Some(value),
                Field::Website => record.website = Some(value),
                Field::Description => record.description = Some(value),
                Field::ImageUrl => record.image_url = Some(value),
                Field::Latitude => record.latitude = Some(parse_number(row, "latitude", &value)?),
                Field::Longitude => {
                    record.longitude = Some(parse_number(row, "longitude", &value)?)
                }
                Field::Features => record.feature_ids = parse_features(row, &value)?,
                Field::Hours => {
                    let parsed: BTreeMap<String, String> = serde_json::from_str(&value)
                        .map_err(|e| AppError::parse(row, format!("hours: {e}")))?;
                    hours.extend(parsed);
                }
                Field::Weekday(day) => {
                    hours.insert(day.to_string(), value);
                }
                Field::PlaceId => enrichment.place_id = Some(value),
                Field::Rating => enrichment.rating = Some(parse_number(row, "rating", &value)?),
                Field::ReviewCount => {
                    enrichment.review_count = Some(parse_number(row, "review count", &value)?)
                }
                Field::Photos => {
                    enrichment.photos =
                        Some(serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value)))
                }
                Field::Slug => record.native_slug = Some(value),
                Field::Live => record.live = parse_flag(&value),
            }
        }

        if !has_id {
            return Err(AppError::parse(row, "missing id"));
        }
        if record.name.is_empty() {
            return Err(AppError::parse(row, "missing name"));
        }

        record.hours = (!hours.is_empty()).then_some(hours);
        record.enrichment = enrichment.non_empty();
        Ok(Some(record))
    }

    /// Render a record as a row in this sheet's column order.
    pub fn render_row(&self, record: &Record) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let num = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();

        self.columns
            .iter()
            .map(|field| match field {
                Some(Field::Id) => record.id.to_string(),
                Some(Field::Name) => record.name.clone(),
                Some(Field::StreetAddress) => opt(&record.street_address),
                Some(Field::City) => opt(&record.city),
                Some(Field::State) => opt(&record.state),
                Some(Field::Zip) => opt(&record.zip),
                Some(Field::County) => opt(&record.county),
                Some(Field::Phone) => opt(&record.phone),
                Some(Field::Website) => opt(&record.website),
                Some(Field::Description) => opt(&record.description),
                Some(Field::ImageUrl) => opt(&record.image_url),
                Some(Field::Latitude) => num(record.latitude),
                Some(Field::Longitude) => num(record.longitude),
                Some(Field::Features) => record
                    .feature_ids
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                Some(Field::Hours) => record
                    .hours
                    .as_ref()
                    .and_then(|h| serde_json::to_string(h).ok())
                    .unwrap_or_default(),
                Some(Field::Weekday(day)) => record
                    .hours
                    .as_ref()
                    .and_then(|h| h.get(*day).cloned())
                    .unwrap_or_default(),
                Some(Field::Slug) => opt(&record.native_slug),
                Some(Field::Live) => (if record.live { "TRUE" } else { "FALSE" }).to_string(),
                Some(Field::PlaceId | Field::Rating | Field::ReviewCount | Field::Photos) | None => {
                    String::new()
                }
            })
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(row: usize, what: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .replace(',', "")
        .parse()
        .map_err(|e| AppError::parse(row, format!("{what} {value:?}: {e}")))
}

/// Comma- or semicolon-separated integer ids.
fn parse_features(row: usize, value: &str) -> Result<Vec<i64>> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(row, "feature id", s))
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x" | "live"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_synonyms() {
        assert_eq!(Field::from_header("Street Address"), Some(Field::StreetAddress));
        assert_eq!(Field::from_header("ZIP_CODE"), Some(Field::Zip));
        assert_eq!(Field::from_header("Google Rating"), Some(Field::Rating));
        assert_eq!(Field::from_header("Hours Monday"), Some(Field::Weekday("monday")));
        assert_eq!(Field::from_header("Sunday"), Some(Field::Weekday("sunday")));
        assert_eq!(Field::from_header("Notes for admins"), None);
    }

    #[test]
    fn test_header_requires_id_and_name() {
        assert!(SheetSchema::from_header(&cells(&["Name", "City"])).is_err());
        assert!(SheetSchema::from_header(&cells(&["ID", "City"])).is_err());
        assert!(SheetSchema::from_header(&cells(&["City", "Name", "ID"])).is_ok());
    }

    #[test]
    fn test_reordered_columns_parse_the_same() {
        let a = SheetSchema::from_header(&cells(&["ID", "Name", "City", "State", "Live"])).unwrap();
        let b = SheetSchema::from_header(&cells(&["Live", "State", "Name", "Notes", "City", "ID"]))
            .unwrap();

        let ra = a
            .parse_row(2, &cells(&["5", "Fables Books", "Goshen", "IN", "TRUE"]))
            .unwrap()
            .unwrap();
        let rb = b
            .parse_row(2, &cells(&["yes", "IN", "Fables Books", "call first", "Goshen", "5"]))
            .unwrap()
            .unwrap();
        assert_eq!(ra, rb);
        assert!(ra.live);
    }

    #[test]
    fn test_short_rows_and_blank_rows() {
        let schema =
            SheetSchema::from_header(&cells(&["ID", "Name", "City", "County", "Live"])).unwrap();
        let record = schema
            .parse_row(3, &cells(&["9", "Short Row"]))
            .unwrap()
            .unwrap();
        assert!(record.city.is_none());
        assert!(!record.live);

        assert!(schema.parse_row(4, &cells(&["", " ", ""])).unwrap().is_none());
        assert!(schema.parse_row(5, &[]).unwrap().is_none());
    }

    #[test]
    fn test_missing_live_column_publishes_rows() {
        let schema = SheetSchema::from_header(&cells(&["ID", "Name"])).unwrap();
        let record = schema.parse_row(2, &cells(&["3", "Open Book"])).unwrap().unwrap();
        assert!(record.live);
        assert!(!schema.has_column(Field::Live));

        let flagged = SheetSchema::from_header(&cells(&["ID", "Name", "Published"])).unwrap();
        assert!(flagged.has_column(Field::Live));
    }

    #[test]
    fn test_bad_cells_are_parse_errors() {
        let schema =
            SheetSchema::from_header(&cells(&["ID", "Name", "Lat", "Features"])).unwrap();
        assert!(matches!(
            schema.parse_row(2, &cells(&["abc", "Shop"])),
            Err(AppError::Parse { row: 2, .. })
        ));
        assert!(schema.parse_row(3, &cells(&["1", "Shop", "north"])).is_err());
        assert!(schema.parse_row(4, &cells(&["1", "Shop", "", "1,x"])).is_err());
        assert!(schema.parse_row(5, &cells(&["1", ""])).is_err());
        assert!(schema.parse_row(6, &cells(&["", "Shop"])).is_err());
    }

    #[test]
    fn test_features_hours_and_enrichment() {
        let schema = SheetSchema::from_header(&cells(&[
            "ID", "Name", "Features", "Monday", "Hours", "Rating", "Reviews",
        ]))
        .unwrap();
        let record = schema
            .parse_row(
                2,
                &cells(&["1", "Shop", "2; 5,7", "9-5", r#"{"sunday":"closed"}"#, "4.5", "1,204"]),
            )
            .unwrap()
            .unwrap();

        assert_eq!(record.feature_ids, vec![2, 5, 7]);
        let hours = record.hours.unwrap();
        assert_eq!(hours.get("monday").map(String::as_str), Some("9-5"));
        assert_eq!(hours.get("sunday").map(String::as_str), Some("closed"));
        let enrichment = record.enrichment.unwrap();
        assert_eq!(enrichment.rating, Some(4.5));
        assert_eq!(enrichment.review_count, Some(1204));
    }

    #[test]
    fn test_render_row_follows_header_order() {
        let schema =
            SheetSchema::from_header(&cells(&["Live", "Name", "Notes", "ID", "Features"])).unwrap();
        let record = Record::new(12, "New Shop").with_features([1, 2]).hidden();
        assert_eq!(
            schema.render_row(&record),
            cells(&["FALSE", "New Shop", "", "12", "1,2"])
        );
    }
}
