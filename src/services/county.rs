//! County derivation for records whose backend lacks the field.

use crate::models::Record;
use crate::models::states::normalize_state;

/// (state code, lowercase city) → county
const CITY_COUNTIES: &[(&str, &str, &str)] = &[
    ("CA", "berkeley", "Alameda County"),
    ("CA", "los angeles", "Los Angeles County"),
    ("CA", "oakland", "Alameda County"),
    ("CA", "san diego", "San Diego County"),
    ("CA", "san francisco", "San Francisco County"),
    ("CO", "denver", "Denver County"),
    ("FL", "miami", "Miami-Dade County"),
    ("GA", "atlanta", "Fulton County"),
    ("IL", "chicago", "Cook County"),
    ("IN", "goshen", "Elkhart County"),
    ("IN", "indianapolis", "Marion County"),
    ("MA", "amherst", "Hampshire County"),
    ("MA", "boston", "Suffolk County"),
    ("MA", "brookline", "Norfolk County"),
    ("MA", "cambridge", "Middlesex County"),
    ("MA", "northampton", "Hampshire County"),
    ("MA", "springfield", "Hampden County"),
    ("MA", "worcester", "Worcester County"),
    ("MN", "minneapolis", "Hennepin County"),
    ("MO", "springfield", "Greene County"),
    ("NC", "asheville", "Buncombe County"),
    ("NY", "brooklyn", "Kings County"),
    ("NY", "new york", "New York County"),
    ("OR", "portland", "Multnomah County"),
    ("PA", "philadelphia", "Philadelphia County"),
    ("TN", "nashville", "Davidson County"),
    ("TX", "austin", "Travis County"),
    ("TX", "dallas", "Dallas County"),
    ("WA", "seattle", "King County"),
];

/// Fills `county` from a static city table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountyEnricher;

impl CountyEnricher {
    /// County for a city, accepting either state spelling.
    pub fn lookup(state: &str, city: &str) -> Option<&'static str> {
        let code = normalize_state(state)?;
        let city = city.trim().to_lowercase();
        CITY_COUNTIES
            .iter()
            .find(|(s, c, _)| *s == code && *c == city)
            .map(|(_, _, county)| *county)
    }

    /// Return the record with its county filled in when the table knows it.
    pub fn enrich(&self, mut record: Record) -> Record {
        let has_county = record
            .county
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if has_county {
            return record;
        }

        if let (Some(state), Some(city)) = (record.state.as_deref(), record.city.as_deref())
            && let Some(county) = Self::lookup(state, city)
        {
            record.county = Some(county.to_string());
        }
        record
    }

    pub fn enrich_all(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().map(|r| self.enrich(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_fills_missing_county() {
        let record = Record::new(1, "The Underground Bookshop").located("Springfield", "MA");
        let enriched = CountyEnricher.enrich(record);
        assert_eq!(enriched.county.as_deref(), Some("Hampden County"));
    }

    #[test]
    fn test_enrich_accepts_full_state_name() {
        let record = Record::new(1, "Shop").located("  SPRINGFIELD ", "Missouri");
        let enriched = CountyEnricher.enrich(record);
        assert_eq!(enriched.county.as_deref(), Some("Greene County"));
    }

    #[test]
    fn test_enrich_keeps_existing_county() {
        let record = Record::new(1, "Shop")
            .located("Springfield", "MA")
            .in_county("Somewhere Else");
        let enriched = CountyEnricher.enrich(record.clone());
        assert_eq!(enriched, record);
    }

    #[test]
    fn test_enrich_miss_is_unchanged() {
        let record = Record::new(1, "Shop").located("Nowhere", "MA");
        assert_eq!(CountyEnricher.enrich(record.clone()), record);

        let no_location = Record::new(2, "Shop");
        assert_eq!(CountyEnricher.enrich(no_location.clone()), no_location);
    }
}
