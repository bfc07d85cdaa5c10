//! US state names and postal codes.
//!
//! Records store the state either as a two-letter code or as the full name.
//! Everything that compares states goes through [`normalize_state`].

use crate::utils::eq_ignore_case;

const STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("PR", "Puerto Rico"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Resolve a code or full name to the two-letter code.
pub fn normalize_state(value: &str) -> Option<&'static str> {
    let value = value.trim();
    STATES
        .iter()
        .find(|(code, name)| eq_ignore_case(code, value) || eq_ignore_case(name, value))
        .map(|(code, _)| *code)
}

/// Full name for a two-letter code (or a full name given in any case).
pub fn state_name(value: &str) -> Option<&'static str> {
    let code = normalize_state(value)?;
    STATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Representation-insensitive state comparison.
///
/// Unknown values (territories missing from the table, typos) still compare
/// equal to themselves case-insensitively.
pub fn same_state(a: &str, b: &str) -> bool {
    match (normalize_state(a), normalize_state(b)) {
        (Some(x), Some(y)) => x == y,
        _ => eq_ignore_case(a, b),
    }
}
