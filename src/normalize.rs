//! Renaming of endpoint-specific upstream keys onto stable field names.
//!
//! The upstream labels the same block differently per function:
//! `Time Series (Daily)`, `Weekly Time Series`, `Global Quote`,
//! `Technical Analysis: SMA`, `annualEarnings` vs `annualReports`, and so on.
//! Each model declares a list of [`FieldAlias`]es and [`normalize`] renames
//! the matching key onto the alias target before the model is deserialized.
//!
//! Matching is a literal prefix comparison. A key equal to the target is a
//! candidate too, so a payload that is already canonical passes through
//! untouched.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Maps a set of upstream key prefixes onto one stable field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAlias {
    /// The stable field name.
    pub target: &'static str,
    /// Literal prefixes of the upstream keys that mean the same thing.
    pub prefixes: &'static [&'static str],
}

impl FieldAlias {
    /// Creates an alias.
    pub const fn new(target: &'static str, prefixes: &'static [&'static str]) -> Self {
        Self { target, prefixes }
    }

    /// Returns `true` if the upstream key is the target or starts with a known prefix.
    pub fn matches(&self, key: &str) -> bool {
        key == self.target || self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }
}

/// Time-series and quote blocks onto `data`.
pub const QUOTE_DATA: FieldAlias = FieldAlias::new(
    "data",
    &[
        "Time Series",
        "Weekly Time Series",
        "Monthly Time Series",
        "Weekly Adjusted Time Series",
        "Monthly Adjusted Time Series",
        "Global Quote",
        "Realtime Currency Exchange Rate",
    ],
);

/// `Meta Data` blocks onto `meta_data`.
pub const META_DATA: FieldAlias = FieldAlias::new("meta_data", &["Meta Data"]);

/// `Technical Analysis: <INDICATOR>` blocks onto `data`.
pub const INDICATOR_DATA: FieldAlias = FieldAlias::new("data", &["Technical Analysis"]);

/// Annual statement or earnings rows onto `annualReports`.
pub const ANNUAL_REPORTS: FieldAlias =
    FieldAlias::new("annualReports", &["annualReports", "annualEarnings"]);

/// Quarterly statement or earnings rows onto `quarterlyReports`.
pub const QUARTERLY_REPORTS: FieldAlias =
    FieldAlias::new("quarterlyReports", &["quarterlyReports", "quarterlyEarnings"]);

/// Symbol search matches onto `data`.
pub const SEARCH_DATA: FieldAlias = FieldAlias::new("data", &["bestMatches"]);

/// News feed items onto `data`.
pub const NEWS_DATA: FieldAlias = FieldAlias::new("data", &["feed"]);

/// Renames upstream keys onto their stable names.
///
/// For every alias, the top-level keys it matches are collected. One match is
/// moved onto the target (keeping its position), no match leaves the map as
/// it is, and more than one is rejected. Keys no alias matches are kept
/// unchanged.
///
/// # Errors
///
/// Returns [`Error::AmbiguousField`] when two distinct keys match the same alias.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use vantage::normalize::{normalize, QUOTE_DATA, META_DATA};
///
/// let payload = json!({
///     "Meta Data": {"2. Symbol": "IBM"},
///     "Weekly Time Series": {"2024-01-05": {"4. close": "160.0"}},
/// });
/// let normalized = normalize(payload.as_object().unwrap().clone(), &[QUOTE_DATA, META_DATA])?;
///
/// assert_eq!(normalized["data"]["2024-01-05"]["4. close"], "160.0");
/// assert_eq!(normalized["meta_data"]["2. Symbol"], "IBM");
/// # Ok::<(), vantage::Error>(())
/// ```
pub fn normalize(mut payload: Map<String, Value>, aliases: &[FieldAlias]) -> Result<Map<String, Value>> {
    for alias in aliases {
        let candidates: Vec<String> = payload
            .keys()
            .filter(|key| alias.matches(key))
            .cloned()
            .collect();

        match candidates.as_slice() {
            [] => {}
            [key] if key == alias.target => {}
            [key] => payload = rename_key(payload, key, alias.target),
            _ => {
                return Err(Error::AmbiguousField {
                    target: alias.target,
                    candidates,
                })
            }
        }
    }
    Ok(payload)
}

fn rename_key(payload: Map<String, Value>, from: &str, to: &str) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(key, value)| {
            if key == from {
                (to.to_string(), value)
            } else {
                (key, value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_weekly_and_daily_series_normalize_to_same_data() {
        let rows = json!({"2024-01-05": {"4. close": "160.0"}});

        let weekly = normalize(
            object(json!({"Weekly Time Series": rows.clone()})),
            &[QUOTE_DATA, META_DATA],
        )
        .unwrap();
        let daily = normalize(
            object(json!({"Time Series (Daily)": rows.clone()})),
            &[QUOTE_DATA, META_DATA],
        )
        .unwrap();

        assert_eq!(weekly["data"], rows);
        assert_eq!(daily["data"], rows);
        assert_eq!(weekly, daily);
    }

    #[test]
    fn test_unrelated_keys_are_preserved_in_order() {
        let payload = object(json!({
            "success": true,
            "Meta Data": {"1. Information": "Daily Prices"},
            "Time Series (5min)": {},
            "symbol": "IBM",
        }));

        let normalized = normalize(payload, &[QUOTE_DATA, META_DATA]).unwrap();
        let keys: Vec<&str> = normalized.keys().map(String::as_str).collect();
        assert_eq!(keys, ["success", "meta_data", "data", "symbol"]);
    }

    #[test]
    fn test_earnings_blocks_become_reports() {
        let payload = object(json!({
            "symbol": "IBM",
            "annualEarnings": [{"fiscalDateEnding": "2023-12-31"}],
            "quarterlyEarnings": [{"fiscalDateEnding": "2023-12-31"}],
        }));

        let normalized = normalize(payload, &[ANNUAL_REPORTS, QUARTERLY_REPORTS]).unwrap();
        assert!(normalized.contains_key("annualReports"));
        assert!(normalized.contains_key("quarterlyReports"));
        assert!(!normalized.contains_key("annualEarnings"));
    }

    #[test]
    fn test_canonical_payload_passes_through() {
        let payload = object(json!({"annualReports": [], "quarterlyReports": []}));
        let normalized = normalize(payload.clone(), &[ANNUAL_REPORTS, QUARTERLY_REPORTS]).unwrap();
        assert_eq!(normalized, payload);
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let payload = object(json!({"Symbol": "IBM", "Name": "International Business Machines"}));
        let normalized = normalize(payload.clone(), &[QUOTE_DATA]).unwrap();
        assert_eq!(normalized, payload);
    }

    #[test]
    fn test_two_matching_keys_are_rejected() {
        let payload = object(json!({
            "Time Series (Daily)": {},
            "Weekly Time Series": {},
        }));

        match normalize(payload, &[QUOTE_DATA]) {
            Err(Error::AmbiguousField { target, candidates }) => {
                assert_eq!(target, "data");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("Expected AmbiguousField, got {:?}", other),
        }
    }

    #[test]
    fn test_indicator_block_normalizes() {
        let payload = object(json!({
            "Meta Data": {"2: Indicator": "Simple Moving Average (SMA)"},
            "Technical Analysis: SMA": {"2024-01-05": {"SMA": "150.0"}},
        }));

        let normalized = normalize(payload, &[INDICATOR_DATA, META_DATA]).unwrap();
        assert_eq!(normalized["data"]["2024-01-05"]["SMA"], "150.0");
    }
}
