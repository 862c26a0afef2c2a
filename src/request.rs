//! Request parameters and the defaults merge.
//!
//! A [`Request`] is the set of upstream query parameters for one call. It
//! keeps insertion order, because the query string is rendered in that order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Query parameter holding the API key.
pub const API_KEY_PARAM: &str = "apikey";
/// Query parameter selecting the upstream operation.
pub const FUNCTION_PARAM: &str = "function";
/// Query parameter selecting the response format.
pub const DATATYPE_PARAM: &str = "datatype";
/// Query parameter naming the instrument.
pub const SYMBOL_PARAM: &str = "symbol";

/// Response format requested from the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// JSON body (the upstream default).
    #[default]
    Json,
    /// CSV body served as a download.
    Csv,
}

impl DataType {
    /// The parameter value the upstream expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Json => "json",
            DataType::Csv => "csv",
        }
    }

    /// Reads a `datatype` parameter value. Anything other than `csv` is JSON.
    pub fn from_param(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("csv") => DataType::Csv,
            _ => DataType::Json,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream query parameters for one call.
///
/// Values are scalars (string, number or bool). Order of insertion is kept
/// and is the order of the rendered query string.
///
/// # Examples
///
/// ```
/// use vantage::{DataType, Request};
///
/// let request = Request::new()
///     .with_param("symbol", "TSLA")
///     .with_param("function", "OVERVIEW");
///
/// assert_eq!(request.query_string(), "symbol=TSLA&function=OVERVIEW");
/// assert_eq!(request.datatype(), DataType::Json);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request {
    params: Map<String, Value>,
}

impl Request {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous value for the key.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a parameter in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Returns a parameter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Removes a parameter, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.params.shift_remove(key)
    }

    /// Returns `true` if the parameter is present (even when `null`).
    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// The `symbol` parameter, if it is a string.
    pub fn symbol(&self) -> Option<&str> {
        self.get(SYMBOL_PARAM).and_then(Value::as_str)
    }

    /// The `function` parameter, if it is a string.
    pub fn function(&self) -> Option<&str> {
        self.get(FUNCTION_PARAM).and_then(Value::as_str)
    }

    /// The API key, if present and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.get(API_KEY_PARAM)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
    }

    /// The requested response format; `json` when the parameter is absent.
    pub fn datatype(&self) -> DataType {
        DataType::from_param(self.get(DATATYPE_PARAM))
    }

    /// A copy of the request without the API key, safe to log and to key the cache with.
    pub fn loggable(&self) -> Request {
        let mut copy = self.clone();
        copy.remove(API_KEY_PARAM);
        copy
    }

    /// Renders `key=value` pairs joined by `&`, in insertion order.
    ///
    /// Values are not URL-encoded. `null` parameters are skipped.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .filter_map(|(key, value)| render_value(value).map(|value| format!("{key}={value}")))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// JSON of the loggable copy with keys sorted.
    ///
    /// Two requests that differ only in key order or API key share a cache key.
    pub fn cache_key(&self) -> String {
        let sorted: BTreeMap<&String, &Value> = self
            .params
            .iter()
            .filter(|(key, _)| key.as_str() != API_KEY_PARAM)
            .collect();
        let object: Map<String, Value> = sorted
            .into_iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(object).to_string()
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl From<Map<String, Value>> for Request {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

impl<K, V> FromIterator<(K, V)> for Request
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut request = Request::new();
        for (key, value) in iter {
            request.set(key, value);
        }
        request
    }
}

/// What a caller hands an endpoint method: a bare symbol or a full parameter set.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInput {
    /// A bare symbol, wrapped into `{symbol: value}`.
    Symbol(String),
    /// Caller parameters, merged over the endpoint defaults.
    Params(Request),
}

impl RequestInput {
    fn into_request(self) -> Request {
        match self {
            RequestInput::Symbol(symbol) => Request::new().with_param(SYMBOL_PARAM, symbol),
            RequestInput::Params(request) => request,
        }
    }
}

impl From<&str> for RequestInput {
    fn from(symbol: &str) -> Self {
        RequestInput::Symbol(symbol.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(symbol: String) -> Self {
        RequestInput::Symbol(symbol)
    }
}

impl From<Request> for RequestInput {
    fn from(request: Request) -> Self {
        RequestInput::Params(request)
    }
}

impl From<&Request> for RequestInput {
    fn from(request: &Request) -> Self {
        RequestInput::Params(request.clone())
    }
}

/// Merges caller parameters over endpoint defaults.
///
/// Starts from a copy of the caller's parameters; every default whose key is
/// absent or `null` there is inserted. Caller values always win.
///
/// ```
/// use vantage::{build_request, Request};
///
/// let defaults = Request::new().with_param("a", 1).with_param("b", 2);
/// let merged = build_request(&defaults, Request::new().with_param("b", 3));
///
/// assert_eq!(merged.query_string(), "b=3&a=1");
/// ```
pub fn build_request(defaults: &Request, input: impl Into<RequestInput>) -> Request {
    let mut request = input.into().into_request();
    for (key, value) in defaults.iter() {
        let missing = matches!(request.get(key), None | Some(Value::Null));
        if missing {
            request.set(key.clone(), value.clone());
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_caller_overrides_default_and_missing_default_is_injected() {
        let defaults = Request::new().with_param("a", 1).with_param("b", 2);
        let merged = build_request(&defaults, Request::new().with_param("b", 3));

        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(3)));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_null_caller_value_takes_default() {
        let defaults = Request::new().with_param("outputsize", "compact");
        let merged = build_request(&defaults, Request::new().with_param("outputsize", Value::Null));

        assert_eq!(merged.get("outputsize"), Some(&json!("compact")));
    }

    #[test]
    fn test_bare_symbol_is_wrapped() {
        let defaults = Request::new().with_param(FUNCTION_PARAM, "GLOBAL_QUOTE");
        let merged = build_request(&defaults, "TSLA");

        assert_eq!(merged.symbol(), Some("TSLA"));
        assert_eq!(merged.function(), Some("GLOBAL_QUOTE"));
    }

    #[test]
    fn test_query_string_keeps_insertion_order_without_encoding() {
        let request = Request::new()
            .with_param("symbol", "TSLA")
            .with_param("function", "OVERVIEW");
        assert_eq!(request.query_string(), "symbol=TSLA&function=OVERVIEW");

        let request = Request::new()
            .with_param("keywords", "tesla motors")
            .with_param("adjusted", true)
            .with_param("time_period", 20)
            .with_param("skipped", Value::Null);
        assert_eq!(
            request.query_string(),
            "keywords=tesla motors&adjusted=true&time_period=20"
        );
    }

    #[test]
    fn test_empty_request_renders_empty_query() {
        assert_eq!(Request::new().query_string(), "");
    }

    #[test]
    fn test_datatype_defaults_to_json() {
        assert_eq!(Request::new().datatype(), DataType::Json);
        assert_eq!(
            Request::new().with_param(DATATYPE_PARAM, "CSV").datatype(),
            DataType::Csv
        );
        assert_eq!(
            Request::new().with_param(DATATYPE_PARAM, "xml").datatype(),
            DataType::Json
        );
    }

    #[test]
    fn test_loggable_copy_strips_api_key() {
        let request = Request::new()
            .with_param("symbol", "IBM")
            .with_param(API_KEY_PARAM, "secret");

        let loggable = request.loggable();
        assert!(!loggable.contains_key(API_KEY_PARAM));
        assert_eq!(loggable.symbol(), Some("IBM"));
        assert_eq!(request.api_key(), Some("secret"));
    }

    #[test]
    fn test_empty_api_key_is_not_a_key() {
        let request = Request::new().with_param(API_KEY_PARAM, "");
        assert_eq!(request.api_key(), None);
    }

    #[test]
    fn test_cache_key_is_sorted_and_keyless() {
        let a = Request::new()
            .with_param("symbol", "IBM")
            .with_param("function", "OVERVIEW")
            .with_param(API_KEY_PARAM, "one");
        let b = Request::new()
            .with_param("function", "OVERVIEW")
            .with_param(API_KEY_PARAM, "two")
            .with_param("symbol", "IBM");

        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), r#"{"function":"OVERVIEW","symbol":"IBM"}"#);
    }
}
