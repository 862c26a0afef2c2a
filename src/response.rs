//! Raw transport results and the normalized envelope built from them.
//!
//! A [`RawResponse`] is what came back over the wire. An [`Envelope`] is the
//! normalized outcome of a request: success, rate limiting, upstream error
//! text and the payload, independent of whether the upstream answered in
//! JSON or CSV.

use crate::request::{DataType, Request};
use crate::rules::RuleEngine;
use crate::Result;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An HTTP response as received from the transport.
///
/// Immutable once built. The body is parsed as JSON when the content type
/// says JSON.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use vantage::RawResponse;
///
/// let raw = RawResponse::new(StatusCode::OK, Some("application/json"), r#"{"a":1}"#);
/// assert!(raw.json().is_some());
///
/// let raw = RawResponse::new(StatusCode::OK, Some("application/x-download"), "a,b\n1,2");
/// assert!(raw.json().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    content_type: Option<String>,
    text: String,
    json: Option<Value>,
}

impl RawResponse {
    /// Creates a raw response, parsing the body when the content type is JSON.
    pub fn new(status: StatusCode, content_type: Option<&str>, text: impl Into<String>) -> Self {
        let text = text.into();
        let content_type = content_type.map(str::to_ascii_lowercase);
        let json = match &content_type {
            Some(ct) if ct.contains("json") => serde_json::from_str(&text).ok(),
            _ => None,
        };

        Self {
            status,
            content_type,
            text,
            json,
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The `content-type` header, lowercased.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The body as text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parsed body, if the content type was JSON and the body parsed.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// The parsed body as an object, if it is one.
    pub fn json_object(&self) -> Option<&Map<String, Value>> {
        self.json.as_ref().and_then(Value::as_object)
    }
}

/// The normalized result of one request.
///
/// Every request that gets past the preflight checks yields an envelope,
/// whether the upstream answered with data, an error message or a rate-limit
/// notice. Callers must check [`success`](Self::success).
///
/// Serializes flat: the upstream payload keys sit next to the base fields,
/// which is also the shape the typed models deserialize from.
///
/// # Examples
///
/// ```
/// use vantage::Envelope;
///
/// let mut envelope = Envelope::new(200);
/// envelope.success = true;
/// envelope.fields.insert("Global Quote".into(), serde_json::json!({"05. price": "10.0"}));
///
/// let json = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(json["success"], true);
/// assert_eq!(json["Global Quote"]["05. price"], "10.0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the upstream answered with usable data.
    pub success: bool,

    /// Whether the upstream signalled call-frequency throttling.
    pub limit_reached: bool,

    /// The HTTP status code of the (last) response.
    pub status_code: u16,

    /// Upstream error text when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Raw CSV text for successful CSV requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,

    /// The symbol from the request, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Top-level keys of a successful JSON payload, merged as-is.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Creates an unsuccessful, empty envelope for the given status code.
    pub fn new(status_code: u16) -> Self {
        Self {
            success: false,
            limit_reached: false,
            status_code,
            error_message: None,
            csv: None,
            symbol: None,
            fields: Map::new(),
        }
    }

    /// Builds the envelope for one raw response to `request`.
    ///
    /// Success and the rate-limit flag come from the rules selected by the
    /// request's `datatype`. The payload is attached only when the response
    /// is successful *and* declared the requested format: JSON keys are
    /// merged into [`fields`](Self::fields), CSV text goes to
    /// [`csv`](Self::csv). The symbol is not copied here.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::StatusCode;
    /// use vantage::{Envelope, RawResponse, Request};
    ///
    /// let request = Request::new().with_param("symbol", "BADSYM");
    /// let raw = RawResponse::new(StatusCode::OK, Some("application/json"), "{}");
    ///
    /// let envelope = Envelope::from_raw(&request, &raw)?;
    /// assert!(!envelope.success);
    /// assert_eq!(envelope.error_message.as_deref(), Some("Symbol not found"));
    /// # Ok::<(), vantage::Error>(())
    /// ```
    pub fn from_raw(request: &Request, raw: &RawResponse) -> Result<Self> {
        let mut checker = RuleEngine::from_request(request).with_response(raw);
        let mut envelope = Envelope::new(raw.status().as_u16());

        envelope.success = checker.expect_successful_response().passed()?;
        if !envelope.success {
            envelope.error_message = Some(checker.error_message());
        }
        envelope.limit_reached = checker.expect_limit_reached().passed()?;

        match request.datatype() {
            DataType::Json => {
                let verified = checker
                    .expect_successful_response()
                    .expect_json_datatype()
                    .passed()?;
                if let (true, Some(payload)) = (verified, raw.json_object()) {
                    envelope.merge_fields(payload);
                }
            }
            DataType::Csv => {
                let verified = checker
                    .expect_successful_response()
                    .expect_csv_datatype()
                    .passed()?;
                if verified {
                    envelope.csv = Some(raw.text().to_string());
                }
            }
        }

        Ok(envelope)
    }

    /// Returns a payload field by its upstream name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Shallow-merges every top-level key of a JSON object into the payload.
    pub fn merge_fields(&mut self, payload: &Map<String, Value>) {
        for (key, value) in payload {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// The envelope as one flat JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_parsed_only_for_json_content_type() {
        let raw = RawResponse::new(
            StatusCode::OK,
            Some("application/json; charset=utf-8"),
            r#"{"Note":"x"}"#,
        );
        assert_eq!(raw.json(), Some(&json!({"Note": "x"})));

        let raw = RawResponse::new(StatusCode::OK, Some("text/csv"), r#"{"Note":"x"}"#);
        assert!(raw.json().is_none());

        let raw = RawResponse::new(StatusCode::OK, None, "{}");
        assert!(raw.json().is_none());
    }

    #[test]
    fn test_unparseable_json_body_has_no_json() {
        let raw = RawResponse::new(StatusCode::OK, Some("application/json"), "not json");
        assert!(raw.json().is_none());
        assert_eq!(raw.text(), "not json");
    }

    #[test]
    fn test_from_raw_merges_successful_json() {
        let request = Request::new().with_param("symbol", "TSLA");
        let raw = RawResponse::new(
            StatusCode::OK,
            Some("application/json"),
            r#"{"Global Quote": {"01. symbol": "TSLA"}}"#,
        );

        let envelope = Envelope::from_raw(&request, &raw).unwrap();
        assert!(envelope.success);
        assert!(!envelope.limit_reached);
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.error_message, None);
        assert_eq!(envelope.field("Global Quote"), Some(&json!({"01. symbol": "TSLA"})));
        assert_eq!(envelope.symbol, None);
    }

    #[test]
    fn test_from_raw_limit_reached() {
        let request = Request::new();
        let raw = RawResponse::new(
            StatusCode::OK,
            Some("application/json"),
            r#"{"Note": "Our standard API call frequency is 5 calls per minute and 500 calls per day."}"#,
        );

        let envelope = Envelope::from_raw(&request, &raw).unwrap();
        assert!(!envelope.success);
        assert!(envelope.limit_reached);
        assert!(envelope.fields.is_empty());
        assert!(envelope
            .error_message
            .as_deref()
            .unwrap()
            .contains("calls per minute"));
    }

    #[test]
    fn test_from_raw_attaches_csv_only_for_csv_content() {
        let request = Request::new().with_param("datatype", "csv");

        let raw = RawResponse::new(
            StatusCode::OK,
            Some("application/x-download"),
            "timestamp,open\n2024-01-02,1.0\n",
        );
        let envelope = Envelope::from_raw(&request, &raw).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.csv.as_deref(), Some("timestamp,open\n2024-01-02,1.0\n"));

        let raw = RawResponse::new(StatusCode::OK, Some("text/html"), "<html>oops</html>");
        let envelope = Envelope::from_raw(&request, &raw).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.csv, None);
    }

    #[test]
    fn test_envelope_round_trips_flat() {
        let mut envelope = Envelope::new(200);
        envelope.success = true;
        envelope.symbol = Some("IBM".to_string());
        envelope.merge_fields(json!({"Meta Data": {"1. Information": "x"}}).as_object().unwrap());

        let map = envelope.to_map();
        assert_eq!(map["symbol"], "IBM");
        assert_eq!(map["Meta Data"]["1. Information"], "x");
        assert!(!map.contains_key("error_message"));

        let back: Envelope = serde_json::from_value(Value::Object(map)).unwrap();
        assert_eq!(back, envelope);
    }
}
