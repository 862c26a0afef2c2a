//! Rule checking over one upstream response.
//!
//! The upstream reports most failures with a `200 OK` and a body that looks
//! like data: an `Error Message` key, a throttling `Note`, an empty object,
//! or a download that is really a JSON error. Whether a response is usable
//! is therefore decided by rules over the body and headers, not by the
//! status code.
//!
//! [`ResponseValidator`] derives individual facts. There is one
//! implementation per response format, chosen from the *request's*
//! `datatype` by [`validator_for`]: on error paths the upstream answers CSV
//! requests with JSON bodies, so the response's own content type cannot be
//! trusted to pick the rules.
//!
//! [`RuleChecker`] records named facts fluently and reads them back as one
//! verdict:
//!
//! ```
//! use http::StatusCode;
//! use vantage::{RawResponse, Request, RuleEngine};
//!
//! let request = Request::new().with_param("symbol", "IBM");
//! let raw = RawResponse::new(StatusCode::OK, Some("application/json"), r#"{"Global Quote": {}}"#);
//!
//! let mut checker = RuleEngine::from_request(&request).with_response(&raw);
//! assert!(!checker.expect_successful_response().passed()?);
//! assert!(checker.expect_json_datatype().passed()?);
//! # Ok::<(), vantage::Error>(())
//! ```

use crate::request::{DataType, Request};
use crate::response::RawResponse;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Phrase the upstream puts in its throttling notice.
pub const LIMIT_REACHED_PHRASE: &str = "calls per minute";

/// Fallback error text when the upstream gave none.
pub const SYMBOL_NOT_FOUND: &str = "Symbol not found";

const ERROR_KEYS: [&str; 3] = ["Error Message", "Information", "Note"];

/// A named fact about a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// The body carries usable data.
    SuccessfulResponse,
    /// The upstream signalled throttling.
    LimitReached,
    /// The request carried a non-empty API key.
    ApiKeyInRequest,
    /// The response declared a JSON content type.
    JsonDatatype,
    /// The response declared a CSV download content type.
    CsvDatatype,
}

impl Rule {
    /// The fact's name, as used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::SuccessfulResponse => "successful_response",
            Rule::LimitReached => "limit_reached",
            Rule::ApiKeyInRequest => "api_key_in_request",
            Rule::JsonDatatype => "json_datatype",
            Rule::CsvDatatype => "csv_datatype",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derives facts from a raw response for one response format.
pub trait ResponseValidator: Send + Sync {
    /// The response format these rules apply to.
    fn datatype(&self) -> DataType;

    /// Whether the body carries usable data.
    fn is_successful(&self, response: &RawResponse) -> bool;

    /// Whether the upstream signalled throttling.
    fn is_limit_reached(&self, response: &RawResponse) -> bool;

    /// Upstream error text, or a fallback when there is none.
    fn error_message(&self, response: &RawResponse) -> String;

    /// Whether the response declared a JSON content type.
    fn is_json_datatype(&self, response: &RawResponse) -> bool {
        response
            .content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Whether the response declared a CSV download content type.
    fn is_csv_datatype(&self, response: &RawResponse) -> bool {
        response
            .content_type()
            .is_some_and(|ct| ct.contains("application/x-download") || ct.contains("text/csv"))
    }
}

/// Rules for responses to `datatype=json` requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValidator;

impl JsonValidator {
    fn is_empty_global_quote(object: &Map<String, Value>) -> bool {
        object.len() == 1
            && object
                .get("Global Quote")
                .and_then(Value::as_object)
                .is_some_and(Map::is_empty)
    }
}

impl ResponseValidator for JsonValidator {
    fn datatype(&self) -> DataType {
        DataType::Json
    }

    fn is_successful(&self, response: &RawResponse) -> bool {
        let text = response.text().trim();
        if text.is_empty() || text == "{}" {
            return false;
        }

        match response.json() {
            Some(Value::Object(object)) => {
                !object.is_empty()
                    && !ERROR_KEYS.iter().any(|key| object.contains_key(*key))
                    && !Self::is_empty_global_quote(object)
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Throttling is announced under `Note`, and under `Information` on
    /// newer keys; either one counts when it carries the calls-per-minute phrase.
    fn is_limit_reached(&self, response: &RawResponse) -> bool {
        let Some(object) = response.json_object() else {
            return false;
        };
        ["Note", "Information"].iter().any(|key| {
            object
                .get(*key)
                .and_then(Value::as_str)
                .is_some_and(|text| text.contains(LIMIT_REACHED_PHRASE))
        })
    }

    fn error_message(&self, response: &RawResponse) -> String {
        response
            .json_object()
            .and_then(|object| {
                ERROR_KEYS
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_str))
            })
            .map(str::to_string)
            .unwrap_or_else(|| SYMBOL_NOT_FOUND.to_string())
    }
}

/// Rules for responses to `datatype=csv` requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvValidator;

impl ResponseValidator for CsvValidator {
    fn datatype(&self) -> DataType {
        DataType::Csv
    }

    fn is_successful(&self, response: &RawResponse) -> bool {
        let text = response.text();
        !text.trim().is_empty() && !text.contains("Error Message")
    }

    fn is_limit_reached(&self, response: &RawResponse) -> bool {
        response.text().contains(LIMIT_REACHED_PHRASE)
    }

    fn error_message(&self, response: &RawResponse) -> String {
        let text = response.text().trim();
        if text.is_empty() {
            return SYMBOL_NOT_FOUND.to_string();
        }
        serde_json::from_str::<Map<String, Value>>(text)
            .ok()
            .and_then(|object| {
                ERROR_KEYS
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| text.to_string())
    }
}

static JSON_VALIDATOR: JsonValidator = JsonValidator;
static CSV_VALIDATOR: CsvValidator = CsvValidator;

/// Picks the rules for a request from its `datatype` parameter (default `json`).
pub fn validator_for(request: &Request) -> &'static dyn ResponseValidator {
    match request.datatype() {
        DataType::Json => &JSON_VALIDATOR,
        DataType::Csv => &CSV_VALIDATOR,
    }
}

/// Rule engine scoped to one outgoing request.
///
/// Holds the request and the validator chosen for it. Pair it with a
/// response via [`with_response`](Self::with_response) to start checking.
#[derive(Clone, Copy)]
pub struct RuleEngine<'a> {
    request: &'a Request,
    validator: &'static dyn ResponseValidator,
}

impl<'a> RuleEngine<'a> {
    /// Scopes the engine to a request and selects the validator from its `datatype`.
    pub fn from_request(request: &'a Request) -> Self {
        Self {
            request,
            validator: validator_for(request),
        }
    }

    /// The validator selected for the request.
    pub fn validator(&self) -> &'static dyn ResponseValidator {
        self.validator
    }

    /// Starts checking a response.
    pub fn with_response(self, response: &'a RawResponse) -> RuleChecker<'a> {
        RuleChecker {
            request: self.request,
            response,
            validator: self.validator,
            facts: Vec::new(),
        }
    }
}

/// Records named facts about one response and reads them back as a verdict.
///
/// Each `expect_*` call evaluates one fact and records it. [`passed`](Self::passed)
/// and [`failed`](Self::failed) read the verdict over every fact recorded
/// since the last read and then clear them, so each read is its own
/// evaluation window.
pub struct RuleChecker<'a> {
    request: &'a Request,
    response: &'a RawResponse,
    validator: &'static dyn ResponseValidator,
    facts: Vec<(Rule, bool)>,
}

impl RuleChecker<'_> {
    fn record(&mut self, rule: Rule, verdict: bool) -> &mut Self {
        match self.facts.iter_mut().find(|(recorded, _)| *recorded == rule) {
            Some(fact) => fact.1 = verdict,
            None => self.facts.push((rule, verdict)),
        }
        self
    }

    /// Records whether the body carries usable data.
    pub fn expect_successful_response(&mut self) -> &mut Self {
        let verdict = self.validator.is_successful(self.response);
        self.record(Rule::SuccessfulResponse, verdict)
    }

    /// Records whether the upstream signalled throttling.
    pub fn expect_limit_reached(&mut self) -> &mut Self {
        let verdict = self.validator.is_limit_reached(self.response);
        self.record(Rule::LimitReached, verdict)
    }

    /// Records whether the request carried a non-empty API key.
    pub fn expect_api_key_in_request(&mut self) -> &mut Self {
        let verdict = self.request.api_key().is_some();
        self.record(Rule::ApiKeyInRequest, verdict)
    }

    /// Records whether the response declared a JSON content type.
    pub fn expect_json_datatype(&mut self) -> &mut Self {
        let verdict = self.validator.is_json_datatype(self.response);
        self.record(Rule::JsonDatatype, verdict)
    }

    /// Records whether the response declared a CSV download content type.
    pub fn expect_csv_datatype(&mut self) -> &mut Self {
        let verdict = self.validator.is_csv_datatype(self.response);
        self.record(Rule::CsvDatatype, verdict)
    }

    /// Facts recorded since the last read.
    pub fn facts(&self) -> &[(Rule, bool)] {
        &self.facts
    }

    /// `true` iff every recorded fact holds. Clears the recorded facts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRulesEvaluated`] if nothing was recorded.
    pub fn passed(&mut self) -> Result<bool> {
        let facts = self.take_facts()?;
        Ok(facts.iter().all(|(_, verdict)| *verdict))
    }

    /// `true` iff at least one recorded fact does not hold. Clears the recorded facts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRulesEvaluated`] if nothing was recorded.
    pub fn failed(&mut self) -> Result<bool> {
        let facts = self.take_facts()?;
        Ok(facts.iter().any(|(_, verdict)| !*verdict))
    }

    /// Upstream error text for the response.
    pub fn error_message(&self) -> String {
        self.validator.error_message(self.response)
    }

    fn take_facts(&mut self) -> Result<Vec<(Rule, bool)>> {
        if self.facts.is_empty() {
            return Err(Error::NoRulesEvaluated);
        }
        Ok(std::mem::take(&mut self.facts))
    }
}
