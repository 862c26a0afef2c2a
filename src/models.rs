//! Typed models built from envelopes.
//!
//! Every model shares the envelope base fields ([`ResponseBase`]) and adds
//! the payload shape of one endpoint family. JSON models declare the
//! [`FieldAlias`]es that rename the upstream's endpoint-specific keys
//! onto their fields; [`Model::from_envelope`] runs that renaming before
//! deserializing. Calendar models are parsed from the envelope's CSV text
//! instead, because the upstream only serves calendars as CSV.

use crate::normalize::{
    normalize, FieldAlias, ANNUAL_REPORTS, INDICATOR_DATA, META_DATA, NEWS_DATA,
    QUARTERLY_REPORTS, QUOTE_DATA, SEARCH_DATA,
};
use crate::response::Envelope;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed view of an [`Envelope`].
pub trait Model: Sized {
    /// Upstream keys renamed onto this model's fields before deserializing.
    const ALIASES: &'static [FieldAlias] = &[];

    /// Builds the model from an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousField`] if the payload matches an alias twice,
    /// or [`Error::DeserializationFailed`] if it does not fit the model.
    fn from_envelope(envelope: &Envelope) -> Result<Self>;
}

fn from_normalized<T: DeserializeOwned>(envelope: &Envelope, aliases: &[FieldAlias]) -> Result<T> {
    let payload = Value::Object(normalize(envelope.to_map(), aliases)?);
    serde_json::from_value(payload.clone()).map_err(|e| {
        tracing::error!(error = %e, "Failed to deserialize envelope into model");
        Error::DeserializationFailed {
            raw_response: payload.to_string(),
            serde_error: e.to_string(),
        }
    })
}

macro_rules! json_model {
    ($($model:ty => [$($alias:expr),*];)+) => {
        $(
            impl Model for $model {
                const ALIASES: &'static [FieldAlias] = &[$($alias),*];

                fn from_envelope(envelope: &Envelope) -> Result<Self> {
                    from_normalized(envelope, Self::ALIASES)
                }
            }
        )+
    };
}

/// Fields every model carries over from the envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBase {
    /// Whether the upstream answered with usable data.
    pub success: bool,
    /// Whether the upstream signalled throttling.
    pub limit_reached: bool,
    /// HTTP status code.
    pub status_code: u16,
    /// Upstream error text when `success` is false.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Raw CSV text for CSV requests.
    #[serde(default)]
    pub csv: Option<String>,
}

impl From<&Envelope> for ResponseBase {
    fn from(envelope: &Envelope) -> Self {
        Self {
            success: envelope.success,
            limit_reached: envelope.limit_reached,
            status_code: envelope.status_code,
            error_message: envelope.error_message.clone(),
            csv: envelope.csv.clone(),
        }
    }
}

/// A quote or a time series: rows keyed by date (or the quote fields) plus metadata.
///
/// Covers `GLOBAL_QUOTE`, the `TIME_SERIES_*` family, FX and digital currency
/// series, and `CURRENCY_EXCHANGE_RATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Series rows keyed by timestamp, or the fields of a single quote.
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub meta_data: Map<String, Value>,
}

impl Quote {
    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A technical indicator series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicator {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub meta_data: Map<String, Value>,
}

/// Income statement, balance sheet, cash flow or earnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingReport {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "annualReports", default)]
    pub annual_reports: Vec<Map<String, Value>>,
    #[serde(rename = "quarterlyReports", default)]
    pub quarterly_reports: Vec<Map<String, Value>>,
}

/// Company attributes from `OVERVIEW`, kept as a flat map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CompanyOverview {
    /// Returns an attribute by its upstream name, e.g. `MarketCapitalization`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// One observation of a commodity or economic indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: String,
    /// The upstream sends `"."` for missing observations.
    pub value: String,
}

impl DataPoint {
    /// The value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}

/// A commodity price series or an economic indicator series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSeries {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

/// One symbol search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(rename = "1. symbol")]
    pub symbol: String,
    #[serde(rename = "2. name")]
    pub name: String,
    #[serde(rename = "3. type", default)]
    pub kind: Option<String>,
    #[serde(rename = "4. region", default)]
    pub region: Option<String>,
    #[serde(rename = "5. marketOpen", default)]
    pub market_open: Option<String>,
    #[serde(rename = "6. marketClose", default)]
    pub market_close: Option<String>,
    #[serde(rename = "7. timezone", default)]
    pub timezone: Option<String>,
    #[serde(rename = "8. currency", default)]
    pub currency: Option<String>,
    #[serde(rename = "9. matchScore", default)]
    pub match_score: Option<String>,
}

/// Results of `SYMBOL_SEARCH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSearch {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub data: Vec<SearchMatch>,
}

/// A ticker in the top gainers, losers or most traded lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub ticker: String,
    pub price: String,
    pub change_amount: String,
    pub change_percentage: String,
    pub volume: String,
}

/// Results of `TOP_GAINERS_LOSERS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMovers {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub top_gainers: Vec<Mover>,
    #[serde(default)]
    pub top_losers: Vec<Mover>,
    #[serde(default)]
    pub most_actively_traded: Vec<Mover>,
}

/// Trading session state of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSession {
    pub market_type: String,
    pub region: String,
    #[serde(default)]
    pub primary_exchanges: Option<String>,
    #[serde(default)]
    pub local_open: Option<String>,
    #[serde(default)]
    pub local_close: Option<String>,
    pub current_status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Results of `MARKET_STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatus {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub markets: Vec<MarketSession>,
}

impl MarketStatus {
    /// Sessions whose `current_status` is `open`.
    pub fn open_markets(&self) -> impl Iterator<Item = &MarketSession> {
        self.markets
            .iter()
            .filter(|m| m.current_status.eq_ignore_ascii_case("open"))
    }
}

/// Results of `NEWS_SENTIMENT`; articles are kept as upstream maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSentiment {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub items: Option<String>,
    #[serde(default)]
    pub sentiment_score_definition: Option<String>,
    #[serde(default)]
    pub relevance_score_definition: Option<String>,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

/// A raw CSV answer, for any function requested with `datatype=csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvResponse {
    #[serde(flatten)]
    pub base: ResponseBase,
    #[serde(default)]
    pub symbol: Option<String>,
}

json_model! {
    Quote => [QUOTE_DATA, META_DATA];
    TechnicalIndicator => [INDICATOR_DATA, META_DATA];
    AccountingReport => [ANNUAL_REPORTS, QUARTERLY_REPORTS];
    CompanyOverview => [];
    DataSeries => [];
    TickerSearch => [SEARCH_DATA];
    MarketMovers => [];
    MarketStatus => [];
    NewsSentiment => [NEWS_DATA];
    CsvResponse => [];
}

/// One row of `EARNINGS_CALENDAR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsEvent {
    pub symbol: String,
    pub name: String,
    pub report_date: String,
    pub fiscal_date_ending: String,
    pub estimate: Option<String>,
    pub currency: String,
}

/// One row of `IPO_CALENDAR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpoEvent {
    pub symbol: String,
    pub name: String,
    pub ipo_date: String,
    pub price_range_low: Option<String>,
    pub price_range_high: Option<String>,
    pub currency: String,
    pub exchange: String,
}

/// A calendar of upcoming events, parsed from the upstream's CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calendar<T> {
    pub base: ResponseBase,
    pub data: Vec<T>,
}

impl<T: DeserializeOwned> Model for Calendar<T> {
    fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let data = match &envelope.csv {
            Some(text) if envelope.success => parse_csv_rows(text)?,
            _ => Vec::new(),
        };
        Ok(Self {
            base: ResponseBase::from(envelope),
            data,
        })
    }
}

/// Parses CSV text with a header row into typed rows.
pub fn parse_csv_rows<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}
