//! Error types for API calls.
//!
//! Only problems the caller has to fix before a request can be made (no API
//! key, a CSV request against a JSON-only function) and transport failures are
//! reported as errors. Upstream functional errors and rate limiting are data:
//! they come back inside an [`Envelope`](crate::Envelope) with `success` or
//! `limit_reached` set accordingly.

/// The main error type for the client.
///
/// # Examples
///
/// ```no_run
/// use vantage::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.global_quote("TSLA").await {
///     Ok(quote) if quote.base.success => println!("{:?}", quote.data),
///     Ok(quote) => eprintln!("upstream said: {:?}", quote.base.error_message),
///     Err(Error::ApiKeyMissing) => eprintln!("set ALPHAVANTAGE_API_KEY"),
///     Err(e) => eprintln!("request failed: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No API key could be resolved for the request.
    ///
    /// Raised before any network I/O; a request is never sent without a key.
    #[error("API key missing: pass one to the builder, write ~/.alphavantage or set ALPHAVANTAGE_API_KEY")]
    ApiKeyMissing,

    /// CSV output was requested from a function that only answers in JSON.
    ///
    /// Raised before any network I/O.
    #[error("CSV not supported for function {function}")]
    CsvNotSupported {
        /// The upstream function that was requested
        function: String,
    },

    /// `passed()` or `failed()` was read before any rule had been recorded.
    #[error("no rules were evaluated before reading the verdict")]
    NoRulesEvaluated,

    /// More than one upstream key matched the same normalized field.
    #[error("ambiguous field {target}: candidates {candidates:?}")]
    AmbiguousField {
        /// The stable field name the keys would be renamed to
        target: &'static str,
        /// Every upstream key that matched
        candidates: Vec<String>,
    },

    /// A network-level error occurred (connection failed, DNS lookup failed, timeout).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The envelope could not be turned into the requested typed model.
    #[error("Failed to deserialize response: {serde_error}")]
    DeserializationFailed {
        /// The envelope as JSON text
        raw_response: String,
        /// The serde error message
        serde_error: String,
    },

    /// A CSV payload could not be parsed into rows.
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the error was raised before anything was sent upstream.
    ///
    /// ```
    /// use vantage::Error;
    ///
    /// assert!(Error::ApiKeyMissing.is_preflight());
    /// assert!(Error::CsvNotSupported { function: "OVERVIEW".into() }.is_preflight());
    /// assert!(!Error::NoRulesEvaluated.is_preflight());
    /// ```
    pub fn is_preflight(&self) -> bool {
        matches!(self, Error::ApiKeyMissing | Error::CsvNotSupported { .. })
    }

    /// Returns `true` if this error is a network timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(e) if e.is_timeout())
    }
}

/// A specialized `Result` type for client calls.
pub type Result<T> = std::result::Result<T, Error>;
