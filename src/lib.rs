//! # Vantage - An Alpha Vantage market data client
//!
//! Vantage is an async client for the Alpha Vantage API built on top of `reqwest`.
//! It validates every response against a small set of rules, so upstream errors,
//! empty results and rate limiting come back as data rather than surprises, and
//! it maps the upstream's inconsistent field names onto a few stable model shapes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vantage::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vantage::Error> {
//!     // The key can also come from ~/.alphavantage or ALPHAVANTAGE_API_KEY
//!     let client = Client::builder()
//!         .api_key("demo")
//!         .cache(true)
//!         .build()?;
//!
//!     let quote = client.global_quote("IBM").await?;
//!     if quote.base.success {
//!         println!("IBM: {:?}", quote.data.get("05. price"));
//!     }
//!
//!     let daily = client.daily("IBM").await?;
//!     for (day, bar) in daily.data.iter().take(5) {
//!         println!("{}: {}", day, bar["4. close"]);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Response rules** - Success, throttling and datatype checks for JSON and CSV answers
//! - **Field normalization** - `Time Series (5min)`, `Weekly Time Series` and friends all become `data`
//! - **Typed endpoints** - Quotes, fundamentals, calendars, commodities, economic and technical indicators
//! - **Caching** - Optional in-memory cache keyed by the request parameters
//! - **Rate-limit pacing** - Optional single retry paced by the upstream's one-minute window
//! - **Automatic logging** - Structured logging with `tracing`; the API key is never logged
//!
//! ## Envelopes
//!
//! Anything that is not a transport or configuration failure is an envelope,
//! including upstream errors:
//!
//! ```no_run
//! use vantage::{Client, Request};
//!
//! # async fn example(client: Client) -> Result<(), vantage::Error> {
//! let envelope = client
//!     .fetch(Request::new()
//!         .with_param("function", "GLOBAL_QUOTE")
//!         .with_param("symbol", "BADSYM"))
//!     .await?;
//!
//! if envelope.limit_reached {
//!     eprintln!("throttled");
//! } else if !envelope.success {
//!     eprintln!("upstream error: {}", envelope.error_message.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules
//!
//! The rule engine can also be used on its own:
//!
//! ```
//! use http::StatusCode;
//! use vantage::{RawResponse, Request, RuleEngine};
//!
//! let request = Request::new().with_param("symbol", "IBM");
//! let raw = RawResponse::new(StatusCode::OK, Some("application/json"), r#"{"Global Quote": {}}"#);
//!
//! let mut checker = RuleEngine::from_request(&request).with_response(&raw);
//! assert!(checker.expect_successful_response().failed()?);
//! # Ok::<(), vantage::Error>(())
//! ```

mod cache;
mod client;
pub mod config;
mod endpoints;
mod error;
pub mod models;
pub mod normalize;
mod request;
mod response;
pub mod retry;
pub mod rules;
pub mod transport;

pub use cache::{ResponseCache, DEFAULT_MAX_CACHE_SIZE};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL};
pub use endpoints::{Commodity, EconomicIndicator};
pub use error::{Error, Result};
pub use models::Model;
pub use request::{build_request, DataType, Request, RequestInput};
pub use response::{Envelope, RawResponse};
pub use rules::{RuleChecker, RuleEngine};
