//! HTTP transport.
//!
//! The client only needs a blocking-style GET: send a URL, get back status,
//! content type and body. [`Transport`] is that contract;
//! [`ReqwestTransport`] is the production implementation. Transport
//! failures are returned as-is and never turned into envelopes.

use crate::response::RawResponse;
use crate::Result;
use http::header::CONTENT_TYPE;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default timeout applied to every upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A future returned by a [`Transport`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse>> + Send + 'a>>;

/// Executes GET requests against the upstream.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use vantage::transport::{Transport, TransportFuture};
/// use vantage::RawResponse;
///
/// struct Canned(&'static str);
///
/// impl Transport for Canned {
///     fn get<'a>(&'a self, _url: &'a str) -> TransportFuture<'a> {
///         let body = self.0;
///         Box::pin(async move {
///             Ok(RawResponse::new(StatusCode::OK, Some("application/json"), body))
///         })
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Issues a GET for the full URL, query string included.
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a>;
}

/// Transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vantage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                crate::Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, timeout })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self.client.get(url).timeout(self.timeout).send().await?;

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let text = response.text().await?;

            Ok(RawResponse::new(status, content_type.as_deref(), text))
        })
    }
}
