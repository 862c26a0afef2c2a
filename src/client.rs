//! API client with response validation, caching and rate-limit pacing.
//!
//! The [`Client`] type is the main entry point. Use [`ClientBuilder`] to
//! configure and create clients. Every endpoint method funnels into
//! [`Client::fetch`], which resolves the API key, consults the cache, calls
//! the transport, turns the raw response into an [`Envelope`] and applies
//! the single-retry policy.

use crate::{
    cache::{ResponseCache, DEFAULT_MAX_CACHE_SIZE},
    config::ApiKeySource,
    models::Model,
    request::{build_request, Request, RequestInput, API_KEY_PARAM},
    retry::{CallStats, RATE_LIMIT_WINDOW},
    transport::{ReqwestTransport, Transport, DEFAULT_TIMEOUT},
    Envelope, Error, Result,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// Default upstream host.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// An Alpha Vantage client.
///
/// The client is designed to be reused across requests; clones share the
/// transport, the cache and the call statistics.
///
/// # Examples
///
/// ```no_run
/// use vantage::Client;
///
/// # async fn example() -> Result<(), vantage::Error> {
/// let client = Client::builder()
///     .api_key("demo")
///     .cache(true)
///     .build()?;
///
/// let quote = client.global_quote("IBM").await?;
/// if quote.base.success {
///     println!("IBM: {:?}", quote.data.get("05. price"));
/// } else if quote.base.limit_reached {
///     println!("throttled, try again in a minute");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    api_key: Option<String>,
    retry_once: bool,
    rate_limit_window: Duration,
    cache: Option<Mutex<ResponseCache>>,
    stats: Mutex<CallStats>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Runs one request through the pipeline and returns its envelope.
    ///
    /// Steps, in order:
    ///
    /// 1. inject the client's API key if the request has none; with no key at
    ///    all, fail with [`Error::ApiKeyMissing`] before any I/O
    /// 2. with caching enabled, return a cached envelope for the same
    ///    request (API key aside) without calling the upstream
    /// 3. call the transport and build the envelope from the response
    /// 4. with single-retry enabled, wait out the rate window and make one
    ///    more attempt when the limit was *not* reached (see
    ///    [`ClientBuilder::retry_once`])
    /// 5. copy the request's symbol onto the envelope and, when it is
    ///    successful and not throttled, cache it
    ///
    /// Upstream errors and throttling are reported in the envelope, not as
    /// `Err`. Transport failures are returned unchanged.
    pub async fn fetch(&self, request: Request) -> Result<Envelope> {
        let request = self.with_api_key(request)?;
        let loggable = request.loggable();
        let cache_key = loggable.cache_key();

        if let Some(cache) = &self.inner.cache {
            let cached = lock(cache).get(&cache_key).cloned();
            if let Some(envelope) = cached {
                tracing::debug!(request = %loggable.query_string(), "Cache hit");
                return Ok(envelope);
            }
        }

        let url = self.url_for(&request);
        let mut retry = self.inner.retry_once;
        let mut attempt = 0;

        let mut envelope = loop {
            attempt += 1;
            let envelope = self.execute_attempt(&request, &loggable, &url, attempt).await?;

            if retry && !envelope.limit_reached {
                let delay =
                    lock(&self.inner.stats).retry_delay(Instant::now(), self.inner.rate_limit_window);
                tracing::info!(
                    delay_ms = delay.as_millis(),
                    attempt = attempt,
                    request = %loggable.query_string(),
                    "Retrying request after rate window delay"
                );
                tokio::time::sleep(delay).await;
                retry = false;
                continue;
            }

            break envelope;
        };

        if let Some(symbol) = request.symbol() {
            envelope.symbol = Some(symbol.to_string());
        }

        if let Some(cache) = &self.inner.cache {
            if envelope.success && !envelope.limit_reached {
                lock(cache).put(cache_key, envelope.clone());
            }
        }

        Ok(envelope)
    }

    /// Runs a request through the pipeline and builds a typed model from the envelope.
    pub async fn fetch_as<M: Model>(&self, request: Request) -> Result<M> {
        let envelope = self.fetch(request).await?;
        M::from_envelope(&envelope)
    }

    /// Merges caller input over endpoint defaults, then fetches a typed model.
    pub(crate) async fn fetch_with_defaults<M: Model>(
        &self,
        defaults: &Request,
        input: impl Into<RequestInput>,
    ) -> Result<M> {
        self.fetch_as(build_request(defaults, input)).await
    }

    /// Number of transport calls made by this client and its clones.
    pub fn total_calls(&self) -> u64 {
        lock(&self.inner.stats).total_calls()
    }

    /// When this client made its first transport call.
    pub fn first_attempt(&self) -> Option<Instant> {
        lock(&self.inner.stats).first_attempt()
    }

    /// Number of cached envelopes; zero when caching is disabled.
    pub fn cache_len(&self) -> usize {
        self.inner
            .cache
            .as_ref()
            .map_or(0, |cache| lock(cache).len())
    }

    /// Drops every cached envelope.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.inner.cache {
            lock(cache).clear();
        }
    }

    /// Returns `true` if an API key was resolved when the client was built.
    pub fn has_api_key(&self) -> bool {
        self.inner.api_key.is_some()
    }

    fn with_api_key(&self, mut request: Request) -> Result<Request> {
        if request.api_key().is_none() {
            let key = self.inner.api_key.as_ref().ok_or(Error::ApiKeyMissing)?;
            request.set(API_KEY_PARAM, key.clone());
        }
        Ok(request)
    }

    fn url_for(&self, request: &Request) -> String {
        format!(
            "{}/query?{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            request.query_string()
        )
    }

    /// Executes a single attempt.
    async fn execute_attempt(
        &self,
        request: &Request,
        loggable: &Request,
        url: &str,
        attempt: usize,
    ) -> Result<Envelope> {
        tracing::debug!(
            request = %loggable.query_string(),
            datatype = %request.datatype(),
            attempt = attempt,
            "Executing request"
        );

        let started = Instant::now();
        let raw = self.inner.transport.get(url).await.inspect_err(|e| {
            tracing::warn!(error = %e, attempt = attempt, "Transport failed");
        })?;
        lock(&self.inner.stats).record_call(started);

        let envelope = Envelope::from_raw(request, &raw)?;

        tracing::info!(
            status = envelope.status_code,
            success = envelope.success,
            limit_reached = envelope.limit_reached,
            latency_ms = started.elapsed().as_millis(),
            attempt = attempt,
            "Received response"
        );

        if envelope.limit_reached {
            tracing::warn!(request = %loggable.query_string(), "Upstream rate limit reached");
        } else if !envelope.success {
            tracing::warn!(
                request = %loggable.query_string(),
                error = envelope.error_message.as_deref().unwrap_or_default(),
                "Upstream reported an error"
            );
        }

        Ok(envelope)
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use vantage::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), vantage::Error> {
/// let client = ClientBuilder::new()
///     .api_key("demo")
///     .timeout(Duration::from_secs(10))
///     .cache(true)
///     .max_cache_size(500)
///     .retry_once(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    api_key_source: ApiKeySource,
    transport: Option<Arc<dyn Transport>>,
    timeout: Duration,
    cache: bool,
    max_cache_size: usize,
    retry_once: bool,
    rate_limit_window: Duration,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key_source: ApiKeySource::default(),
            transport: None,
            timeout: DEFAULT_TIMEOUT,
            cache: false,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            retry_once: false,
            rate_limit_window: RATE_LIMIT_WINDOW,
        }
    }

    /// Sets the upstream host. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Uses this API key ahead of the config file and environment.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key_source = self.api_key_source.explicit(key);
        self
    }

    /// Replaces the API key lookup chain.
    pub fn api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key_source = source;
        self
    }

    /// Uses a custom transport instead of `reqwest`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the per-request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables the in-memory envelope cache.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Sets how many envelopes are cached before the cache is cleared.
    pub fn max_cache_size(mut self, max_size: usize) -> Self {
        self.max_cache_size = max_size;
        self
    }

    /// Enables the single retry.
    ///
    /// When enabled, a request whose response did **not** hit the rate limit
    /// is issued once more after waiting out the rate window measured from
    /// the client's first call. A response that did hit the limit is
    /// returned as is. This looks inverted relative to retrying after
    /// throttling, and is kept that way deliberately for compatibility.
    pub fn retry_once(mut self, enabled: bool) -> Self {
        self.retry_once = enabled;
        self
    }

    /// Overrides the rate window used to pace the retry. Defaults to 60 seconds.
    pub fn rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// A missing API key is not an error here; requests fail with
    /// [`Error::ApiKeyMissing`] until one is supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is malformed or the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<Client> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let api_key = self.api_key_source.resolve()?;
        if api_key.is_none() {
            tracing::warn!("No API key resolved; requests will fail until one is provided");
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        let cache = self
            .cache
            .then(|| Mutex::new(ResponseCache::new(self.max_cache_size)));

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                api_key,
                retry_once: self.retry_once,
                rate_limit_window: self.rate_limit_window,
                cache,
                stats: Mutex::new(CallStats::default()),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportFuture;
    use crate::RawResponse;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with `bodies` in order, repeating the last one.
    struct Recording {
        bodies: Vec<&'static str>,
        urls: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl Recording {
        fn new(body: &'static str) -> Arc<Self> {
            Self::sequence(vec![body])
        }

        fn sequence(bodies: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                bodies,
                urls: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Transport for Recording {
        fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.urls).push(url.to_string());
            let body = self.bodies[call.min(self.bodies.len() - 1)];
            Box::pin(async move {
                Ok(RawResponse::new(StatusCode::OK, Some("application/json"), body))
            })
        }
    }

    fn keyless_source() -> ApiKeySource {
        ApiKeySource::default()
            .without_config_file()
            .env_var("VANTAGE_CLIENT_TEST_UNSET")
    }

    fn client_with(transport: Arc<Recording>) -> ClientBuilder {
        Client::builder()
            .api_key_source(keyless_source())
            .api_key("test-key")
            .base_url("https://api.test/")
            .unwrap()
            .transport(transport)
    }

    #[tokio::test]
    async fn test_url_is_unencoded_and_carries_key() {
        let transport = Recording::new(r#"{"a": 1}"#);
        let client = client_with(transport.clone()).build().unwrap();

        let request = Request::new()
            .with_param("symbol", "TSLA")
            .with_param("function", "OVERVIEW");
        client.fetch(request).await.unwrap();

        let urls = lock(&transport.urls);
        assert_eq!(
            urls[0],
            "https://api.test/query?symbol=TSLA&function=OVERVIEW&apikey=test-key"
        );
    }

    #[tokio::test]
    async fn test_caller_key_is_not_replaced() {
        let transport = Recording::new(r#"{"a": 1}"#);
        let client = client_with(transport.clone()).build().unwrap();

        client
            .fetch(Request::new().with_param(API_KEY_PARAM, "caller-key"))
            .await
            .unwrap();

        assert!(lock(&transport.urls)[0].ends_with("apikey=caller-key"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_transport() {
        let transport = Recording::new("{}");
        let client = Client::builder()
            .api_key_source(keyless_source())
            .transport(transport.clone())
            .build()
            .unwrap();

        assert!(!client.has_api_key());
        let result = client.fetch(Request::new().with_param("symbol", "IBM")).await;

        assert!(matches!(result, Err(Error::ApiKeyMissing)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_call_stats_track_first_attempt() {
        let transport = Recording::new(r#"{"a": 1}"#);
        let client = client_with(transport).build().unwrap();
        assert!(client.first_attempt().is_none());

        client.fetch(Request::new()).await.unwrap();
        let first = client.first_attempt();
        client.fetch(Request::new()).await.unwrap();

        assert!(first.is_some());
        assert_eq!(client.first_attempt(), first);
        assert_eq!(client.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_fires_when_limit_not_reached() {
        let transport = Recording::new(r#"{"Global Quote": {"01. symbol": "IBM"}}"#);
        let client = client_with(transport.clone())
            .retry_once(true)
            .rate_limit_window(Duration::ZERO)
            .build()
            .unwrap();

        let envelope = client
            .fetch(Request::new().with_param("symbol", "IBM"))
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_when_limit_reached() {
        let transport =
            Recording::new(r#"{"Note": "API call frequency is 5 calls per minute and 500 calls per day."}"#);
        let client = client_with(transport.clone())
            .retry_once(true)
            .rate_limit_window(Duration::ZERO)
            .build()
            .unwrap();

        let envelope = client.fetch(Request::new()).await.unwrap();

        assert!(envelope.limit_reached);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_by_default() {
        let transport = Recording::new(r#"{"a": 1}"#);
        let client = client_with(transport.clone()).build().unwrap();

        client.fetch(Request::new()).await.unwrap();
        client.fetch(Request::new()).await.unwrap();

        assert_eq!(client.cache_len(), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    const THROTTLED: &str =
        r#"{"Note": "Our standard API call frequency is 5 calls per minute and 500 calls per day."}"#;

    #[tokio::test]
    async fn test_throttled_envelope_is_not_cached() {
        let transport = Recording::sequence(vec![
            THROTTLED,
            r#"{"Global Quote": {"01. symbol": "IBM"}}"#,
        ]);
        let client = client_with(transport.clone()).cache(true).build().unwrap();
        let request = Request::new()
            .with_param("function", "GLOBAL_QUOTE")
            .with_param("symbol", "IBM");

        let first = client.fetch(request.clone()).await.unwrap();
        assert!(first.limit_reached);
        assert_eq!(client.cache_len(), 0);

        let second = client.fetch(request.clone()).await.unwrap();
        assert!(second.success);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.cache_len(), 1);

        let third = client.fetch(request).await.unwrap();
        assert_eq!(third, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_envelope_is_not_cached() {
        let transport = Recording::new("{}");
        let client = client_with(transport.clone()).cache(true).build().unwrap();

        let envelope = client
            .fetch(Request::new().with_param("symbol", "BADSYM"))
            .await
            .unwrap();
        client
            .fetch(Request::new().with_param("symbol", "BADSYM"))
            .await
            .unwrap();

        assert!(!envelope.success);
        assert_eq!(client.cache_len(), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_out_rate_window() {
        let transport = Recording::new(r#"{"Global Quote": {"01. symbol": "IBM"}}"#);
        let client = client_with(transport.clone())
            .retry_once(true)
            .rate_limit_window(Duration::from_secs(60))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        client.fetch(Request::new()).await.unwrap();
        let waited = started.elapsed();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(waited > Duration::from_secs(59), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(60), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_response_returns_without_waiting() {
        let transport = Recording::new(THROTTLED);
        let client = client_with(transport)
            .retry_once(true)
            .rate_limit_window(Duration::from_secs(60))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        client.fetch(Request::new()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
