//! Typed endpoint methods.
//!
//! Each method supplies the upstream `function` and its default parameters,
//! merges the caller's input over them with [`build_request`] and hands the
//! result to the shared pipeline. Methods that take `impl Into<RequestInput>`
//! accept either a bare symbol or a full [`Request`]; caller values always
//! win over the defaults.

use crate::models::{
    AccountingReport, Calendar, CompanyOverview, CsvResponse, DataSeries, EarningsEvent,
    IpoEvent, MarketMovers, MarketStatus, Model, NewsSentiment, Quote, TechnicalIndicator,
    TickerSearch,
};
use crate::request::{build_request, DataType, Request, RequestInput, DATATYPE_PARAM, FUNCTION_PARAM};
use crate::{Client, Error, Result};

fn defaults(function: &str) -> Request {
    Request::new().with_param(FUNCTION_PARAM, function)
}

fn reject_csv(request: &Request) -> Result<()> {
    if request.datatype() == DataType::Csv {
        return Err(Error::CsvNotSupported {
            function: request.function().unwrap_or_default().to_string(),
        });
    }
    Ok(())
}

/// Commodity price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Commodity {
    Wti,
    Brent,
    NaturalGas,
    Copper,
    Aluminum,
    Wheat,
    Corn,
    Cotton,
    Sugar,
    Coffee,
    /// Global price index of all commodities.
    AllCommodities,
}

impl Commodity {
    /// The upstream `function` value.
    pub fn function(&self) -> &'static str {
        match self {
            Commodity::Wti => "WTI",
            Commodity::Brent => "BRENT",
            Commodity::NaturalGas => "NATURAL_GAS",
            Commodity::Copper => "COPPER",
            Commodity::Aluminum => "ALUMINUM",
            Commodity::Wheat => "WHEAT",
            Commodity::Corn => "CORN",
            Commodity::Cotton => "COTTON",
            Commodity::Sugar => "SUGAR",
            Commodity::Coffee => "COFFEE",
            Commodity::AllCommodities => "ALL_COMMODITIES",
        }
    }

    fn default_interval(&self) -> &'static str {
        match self {
            Commodity::Wti | Commodity::Brent | Commodity::NaturalGas => "daily",
            _ => "monthly",
        }
    }
}

/// US economic indicator series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EconomicIndicator {
    RealGdp,
    RealGdpPerCapita,
    TreasuryYield,
    FederalFundsRate,
    Cpi,
    Inflation,
    RetailSales,
    DurableGoods,
    Unemployment,
    NonfarmPayroll,
}

impl EconomicIndicator {
    /// The upstream `function` value.
    pub fn function(&self) -> &'static str {
        match self {
            EconomicIndicator::RealGdp => "REAL_GDP",
            EconomicIndicator::RealGdpPerCapita => "REAL_GDP_PER_CAPITA",
            EconomicIndicator::TreasuryYield => "TREASURY_YIELD",
            EconomicIndicator::FederalFundsRate => "FEDERAL_FUNDS_RATE",
            EconomicIndicator::Cpi => "CPI",
            EconomicIndicator::Inflation => "INFLATION",
            EconomicIndicator::RetailSales => "RETAIL_SALES",
            EconomicIndicator::DurableGoods => "DURABLES",
            EconomicIndicator::Unemployment => "UNEMPLOYMENT",
            EconomicIndicator::NonfarmPayroll => "NONFARM_PAYROLL",
        }
    }

    fn defaults(&self) -> Request {
        let request = defaults(self.function());
        match self {
            EconomicIndicator::RealGdp => request.with_param("interval", "annual"),
            EconomicIndicator::TreasuryYield => request
                .with_param("interval", "monthly")
                .with_param("maturity", "10year"),
            EconomicIndicator::FederalFundsRate | EconomicIndicator::Cpi => {
                request.with_param("interval", "monthly")
            }
            _ => request,
        }
    }
}

/// Quotes and stock time series.
impl Client {
    /// Latest price and volume for one symbol (`GLOBAL_QUOTE`).
    ///
    /// An upstream answer of `{"Global Quote": {}}` is reported as unsuccessful.
    pub async fn global_quote(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.fetch_with_defaults(&defaults("GLOBAL_QUOTE"), input).await
    }

    /// Intraday series; defaults to 5-minute bars, compact output.
    pub async fn intraday(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        let defaults = defaults("TIME_SERIES_INTRADAY")
            .with_param("interval", "5min")
            .with_param("outputsize", "compact");
        self.fetch_with_defaults(&defaults, input).await
    }

    pub async fn daily(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        let defaults = defaults("TIME_SERIES_DAILY").with_param("outputsize", "compact");
        self.fetch_with_defaults(&defaults, input).await
    }

    pub async fn daily_adjusted(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        let defaults = defaults("TIME_SERIES_DAILY_ADJUSTED").with_param("outputsize", "compact");
        self.fetch_with_defaults(&defaults, input).await
    }

    pub async fn weekly(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.fetch_with_defaults(&defaults("TIME_SERIES_WEEKLY"), input).await
    }

    pub async fn weekly_adjusted(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.fetch_with_defaults(&defaults("TIME_SERIES_WEEKLY_ADJUSTED"), input)
            .await
    }

    pub async fn monthly(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.fetch_with_defaults(&defaults("TIME_SERIES_MONTHLY"), input).await
    }

    pub async fn monthly_adjusted(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.fetch_with_defaults(&defaults("TIME_SERIES_MONTHLY_ADJUSTED"), input)
            .await
    }
}

/// Forex and digital currencies.
impl Client {
    /// Realtime exchange rate between two currencies, physical or digital.
    pub async fn exchange_rate(&self, from: &str, to: &str) -> Result<Quote> {
        let request = defaults("CURRENCY_EXCHANGE_RATE")
            .with_param("from_currency", from)
            .with_param("to_currency", to);
        self.fetch_as(request).await
    }

    pub async fn fx_daily(&self, from: &str, to: &str) -> Result<Quote> {
        self.fx_series("FX_DAILY", from, to).await
    }

    pub async fn fx_weekly(&self, from: &str, to: &str) -> Result<Quote> {
        self.fx_series("FX_WEEKLY", from, to).await
    }

    pub async fn fx_monthly(&self, from: &str, to: &str) -> Result<Quote> {
        self.fx_series("FX_MONTHLY", from, to).await
    }

    async fn fx_series(&self, function: &str, from: &str, to: &str) -> Result<Quote> {
        let request = defaults(function)
            .with_param("from_symbol", from)
            .with_param("to_symbol", to);
        self.fetch_as(request).await
    }

    /// Daily series of a digital currency; the market defaults to `USD`.
    pub async fn digital_currency_daily(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.digital_currency("DIGITAL_CURRENCY_DAILY", input).await
    }

    pub async fn digital_currency_weekly(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.digital_currency("DIGITAL_CURRENCY_WEEKLY", input).await
    }

    pub async fn digital_currency_monthly(&self, input: impl Into<RequestInput>) -> Result<Quote> {
        self.digital_currency("DIGITAL_CURRENCY_MONTHLY", input).await
    }

    async fn digital_currency(&self, function: &str, input: impl Into<RequestInput>) -> Result<Quote> {
        let defaults = defaults(function).with_param("market", "USD");
        self.fetch_with_defaults(&defaults, input).await
    }
}

/// Fundamentals. The upstream serves these as JSON only.
impl Client {
    /// Company attributes and financial ratios (`OVERVIEW`).
    pub async fn company_overview(&self, input: impl Into<RequestInput>) -> Result<CompanyOverview> {
        self.json_only("OVERVIEW", input).await
    }

    pub async fn income_statement(&self, input: impl Into<RequestInput>) -> Result<AccountingReport> {
        self.json_only("INCOME_STATEMENT", input).await
    }

    pub async fn balance_sheet(&self, input: impl Into<RequestInput>) -> Result<AccountingReport> {
        self.json_only("BALANCE_SHEET", input).await
    }

    pub async fn cash_flow(&self, input: impl Into<RequestInput>) -> Result<AccountingReport> {
        self.json_only("CASH_FLOW", input).await
    }

    /// Annual and quarterly EPS. The upstream's `annualEarnings` and
    /// `quarterlyEarnings` land in the report fields.
    pub async fn earnings(&self, input: impl Into<RequestInput>) -> Result<AccountingReport> {
        self.json_only("EARNINGS", input).await
    }

    /// Fails with [`Error::CsvNotSupported`] before any I/O when the caller asks for CSV.
    async fn json_only<M: Model>(&self, function: &str, input: impl Into<RequestInput>) -> Result<M> {
        let request = build_request(&defaults(function), input);
        reject_csv(&request)?;
        self.fetch_as(request).await
    }
}

/// Calendars. The upstream serves these as CSV only, so `datatype=csv` is forced.
impl Client {
    /// Upcoming earnings; `horizon` defaults to `3month`.
    pub async fn earnings_calendar(&self, params: Request) -> Result<Calendar<EarningsEvent>> {
        let defaults = defaults("EARNINGS_CALENDAR").with_param("horizon", "3month");
        self.csv_only(&defaults, params).await
    }

    /// Upcoming IPOs.
    pub async fn ipo_calendar(&self) -> Result<Calendar<IpoEvent>> {
        self.csv_only(&defaults("IPO_CALENDAR"), Request::new()).await
    }

    async fn csv_only<M: Model>(&self, defaults: &Request, params: Request) -> Result<M> {
        let mut request = build_request(defaults, params);
        request.set(DATATYPE_PARAM, DataType::Csv.as_str());
        self.fetch_as(request).await
    }

    /// Any function, requested as CSV. The text is in `base.csv`.
    ///
    /// ```no_run
    /// use vantage::{Client, Request};
    ///
    /// # async fn example(client: Client) -> Result<(), vantage::Error> {
    /// let response = client
    ///     .csv(Request::new()
    ///         .with_param("function", "TIME_SERIES_DAILY")
    ///         .with_param("symbol", "IBM"))
    ///     .await?;
    /// println!("{}", response.base.csv.unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn csv(&self, params: Request) -> Result<CsvResponse> {
        self.csv_only(&Request::new(), params).await
    }
}

/// Commodities and economic indicators.
impl Client {
    /// A commodity price series. Energy defaults to daily, everything else to monthly.
    pub async fn commodity(&self, commodity: Commodity, params: Request) -> Result<DataSeries> {
        let defaults = defaults(commodity.function()).with_param("interval", commodity.default_interval());
        self.fetch_with_defaults(&defaults, params).await
    }

    pub async fn economic_indicator(
        &self,
        indicator: EconomicIndicator,
        params: Request,
    ) -> Result<DataSeries> {
        self.fetch_with_defaults(&indicator.defaults(), params).await
    }
}

/// Technical indicators.
impl Client {
    /// Any indicator function. Defaults: daily interval, closing prices.
    ///
    /// ```no_run
    /// use vantage::{Client, Request};
    ///
    /// # async fn example(client: Client) -> Result<(), vantage::Error> {
    /// let bbands = client
    ///     .technical_indicator("BBANDS", Request::new()
    ///         .with_param("symbol", "IBM")
    ///         .with_param("time_period", 20))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn technical_indicator(
        &self,
        function: &str,
        input: impl Into<RequestInput>,
    ) -> Result<TechnicalIndicator> {
        let defaults = defaults(function)
            .with_param("interval", "daily")
            .with_param("series_type", "close");
        self.fetch_with_defaults(&defaults, input).await
    }

    /// Simple moving average, 20 periods by default.
    pub async fn sma(&self, input: impl Into<RequestInput>) -> Result<TechnicalIndicator> {
        self.moving_indicator("SMA", 20, input).await
    }

    /// Exponential moving average, 20 periods by default.
    pub async fn ema(&self, input: impl Into<RequestInput>) -> Result<TechnicalIndicator> {
        self.moving_indicator("EMA", 20, input).await
    }

    /// Relative strength index, 14 periods by default.
    pub async fn rsi(&self, input: impl Into<RequestInput>) -> Result<TechnicalIndicator> {
        self.moving_indicator("RSI", 14, input).await
    }

    pub async fn macd(&self, input: impl Into<RequestInput>) -> Result<TechnicalIndicator> {
        self.technical_indicator("MACD", input).await
    }

    async fn moving_indicator(
        &self,
        function: &str,
        time_period: u32,
        input: impl Into<RequestInput>,
    ) -> Result<TechnicalIndicator> {
        let defaults = defaults(function)
            .with_param("interval", "daily")
            .with_param("time_period", time_period)
            .with_param("series_type", "close");
        self.fetch_with_defaults(&defaults, input).await
    }
}

/// Search, market state and news.
impl Client {
    /// Best-matching symbols for a keyword (`SYMBOL_SEARCH`).
    pub async fn ticker_search(&self, keywords: &str) -> Result<TickerSearch> {
        self.fetch_as(defaults("SYMBOL_SEARCH").with_param("keywords", keywords))
            .await
    }

    /// Open or closed state of the major trading venues.
    pub async fn market_status(&self) -> Result<MarketStatus> {
        self.json_only("MARKET_STATUS", Request::new()).await
    }

    pub async fn top_gainers_losers(&self) -> Result<MarketMovers> {
        self.json_only("TOP_GAINERS_LOSERS", Request::new()).await
    }

    /// News articles with sentiment scores; filter with `tickers`, `topics`,
    /// `time_from`, `sort` or `limit`.
    pub async fn news_sentiment(&self, params: Request) -> Result<NewsSentiment> {
        self.json_only("NEWS_SENTIMENT", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeySource;
    use crate::transport::{Transport, TransportFuture};
    use crate::RawResponse;
    use http::StatusCode;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Capture {
        urls: Mutex<Vec<String>>,
        body: &'static str,
        content_type: &'static str,
    }

    impl Transport for Capture {
        fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
            self.urls.lock().unwrap().push(url.to_string());
            Box::pin(async move {
                Ok(RawResponse::new(StatusCode::OK, Some(self.content_type), self.body))
            })
        }
    }

    fn client(transport: Arc<Capture>) -> Client {
        Client::builder()
            .api_key_source(ApiKeySource::default().without_config_file().env_var("VANTAGE_ENDPOINTS_UNSET"))
            .api_key("k")
            .base_url("https://api.test")
            .unwrap()
            .transport(transport)
            .build()
            .unwrap()
    }

    fn json_capture(body: &'static str) -> Arc<Capture> {
        Arc::new(Capture {
            body,
            content_type: "application/json",
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_symbol_input_gets_endpoint_defaults() {
        let transport = json_capture(r#"{"Meta Data": {}, "Time Series (5min)": {"t": {}}}"#);
        let quote = client(transport.clone()).intraday("IBM").await.unwrap();

        assert_eq!(quote.symbol.as_deref(), Some("IBM"));
        assert_eq!(quote.data.len(), 1);
        assert_eq!(
            transport.urls.lock().unwrap()[0],
            "https://api.test/query?symbol=IBM&function=TIME_SERIES_INTRADAY&interval=5min&outputsize=compact&apikey=k"
        );
    }

    #[tokio::test]
    async fn test_caller_params_override_defaults() {
        let transport = json_capture(r#"{"Technical Analysis: RSI": {}}"#);
        client(transport.clone())
            .rsi(Request::new().with_param("symbol", "IBM").with_param("time_period", 7))
            .await
            .unwrap();

        let url = transport.urls.lock().unwrap()[0].clone();
        assert!(url.contains("time_period=7"));
        assert!(!url.contains("time_period=14"));
        assert!(url.contains("function=RSI"));
    }

    #[tokio::test]
    async fn test_json_only_endpoint_rejects_csv_without_io() {
        let transport = json_capture("{}");
        let client = client(transport.clone());

        let result = client
            .balance_sheet(Request::new().with_param("symbol", "IBM").with_param("datatype", "CSV"))
            .await;

        match result {
            Err(Error::CsvNotSupported { function }) => assert_eq!(function, "BALANCE_SHEET"),
            other => panic!("expected CsvNotSupported, got {:?}", other),
        }
        assert!(transport.urls.lock().unwrap().is_empty());
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_calendar_forces_csv() {
        let transport = Arc::new(Capture {
            body: "symbol,name,ipoDate,priceRangeLow,priceRangeHigh,currency,exchange\n\
                   ABCD,Abcd Inc,2024-05-01,10,12,USD,NASDAQ\n",
            content_type: "application/x-download",
            ..Default::default()
        });

        let calendar = client(transport.clone()).ipo_calendar().await.unwrap();

        assert!(calendar.base.success);
        assert_eq!(calendar.data[0].exchange, "NASDAQ");
        assert!(transport.urls.lock().unwrap()[0].contains("datatype=csv"));
    }

    #[tokio::test]
    async fn test_economic_indicator_defaults() {
        let transport = json_capture(r#"{"name": "10-Year Treasury", "data": []}"#);
        let series = client(transport.clone())
            .economic_indicator(EconomicIndicator::TreasuryYield, Request::new())
            .await
            .unwrap();

        assert_eq!(series.name.as_deref(), Some("10-Year Treasury"));
        assert!(transport.urls.lock().unwrap()[0]
            .contains("function=TREASURY_YIELD&interval=monthly&maturity=10year"));
    }

    #[test]
    fn test_commodity_functions() {
        assert_eq!(Commodity::NaturalGas.function(), "NATURAL_GAS");
        assert_eq!(Commodity::AllCommodities.function(), "ALL_COMMODITIES");
        assert_eq!(Commodity::Brent.default_interval(), "daily");
        assert_eq!(Commodity::Coffee.default_interval(), "monthly");
        assert_eq!(EconomicIndicator::DurableGoods.function(), "DURABLES");
    }
}
