use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::join;
use tracing::warn;

use crate::cache::TtlCache;
use crate::models::{Holding, Profile, Quote};

const QUOTE_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const PROFILE_BASE_URL: &str = "https://financialmodelingprep.com/api/v3/profile";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type FetchError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Latest traded price for a ticker. Failures come back as
    /// `Quote { price: None }`, never as an error.
    async fn fetch_price(&self, ticker: &str) -> Quote;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Dividend yield and analyst target for a symbol. Failures come back as
    /// `Profile::failed()`, never as an error.
    async fn fetch_profile(&self, symbol: &str) -> Profile;
}

// Yahoo v8 chart response, pared down to the one field we read.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

// First element of the FMP profile array.
#[derive(Debug, Deserialize)]
struct FmpProfile {
    #[serde(rename = "dividendYield")]
    dividend_yield: Option<f64>,
    #[serde(rename = "targetPrice")]
    target_price: Option<f64>,
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Provider yields are raw fractions (0.045); the dashboard works in
/// percentages rounded to 2 dp (4.5).
pub fn yield_to_pct(raw: f64) -> f64 {
    round_to(raw * 100.0, 2)
}

pub struct YahooQuoteClient {
    client: Client,
}

impl YahooQuoteClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    async fn request_price(&self, ticker: &str) -> Result<f64, FetchError> {
        let url = format!("{}/{}", QUOTE_BASE_URL, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            // Yahoo rejects requests without a browser-looking agent.
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChartResponse = response.json().await?;
        let price = parsed
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    results.remove(0).meta.regular_market_price
                }
            })
            .ok_or("missing regularMarketPrice in chart response")?;
        Ok(round_to(price, 4))
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteClient {
    async fn fetch_price(&self, ticker: &str) -> Quote {
        match self.request_price(ticker).await {
            Ok(price) => Quote { price: Some(price) },
            Err(e) => {
                warn!(ticker, error = %e, "quote fetch failed");
                Quote::failed()
            }
        }
    }
}

pub struct FmpProfileClient {
    client: Client,
    api_key: String,
}

impl FmpProfileClient {
    pub fn new(api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, api_key })
    }

    async fn request_profile(&self, symbol: &str) -> Result<Profile, FetchError> {
        let url = format!("{}/{}", PROFILE_BASE_URL, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let mut records: Vec<FmpProfile> = response.json().await?;
        if records.is_empty() {
            return Err("empty profile result set".into());
        }
        let record = records.remove(0);
        Ok(Profile {
            yield_pct: record.dividend_yield.map(yield_to_pct),
            target: record.target_price,
        })
    }
}

#[async_trait]
impl ProfileProvider for FmpProfileClient {
    async fn fetch_profile(&self, symbol: &str) -> Profile {
        match self.request_profile(symbol).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(symbol, error = %e, "profile fetch failed");
                Profile::failed()
            }
        }
    }
}

/// Cached front for the two providers. Failed fetches are cached for the
/// same window as successes so a dead provider is retried once per TTL
/// window, not once per request.
pub struct MarketData {
    quotes: Arc<dyn QuoteProvider>,
    profiles: Arc<dyn ProfileProvider>,
    quote_cache: TtlCache<Quote>,
    profile_cache: TtlCache<Profile>,
}

impl MarketData {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        profiles: Arc<dyn ProfileProvider>,
        quote_ttl: Duration,
        profile_ttl: Duration,
    ) -> Self {
        Self {
            quotes,
            profiles,
            quote_cache: TtlCache::new(quote_ttl),
            profile_cache: TtlCache::new(profile_ttl),
        }
    }

    pub async fn quote(&self, ticker: &str) -> Quote {
        if let Some(quote) = self.quote_cache.get(ticker).await {
            return quote;
        }
        let quote = self.quotes.fetch_price(ticker).await;
        self.quote_cache
            .insert(ticker.to_string(), quote.clone())
            .await;
        quote
    }

    pub async fn profile(&self, symbol: &str) -> Profile {
        if let Some(profile) = self.profile_cache.get(symbol).await {
            return profile;
        }
        let profile = self.profiles.fetch_profile(symbol).await;
        self.profile_cache
            .insert(symbol.to_string(), profile.clone())
            .await;
        profile
    }

    /// Fan out the per-row quote and profile fetches with a bounded number
    /// of rows in flight. Output order matches input order.
    pub async fn fetch_all(
        &self,
        holdings: &[Holding],
        suffix: &str,
        concurrency: usize,
    ) -> Vec<(Quote, Profile)> {
        let fetches: Vec<_> = holdings
            .iter()
            .map(|holding| {
                let ticker = holding.ticker(suffix);
                let symbol = holding.symbol.clone();
                async move { join!(self.quote(&ticker), self.profile(&symbol)) }
            })
            .collect();
        stream::iter(fetches)
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

// Mock providers for tests and handler mocks.
pub struct MockQuoteProvider {
    prices: std::collections::HashMap<String, f64>,
    pub calls: std::sync::atomic::AtomicUsize,
}

impl MockQuoteProvider {
    #[allow(dead_code)]
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    async fn fetch_price(&self, ticker: &str) -> Quote {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Quote {
            price: self.prices.get(ticker).copied(),
        }
    }
}

pub struct MockProfileProvider {
    profiles: std::collections::HashMap<String, Profile>,
}

impl MockProfileProvider {
    #[allow(dead_code)]
    pub fn new(profiles: &[(&str, Profile)]) -> Self {
        Self {
            profiles: profiles
                .iter()
                .map(|(s, p)| (s.to_string(), p.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileProvider for MockProfileProvider {
    async fn fetch_profile(&self, symbol: &str) -> Profile {
        self.profiles
            .get(symbol)
            .cloned()
            .unwrap_or_else(Profile::failed)
    }
}
