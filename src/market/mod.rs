//! Price lookup gateway over the Finnhub market-data API.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::{CandlePoint, CompanyProfile, Quote, SymbolMatch};

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Thin client for the upstream market-data provider. Requests carry a fixed
/// timeout and a bounded retry with exponential backoff for transport
/// failures and upstream 5xx; 4xx responses surface directly with the
/// upstream message preserved.
#[derive(Clone)]
pub struct MarketDataClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MarketDataClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), api_key)
    }

    /// Lets tests point the client at a mock server.
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url,
            api_key,
        }
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote, AppError> {
        let raw: RawQuote = self.get("/quote", &[("symbol", symbol)]).await?;
        Ok(raw.into_quote(symbol))
    }

    /// Concurrent quote fan-out where every symbol must resolve; the first
    /// failure fails the batch.
    pub async fn quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, AppError> {
        try_join_all(symbols.iter().map(|symbol| self.quote(symbol))).await
    }

    /// Concurrent quote fan-out keyed by symbol. Lookups that fail are
    /// dropped from the map (and logged); callers decide how to degrade.
    pub async fn quote_map(&self, symbols: &[String]) -> HashMap<String, Quote> {
        let fetches = symbols
            .iter()
            .map(|symbol| async move { (symbol.clone(), self.quote(symbol).await) });

        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(symbol, result)| match result {
                Ok(quote) => Some((symbol, quote)),
                Err(e) => {
                    warn!("price lookup failed for {symbol}: {e}");
                    None
                }
            })
            .collect()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, AppError> {
        let raw: RawSearch = self.get("/search", &[("q", query)]).await?;
        Ok(raw.result)
    }

    pub async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, AppError> {
        self.get("/stock/profile2", &[("symbol", symbol)]).await
    }

    pub async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<CandlePoint>, AppError> {
        let from = from.to_string();
        let to = to.to_string();
        let raw: RawCandles = self
            .get(
                "/stock/candle",
                &[
                    ("symbol", symbol),
                    ("resolution", resolution),
                    ("from", &from),
                    ("to", &to),
                ],
            )
            .await?;
        Ok(raw.into_points())
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .get(&url)
                .header("X-Finnhub-Token", &self.api_key)
                .query(query)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(|e| {
                        AppError::ExternalService(format!(
                            "malformed market data response: {e}"
                        ))
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    // Only upstream 5xx is worth retrying.
                    if !status.is_server_error() || attempt + 1 >= MAX_ATTEMPTS {
                        return Err(upstream_error(status.as_u16(), &body));
                    }
                }
                Err(e) => {
                    if attempt + 1 >= MAX_ATTEMPTS {
                        return Err(AppError::ExternalService(format!(
                            "market data request failed: {e}"
                        )));
                    }
                }
            }

            tokio::time::sleep(retry_delay(attempt)).await;
            attempt += 1;
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS * 2_u64.pow(attempt))
}

fn upstream_error(status: u16, body: &str) -> AppError {
    let message = body.trim();
    if message.is_empty() {
        AppError::ExternalService(format!("market data provider returned status {status}"))
    } else {
        AppError::ExternalService(format!(
            "market data provider returned status {status}: {message}"
        ))
    }
}

// ── Upstream wire formats ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    t: Option<i64>,
}

impl RawQuote {
    fn into_quote(self, symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_uppercase(),
            current_price: self.c.unwrap_or_default(),
            change: self.d.unwrap_or_default(),
            percent_change: self.dp.unwrap_or_default(),
            high_price: self.h.unwrap_or_default(),
            low_price: self.l.unwrap_or_default(),
            open_price: self.o.unwrap_or_default(),
            previous_close: self.pc.unwrap_or_default(),
            timestamp: self.t.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSearch {
    result: Vec<SymbolMatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCandles {
    s: String,
    c: Vec<f64>,
    h: Vec<f64>,
    l: Vec<f64>,
    o: Vec<f64>,
    t: Vec<i64>,
    v: Vec<f64>,
}

impl RawCandles {
    fn into_points(self) -> Vec<CandlePoint> {
        if self.s != "ok" {
            return Vec::new();
        }

        let len = [
            self.c.len(),
            self.h.len(),
            self.l.len(),
            self.o.len(),
            self.t.len(),
            self.v.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);

        (0..len)
            .map(|i| CandlePoint {
                timestamp: self.t[i],
                open: self.o[i],
                high: self.h[i],
                low: self.l[i],
                close: self.c[i],
                volume: self.v[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> MarketDataClient {
        MarketDataClient::with_base_url(base_url, "test-token".to_string())
    }

    fn aapl_body() -> serde_json::Value {
        json!({
            "c": 150.25,
            "d": 1.5,
            "dp": 1.01,
            "h": 151.0,
            "l": 148.5,
            "o": 149.0,
            "pc": 148.75,
            "t": 1_700_000_000
        })
    }

    #[test]
    fn retry_delays_double_from_base() {
        assert_eq!(retry_delay(0), Duration::from_millis(250));
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_millis(1000));
    }

    #[test]
    fn quote_mapping_defaults_missing_fields_to_zero() {
        let raw: RawQuote = serde_json::from_str(r#"{"c": 185.5, "dp": 1.2}"#).unwrap();
        let quote = raw.into_quote("aapl");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.current_price, 185.5);
        assert_eq!(quote.percent_change, 1.2);
        assert_eq!(quote.previous_close, 0.0);
        assert_eq!(quote.timestamp, 0);
    }

    #[test]
    fn quote_mapping_tolerates_null_fields() {
        let raw: RawQuote =
            serde_json::from_str(r#"{"c": null, "d": null, "dp": null, "t": null}"#).unwrap();
        let quote = raw.into_quote("NOPE");
        assert!(quote.is_empty());
    }

    #[test]
    fn no_data_candles_map_to_empty() {
        let raw: RawCandles = serde_json::from_str(r#"{"s": "no_data"}"#).unwrap();
        assert!(raw.into_points().is_empty());
    }

    #[test]
    fn candles_zip_by_shortest_series() {
        let raw = RawCandles {
            s: "ok".to_string(),
            c: vec![10.0, 11.0, 12.0],
            h: vec![10.5, 11.5],
            l: vec![9.5, 10.5],
            o: vec![9.8, 10.8],
            t: vec![100, 200],
            v: vec![1000.0, 2000.0],
        };

        let points = raw.into_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 100);
        assert_eq!(points[1].close, 11.0);
    }

    #[tokio::test]
    async fn quote_maps_upstream_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "AAPL"))
            .and(header("X-Finnhub-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(aapl_body()))
            .mount(&server)
            .await;

        let quote = test_client(server.uri()).quote("AAPL").await.unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.current_price, 150.25);
        assert_eq!(quote.previous_close, 148.75);
        assert_eq!(quote.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn server_errors_retry_then_preserve_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream exploded"))
            .expect(u64::from(MAX_ATTEMPTS))
            .mount(&server)
            .await;

        let err = test_client(server.uri()).quote("AAPL").await.unwrap_err();
        match err {
            AppError::ExternalService(message) => {
                assert!(message.contains("502"), "got: {message}");
                assert!(message.contains("upstream exploded"), "got: {message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(server.uri()).quote("AAPL").await.unwrap_err();
        match err {
            AppError::ExternalService(message) => {
                assert!(message.contains("invalid api key"), "got: {message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn quote_map_drops_failing_symbols() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(aapl_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "BAD"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown symbol"))
            .mount(&server)
            .await;

        let symbols = vec!["AAPL".to_string(), "BAD".to_string()];
        let quotes = test_client(server.uri()).quote_map(&symbols).await;

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["AAPL"].current_price, 150.25);
        assert!(!quotes.contains_key("BAD"));
    }

    #[tokio::test]
    async fn search_maps_result_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "apple"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "result": [{
                    "description": "APPLE INC",
                    "displaySymbol": "AAPL",
                    "symbol": "AAPL",
                    "type": "Common Stock"
                }]
            })))
            .mount(&server)
            .await;

        let matches = test_client(server.uri()).search("apple").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].symbol, "AAPL");
        assert_eq!(matches[0].kind, "Common Stock");
    }
}
