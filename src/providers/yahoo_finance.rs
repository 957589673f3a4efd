use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::auth::{CredentialProvider, with_token};
use crate::core::history::HistoryProvider;
use crate::core::instrument::{InstrumentSource, PriceObservation};
use crate::providers::util::{day_start, with_retry};

/// Daily closes from the Yahoo Finance chart API.
pub struct YahooHistoryProvider {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    retries: usize,
    retry_delay_ms: u64,
}

impl YahooHistoryProvider {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Self {
        YahooHistoryProvider {
            base_url: base_url.to_string(),
            credentials,
            retries: 2,
            retry_delay_ms: 500,
        }
    }

    pub fn with_retries(mut self, retries: usize, retry_delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

/// Pairs timestamps with closes, skipping bars without a close.
fn extract_observations(item: &ChartItem) -> Vec<PriceObservation> {
    let (Some(timestamps), Some(quote)) = (
        item.timestamp.as_ref(),
        item.indicators.as_ref().and_then(|i| i.quote.first()),
    ) else {
        return Vec::new();
    };
    let Some(closes) = quote.close.as_ref() else {
        return Vec::new();
    };

    timestamps
        .iter()
        .zip(closes)
        .enumerate()
        .filter_map(|(i, (ts, close))| {
            let price = (*close)?;
            let timestamp = Utc.timestamp_opt(*ts, 0).single()?;
            let volume = quote
                .volume
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());
            Some(PriceObservation {
                timestamp: day_start(timestamp),
                price,
                volume,
            })
        })
        .collect()
}

#[async_trait]
impl HistoryProvider for YahooHistoryProvider {
    fn supports(&self, source: &InstrumentSource) -> bool {
        matches!(source, InstrumentSource::Yahoo { .. })
    }

    #[instrument(name = "YahooHistoryFetch", skip(self, source), fields(source = ?source))]
    async fn fetch_history(
        &self,
        source: &InstrumentSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let InstrumentSource::Yahoo { symbol } = source else {
            bail!("Yahoo provider cannot fetch {:?}", source);
        };

        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&period1={}&period2={}",
            self.base_url,
            symbol,
            start.timestamp(),
            end.timestamp()
        );
        debug!("Requesting price history from {}", url);

        let token = self.credentials.token().await?;
        let client = reqwest::Client::builder().user_agent("xbench/1.0").build()?;
        let response = with_retry(
            || with_token(client.get(&url), token.as_deref()).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for symbol: {}", response.status(), symbol);
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if let Some(error) = data.chart.error {
            bail!(
                "Yahoo error for {}: {}",
                symbol,
                error.description.unwrap_or_else(|| "unknown".to_string())
            );
        }

        let item = data
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        let observations = extract_observations(item);
        debug!("Fetched {} observations for {}", observations.len(), symbol);
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{NoCredentials, StaticToken};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    fn source(symbol: &str) -> InstrumentSource {
        InstrumentSource::Yahoo {
            symbol: symbol.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_history_fetch() {
        // 2024-01-02 13:00 UTC, 2024-01-03 13:00 UTC, 2024-01-04 13:00 UTC
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "regularMarketPrice": 128.5, "currency": "BRL" },
                    "timestamp": [1704200400, 1704286800, 1704373200],
                    "indicators": {
                        "quote": [{
                            "close": [126.1, null, 128.5],
                            "volume": [1000, null, 3000]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let mock_server = create_mock_server("BOVA11.SA", mock_response).await;
        let provider = YahooHistoryProvider::new(&mock_server.uri(), Arc::new(NoCredentials));
        let (start, end) = window();
        let observations = provider
            .fetch_history(&source("BOVA11.SA"), start, end)
            .await
            .unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(
            observations[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(observations[0].price, 126.1);
        assert_eq!(observations[0].volume, Some(1000));
        assert_eq!(observations[1].price, 128.5);
        assert_eq!(observations[1].volume, Some(3000));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BRL=X"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"chart": {"result": [{"timestamp": [1704200400], "indicators": {"quote": [{"close": [4.9]}]}}]}}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider =
            YahooHistoryProvider::new(&mock_server.uri(), Arc::new(StaticToken::new("secret")));
        let (start, end) = window();
        let observations = provider
            .fetch_history(&source("BRL=X"), start, end)
            .await
            .unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].volume, None);
    }

    #[tokio::test]
    async fn test_no_result_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;
        let provider = YahooHistoryProvider::new(&mock_server.uri(), Arc::new(NoCredentials));
        let (start, end) = window();

        let result = provider.fetch_history(&source("INVALID"), start, end).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_yahoo_error_payload() {
        let mock_response = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;
        let mock_server = create_mock_server("GONE", mock_response).await;
        let provider = YahooHistoryProvider::new(&mock_server.uri(), Arc::new(NoCredentials));
        let (start, end) = window();

        let result = provider.fetch_history(&source("GONE"), start, end).await;
        assert!(result.unwrap_err().to_string().contains("delisted"));
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BOVA11.SA"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = YahooHistoryProvider::new(&mock_server.uri(), Arc::new(NoCredentials))
            .with_retries(0, 0);
        let (start, end) = window();
        let result = provider.fetch_history(&source("BOVA11.SA"), start, end).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: BOVA11.SA"
        );
    }

    #[tokio::test]
    async fn test_rejects_foreign_source() {
        let provider = YahooHistoryProvider::new("http://localhost", Arc::new(NoCredentials));
        let bcb = InstrumentSource::Bcb { series: 12 };
        assert!(!provider.supports(&bcb));
        let (start, end) = window();
        assert!(provider.fetch_history(&bcb, start, end).await.is_err());
    }
}
