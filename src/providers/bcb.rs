//! Daily rate series from the Brazilian Central Bank SGS API.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::auth::{CredentialProvider, with_token};
use crate::core::history::HistoryProvider;
use crate::core::instrument::{InstrumentSource, PriceObservation};
use crate::providers::util::with_retry;

const DATE_FORMAT: &str = "%d/%m/%Y";

pub struct BcbRateProvider {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    retries: usize,
    retry_delay_ms: u64,
}

impl BcbRateProvider {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Self {
        BcbRateProvider {
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
struct SgsEntry {
    data: String,
    valor: String,
}

/// Parses one SGS entry. Values may use a decimal comma.
fn parse_entry(entry: &SgsEntry) -> Result<PriceObservation> {
    let date = NaiveDate::parse_from_str(&entry.data, DATE_FORMAT)
        .with_context(|| format!("Invalid SGS date: {}", entry.data))?;
    let rate: f64 = entry
        .valor
        .trim()
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid SGS value: {}", entry.valor))?;

    Ok(PriceObservation::new(
        date.and_time(NaiveTime::MIN).and_utc(),
        rate,
    ))
}

#[async_trait]
impl HistoryProvider for BcbRateProvider {
    fn supports(&self, source: &InstrumentSource) -> bool {
        matches!(source, InstrumentSource::Bcb { .. })
    }

    #[instrument(name = "BcbRateFetch", skip(self, source), fields(source = ?source))]
    async fn fetch_history(
        &self,
        source: &InstrumentSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let InstrumentSource::Bcb { series } = source else {
            bail!("BCB provider cannot fetch {:?}", source);
        };

        let url = format!(
            "{}/dados/serie/bcdata.sgs.{}/dados?formato=json&dataInicial={}&dataFinal={}",
            self.base_url,
            series,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        );
        debug!("Requesting rate series from {}", url);

        let token = self.credentials.token().await?;
        let client = reqwest::Client::builder().user_agent("xbench/1.0").build()?;
        let response = with_retry(
            || with_token(client.get(&url), token.as_deref()).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} for SGS series: {}", e, series))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for SGS series: {}", response.status(), series);
        }

        let text = response.text().await?;
        let entries: Vec<SgsEntry> = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for SGS series {}: {}", series, e))?;

        let mut observations = Vec::with_capacity(entries.len());
        for entry in &entries {
            match parse_entry(entry) {
                Ok(observation) => observations.push(observation),
                Err(e) => debug!("Skipping SGS entry: {e}"),
            }
        }
        debug!("Fetched {} rates for SGS series {}", observations.len(), series);
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::core::auth::NoCredentials;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_parse_entry_accepts_decimal_comma() {
        let entry = SgsEntry {
            data: "02/01/2024".to_string(),
            valor: "0,043739".to_string(),
        };
        let observation = parse_entry(&entry).unwrap();
        assert_eq!(
            observation.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(observation.price, 0.043739);
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dados/serie/bcdata.sgs.12/dados"))
            .and(query_param("formato", "json"))
            .and(query_param("dataInicial", "01/01/2024"))
            .and(query_param("dataFinal", "31/01/2024"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"data": "02/01/2024", "valor": "0.043739"},
                    {"data": "03/01/2024", "valor": "0,043739"},
                    {"data": "bad", "valor": "0.04"}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = BcbRateProvider::new(&mock_server.uri(), Arc::new(NoCredentials));
        let (start, end) = window();
        let observations = provider
            .fetch_history(&InstrumentSource::Bcb { series: 12 }, start, end)
            .await
            .unwrap();

        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.price == 0.043739));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dados/serie/bcdata.sgs.12/dados"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"erro": "x"}"#))
            .mount(&mock_server)
            .await;

        let provider = BcbRateProvider::new(&mock_server.uri(), Arc::new(NoCredentials));
        let (start, end) = window();
        let result = provider
            .fetch_history(&InstrumentSource::Bcb { series: 12 }, start, end)
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for SGS series 12")
        );
    }
}
