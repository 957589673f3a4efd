use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::sync::Arc;
use tracing::info;
use xbench::cli::QueryArgs;
use xbench::core::config::AppConfig;
use xbench::core::portfolio::PortfolioReturn;
use xbench::core::window::{Period, ReturnWindow};
use xbench::service::BenchmarkService;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mount(server: &MockServer, url_path: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    pub fn yahoo_chart(timestamps: &[i64], closes: &[f64]) -> String {
        serde_json::json!({
            "chart": {
                "result": [{
                    "timestamp": timestamps,
                    "indicators": { "quote": [{ "close": closes }] }
                }],
                "error": null
            }
        })
        .to_string()
    }
}

fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days) - Duration::hours(2)
}

fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
    let config_path = dir.join("config.yaml");
    let config = format!(
        r#"
instruments:
  - id: "BOVA11"
    name: "BOVA11 (Ibovespa)"
    kind: price_asset
    source:
      provider: yahoo
      symbol: "BOVA11.SA"
  - id: "FIXA11"
    name: "FIXA11 (Pre)"
    kind: price_asset
    source:
      provider: yahoo
      symbol: "FIXA11.SA"
  - id: "CDI"
    name: "CDI"
    kind: rate
    source:
      provider: bcb
      series: 12
portfolio:
  name: "Test Mix"
  components:
    - instrument: "BOVA11"
      weight: 0.5
    - instrument: "FIXA11"
      weight: 0.3
    - instrument: "CDI"
      weight: 0.2
providers:
  yahoo:
    base_url: "{base_url}"
  bcb:
    base_url: "{base_url}"
returns:
  retries: 0
data_path: "{}"
"#,
        dir.join("data").display()
    );
    fs::write(&config_path, config).expect("Failed to write config file");
    config_path
}

#[test_log::test(tokio::test)]
async fn test_sync_then_query_flow() {
    let now = Utc::now();
    let server = wiremock::MockServer::start().await;

    let stamps: Vec<i64> = (1..=4).rev().map(|d| days_ago(now, d).timestamp()).collect();
    test_utils::mount(
        &server,
        "/v8/finance/chart/BOVA11.SA",
        test_utils::yahoo_chart(&stamps, &[100.0, 101.0, 102.0, 99.0]),
    )
    .await;
    test_utils::mount(
        &server,
        "/v8/finance/chart/FIXA11.SA",
        test_utils::yahoo_chart(&stamps, &[50.0, 51.0, 51.5, 52.5]),
    )
    .await;
    let rates: Vec<serde_json::Value> = (1..=4)
        .rev()
        .map(|d| {
            serde_json::json!({
                "data": days_ago(now, d).format("%d/%m/%Y").to_string(),
                "valor": "0,04"
            })
        })
        .collect();
    test_utils::mount(
        &server,
        "/dados/serie/bcdata.sgs.12/dados",
        serde_json::Value::Array(rates).to_string(),
    )
    .await;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), &server.uri());
    let config_path = config_path.to_str().unwrap();

    let result = xbench::run_command(
        xbench::AppCommand::Sync {
            period: Period::OneYear,
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Sync failed with: {:?}", result.err());

    for command in [
        xbench::AppCommand::Returns(QueryArgs::default()),
        xbench::AppCommand::Chart(QueryArgs {
            json: true,
            ..Default::default()
        }),
    ] {
        let result = xbench::run_command(command, Some(config_path)).await;
        assert!(result.is_ok(), "Query failed with: {:?}", result.err());
    }

    let config = AppConfig::load_from_path(config_path).unwrap();
    let store = xbench::store::open_store(&config).unwrap();
    let service = BenchmarkService::from_config(&config, Arc::clone(&store));
    let window = ReturnWindow::from_period(Period::OneYear, Utc::now());
    let ids = service.all_ids();

    let report = service.window_returns(&ids, window, true).await.unwrap();
    let value = |id: &str| {
        report
            .instruments
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.outcome.as_ref().ok())
            .and_then(|r| r.value)
            .unwrap()
    };
    info!(?report, "Window returns after sync");

    assert!((value("BOVA11") - -1.0).abs() < 1e-9);
    assert!((value("FIXA11") - 5.0).abs() < 1e-9);
    let cdi = (1.0004f64.powi(4) - 1.0) * 100.0;
    assert!((value("CDI") - cdi).abs() < 1e-9);

    let expected = 0.5 * -1.0 + 0.3 * 5.0 + 0.2 * cdi;
    let portfolio = report.portfolio.unwrap();
    assert!(matches!(portfolio, PortfolioReturn::Complete { .. }));
    assert!((portfolio.value().unwrap() - expected).abs() < 1e-9);

    let chart = service.chart(&ids, window, true).await.unwrap();
    let last = chart.points.last().unwrap();
    assert!((last.values["PORTFOLIO"] - expected).abs() < 1e-9);
    assert!(chart.axis.min <= -1.0 && chart.axis.max >= 5.0);
}

#[test_log::test(tokio::test)]
async fn test_partial_sync_degrades_portfolio() {
    let now = Utc::now();
    let server = wiremock::MockServer::start().await;
    let stamps: Vec<i64> = (1..=3).rev().map(|d| days_ago(now, d).timestamp()).collect();
    test_utils::mount(
        &server,
        "/v8/finance/chart/BOVA11.SA",
        test_utils::yahoo_chart(&stamps, &[10.0, 10.5, 11.0]),
    )
    .await;
    test_utils::mount(
        &server,
        "/v8/finance/chart/FIXA11.SA",
        test_utils::yahoo_chart(&stamps, &[20.0, 20.0, 21.0]),
    )
    .await;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), &server.uri());
    let config_path = config_path.to_str().unwrap();

    // The BCB endpoint is not mocked, so CDI fails while the others sync.
    let result = xbench::run_command(
        xbench::AppCommand::Sync {
            period: Period::OneYear,
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Sync failed with: {:?}", result.err());

    let config = AppConfig::load_from_path(config_path).unwrap();
    let store = xbench::store::open_store(&config).unwrap();
    let service = BenchmarkService::from_config(&config, store);
    let window = ReturnWindow::from_period(Period::OneYear, Utc::now());

    let report = service
        .window_returns(&service.all_ids(), window, true)
        .await
        .unwrap();
    match report.portfolio.unwrap() {
        PortfolioReturn::Partial {
            value,
            coverage,
            missing,
            ..
        } => {
            assert_eq!(missing, vec!["CDI".to_string()]);
            assert!((coverage - 0.8).abs() < 1e-9);
            assert!((value - (0.5 * 10.0 + 0.3 * 5.0) / 0.8).abs() < 1e-9);
        }
        other => panic!("Expected partial portfolio, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file() {
    let result = xbench::run_command(
        xbench::AppCommand::Returns(QueryArgs::default()),
        Some("/nonexistent/xbench/config.yaml"),
    )
    .await;
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file")
    );
}
