//! Request orchestration: fetch every instrument's prices from the store
//! concurrently, then run the return engine over them.

use crate::core::align::{AlignOptions, AlignedPoint, SeriesInput, align_series};
use crate::core::config::AppConfig;
use crate::core::error::ReturnError;
use crate::core::instrument::{
    Instrument, InstrumentKind, PORTFOLIO_ID, PriceObservation, normalize_observations,
};
use crate::core::portfolio::{PortfolioDefinition, PortfolioReturn, apply_portfolio, portfolio_return};
use crate::core::returns::{WindowReturn, ensure_enough, window_return};
use crate::core::scale::{AxisScale, axis_scale};
use crate::core::store::PriceStore;
use crate::core::window::ReturnWindow;
use futures::future::join_all;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-instrument row of a returns report.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentReturn {
    pub id: String,
    pub name: String,
    pub kind: Option<InstrumentKind>,
    #[serde(serialize_with = "serialize_outcome")]
    pub outcome: Result<WindowReturn, ReturnError>,
}

fn serialize_outcome<S: Serializer>(
    outcome: &Result<WindowReturn, ReturnError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(1))?;
    match outcome {
        Ok(window_return) => map.serialize_entry("ok", window_return)?,
        Err(e) => map.serialize_entry("error", &e.to_string())?,
    }
    map.end()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnsReport {
    pub window: ReturnWindow,
    pub instruments: Vec<InstrumentReturn>,
    pub portfolio: Option<PortfolioReturn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub window: ReturnWindow,
    pub points: Vec<AlignedPoint>,
    pub axis: AxisScale,
    /// Instruments that could not be fetched, with the reason.
    pub failures: Vec<(String, String)>,
}

type Fetched = Result<(Instrument, Vec<PriceObservation>), ReturnError>;

pub struct BenchmarkService {
    store: Arc<dyn PriceStore>,
    instruments: Vec<Instrument>,
    portfolio: PortfolioDefinition,
    options: AlignOptions,
    fetch_timeout: Duration,
}

impl BenchmarkService {
    pub fn new(
        store: Arc<dyn PriceStore>,
        instruments: Vec<Instrument>,
        portfolio: PortfolioDefinition,
    ) -> Self {
        BenchmarkService {
            store,
            instruments,
            portfolio,
            options: AlignOptions::default(),
            fetch_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn PriceStore>) -> Self {
        Self::new(store, config.instruments.clone(), config.portfolio.clone())
            .with_options(config.returns.align_options(), config.returns.fetch_timeout())
    }

    pub fn with_options(mut self, options: AlignOptions, fetch_timeout: Duration) -> Self {
        self.options = options;
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn portfolio(&self) -> &PortfolioDefinition {
        &self.portfolio
    }

    /// Ids of every configured instrument, in configuration order.
    pub fn all_ids(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.id.clone()).collect()
    }

    fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    async fn fetch_one(&self, id: &str, window: &ReturnWindow) -> Fetched {
        let instrument = self
            .instrument(id)
            .ok_or_else(|| ReturnError::InstrumentNotFound(id.to_string()))?;

        let lookup = async {
            if !self.store.instrument_exists(id).await? {
                return Ok(None);
            }
            let observations = self
                .store
                .get_observations(id, window.start, window.end)
                .await?;
            Ok::<_, anyhow::Error>(Some(observations))
        };

        match tokio::time::timeout(self.fetch_timeout, lookup).await {
            Ok(Ok(Some(observations))) => {
                debug!("Fetched {} observations for {}", observations.len(), id);
                Ok((instrument.clone(), observations))
            }
            Ok(Ok(None)) => Err(ReturnError::InstrumentNotFound(id.to_string())),
            Ok(Err(e)) => Err(ReturnError::FetchFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ReturnError::FetchTimeout(id.to_string())),
        }
    }

    /// Fetches every id concurrently; one failure never affects the others.
    async fn fetch_all(&self, ids: &[String], window: &ReturnWindow) -> HashMap<String, Fetched> {
        let futures = ids.iter().map(|id| async move {
            let result = self.fetch_one(id, window).await;
            if let Err(e) = &result {
                warn!("Price lookup failed: {e}");
            }
            (id.clone(), result)
        });
        join_all(futures).await.into_iter().collect()
    }

    /// Requested ids plus portfolio components, deduplicated, in order.
    fn ids_to_fetch(&self, ids: &[String], include_portfolio: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let components = self
            .portfolio
            .instrument_ids()
            .filter(|_| include_portfolio)
            .map(str::to_string);
        ids.iter()
            .cloned()
            .chain(components)
            .filter(|id| id != PORTFOLIO_ID && seen.insert(id.clone()))
            .collect()
    }

    fn requested(ids: &[String], include_portfolio: bool) -> Result<bool, ReturnError> {
        let include_portfolio = include_portfolio || ids.iter().any(|id| id == PORTFOLIO_ID);
        if !include_portfolio && ids.is_empty() {
            return Err(ReturnError::EmptyRequest);
        }
        Ok(include_portfolio)
    }

    /// Window return of each requested instrument, plus the portfolio.
    ///
    /// `ids` may contain [`PORTFOLIO_ID`], which is the same as passing
    /// `include_portfolio`.
    pub async fn window_returns(
        &self,
        ids: &[String],
        window: ReturnWindow,
        include_portfolio: bool,
    ) -> Result<ReturnsReport, ReturnError> {
        let include_portfolio = Self::requested(ids, include_portfolio)?;
        let to_fetch = self.ids_to_fetch(ids, include_portfolio);
        info!(
            instruments = to_fetch.len(),
            start = %window.start,
            end = %window.end,
            "Computing window returns"
        );

        let mut fetched = self.fetch_all(&to_fetch, &window).await;
        let sanity_bound = self.options.sanity_bound;

        let mut rows: HashMap<String, InstrumentReturn> = to_fetch
            .iter()
            .map(|id| {
                let row = match fetched.remove(id) {
                    Some(Ok((instrument, observations))) => InstrumentReturn {
                        id: id.clone(),
                        name: instrument.name.clone(),
                        kind: Some(instrument.kind),
                        outcome: window_return(instrument.kind, &observations, sanity_bound),
                    },
                    Some(Err(e)) => self.failed_row(id, e),
                    None => self.failed_row(id, ReturnError::NoData),
                };
                if let Err(e) = &row.outcome {
                    debug!("No return for {}: {}", id, e);
                }
                (id.clone(), row)
            })
            .collect();

        let portfolio = include_portfolio.then(|| {
            let returns: HashMap<String, Option<f64>> = rows
                .iter()
                .map(|(id, row)| (id.clone(), row.outcome.as_ref().ok().and_then(|r| r.value)))
                .collect();
            portfolio_return(&self.portfolio, &returns)
        });

        let instruments = ids
            .iter()
            .filter(|id| id.as_str() != PORTFOLIO_ID)
            .filter_map(|id| rows.remove(id))
            .collect();

        Ok(ReturnsReport {
            window,
            instruments,
            portfolio,
        })
    }

    fn failed_row(&self, id: &str, error: ReturnError) -> InstrumentReturn {
        let instrument = self.instrument(id);
        InstrumentReturn {
            id: id.to_string(),
            name: instrument.map_or_else(|| id.to_string(), |i| i.name.clone()),
            kind: instrument.map(|i| i.kind),
            outcome: Err(error),
        }
    }

    /// Aligned accumulated-return series with its display axis.
    ///
    /// Portfolio components that were not requested take part in the
    /// alignment but are left out of the returned points.
    pub async fn chart(
        &self,
        ids: &[String],
        window: ReturnWindow,
        include_portfolio: bool,
    ) -> Result<ChartReport, ReturnError> {
        let include_portfolio = Self::requested(ids, include_portfolio)?;
        let to_fetch = self.ids_to_fetch(ids, include_portfolio);
        info!(instruments = to_fetch.len(), "Building aligned chart series");

        let fetched = self.fetch_all(&to_fetch, &window).await;
        let mut inputs = Vec::new();
        let mut failures = Vec::new();
        for id in &to_fetch {
            match fetched.get(id) {
                Some(Ok((instrument, observations))) => {
                    let observations = normalize_observations(observations);
                    match ensure_enough(&observations) {
                        Ok(()) => inputs.push(SeriesInput::new(id, instrument.kind, observations)),
                        Err(e) => {
                            debug!("No chart series for {}: {}", id, e);
                            failures.push((id.clone(), e.to_string()));
                        }
                    }
                }
                Some(Err(e)) => failures.push((id.clone(), e.to_string())),
                None => failures.push((id.clone(), ReturnError::NoData.to_string())),
            }
        }

        let mut points = align_series(&inputs, &self.options);
        if include_portfolio {
            apply_portfolio(&mut points, &self.portfolio);
        }

        let shown: HashSet<&str> = ids
            .iter()
            .map(String::as_str)
            .chain(include_portfolio.then_some(PORTFOLIO_ID))
            .collect();
        for point in &mut points {
            point.values.retain(|id, _| shown.contains(id.as_str()));
        }
        points.retain(|p| !p.values.is_empty());

        let axis = axis_scale(&points);
        debug!(points = points.len(), ?axis, "Chart series ready");

        Ok(ChartReport {
            window,
            points,
            axis,
            failures,
        })
    }
}
