pub mod bcb;
pub mod util;
pub mod yahoo_finance;

use crate::core::auth::{CredentialProvider, NoCredentials, StaticToken};
use crate::core::config::AppConfig;
use crate::core::history::HistoryProvider;
use crate::core::instrument::InstrumentSource;
use std::sync::Arc;

/// Builds the upstream providers enabled in `config`.
pub fn build_providers(config: &AppConfig) -> Vec<Arc<dyn HistoryProvider>> {
    let retries = config.returns.retries;
    let delay = config.returns.retry_delay_ms;
    let mut providers: Vec<Arc<dyn HistoryProvider>> = Vec::new();

    if let Some(yahoo) = &config.providers.yahoo {
        let credentials: Arc<dyn CredentialProvider> = match &yahoo.token {
            Some(token) => Arc::new(StaticToken::new(token)),
            None => Arc::new(NoCredentials),
        };
        providers.push(Arc::new(
            yahoo_finance::YahooHistoryProvider::new(&yahoo.base_url, credentials)
                .with_retries(retries, delay),
        ));
    }
    if let Some(bcb) = &config.providers.bcb {
        providers.push(Arc::new(
            bcb::BcbRateProvider::new(&bcb.base_url, Arc::new(NoCredentials))
                .with_retries(retries, delay),
        ));
    }
    providers
}

/// First provider able to fetch `source`.
pub fn provider_for<'a>(
    providers: &'a [Arc<dyn HistoryProvider>],
    source: &InstrumentSource,
) -> Option<&'a Arc<dyn HistoryProvider>> {
    providers.iter().find(|p| p.supports(source))
}
