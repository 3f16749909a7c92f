use std::sync::Arc;

use tracing::info;

use crate::adapters::CoinbaseClient;
use crate::config::AppConfig;
use crate::error::Result;

use super::ExchangeClient;

/// Create the runtime exchange client from `AppConfig`.
///
/// `dry_run` from the command line wins over the config file when set.
pub fn build_exchange_client(
    app_config: &AppConfig,
    dry_run: bool,
) -> Result<Arc<dyn ExchangeClient>> {
    let dry_run = dry_run || app_config.dry_run.enabled;
    let client = CoinbaseClient::from_env(Some(&app_config.exchange.rest_url), dry_run)?;
    info!(
        rest_url = client.base_url(),
        dry_run, "exchange client initialized"
    );
    Ok(Arc::new(client))
}
