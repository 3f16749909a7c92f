use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::domain::rounding::increment_precision;
use crate::domain::{Currency, ProductId};
use crate::exchange::FundingSourceKind;

pub const DEFAULT_REST_URL: &str = "https://api.pro.coinbase.com";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    pub account: AccountConfig,
    pub threshold: ThresholdConfig,
    /// Top-up source; without it an insufficient balance ends the run
    #[serde(default)]
    pub funding: Option<FundingConfig>,
    #[serde(default)]
    pub conversion: Option<ConversionConfig>,
    /// Buy legs, placed in order; empty for fund-only runs
    #[serde(default)]
    pub orders: Vec<OrderLegConfig>,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST API base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
}

fn default_rest_url() -> String {
    DEFAULT_REST_URL.to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Exchange account id holding the trading balance
    pub id: String,
    /// Currency of that account (e.g., "USD")
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Available balance must stay strictly above this
    pub amount: Decimal,
    /// Multiplier applied to `amount` before comparing (e.g., 1.05)
    #[serde(default = "default_fuzz")]
    pub fuzz: Decimal,
}

fn default_fuzz() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfig {
    /// "payment_method" or "linked_account"
    pub source: String,
    /// Id of the payment method / linked account
    pub source_id: String,
    /// Amount to move; defaults to the total buy amount of all legs
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLegConfig {
    /// Product to buy (e.g., "BTC-USD")
    pub product: String,
    /// Quote-currency amount to spend
    pub buy_amount: Decimal,
    /// Smallest size unit the exchange accepts (e.g., "0.00001")
    pub base_increment: String,
    /// Added to the best bid to get the limit price
    #[serde(default = "default_price_margin")]
    pub price_margin: Decimal,
}

fn default_price_margin() -> Decimal {
    Decimal::TEN
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Fixed wait after a transfer or conversion before reading again
    #[serde(default = "default_settle_delay")]
    pub delay_secs: u64,
}

fn default_settle_delay() -> u64 {
    5
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_settle_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Enable dry run mode (reads are real, transfers and orders are not)
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Flat variable names still accepted from single-purpose deployments.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("COINBASE_PRO_BASEURL", "exchange.rest_url"),
    ("COINBASE_USD_ACCOUNT_ID", "account.id"),
    ("USD_THRESHOLD_TO_BUY", "threshold.amount"),
    ("USD_THRESHOLD_FUZZ", "threshold.fuzz"),
    ("COINBASE_PAYMENT_METHOD_ID", "funding.source_id"),
    ("USD_AMOUNT_TO_TRANSFER", "funding.amount"),
    ("DRY_RUN", "dry_run.enabled"),
];

fn with_legacy_env(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (var, key) in LEGACY_ENV {
        builder = builder.set_override_option(*key, std::env::var(var).ok())?;
    }
    if std::env::var("COINBASE_PAYMENT_METHOD_ID").is_ok() {
        builder = builder
            .set_override("funding.source", "payment_method")?
            .set_override("account.currency", "USD")?;
    } else if std::env::var("COINBASE_USD_ACCOUNT_ID").is_ok() {
        builder = builder.set_override("account.currency", "USD")?;
    }
    Ok(builder)
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("settlement.delay_secs", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TOPUP_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TOPUP__ACCOUNT__ID, etc.).
            // Values stay strings so decimals never pass through f64.
            .add_source(Environment::with_prefix("TOPUP").separator("__"));

        with_legacy_env(builder)?.build()?.try_deserialize()
    }

    /// Load a single TOML file, ignoring the environment
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Currency the order legs are paid in
    pub fn settlement_currency(&self) -> &str {
        self.conversion
            .as_ref()
            .map(|c| c.to.as_str())
            .unwrap_or(self.account.currency.as_str())
    }

    /// Sum of all leg buy amounts
    pub fn total_buy_amount(&self) -> Decimal {
        self.orders.iter().map(|leg| leg.buy_amount).sum()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = url::Url::parse(&self.exchange.rest_url) {
            errors.push(format!("exchange.rest_url is not a valid URL: {e}"));
        }

        if self.account.id.trim().is_empty() {
            errors.push("account.id must not be empty".to_string());
        }
        if let Err(e) = Currency::new(&self.account.currency) {
            errors.push(format!("account.currency: {e}"));
        }

        if self.threshold.amount <= Decimal::ZERO {
            errors.push("threshold.amount must be positive".to_string());
        }
        if self.threshold.fuzz <= Decimal::ZERO {
            errors.push("threshold.fuzz must be positive".to_string());
        }

        if let Some(funding) = &self.funding {
            if let Err(e) = FundingSourceKind::from_str(&funding.source) {
                errors.push(format!("funding.source: {e}"));
            }
            if funding.source_id.trim().is_empty() {
                errors.push("funding.source_id must not be empty".to_string());
            }
            match funding.amount {
                Some(amount) if amount <= Decimal::ZERO => {
                    errors.push("funding.amount must be positive".to_string());
                }
                None if self.orders.is_empty() => {
                    errors.push(
                        "funding.amount is required when no order legs are configured"
                            .to_string(),
                    );
                }
                _ => {}
            }
        }

        if let Some(conversion) = &self.conversion {
            match (Currency::new(&conversion.from), Currency::new(&conversion.to)) {
                (Ok(from), Ok(to)) if from == to => {
                    errors.push("conversion.from and conversion.to must differ".to_string());
                }
                (Ok(_), Ok(_)) => {}
                (Err(e), _) | (_, Err(e)) => errors.push(format!("conversion: {e}")),
            }
            if self.orders.is_empty() {
                errors.push("conversion requires at least one order leg".to_string());
            }
        }

        let settlement = Currency::new(self.settlement_currency()).ok();
        for (idx, leg) in self.orders.iter().enumerate() {
            match ProductId::new(&leg.product) {
                Ok(product) => {
                    if settlement.as_ref().is_some_and(|s| product.quote() != s) {
                        errors.push(format!(
                            "orders[{idx}].product {} is not quoted in {}",
                            product,
                            self.settlement_currency()
                        ));
                    }
                }
                Err(e) => errors.push(format!("orders[{idx}].product: {e}")),
            }
            if leg.buy_amount <= Decimal::ZERO {
                errors.push(format!("orders[{idx}].buy_amount must be positive"));
            }
            if leg.price_margin < Decimal::ZERO {
                errors.push(format!("orders[{idx}].price_margin must not be negative"));
            }
            if let Err(e) = increment_precision(&leg.base_increment) {
                errors.push(format!("orders[{idx}].base_increment: {e}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
