//! topup CLI
//!
//! Commands:
//! - `topup run` - verify, fund and buy
//! - `topup balance` - show the configured account
//! - `topup book <product>` - show the best bid
//! - `topup size` - preview an order size offline
//! - `topup check` - validate configuration

pub mod output;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::rounding::increment_precision;
use crate::domain::{OrderRequest, ProductId};
use crate::error::{Result, TopupError};
use crate::exchange::ExchangeClient;
use crate::saga::compute_order_size;

use self::output::{print_items, BalanceRow, BookRow, OrderRow, OutputMode};

#[derive(Parser, Debug)]
#[command(name = "topup")]
#[command(author, version, about = "Keep an exchange account funded and buy on a schedule", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read balances and prices but never move money or place orders
    /// (DRY_RUN accepts 1/0, true/false, yes/no, on/off)
    #[arg(
        short,
        long,
        env = "DRY_RUN",
        global = true,
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the workflow once (default)
    Run,
    /// Show balance of the configured account
    Balance,
    /// Show the best bid for a product
    Book {
        /// Product id, e.g. BTC-USD
        product: String,
    },
    /// Compute the order a buy amount would produce at a given bid
    Size {
        /// Product id, only used for display
        #[arg(long, default_value = "BTC-USD")]
        product: String,
        /// Quote-currency amount to spend
        #[arg(long)]
        amount: Decimal,
        /// Best bid
        #[arg(long)]
        price: Decimal,
        /// Base increment, e.g. 0.00001
        #[arg(long)]
        increment: String,
        /// Added to the bid for the limit price
        #[arg(long, default_value = "10")]
        margin: Decimal,
    },
    /// Validate configuration and exit
    Check,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_json_flag(self.json)
    }
}

pub async fn show_balance(
    client: &dyn ExchangeClient,
    account_id: &str,
    mode: OutputMode,
) -> Result<()> {
    let snapshot = client.get_account(account_id).await?;
    print_items(&[BalanceRow::from(&snapshot)], mode)?;
    Ok(())
}

pub async fn show_order_book(
    client: &dyn ExchangeClient,
    product: &str,
    mode: OutputMode,
) -> Result<()> {
    let product = ProductId::new(product)?;
    let top = client.get_best_bid(product.as_str()).await?;
    print_items(&[BookRow::new(product.as_str(), &top)], mode)?;
    Ok(())
}

/// Offline preview of the order `run` would place.
pub fn preview_order(
    product: &str,
    amount: Decimal,
    price: Decimal,
    increment: &str,
    margin: Decimal,
    mode: OutputMode,
) -> Result<()> {
    let precision = increment_precision(increment)?;
    let size = compute_order_size(amount, price, increment)?;
    info!(%amount, %price, increment, precision, %size, "order preview");

    let order = OrderRequest::buy_limit(ProductId::new(product)?, size, price + margin);
    print_items(&[OrderRow::from(&order)], mode)?;
    Ok(())
}

pub fn check_config(config: &AppConfig) -> Result<()> {
    match config.validate() {
        Ok(()) => {
            println!(
                "config ok: account {} ({}), {} order leg(s), funding {}",
                config.account.id,
                config.account.currency,
                config.orders.len(),
                if config.funding.is_some() { "on" } else { "off" }
            );
            Ok(())
        }
        Err(errors) => {
            for e in &errors {
                eprintln!("  - {}", e);
            }
            Err(TopupError::InvalidConfig(format!(
                "{} configuration error(s)",
                errors.len()
            )))
        }
    }
}
