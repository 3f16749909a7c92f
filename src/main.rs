use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use topup::cli::{self, output, Cli, Commands};
use topup::config::AppConfig;
use topup::error::Result;
use topup::exchange::build_exchange_client;
use topup::saga::{result_message, FixedDelay, SagaController, SagaPlan};
use topup::services::{Metrics, MetricsPublisher};
use topup::CoinbaseClient;
use tracing::info;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, load_env_file};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    load_env_file();

    match &cli.command {
        Some(Commands::Size {
            product,
            amount,
            price,
            increment,
            margin,
        }) => {
            init_logging_simple();
            cli::preview_order(product, *amount, *price, increment, *margin, cli.output_mode())?;
        }
        Some(Commands::Book { product }) => {
            init_logging_simple();
            let rest_url = AppConfig::load_from(&cli.config)
                .ok()
                .map(|c| c.exchange.rest_url);
            // Public endpoint; no credentials needed.
            let client = CoinbaseClient::new(rest_url.as_deref(), None, true)?;
            cli::show_order_book(&client, product, cli.output_mode()).await?;
        }
        Some(Commands::Balance) => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config)?;
            let client = build_exchange_client(&config, true)?;
            cli::show_balance(client.as_ref(), &config.account.id, cli.output_mode()).await?;
        }
        Some(Commands::Check) => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config)?;
            cli::check_config(&config)?;
        }
        Some(Commands::Run) | None => {
            let config = AppConfig::load_from(&cli.config)?;
            init_logging(&config.logging);
            return run_once(&cli, &config).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_once(cli: &Cli, config: &AppConfig) -> Result<ExitCode> {
    let plan = SagaPlan::from_config(config)?;
    let exchange = build_exchange_client(config, cli.dry_run)?;

    let metrics = Arc::new(Metrics::new());
    let publisher = MetricsPublisher::new(metrics.clone());
    let settlement = Arc::new(FixedDelay::from_secs(config.settlement.delay_secs));

    let result = SagaController::new(exchange, settlement, publisher, plan)
        .run()
        .await;

    metrics.log_status().await;
    info!(prometheus = %metrics.prometheus().await, "final metrics");

    if let Ok(report) = &result {
        output::print_report(report, cli.output_mode())?;
    }
    println!("{}", result_message(&result));

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
