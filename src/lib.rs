pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod saga;
pub mod services;

pub use adapters::{CoinbaseClient, Credentials};
pub use config::AppConfig;
pub use domain::{
    AccountSnapshot, BookTop, Currency, Money, OrderRequest, OrderSide, ProductId, SagaState,
    StateTransition, Threshold,
};
pub use error::{ErrorKind, Result, TopupError};
pub use exchange::{build_exchange_client, ExchangeClient};
pub use saga::{result_message, SagaController, SagaOutcome, SagaPlan, SagaReport};
pub use services::{Metrics, MetricsPublisher};
