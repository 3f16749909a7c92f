pub mod factory;
mod traits;

pub use factory::build_exchange_client;
pub use traits::{
    ConversionReceipt, ConversionRequest, ExchangeClient, FundingSource, FundingSourceKind,
    OrderReceipt, TransferReceipt, TransferRequest,
};

#[cfg(test)]
pub use traits::MockExchangeClient;
