use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::exchange::{ConversionReceipt, ConversionRequest, ExchangeClient};

pub struct ConversionStep {
    exchange: Arc<dyn ExchangeClient>,
}

impl ConversionStep {
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self { exchange }
    }

    /// Single-shot conversion; any error is fatal to the run.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionReceipt> {
        info!(
            amount = %request.amount,
            from = %request.from,
            to = %request.to,
            "converting"
        );
        let receipt = self.exchange.convert(request).await?;
        info!(conversion_id = %receipt.id, amount = %receipt.amount, "conversion accepted");
        Ok(receipt)
    }
}
