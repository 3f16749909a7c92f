use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::exchange::{ExchangeClient, TransferReceipt, TransferRequest};

/// What we know after the single transfer attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingOutcome {
    /// The exchange acknowledged the transfer
    Confirmed(TransferReceipt),
    /// The call failed after the request may have reached the exchange.
    /// The transfer may or may not exist; the next balance check decides.
    Ambiguous { error: String },
}

impl FundingOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, FundingOutcome::Confirmed(_))
    }
}

pub struct FundingStep {
    exchange: Arc<dyn ExchangeClient>,
}

impl FundingStep {
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self { exchange }
    }

    /// Issue exactly one transfer. Never retried and never deduplicated against
    /// earlier runs.
    ///
    /// Failures that may have moved money come back as
    /// [`FundingOutcome::Ambiguous`]; failures that happened before the request
    /// left (credentials, request validation) are returned as errors.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<FundingOutcome> {
        info!(
            amount = %request.amount,
            source = %request.source,
            "requesting transfer"
        );

        match self.exchange.transfer(request).await {
            Ok(receipt) => {
                info!(
                    transfer_id = %receipt.id,
                    amount = %receipt.amount,
                    currency = %receipt.currency,
                    payout_at = receipt.payout_at.as_deref().unwrap_or("-"),
                    "transfer accepted"
                );
                Ok(FundingOutcome::Confirmed(receipt))
            }
            Err(e) if e.may_have_taken_effect() => {
                warn!(
                    error = %e,
                    amount = %request.amount,
                    "transfer result unknown; continuing to re-verify balance"
                );
                Ok(FundingOutcome::Ambiguous {
                    error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Money};
    use crate::error::TopupError;
    use crate::exchange::{FundingSource, MockExchangeClient};
    use rust_decimal_macros::dec;

    fn request() -> TransferRequest {
        TransferRequest {
            amount: Money::new(dec!(100), Currency::new("USD").unwrap()),
            source: FundingSource::PaymentMethod("pm-1".to_string()),
        }
    }

    #[tokio::test]
    async fn confirmed_transfer_carries_receipt() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_transfer()
            .withf(|req| req.amount.amount == dec!(100))
            .times(1)
            .returning(|req| {
                Ok(TransferReceipt {
                    id: "dep-1".to_string(),
                    amount: req.amount.amount,
                    currency: req.amount.currency.to_string(),
                    payout_at: Some("2026-10-20T00:00:00Z".to_string()),
                })
            });

        let outcome = FundingStep::new(Arc::new(exchange))
            .transfer(&request())
            .await
            .unwrap();
        assert!(outcome.is_confirmed());
    }

    #[tokio::test]
    async fn exchange_failure_is_ambiguous() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_transfer().times(1).returning(|_| {
            Err(TopupError::Exchange {
                status: 504,
                body: "gateway timeout".to_string(),
            })
        });

        let outcome = FundingStep::new(Arc::new(exchange))
            .transfer(&request())
            .await
            .unwrap();
        assert!(matches!(outcome, FundingOutcome::Ambiguous { ref error } if error.contains("504")));
    }

    #[tokio::test]
    async fn credential_failure_is_fatal() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_transfer()
            .times(1)
            .returning(|_| Err(TopupError::Auth("missing key".to_string())));

        let err = FundingStep::new(Arc::new(exchange))
            .transfer(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Auth(_)));
    }
}
