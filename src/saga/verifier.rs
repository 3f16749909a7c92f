use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::domain::{AccountSnapshot, Threshold};
use crate::error::{Result, TopupError};
use crate::exchange::ExchangeClient;
use crate::services::MetricsPublisher;

/// Outcome of one balance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub snapshot: AccountSnapshot,
    pub effective_threshold: Decimal,
    pub sufficient: bool,
}

impl Verification {
    /// Gap between available funds and the effective threshold, never negative
    pub fn shortfall(&self) -> Decimal {
        (self.effective_threshold - self.snapshot.available).max(Decimal::ZERO)
    }

    pub fn into_insufficient_error(self) -> TopupError {
        TopupError::InsufficientFunds {
            available: self.snapshot.available,
            required: self.effective_threshold,
        }
    }
}

pub struct BalanceVerifier {
    exchange: Arc<dyn ExchangeClient>,
    metrics: MetricsPublisher,
}

impl BalanceVerifier {
    pub fn new(exchange: Arc<dyn ExchangeClient>, metrics: MetricsPublisher) -> Self {
        Self { exchange, metrics }
    }

    pub async fn verify(&self, account_id: &str, threshold: &Threshold) -> Result<Verification> {
        let snapshot = self.exchange.get_account(account_id).await?;

        if snapshot.currency != threshold.minimum.currency {
            return Err(TopupError::Validation(format!(
                "account {} holds {} but the threshold is in {}",
                account_id, snapshot.currency, threshold.minimum.currency
            )));
        }

        self.metrics.gauge("balance", snapshot.balance);
        self.metrics.gauge("available", snapshot.available);

        let effective_threshold = threshold.effective();
        let sufficient = threshold.is_satisfied_by(snapshot.available);

        info!(
            account_id,
            balance = %snapshot.balance,
            available = %snapshot.available,
            threshold = %threshold.minimum,
            effective = %effective_threshold,
            sufficient,
            "balance verified"
        );

        Ok(Verification {
            snapshot,
            effective_threshold,
            sufficient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Money};
    use crate::exchange::MockExchangeClient;
    use crate::services::Metrics;
    use rust_decimal_macros::dec;

    fn verifier_with_available(available: &'static str) -> (BalanceVerifier, Arc<Metrics>) {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_get_account()
            .withf(|id| id == "usd-account")
            .times(1)
            .returning(move |id| AccountSnapshot::parse(id, "USD", "500", available));
        let metrics = Arc::new(Metrics::new());
        let verifier = BalanceVerifier::new(Arc::new(exchange), MetricsPublisher::new(metrics.clone()));
        (verifier, metrics)
    }

    fn usd_threshold(amount: Decimal, fuzz: Decimal) -> Threshold {
        Threshold::new(Money::new(amount, Currency::new("USD").unwrap()), fuzz).unwrap()
    }

    #[tokio::test]
    async fn equal_to_threshold_is_not_sufficient() {
        let (verifier, _) = verifier_with_available("100");
        let v = verifier
            .verify("usd-account", &usd_threshold(dec!(100), Decimal::ONE))
            .await
            .unwrap();
        assert!(!v.sufficient);
        assert_eq!(v.shortfall(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn fuzz_raises_the_bar() {
        let (verifier, _) = verifier_with_available("104");
        let v = verifier
            .verify("usd-account", &usd_threshold(dec!(100), dec!(1.05)))
            .await
            .unwrap();
        assert_eq!(v.effective_threshold, dec!(105));
        assert!(!v.sufficient);
        assert_eq!(v.shortfall(), dec!(1));

        let (verifier, _) = verifier_with_available("105.01");
        let v = verifier
            .verify("usd-account", &usd_threshold(dec!(100), dec!(1.05)))
            .await
            .unwrap();
        assert!(v.sufficient);
    }

    #[tokio::test]
    async fn balances_are_published() {
        let (verifier, metrics) = verifier_with_available("42.5");
        verifier
            .verify("usd-account", &usd_threshold(dec!(10), Decimal::ONE))
            .await
            .unwrap();
        verifier.metrics.flush().await;
        assert_eq!(metrics.gauge("available").await, Some(dec!(42.5)));
        assert_eq!(metrics.gauge("balance").await, Some(dec!(500)));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_get_account().returning(|_| {
            Err(TopupError::Exchange {
                status: 500,
                body: "boom".to_string(),
            })
        });
        let verifier = BalanceVerifier::new(
            Arc::new(exchange),
            MetricsPublisher::new(Arc::new(Metrics::new())),
        );
        let err = verifier
            .verify("usd-account", &usd_threshold(dec!(10), Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, TopupError::Exchange { status: 500, .. }));
    }

    #[tokio::test]
    async fn currency_mismatch_is_rejected() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_get_account()
            .returning(|id| AccountSnapshot::parse(id, "EUR", "500", "500"));
        let verifier = BalanceVerifier::new(
            Arc::new(exchange),
            MetricsPublisher::new(Arc::new(Metrics::new())),
        );
        assert!(verifier
            .verify("eur-account", &usd_threshold(dec!(10), Decimal::ONE))
            .await
            .is_err());
    }
}
