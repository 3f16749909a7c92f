use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{SagaState, StateTransition};
use crate::error::{Result, TopupError};
use crate::exchange::{ConversionReceipt, ExchangeClient, OrderReceipt};
use crate::services::MetricsPublisher;

use super::conversion::ConversionStep;
use super::funding::{FundingOutcome, FundingStep};
use super::placement::OrderPlacement;
use super::plan::SagaPlan;
use super::settlement::Settlement;
use super::verifier::{BalanceVerifier, Verification};

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaOutcome {
    /// Fund-only run, balance was already above the threshold
    AlreadyFunded,
    /// Fund-only run, a transfer was issued and the balance cleared the threshold
    Deposited,
    /// Orders were placed for every leg
    OrdersPlaced(usize),
}

/// Everything a finished run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaReport {
    pub outcome: SagaOutcome,
    pub initial: Verification,
    /// Balance check after funding, when funding happened
    pub final_verification: Option<Verification>,
    pub transfer: Option<FundingOutcome>,
    pub conversion: Option<ConversionReceipt>,
    pub orders: Vec<OrderReceipt>,
    pub transitions: Vec<StateTransition>,
    pub dry_run: bool,
}

impl SagaReport {
    pub fn message(&self) -> String {
        match self.outcome {
            SagaOutcome::AlreadyFunded => "Have enough money".to_string(),
            SagaOutcome::Deposited => "Successfully deposited money".to_string(),
            SagaOutcome::OrdersPlaced(1) => "Successfully placed order".to_string(),
            SagaOutcome::OrdersPlaced(n) => format!("Successfully placed {} orders", n),
        }
    }

    pub fn funded(&self) -> bool {
        self.transfer.is_some()
    }
}

/// Status line for a finished run, success or not.
pub fn result_message(result: &Result<SagaReport>) -> String {
    match result {
        Ok(report) => report.message(),
        Err(e) => format!("FAILED: {}", e),
    }
}

/// Drives one run: verify, fund, re-verify, convert, then place each leg.
///
/// Every step runs at most once. There is no compensation; a failure after a
/// transfer or conversion leaves that effect in place.
pub struct SagaController {
    plan: SagaPlan,
    verifier: BalanceVerifier,
    funding: FundingStep,
    conversion: ConversionStep,
    placement: OrderPlacement,
    settlement: Arc<dyn Settlement>,
    metrics: MetricsPublisher,
    dry_run: bool,
    state: SagaState,
    transitions: Vec<StateTransition>,
}

impl SagaController {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        settlement: Arc<dyn Settlement>,
        metrics: MetricsPublisher,
        plan: SagaPlan,
    ) -> Self {
        Self {
            dry_run: exchange.is_dry_run(),
            verifier: BalanceVerifier::new(exchange.clone(), metrics.clone()),
            funding: FundingStep::new(exchange.clone()),
            conversion: ConversionStep::new(exchange.clone()),
            placement: OrderPlacement::new(exchange, metrics.clone()),
            settlement,
            metrics,
            plan,
            state: SagaState::Init,
            transitions: Vec::new(),
        }
    }

    fn transition(&mut self, to: SagaState, reason: &str) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(TopupError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        info!(from = %self.state, to = %to, reason, "saga transition");
        self.transitions.push(StateTransition::new(self.state, to, reason));
        self.state = to;
        Ok(())
    }

    /// Run the saga to completion.
    pub async fn run(mut self) -> Result<SagaReport> {
        self.metrics.incr("runs_started");
        info!(
            account_id = %self.plan.account_id,
            threshold = %self.plan.threshold.minimum,
            legs = self.plan.legs.len(),
            dry_run = self.dry_run,
            "starting run"
        );

        let result = self.execute().await;

        match &result {
            Ok(report) => {
                self.metrics.incr("runs_succeeded");
                info!(outcome = %report.message(), "run finished");
            }
            Err(e) => {
                if !self.state.is_terminal() {
                    let from = self.state;
                    self.transitions
                        .push(StateTransition::new(from, SagaState::Failed, e.to_string()));
                    self.state = SagaState::Failed;
                }
                self.metrics.incr("runs_failed");
                error!(state = %self.state, error = %e, kind = ?e.kind(), "run failed");
            }
        }

        self.metrics.flush().await;
        result
    }

    async fn execute(&mut self) -> Result<SagaReport> {
        self.transition(SagaState::Verifying, "initial balance check")?;
        let initial = self
            .verifier
            .verify(&self.plan.account_id, &self.plan.threshold)
            .await?;

        let mut transfer = None;
        let mut final_verification = None;

        if initial.sufficient {
            self.transition(SagaState::Sufficient, "balance above threshold")?;
        } else {
            let Some(request) = self.plan.funding.clone() else {
                warn!(shortfall = %initial.shortfall(), "balance below threshold and no funding source");
                return Err(initial.into_insufficient_error());
            };

            self.transition(SagaState::Funding, "balance below threshold")?;
            let outcome = self.funding.transfer(&request).await?;
            self.metrics.incr("transfers_issued");

            self.transition(SagaState::Settling, "transfer issued")?;
            self.settle().await;

            self.transition(SagaState::Reverifying, "settling wait elapsed")?;
            let after = self
                .verifier
                .verify(&self.plan.account_id, &self.plan.threshold)
                .await?;

            if !after.sufficient {
                self.transition(SagaState::Insufficient, "still below threshold after funding")?;
                return Err(after.into_insufficient_error());
            }
            self.transition(SagaState::Sufficient, "funding cleared threshold")?;
            transfer = Some(outcome);
            final_verification = Some(after);
        }

        if self.plan.is_fund_only() {
            let outcome = if transfer.is_some() {
                SagaOutcome::Deposited
            } else {
                SagaOutcome::AlreadyFunded
            };
            self.transition(SagaState::Done, "nothing to buy")?;
            return Ok(self.report(outcome, initial, final_verification, transfer, None, Vec::new()));
        }

        let mut conversion = None;
        if let Some(request) = self.plan.conversion.clone() {
            self.transition(SagaState::Converting, "converting to settlement currency")?;
            let receipt = self.conversion.convert(&request).await?;
            self.metrics.incr("conversions");
            conversion = Some(receipt);

            self.transition(SagaState::SettlingConversion, "conversion issued")?;
            self.settle().await;
        }

        let legs = self.plan.legs.clone();
        let mut orders = Vec::with_capacity(legs.len());
        for leg in &legs {
            self.transition(SagaState::Pricing, leg.product.as_str())?;
            let top = self.placement.fetch_top(leg).await?;

            self.transition(SagaState::Sizing, leg.product.as_str())?;
            let request = self.placement.build_order(leg, &top)?;

            self.transition(SagaState::Placing, leg.product.as_str())?;
            let receipt = self.placement.submit(&request, &top).await?;
            self.metrics.incr("orders_submitted");
            orders.push(receipt);
        }

        self.transition(SagaState::Done, "all orders placed")?;
        let outcome = SagaOutcome::OrdersPlaced(orders.len());
        Ok(self.report(outcome, initial, final_verification, transfer, conversion, orders))
    }

    async fn settle(&self) {
        if self.state.follows_side_effect() {
            self.settlement.wait_for_settlement(self.state).await;
        }
    }

    fn report(
        &self,
        outcome: SagaOutcome,
        initial: Verification,
        final_verification: Option<Verification>,
        transfer: Option<FundingOutcome>,
        conversion: Option<ConversionReceipt>,
        orders: Vec<OrderReceipt>,
    ) -> SagaReport {
        SagaReport {
            outcome,
            initial,
            final_verification,
            transfer,
            conversion,
            orders,
            transitions: self.transitions.clone(),
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountSnapshot, SagaState};
    use rust_decimal_macros::dec;

    fn report(outcome: SagaOutcome) -> SagaReport {
        SagaReport {
            outcome,
            initial: Verification {
                snapshot: AccountSnapshot::parse("acct", "USD", "500", "500").unwrap(),
                effective_threshold: dec!(100),
                sufficient: true,
            },
            final_verification: None,
            transfer: None,
            conversion: None,
            orders: Vec::new(),
            transitions: vec![StateTransition::new(SagaState::Init, SagaState::Verifying, "test")],
            dry_run: false,
        }
    }

    #[test]
    fn messages_match_outcome() {
        assert_eq!(report(SagaOutcome::AlreadyFunded).message(), "Have enough money");
        assert_eq!(report(SagaOutcome::Deposited).message(), "Successfully deposited money");
        assert_eq!(report(SagaOutcome::OrdersPlaced(1)).message(), "Successfully placed order");
        assert_eq!(report(SagaOutcome::OrdersPlaced(3)).message(), "Successfully placed 3 orders");
    }

    #[test]
    fn failed_result_carries_error_text() {
        let result: Result<SagaReport> = Err(TopupError::OrderTooSmall {
            size: dec!(0.0005),
            minimum: dec!(0.001),
        });
        let msg = result_message(&result);
        assert!(msg.starts_with("FAILED: "));
        assert!(msg.contains("0.0005"));
        assert!(!report(SagaOutcome::AlreadyFunded).funded());
    }
}
