//! The funding and order placement workflow.

pub mod controller;
pub mod conversion;
pub mod funding;
pub mod placement;
pub mod plan;
pub mod settlement;
pub mod verifier;

pub use controller::{result_message, SagaController, SagaOutcome, SagaReport};
pub use conversion::ConversionStep;
pub use funding::{FundingOutcome, FundingStep};
pub use placement::{compute_order_size, OrderPlacement, MIN_ORDER_SIZE};
pub use plan::{OrderLeg, SagaPlan};
pub use settlement::{FixedDelay, Settlement};
pub use verifier::{BalanceVerifier, Verification};
