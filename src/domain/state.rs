use serde::{Deserialize, Serialize};
use std::fmt;

/// Saga state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaState {
    /// Nothing has been read yet
    Init,
    /// First balance check
    Verifying,
    /// Available balance is above the threshold
    Sufficient,
    /// Transfer request issued
    Funding,
    /// Waiting for the transfer to land
    Settling,
    /// Balance check after funding
    Reverifying,
    /// Still short after funding
    Insufficient,
    /// Conversion request issued
    Converting,
    /// Waiting for the conversion to land
    SettlingConversion,
    /// Reading top of book for the current leg
    Pricing,
    /// Computing order size for the current leg
    Sizing,
    /// Order submitted for the current leg
    Placing,
    /// Run finished
    Done,
    /// Run aborted
    Failed,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Init => "INIT",
            SagaState::Verifying => "VERIFYING",
            SagaState::Sufficient => "SUFFICIENT",
            SagaState::Funding => "FUNDING",
            SagaState::Settling => "SETTLING",
            SagaState::Reverifying => "REVERIFYING",
            SagaState::Insufficient => "INSUFFICIENT",
            SagaState::Converting => "CONVERTING",
            SagaState::SettlingConversion => "SETTLING_CONVERSION",
            SagaState::Pricing => "PRICING",
            SagaState::Sizing => "SIZING",
            SagaState::Placing => "PLACING",
            SagaState::Done => "DONE",
            SagaState::Failed => "FAILED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SagaState) -> bool {
        use SagaState::*;

        // Any live state may abort
        if target == Failed {
            return !self.is_terminal();
        }

        match (self, target) {
            (Init, Verifying) => true,

            (Verifying, Sufficient) => true,
            (Verifying, Funding) => true,

            (Funding, Settling) => true,
            (Settling, Reverifying) => true,

            (Reverifying, Sufficient) => true,
            (Reverifying, Insufficient) => true,

            // Fund-only runs stop here
            (Sufficient, Done) => true,
            (Sufficient, Converting) => true,
            (Sufficient, Pricing) => true,

            (Converting, SettlingConversion) => true,
            (SettlingConversion, Pricing) => true,

            (Pricing, Sizing) => true,
            (Sizing, Placing) => true,

            // Next leg, or finished
            (Placing, Pricing) => true,
            (Placing, Done) => true,

            _ => false,
        }
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<SagaState> {
        use SagaState::*;

        let mut next = match self {
            Init => vec![Verifying],
            Verifying => vec![Sufficient, Funding],
            Funding => vec![Settling],
            Settling => vec![Reverifying],
            Reverifying => vec![Sufficient, Insufficient],
            Sufficient => vec![Done, Converting, Pricing],
            Converting => vec![SettlingConversion],
            SettlingConversion => vec![Pricing],
            Pricing => vec![Sizing],
            Sizing => vec![Placing],
            Placing => vec![Pricing, Done],
            Insufficient | Done | Failed => vec![],
        };
        if !self.is_terminal() {
            next.push(Failed);
        }
        next
    }

    /// Has a side-effecting call been made by the time we reach this state?
    pub fn follows_side_effect(&self) -> bool {
        matches!(
            self,
            SagaState::Settling | SagaState::SettlingConversion
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Insufficient | SagaState::Done | SagaState::Failed
        )
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State transition event (for logging and the run report)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SagaState,
    pub to: SagaState,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StateTransition {
    pub fn new(from: SagaState, to: SagaState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        use SagaState::*;
        let path = [
            Init,
            Verifying,
            Funding,
            Settling,
            Reverifying,
            Sufficient,
            Converting,
            SettlingConversion,
            Pricing,
            Sizing,
            Placing,
            Pricing,
            Sizing,
            Placing,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn funding_cannot_be_repeated() {
        assert!(!SagaState::Reverifying.can_transition_to(SagaState::Funding));
        assert!(!SagaState::Insufficient.can_transition_to(SagaState::Funding));
    }

    #[test]
    fn orders_require_sufficient_funds() {
        assert!(!SagaState::Verifying.can_transition_to(SagaState::Pricing));
        assert!(!SagaState::Reverifying.can_transition_to(SagaState::Pricing));
        assert!(!SagaState::Funding.can_transition_to(SagaState::Placing));
    }

    #[test]
    fn terminal_states_do_not_move() {
        for state in [SagaState::Done, SagaState::Failed, SagaState::Insufficient] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
            assert!(!state.can_transition_to(SagaState::Failed));
        }
    }

    #[test]
    fn valid_transitions_agree_with_can_transition_to() {
        use SagaState::*;
        let all = [
            Init,
            Verifying,
            Sufficient,
            Funding,
            Settling,
            Reverifying,
            Insufficient,
            Converting,
            SettlingConversion,
            Pricing,
            Sizing,
            Placing,
            Done,
            Failed,
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.valid_transitions().contains(&to),
                    from.can_transition_to(to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }
}
