use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::domain::SagaState;

/// Waits for the exchange to reflect a transfer or conversion.
///
/// The exchange offers no completion signal, so the production implementation
/// is a fixed sleep.
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn wait_for_settlement(&self, after: SagaState);
}

/// Sleep a fixed amount of time
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl Settlement for FixedDelay {
    async fn wait_for_settlement(&self, after: SagaState) {
        info!(state = %after, delay_ms = self.delay.as_millis() as u64, "waiting for settlement");
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn fixed_delay_sleeps_at_least_the_delay() {
        let settlement = FixedDelay::new(Duration::from_millis(20));
        let started = Instant::now();
        settlement.wait_for_settlement(SagaState::Settling).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn from_secs_converts() {
        assert_eq!(FixedDelay::from_secs(5).delay(), Duration::from_secs(5));
    }
}
