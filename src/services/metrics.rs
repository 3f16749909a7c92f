use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Last value wins
    Gauge,
    /// Values are added up
    Counter,
}

/// One observation handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub kind: MetricKind,
    pub value: Decimal,
    /// Extra dimension, e.g. the product id
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    pub fn gauge(name: &str, value: Decimal) -> Self {
        Self {
            name: name.to_string(),
            kind: MetricKind::Gauge,
            value,
            label: None,
            timestamp: Utc::now(),
        }
    }

    pub fn counter(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: MetricKind::Counter,
            value: Decimal::ONE,
            label: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn key(&self) -> String {
        match &self.label {
            Some(label) => format!("{}{{label=\"{}\"}}", self.name, label),
            None => self.name.clone(),
        }
    }
}

/// Destination for metric points.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn publish(&self, point: MetricPoint) -> Result<()>;
}

/// In-process metrics registry
pub struct Metrics {
    gauges: RwLock<BTreeMap<String, Decimal>>,
    counters: RwLock<BTreeMap<String, Decimal>>,
    /// Timestamp of the most recent point
    last_update: RwLock<DateTime<Utc>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(BTreeMap::new()),
            counters: RwLock::new(BTreeMap::new()),
            last_update: RwLock::new(Utc::now()),
        }
    }

    pub async fn gauge(&self, key: &str) -> Option<Decimal> {
        self.gauges.read().await.get(key).copied()
    }

    pub async fn counter(&self, key: &str) -> Decimal {
        self.counters
            .read()
            .await
            .get(key)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Get current metrics as a formatted string
    pub async fn summary(&self) -> String {
        let gauges = self.gauges.read().await;
        let counters = self.counters.read().await;
        let mut out = String::from("\n=== TOPUP RUN METRICS ===\n");
        for (key, value) in counters.iter().chain(gauges.iter()) {
            out.push_str(&format!("{}: {}\n", key, value.normalize()));
        }
        out.push_str(&format!(
            "last update: {}\n",
            self.last_update.read().await.to_rfc3339()
        ));
        out.push_str("=========================\n");
        out
    }

    /// Export metrics in Prometheus format
    pub async fn prometheus(&self) -> String {
        let gauges = self.gauges.read().await;
        let counters = self.counters.read().await;
        let mut out = String::new();
        for (key, value) in counters.iter() {
            let (name, labels) = split_key(key);
            out.push_str(&format!("topup_{}_total{} {}\n", name, labels, value.normalize()));
        }
        for (key, value) in gauges.iter() {
            let (name, labels) = split_key(key);
            out.push_str(&format!("topup_{}{} {}\n", name, labels, value.normalize()));
        }
        out
    }

    /// Log current values
    pub async fn log_status(&self) {
        info!("{}", self.summary().await);
    }
}

/// `name{label="x"}` -> (`name`, `{label="x"}`)
fn split_key(key: &str) -> (&str, &str) {
    match key.find('{') {
        Some(idx) => key.split_at(idx),
        None => (key, ""),
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSink for Metrics {
    async fn publish(&self, point: MetricPoint) -> Result<()> {
        let key = point.key();
        match point.kind {
            MetricKind::Gauge => {
                self.gauges.write().await.insert(key, point.value);
            }
            MetricKind::Counter => {
                *self.counters.write().await.entry(key).or_insert(Decimal::ZERO) += point.value;
            }
        }
        *self.last_update.write().await = point.timestamp;
        Ok(())
    }
}

/// Fire-and-forget front end for a sink.
///
/// Every point is published on its own task; a failing sink is logged and
/// never reaches the caller.
#[derive(Clone)]
pub struct MetricsPublisher {
    sink: Arc<dyn MetricsSink>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MetricsPublisher {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn emit(&self, point: MetricPoint) {
        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            let name = point.name.clone();
            if let Err(e) = sink.publish(point).await {
                warn!(metric = %name, error = %e, "failed to publish metric");
            }
        });
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
            Err(_) => debug!("metrics pending list poisoned; not tracking task"),
        }
    }

    pub fn gauge(&self, name: &str, value: Decimal) {
        self.emit(MetricPoint::gauge(name, value));
    }

    pub fn gauge_labeled(&self, name: &str, label: &str, value: Decimal) {
        self.emit(MetricPoint::gauge(name, value).with_label(label));
    }

    pub fn incr(&self, name: &str) {
        self.emit(MetricPoint::counter(name));
    }

    /// Wait for every point emitted so far to be handed to the sink.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "metrics task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopupError;
    use rust_decimal_macros::dec;

    struct BrokenSink;

    #[async_trait]
    impl MetricsSink for BrokenSink {
        async fn publish(&self, _point: MetricPoint) -> Result<()> {
            Err(TopupError::Metrics("collector unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn gauges_keep_last_value_and_counters_add_up() {
        let metrics = Arc::new(Metrics::new());
        let publisher = MetricsPublisher::new(metrics.clone());

        publisher.gauge("available", dec!(50));
        publisher.flush().await;
        publisher.gauge("available", dec!(150));
        publisher.incr("transfers");
        publisher.incr("transfers");
        publisher.flush().await;

        assert_eq!(metrics.gauge("available").await, Some(dec!(150)));
        assert_eq!(metrics.counter("transfers").await, dec!(2));
    }

    #[tokio::test]
    async fn labels_are_kept_apart() {
        let metrics = Arc::new(Metrics::new());
        let publisher = MetricsPublisher::new(metrics.clone());

        publisher.gauge_labeled("last_price", "BTC-USD", dec!(20000));
        publisher.gauge_labeled("last_price", "ETH-USD", dec!(1500));
        publisher.flush().await;

        assert_eq!(
            metrics.gauge("last_price{label=\"BTC-USD\"}").await,
            Some(dec!(20000))
        );
        let text = metrics.prometheus().await;
        assert!(text.contains("topup_last_price{label=\"ETH-USD\"} 1500"));
    }

    #[tokio::test]
    async fn labeled_counters_render_valid_prometheus_lines() {
        let metrics = Metrics::new();
        for _ in 0..2 {
            metrics
                .publish(MetricPoint::counter("orders_submitted").with_label("BTC-USD"))
                .await
                .unwrap();
        }
        metrics.publish(MetricPoint::counter("runs_succeeded")).await.unwrap();

        let text = metrics.prometheus().await;
        assert!(text.contains("topup_orders_submitted_total{label=\"BTC-USD\"} 2\n"));
        assert!(text.contains("topup_runs_succeeded_total 1\n"));
        assert!(!text.contains("}_total"));
        assert!(metrics.summary().await.contains("last update: "));
    }

    #[tokio::test]
    async fn broken_sink_does_not_surface_errors() {
        let publisher = MetricsPublisher::new(Arc::new(BrokenSink));
        publisher.gauge("balance", dec!(1));
        publisher.flush().await;
    }
}
