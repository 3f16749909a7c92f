pub mod metrics;

pub use metrics::{MetricKind, MetricPoint, Metrics, MetricsPublisher, MetricsSink};
