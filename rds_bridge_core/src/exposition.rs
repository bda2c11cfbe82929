use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;

use crate::collector::ScrapeStats;
use crate::query::QueryClient;
use crate::rds::{RdsMetric, TargetIdentity};

pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Registers one collector per requested metric, in order, followed by the
/// scrape statistics.
pub fn build_registry(
    client: Arc<dyn QueryClient>,
    target: &TargetIdentity,
    metrics: &[RdsMetric],
    stats: &ScrapeStats,
) -> Registry {
    let mut registry = Registry::default();
    for metric in metrics {
        let collector = metric.collector(client.clone(), target.clone(), stats.clone());
        registry.register_collector(Box::new(collector));
    }
    stats.register(&mut registry);
    registry
}

/// Runs every collector and renders the OpenMetrics text exposition.
///
/// Collectors block on upstream requests, so this must not be called on an
/// async executor thread.
pub fn encode_registry(registry: &Registry) -> Result<String, std::fmt::Error> {
    let mut body = String::new();
    encode(&mut body, registry)?;
    Ok(body)
}
