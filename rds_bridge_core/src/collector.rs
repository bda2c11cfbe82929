use std::fmt::{self, Debug};
use std::sync::Arc;

use log::debug;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::MetricType;
use prometheus_client::registry::Registry;

use crate::query::{QueryClient, QueryError, Sample};

/// Name and help text of an exposed metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
}

/// Builds the upstream query for a target.
pub type QueryTemplate<T> = fn(&T) -> String;

/// Builds the exposed label set from the target and the upstream series.
pub type LabelMapper<T, L> = fn(&T, &Sample) -> L;

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample<L> {
    pub value: f64,
    pub labels: L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeOutcome {
    Success,
    NoData,
    RequestFailed,
    InvalidValue,
}

impl ScrapeOutcome {
    pub const ALL: [ScrapeOutcome; 4] = [
        ScrapeOutcome::Success,
        ScrapeOutcome::NoData,
        ScrapeOutcome::RequestFailed,
        ScrapeOutcome::InvalidValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeOutcome::Success => "success",
            ScrapeOutcome::NoData => "no_data",
            ScrapeOutcome::RequestFailed => "request_failed",
            ScrapeOutcome::InvalidValue => "invalid_value",
        }
    }
}

impl From<&QueryError> for ScrapeOutcome {
    fn from(e: &QueryError) -> Self {
        match e {
            QueryError::NoData => ScrapeOutcome::NoData,
            QueryError::InvalidValue(_) => ScrapeOutcome::InvalidValue,
            QueryError::Transport(_)
            | QueryError::Status(_)
            | QueryError::Decode(_)
            | QueryError::Upstream { .. }
            | QueryError::UnexpectedResultType(_) => ScrapeOutcome::RequestFailed,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ScrapeLabels {
    pub metric: String,
    pub outcome: String,
}

/// Per collector scrape outcome counters. Clones share the counters.
#[derive(Clone, Debug, Default)]
pub struct ScrapeStats {
    outcomes: Family<ScrapeLabels, Counter>,
}

impl ScrapeStats {
    pub const NAME: &'static str = "rds_bridge_scrapes";
    pub const HELP: &'static str = "Upstream scrapes performed by the bridge collectors, by outcome";

    fn labels(metric: &str, outcome: ScrapeOutcome) -> ScrapeLabels {
        ScrapeLabels {
            metric: metric.to_string(),
            outcome: outcome.as_str().to_string(),
        }
    }

    /// Creates zeroed series for every outcome of `metric`.
    pub fn init_metric(&self, metric: &str) {
        for outcome in ScrapeOutcome::ALL {
            let _ = self.outcomes.get_or_create(&Self::labels(metric, outcome));
        }
    }

    pub fn record(&self, metric: &str, outcome: ScrapeOutcome) {
        self.outcomes
            .get_or_create(&Self::labels(metric, outcome))
            .inc();
    }

    pub fn count(&self, metric: &str, outcome: ScrapeOutcome) -> u64 {
        self.outcomes
            .get(&Self::labels(metric, outcome))
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Registers the counters as a collector. Collectors are encoded in
    /// registration order, so this must follow the gauges it counts for.
    pub fn register(&self, registry: &mut Registry) {
        registry.register_collector(Box::new(self.clone()));
    }
}

impl Collector for ScrapeStats {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let metric_encoder =
            encoder.encode_descriptor(Self::NAME, Self::HELP, None, MetricType::Counter)?;
        self.outcomes.encode(metric_encoder)
    }
}

/// Re-exposes the first sample of an upstream instant query as a gauge.
///
/// Every scrape issues exactly one query. Failures of any kind are logged at
/// debug level and produce no sample, so a broken upstream never fails the
/// whole exposition.
pub struct ForwardedGauge<T, L> {
    descriptor: MetricDescriptor,
    query_template: QueryTemplate<T>,
    label_mapper: LabelMapper<T, L>,
    target: T,
    client: Arc<dyn QueryClient>,
    stats: ScrapeStats,
}

impl<T, L> ForwardedGauge<T, L> {
    pub fn new(
        descriptor: MetricDescriptor,
        query_template: QueryTemplate<T>,
        label_mapper: LabelMapper<T, L>,
        target: T,
        client: Arc<dyn QueryClient>,
        stats: ScrapeStats,
    ) -> Self {
        stats.init_metric(descriptor.name);
        Self {
            descriptor,
            query_template,
            label_mapper,
            target,
            client,
            stats,
        }
    }

    pub fn describe(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn query(&self) -> String {
        (self.query_template)(&self.target)
    }

    /// Queries the upstream once. Unlike [`ForwardedGauge::collect`] this
    /// neither logs nor updates the scrape statistics.
    pub fn scrape(&self) -> Result<GaugeSample<L>, QueryError> {
        let response = self.client.query(&self.query())?;
        let sample = response.first_sample()?;
        let value = sample.value()?;
        Ok(GaugeSample {
            value,
            labels: (self.label_mapper)(&self.target, sample),
        })
    }

    pub fn collect(&self) -> Option<GaugeSample<L>> {
        match self.scrape() {
            Ok(sample) => {
                self.stats.record(self.descriptor.name, ScrapeOutcome::Success);
                Some(sample)
            }
            Err(e) => {
                debug!(
                    target: "rds_bridge::collector",
                    "Collector {} returned no data: {}",
                    self.descriptor.name,
                    e
                );
                self.stats.record(self.descriptor.name, ScrapeOutcome::from(&e));
                None
            }
        }
    }
}

impl<T: Debug, L> Debug for ForwardedGauge<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardedGauge")
            .field("descriptor", &self.descriptor)
            .field("target", &self.target)
            .field("client", &self.client)
            .finish()
    }
}

impl<T, L> Collector for ForwardedGauge<T, L>
where
    T: Debug + Send + Sync + 'static,
    L: EncodeLabelSet + Send + Sync + 'static,
{
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        // Without a sample the whole family is left out.
        let Some(sample) = self.collect() else {
            return Ok(());
        };
        let gauge = ConstGauge::new(sample.value);
        let mut metric_encoder = encoder.encode_descriptor(
            self.descriptor.name,
            self.descriptor.help,
            None,
            MetricType::Gauge,
        )?;
        let family_encoder = metric_encoder.encode_family(&sample.labels)?;
        gauge.encode(family_encoder)
    }
}
