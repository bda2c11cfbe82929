//! The five gauges that mimic the CloudWatch exporter's `aws_rds_*` series.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use prometheus_client::encoding::EncodeLabelSet;
use serde::{Deserialize, Serialize};

use crate::collector::{ForwardedGauge, MetricDescriptor, QueryTemplate, ScrapeStats};
use crate::query::{QueryClient, Sample};

pub const EXPORTED_JOB: &str = "aws_rds";
pub const JOB: &str = "rds";

/// Identifies the database workload the gauges are reported for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    /// Reported as `dbinstance_identifier`.
    pub instance_name: String,
    pub namespace: String,
    pub pod_name: String,
    pub resource_id: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RdsLabels {
    pub dbinstance_identifier: String,
    pub exported_job: String,
    pub instance: String,
    pub job: String,
}

pub fn rds_labels(target: &TargetIdentity, sample: &Sample) -> RdsLabels {
    RdsLabels {
        dbinstance_identifier: target.instance_name.clone(),
        exported_job: EXPORTED_JOB.to_string(),
        instance: sample.instance().to_string(),
        job: JOB.to_string(),
    }
}

pub type RdsCollector = ForwardedGauge<TargetIdentity, RdsLabels>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RdsMetric {
    DatabaseConnections,
    CpuUtilization,
    FreeStorageSpace,
    FreeableMemory,
    WriteIops,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown RDS metric {0:?}")]
pub struct UnknownRdsMetric(pub String);

impl RdsMetric {
    pub const ALL: [RdsMetric; 5] = [
        RdsMetric::DatabaseConnections,
        RdsMetric::CpuUtilization,
        RdsMetric::FreeStorageSpace,
        RdsMetric::FreeableMemory,
        RdsMetric::WriteIops,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RdsMetric::DatabaseConnections => "database_connections",
            RdsMetric::CpuUtilization => "cpu_utilization",
            RdsMetric::FreeStorageSpace => "free_storage_space",
            RdsMetric::FreeableMemory => "freeable_memory",
            RdsMetric::WriteIops => "write_iops",
        }
    }

    pub fn descriptor(&self) -> MetricDescriptor {
        match self {
            RdsMetric::DatabaseConnections => MetricDescriptor {
                name: "aws_rds_database_connections_average",
                help: "postgres_exporter: Connection average",
            },
            RdsMetric::CpuUtilization => MetricDescriptor {
                name: "aws_rds_cpuutilization_average",
                help: "postgres_exporter: CPU utilization",
            },
            RdsMetric::FreeStorageSpace => MetricDescriptor {
                name: "aws_rds_free_storage_space_average",
                help: "postgres_exporter: Free storage space",
            },
            RdsMetric::FreeableMemory => MetricDescriptor {
                name: "aws_rds_freeable_memory_average",
                help: "postgres_exporter: Freeable memory",
            },
            RdsMetric::WriteIops => MetricDescriptor {
                name: "aws_rds_write_iops_average",
                help: "postgres_exporter: Write IOPS",
            },
        }
    }

    pub fn query_template(&self) -> QueryTemplate<TargetIdentity> {
        match self {
            RdsMetric::DatabaseConnections => database_connections_query,
            RdsMetric::CpuUtilization => cpu_utilization_query,
            RdsMetric::FreeStorageSpace => free_storage_space_query,
            RdsMetric::FreeableMemory => freeable_memory_query,
            RdsMetric::WriteIops => write_iops_query,
        }
    }

    pub fn collector(
        self,
        client: Arc<dyn QueryClient>,
        target: TargetIdentity,
        stats: ScrapeStats,
    ) -> RdsCollector {
        ForwardedGauge::new(
            self.descriptor(),
            self.query_template(),
            rds_labels,
            target,
            client,
            stats,
        )
    }
}

impl fmt::Display for RdsMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RdsMetric {
    type Err = UnknownRdsMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RdsMetric::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| UnknownRdsMetric(s.to_string()))
    }
}

pub fn database_connections(
    client: Arc<dyn QueryClient>,
    target: TargetIdentity,
    stats: ScrapeStats,
) -> RdsCollector {
    RdsMetric::DatabaseConnections.collector(client, target, stats)
}

pub fn cpu_utilization(
    client: Arc<dyn QueryClient>,
    target: TargetIdentity,
    stats: ScrapeStats,
) -> RdsCollector {
    RdsMetric::CpuUtilization.collector(client, target, stats)
}

pub fn free_storage_space(
    client: Arc<dyn QueryClient>,
    target: TargetIdentity,
    stats: ScrapeStats,
) -> RdsCollector {
    RdsMetric::FreeStorageSpace.collector(client, target, stats)
}

pub fn freeable_memory(
    client: Arc<dyn QueryClient>,
    target: TargetIdentity,
    stats: ScrapeStats,
) -> RdsCollector {
    RdsMetric::FreeableMemory.collector(client, target, stats)
}

pub fn write_iops(
    client: Arc<dyn QueryClient>,
    target: TargetIdentity,
    stats: ScrapeStats,
) -> RdsCollector {
    RdsMetric::WriteIops.collector(client, target, stats)
}

fn database_connections_query(t: &TargetIdentity) -> String {
    format!(
        r#"mysql_global_status_max_used_connections{{namespace="{ns}", container="mysql-exporter-{rid}"}}"#,
        ns = t.namespace,
        rid = t.resource_id,
    )
}

fn cpu_utilization_query(t: &TargetIdentity) -> String {
    format!(
        r#"container_cpu_usage_seconds_total{{namespace="{ns}", container="mysql-{rid}", pod="{pod}"}}"#,
        ns = t.namespace,
        rid = t.resource_id,
        pod = t.pod_name,
    )
}

fn free_storage_space_query(t: &TargetIdentity) -> String {
    format!(
        r#"kubelet_volume_stats_available_bytes{{persistentvolumeclaim="data-{pod}",namespace="{ns}"}}"#,
        pod = t.pod_name,
        ns = t.namespace,
    )
}

fn freeable_memory_query(t: &TargetIdentity) -> String {
    format!(
        concat!(
            r#"(container_memory_max_usage_bytes{{container="pg-{rid}", namespace="{ns}", pod="{pod}"}}"#,
            r#" - container_memory_usage_bytes{{container="pg-{rid}",namespace="{ns}",pod="{pod}"}})"#,
        ),
        rid = t.resource_id,
        ns = t.namespace,
        pod = t.pod_name,
    )
}

fn write_iops_query(t: &TargetIdentity) -> String {
    format!(
        r#"sum by (pod, namespace) (rate(container_fs_writes_bytes_total{{pod="{pod}", namespace="{ns}"}}[15m]))"#,
        pod = t.pod_name,
        ns = t.namespace,
    )
}
