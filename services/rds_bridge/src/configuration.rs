use std::time::Duration;

use anyhow::{bail, Context, Result};
use rds_bridge_core::client::DEFAULT_REQUEST_TIMEOUT;
use rds_bridge_core::rds::{RdsMetric, TargetIdentity};
use serde::{Deserialize, Serialize};
use twelf::{config, Layer};
use url::Url;

pub const DEFAULT_TELEMETRY_PORT: u16 = 9187;

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpstreamConfiguration {
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout: Duration,
}

fn default_telemetry_port() -> u16 {
    DEFAULT_TELEMETRY_PORT
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelemetryConfiguration {
    #[serde(default = "default_telemetry_port")]
    pub port: u16,
}

#[config]
#[derive(Debug, Serialize, Clone)]
pub struct ServiceConfiguration {
    pub upstream: UpstreamConfiguration,
    pub target: TargetIdentity,
    pub collectors: Option<Vec<RdsMetric>>,
    pub telemetry: TelemetryConfiguration,
}

fn validate_identity_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("target.{} must not be empty", name);
    }
    // Values are interpolated into PromQL label matchers verbatim.
    if value.contains(['"', '\\', '\n', '\r']) {
        bail!(
            "target.{} contains characters not allowed in a label matcher: {:?}",
            name,
            value
        );
    }
    Ok(())
}

impl ServiceConfiguration {
    pub(crate) fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.upstream.url)
            .with_context(|| format!("Invalid upstream URL {:?}", self.upstream.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "Upstream URL must use the http or https scheme, got {:?}",
                url.scheme()
            );
        }
        if self.upstream.timeout.is_zero() {
            bail!("Upstream request timeout must be greater than zero!");
        }

        validate_identity_field("instance_name", &self.target.instance_name)?;
        validate_identity_field("namespace", &self.target.namespace)?;
        validate_identity_field("pod_name", &self.target.pod_name)?;
        validate_identity_field("resource_id", &self.target.resource_id)?;

        if let Some(collectors) = &self.collectors {
            if collectors.is_empty() {
                bail!("At least one collector must be enabled, omit the key to enable all");
            }
            for (i, c) in collectors.iter().enumerate() {
                if collectors[..i].contains(c) {
                    bail!("Collector {} is listed more than once", c);
                }
            }
        }

        if self.telemetry.port <= 1024 {
            bail!("Telemetry port must be set to a value greater than 1024!");
        }
        Ok(())
    }

    pub fn enabled_collectors(&self) -> Vec<RdsMetric> {
        self.collectors
            .clone()
            .unwrap_or_else(|| RdsMetric::ALL.to_vec())
    }

    pub fn new(path: &str) -> Result<Self> {
        let conf = Self::with_layers(&[Layer::Json(path.into())]).with_context(|| {
            let cwd = std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            format!(
                "Failed to load configuration from {}, current working directory: {}",
                path, cwd
            )
        })?;
        conf.validate()?;
        Ok(conf)
    }
}
