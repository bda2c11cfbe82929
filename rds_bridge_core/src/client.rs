use std::time::Duration;

use log::debug;

use crate::query::{QueryClient, QueryError, QueryResponse};

pub const QUERY_PATH: &str = "/api/v1/query";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP client for the instant query endpoint.
///
/// The underlying `reqwest` client owns its own runtime thread, so it must be
/// created and dropped outside of an async context.
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpQueryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rds_bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), QUERY_PATH),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl QueryClient for HttpQueryClient {
    fn query(&self, promql: &str) -> Result<QueryResponse, QueryError> {
        debug!(
            target: "rds_bridge::client",
            "GET {} query={}", self.endpoint, promql
        );
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", promql)])
            .send()?;
        let status = response.status();
        let body = response.bytes()?;
        // Prometheus sends a JSON error envelope along with 4xx/5xx codes,
        // which carries a better message than the bare status.
        match QueryResponse::from_slice(&body) {
            Ok(decoded) => {
                let decoded = decoded.into_checked()?;
                if !status.is_success() {
                    return Err(QueryError::Status(status.as_u16()));
                }
                Ok(decoded)
            }
            Err(_) if !status.is_success() => Err(QueryError::Status(status.as_u16())),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() -> anyhow::Result<()> {
        let client = HttpQueryClient::new("http://thanos-query:9090/", DEFAULT_REQUEST_TIMEOUT)?;
        assert_eq!(client.endpoint(), "http://thanos-query:9090/api/v1/query");
        let client = HttpQueryClient::new("http://federate/prom", Duration::from_secs(1))?;
        assert_eq!(client.endpoint(), "http://federate/prom/api/v1/query");
        Ok(())
    }
}
