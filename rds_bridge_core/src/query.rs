//! Response model of the Prometheus HTTP query API and the client seam used
//! by collectors.
//!
//! Only instant queries (`/api/v1/query`) are modelled. A successful
//! response looks like:
//!
//! ```json
//! {"status": "success",
//!  "data": {"resultType": "vector",
//!           "result": [{"metric": {"instance": "db-1"}, "value": [1700000000.1, "42.5"]}]}}
//! ```

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Request to the upstream query API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Upstream query API responded with HTTP status {0}")]
    Status(u16),
    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Upstream query API returned an error ({error_type}): {error}")]
    Upstream { error_type: String, error: String },
    #[error("Unexpected result type {0:?}, only instant vectors are supported")]
    UnexpectedResultType(String),
    #[error("Query returned no data")]
    NoData,
    #[error("Sample value {0} is not a number")]
    InvalidValue(String),
}

/// Executes instant queries against a Prometheus-compatible API.
pub trait QueryClient: std::fmt::Debug + Send + Sync {
    fn query(&self, promql: &str) -> Result<QueryResponse, QueryError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status: ResponseStatus,
    pub data: Option<QueryData>,
    pub error_type: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Vector(Vec<Sample>),
    Matrix(Value),
    Scalar(Value),
    String(Value),
}

impl QueryData {
    pub fn result_type(&self) -> &'static str {
        match self {
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::Scalar(_) => "scalar",
            QueryData::String(_) => "string",
        }
    }
}

/// One series of an instant vector.
#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub value: SampleValue,
}

/// `[<unix timestamp>, "<value>"]`
#[derive(Debug, Clone, Deserialize)]
pub struct SampleValue(pub f64, pub Value);

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric.get(name).map(String::as_str)
    }

    /// The `instance` label of the series, empty when the upstream omits it.
    pub fn instance(&self) -> &str {
        self.label("instance").unwrap_or_default()
    }

    pub fn timestamp(&self) -> f64 {
        self.value.0
    }

    pub fn value(&self) -> Result<f64, QueryError> {
        parse_sample_value(&self.value.1)
    }
}

/// Prometheus encodes sample values as strings so that `NaN` and `±Inf`
/// survive JSON; plain numbers are accepted as well.
pub fn parse_sample_value(raw: &Value) -> Result<f64, QueryError> {
    match raw {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| QueryError::InvalidValue(format!("{:?}", s))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| QueryError::InvalidValue(n.to_string())),
        other => Err(QueryError::InvalidValue(other.to_string())),
    }
}

impl QueryResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, QueryError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Turns an error envelope into [`QueryError::Upstream`].
    pub fn into_checked(self) -> Result<Self, QueryError> {
        match self.status {
            ResponseStatus::Success => Ok(self),
            ResponseStatus::Error => Err(QueryError::Upstream {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                error: self.error.unwrap_or_default(),
            }),
        }
    }

    /// The first series of the result. Any further series are ignored.
    pub fn first_sample(&self) -> Result<&Sample, QueryError> {
        if self.status == ResponseStatus::Error {
            return Err(QueryError::Upstream {
                error_type: self.error_type.clone().unwrap_or_else(|| "unknown".to_string()),
                error: self.error.clone().unwrap_or_default(),
            });
        }
        match &self.data {
            None => Err(QueryError::NoData),
            Some(QueryData::Vector(samples)) => samples.first().ok_or(QueryError::NoData),
            Some(other) => Err(QueryError::UnexpectedResultType(
                other.result_type().to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> anyhow::Result<QueryResponse> {
        Ok(QueryResponse::from_slice(&serde_json::to_vec(&v)?)?)
    }

    #[test]
    fn test_first_sample_of_vector() -> anyhow::Result<()> {
        let resp = decode(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"instance": "db-1", "pod": "p"}, "value": [1700000000.5, "42.5"]},
                    {"metric": {"instance": "db-2"}, "value": [1700000000.5, "1"]}
                ]
            }
        }))?;
        let sample = resp.first_sample()?;
        assert_eq!(sample.instance(), "db-1");
        assert_eq!(sample.label("pod"), Some("p"));
        assert_eq!(sample.timestamp(), 1700000000.5);
        assert_eq!(sample.value()?, 42.5);
        Ok(())
    }

    #[test]
    fn test_empty_vector_is_no_data() -> anyhow::Result<()> {
        let resp = decode(json!({
            "status": "success",
            "data": {"resultType": "vector", "result": []}
        }))?;
        assert!(matches!(resp.first_sample(), Err(QueryError::NoData)));
        Ok(())
    }

    #[test]
    fn test_missing_instance_label() -> anyhow::Result<()> {
        let resp = decode(json!({
            "status": "success",
            "data": {"resultType": "vector", "result": [{"metric": {}, "value": [1, "3"]}]}
        }))?;
        assert_eq!(resp.first_sample()?.instance(), "");
        Ok(())
    }

    #[test]
    fn test_scalar_result_is_rejected() -> anyhow::Result<()> {
        let resp = decode(json!({
            "status": "success",
            "data": {"resultType": "scalar", "result": [1700000000, "7"]}
        }))?;
        match resp.first_sample() {
            Err(QueryError::UnexpectedResultType(t)) => assert_eq!(t, "scalar"),
            other => panic!("unexpected: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_error_envelope() -> anyhow::Result<()> {
        let resp = decode(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 5"
        }))?;
        assert!(matches!(
            resp.first_sample(),
            Err(QueryError::Upstream { .. })
        ));
        match resp.into_checked() {
            Err(QueryError::Upstream { error_type, error }) => {
                assert_eq!(error_type, "bad_data");
                assert_eq!(error, "parse error at char 5");
            }
            other => panic!("unexpected: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_parse_sample_value() -> anyhow::Result<()> {
        assert_eq!(parse_sample_value(&json!("42.5"))?, 42.5);
        assert_eq!(parse_sample_value(&json!("1e3"))?, 1000.0);
        assert_eq!(parse_sample_value(&json!(7))?, 7.0);
        assert!(parse_sample_value(&json!("NaN"))?.is_nan());
        let neg_inf = parse_sample_value(&json!("-Inf"))?;
        assert!(neg_inf.is_infinite() && neg_inf.is_sign_negative());
        assert!(matches!(
            parse_sample_value(&json!("abc")),
            Err(QueryError::InvalidValue(_))
        ));
        assert!(matches!(
            parse_sample_value(&json!(null)),
            Err(QueryError::InvalidValue(_))
        ));
        Ok(())
    }

    #[test]
    fn test_garbage_body() {
        assert!(matches!(
            QueryResponse::from_slice(b"<html>bad gateway</html>"),
            Err(QueryError::Decode(_))
        ));
    }
}
