//! Metrics client (ambient component A2): a narrow interface over a
//! Prometheus-compatible instant-query endpoint, used by the example
//! pages.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetricsError {
    #[error("request to metrics endpoint failed")]
    Transport(#[from] Box<ureq::Error>),

    #[error("failed to read or parse metrics response")]
    Io(#[from] std::io::Error),

    #[error("query did not succeed: {0}")]
    QueryFailed(String),

    #[error("query returned no results")]
    EmptyResult,

    #[error("series value was not a valid number: {0:?}")]
    ValueParse(String),
}

/// One labeled time series sample, as returned by an instant query:
/// `{metric: {label: value, ...}, value: [timestamp, "value"]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    pub metric: HashMap<String, String>,
    pub value: (f64, String),
}

impl Series {
    pub fn parsed_value(&self) -> Result<f64, MetricsError> {
        self.value
            .1
            .parse()
            .map_err(|_| MetricsError::ValueParse(self.value.1.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryData {
    pub result: Vec<Series>,
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    status: String,
    data: QueryData,
}

/// What the example pages need from an upstream metrics source. Narrow on
/// purpose: the core never depends on the concrete query language or
/// transport, only this trait.
pub trait MetricsClient: Send + Sync {
    fn query(&self, promql: &str) -> Result<QueryData, MetricsError>;

    fn query_first_value(&self, promql: &str) -> Result<f64, MetricsError> {
        self.query(promql)?
            .result
            .first()
            .ok_or(MetricsError::EmptyResult)?
            .parsed_value()
    }

    /// Runs `promql` and indexes each series' parsed value by the value of
    /// label `by`, dropping series missing that label.
    fn query_map_by(&self, promql: &str, by: &str) -> Result<HashMap<String, f64>, MetricsError> {
        let data = self.query(promql)?;
        let mut out = HashMap::with_capacity(data.result.len());
        for series in &data.result {
            if let Some(name) = series.metric.get(by) {
                out.insert(name.clone(), series.parsed_value()?);
            }
        }
        Ok(out)
    }
}

/// A `MetricsClient` backed by a Prometheus-compatible `/api/v1/query`
/// endpoint.
pub struct PrometheusClient {
    base_url: String,
    agent: ureq::Agent,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(QUERY_TIMEOUT).build();
        Self {
            base_url: base_url.into(),
            agent,
        }
    }
}

impl MetricsClient for PrometheusClient {
    fn query(&self, promql: &str) -> Result<QueryData, MetricsError> {
        let url = format!("{}/api/v1/query", self.base_url.trim_end_matches('/'));
        let response = self
            .agent
            .get(&url)
            .query("query", promql)
            .call()
            .map_err(|e| MetricsError::Transport(Box::new(e)))?;
        let envelope: Envelope = response.into_json()?;
        if envelope.status != "success" {
            return Err(MetricsError::QueryFailed(envelope.status));
        }
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient {
        data: QueryData,
    }

    impl MetricsClient for StubClient {
        fn query(&self, _promql: &str) -> Result<QueryData, MetricsError> {
            Ok(QueryData {
                result: self.data.result.clone(),
            })
        }
    }

    fn series(labels: &[(&str, &str)], value: &str) -> Series {
        Series {
            metric: labels.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect(),
            value: (0.0, value.to_owned()),
        }
    }

    #[test]
    fn query_first_value_parses_the_first_series() {
        let client = StubClient {
            data: QueryData {
                result: vec![series(&[("name", "lte")], "42.5")],
            },
        };
        assert_eq!(client.query_first_value("anything").unwrap(), 42.5);
    }

    #[test]
    fn query_first_value_fails_on_empty_result() {
        let client = StubClient {
            data: QueryData { result: vec![] },
        };
        assert!(matches!(
            client.query_first_value("anything"),
            Err(MetricsError::EmptyResult)
        ));
    }

    #[test]
    fn query_map_by_indexes_by_label_and_skips_missing() {
        let client = StubClient {
            data: QueryData {
                result: vec![
                    series(&[("name", "lte")], "1.0"),
                    series(&[("name", "wired")], "2.0"),
                    series(&[("other", "x")], "3.0"),
                ],
            },
        };
        let map = client.query_map_by("anything", "name").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["lte"], 1.0);
        assert_eq!(map["wired"], 2.0);
    }
}
