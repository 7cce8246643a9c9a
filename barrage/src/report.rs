use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::BoxError,
    session::{Outcome, Session},
};

/// Summary of the samples recorded under one metric key.
///
/// Durations are in milliseconds. Percentiles use the nearest-rank method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl MetricSummary {
    /// Returns `None` for an empty sample set.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut values: Vec<f64> = samples.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            mean: values.iter().sum::<f64>() / count as f64,
            p50: percentile(&values, 50.0),
            p90: percentile(&values, 90.0),
            p95: percentile(&values, 95.0),
            p99: percentile(&values, 99.0),
        })
    }
}

/// Nearest-rank percentile of non-empty sorted `values`.
fn percentile(values: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0 * values.len() as f64).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}

/// What a (usually merged) session measured, keyed by the metric key's string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub session: String,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub results: usize,
    /// Recorded responses with a non-2xx status.
    pub failed_responses: usize,
}

impl From<&Session> for Report {
    fn from(value: &Session) -> Self {
        let metrics = value
            .metrics
            .iter()
            .filter_map(|(key, samples)| {
                MetricSummary::from_samples(samples.iter().map(|(_, v)| v.as_f64()))
                    .map(|summary| (key.to_string(), summary))
            })
            .collect();

        let failed_responses = value
            .results
            .values()
            .filter(|outcome| matches!(outcome, Outcome::Response(r) if !r.is_success()))
            .count();

        Self {
            session: value.name().to_owned(),
            metrics,
            results: value.results.len(),
            failed_responses,
        }
    }
}

/// Sends a [`Report`] somewhere: stdout, a file, a database.
#[async_trait]
pub trait Reporter {
    async fn report(&self, report: &Report) -> Result<(), BoxError>;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    pub struct StdoutReporter;
    #[async_trait]
    impl Reporter for StdoutReporter {
        async fn report(&self, report: &Report) -> Result<(), BoxError> {
            println!("{report:#?}");
            Ok(())
        }
    }

    /// Prints the report as a single JSON line.
    pub struct JsonReporter;
    #[async_trait]
    impl Reporter for JsonReporter {
        async fn report(&self, report: &Report) -> Result<(), BoxError> {
            let value = serde_json::to_string(report)?;
            println!("{value}");
            Ok(())
        }
    }
}
