use std::time::Duration;

use thiserror::Error;

/// Boxed cause carried by failures coming from collaborators and scenarios.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unit-level failures observed by an [`Environment`](crate::Environment) run.
///
/// Action failures never show up here directly: they are returned to the scenario,
/// which decides what to do with them. Only when a scenario gives up does its error
/// surface as [`Error::Scenario`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("scenario `{session}` did not finish within {after:?}")]
    Timeout { session: String, after: Duration },
    #[error("scenario `{session}` failed: {source}")]
    Scenario {
        session: String,
        #[source]
        source: BoxError,
    },
    #[error("scenario task `{session}` did not complete: {source}")]
    Join {
        session: String,
        #[source]
        source: tokio::task::JoinError,
    },
    #[error("environment `{0}` has no scenarios to run")]
    NoScenarios(String),
}
