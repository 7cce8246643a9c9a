//! Environment — runs every scenario concurrently and merges what they produce.
//!
//! Each `(scenario, config)` pair becomes one Tokio task owning its own [`Session`].
//! Tasks share nothing but the HTTP client handle, so a slow scenario cannot stall
//! another one's clock.
//!
//! # High-level flow
//! 1. Layer each scenario's config over the environment config.
//! 2. Spawn one task per scenario, each bounded by its own `scenario_timeout`. The
//!    timeout runs inside the task, so the whole run is bounded by the largest timeout
//!    rather than their sum.
//! 3. Wait for every task. The first failure or timeout aborts the tasks still running
//!    and fails the run; there is no partial report. Dropping the `run` future aborts
//!    them too.
//! 4. Merge the sessions, in declaration order, into one namespaced session.
//!
//! # Logging
//! The environment takes a [`tracing::Span`] (by default `environment{name}`). Each
//! scenario task runs inside a child `scenario{session}` span, so everything an action
//! logs can be traced back to the scenario that issued it. No subscriber is installed
//! here; that is left to the binary.
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, Span};
use typed_builder::TypedBuilder;

use crate::{
    client::HttpClient,
    config::{Config, ScenarioTimeout},
    error::{Error, Result},
    scenario::{Scenario, execute, session_name},
    session::{Session, merge},
};

/// A scenario and the config its session is seeded with.
#[derive(Clone)]
pub struct ScenarioEntry {
    pub scenario: Arc<dyn Scenario>,
    pub config: Config,
}

impl ScenarioEntry {
    pub fn new(scenario: impl Scenario, config: Config) -> Self {
        Self {
            scenario: Arc::new(scenario),
            config,
        }
    }
}

#[derive(TypedBuilder)]
pub struct Environment {
    #[builder(setter(into))]
    pub name: String,
    pub scenarios: Vec<ScenarioEntry>,
    /// Shared config every scenario's config is layered over.
    #[builder(default)]
    pub config: Config,
    #[cfg_attr(
        feature = "builtins",
        builder(default = Arc::new(crate::client::ReqwestClient::default()) as Arc<dyn HttpClient>)
    )]
    pub client: Arc<dyn HttpClient>,
    /// Parent span of every scenario task. Defaults to `environment{name}`.
    #[builder(default, setter(strip_option))]
    pub span: Option<Span>,
}

impl Environment {
    /// Runs every scenario and returns their merged session.
    ///
    /// Fails if any scenario fails, panics or exceeds its timeout.
    pub async fn run(&self) -> Result<Session> {
        let span = self
            .span
            .clone()
            .unwrap_or_else(|| tracing::info_span!("environment", name = %self.name));
        self.run_scenarios(&span).instrument(span.clone()).await
    }

    async fn run_scenarios(&self, span: &Span) -> Result<Session> {
        if self.scenarios.is_empty() {
            return Err(Error::NoScenarios(self.name.clone()));
        }

        tracing::info!("Spawning {} scenarios...", self.scenarios.len());
        let units: Vec<_> = self
            .scenarios
            .iter()
            .map(|entry| self.spawn(entry, span))
            .collect();
        let _guard = AbortOnDrop(
            units
                .iter()
                .map(|(_, handle)| handle.abort_handle())
                .collect(),
        );

        tracing::info!("Waiting for scenarios...");
        let joined = try_join_all(units.into_iter().map(|(session, handle)| async move {
            match handle.await {
                Ok(result) => result,
                Err(source) => Err(Error::Join { session, source }),
            }
        }))
        .await;

        let sessions = match joined {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!("Environment {} failed: {}", self.name, e);
                return Err(e);
            }
        };

        tracing::info!("Merging {} sessions...", sessions.len());
        Ok(merge(sessions))
    }

    fn spawn(
        &self,
        entry: &ScenarioEntry,
        parent: &Span,
    ) -> (String, JoinHandle<Result<Session>>) {
        let config = entry.config.layered_over(&self.config);
        let scenario = Arc::clone(&entry.scenario);
        let client = Arc::clone(&self.client);
        let session = session_name(scenario.as_ref(), &config);
        let span = tracing::info_span!(parent: parent, "scenario", session = %session);
        let timeout = config.timeout();
        let label = session.clone();

        let unit = async move {
            let run = execute(scenario.as_ref(), config, client);
            match timeout {
                ScenarioTimeout::Unbounded => run.await,
                ScenarioTimeout::After(after) => match tokio::time::timeout(after, run).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!("Scenario {} timed out after {:?}", label, after);
                        Err(Error::Timeout {
                            session: label,
                            after,
                        })
                    }
                },
            }
        };

        (session, tokio::spawn(unit.instrument(span)))
    }
}

/// Aborts every scenario task still running when dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.iter().for_each(AbortHandle::abort);
    }
}
