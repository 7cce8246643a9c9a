use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{
    client::HttpClient,
    config::Config,
    error::{BoxError, Error},
    session::Session,
};

/// Load-generation logic driving a sequence of actions against one session.
///
/// What to do when an action fails is up to the scenario: retry it, skip it, or give up
/// by returning the error, which fails the environment run.
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    /// Session name used when the config does not set `session_name`.
    fn name(&self) -> &str;

    async fn run(&self, session: Session) -> Result<Session, BoxError>;
}

/// A [`Scenario`] made from an async closure.
///
/// ```rust
/// use barrage::{BoxError, ScenarioFn, Session, action::HttpAction};
///
/// let scenario = ScenarioFn::new("landing page", |session: Session| async move {
///     Ok::<_, BoxError>(session.run(HttpAction::get("/")).await?)
/// });
/// ```
#[derive(Clone)]
pub struct ScenarioFn<F> {
    name: String,
    run: F,
}

impl<F, Fut> ScenarioFn<F>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Session, BoxError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

#[async_trait]
impl<F, Fut> Scenario for ScenarioFn<F>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Session, BoxError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, session: Session) -> Result<Session, BoxError> {
        (self.run)(session).await
    }
}

/// Runs `scenario` to completion on a fresh session seeded from `config`.
pub async fn execute(
    scenario: &dyn Scenario,
    config: Config,
    client: Arc<dyn HttpClient>,
) -> Result<Session, Error> {
    let name = session_name(scenario, &config);
    let session = Session::new(name.clone(), config, client);

    tracing::info!("Running scenario {}", scenario.name());
    let session = scenario
        .run(session)
        .await
        .map_err(|source| Error::Scenario {
            session: name,
            source,
        })?;
    tracing::info!("Done running scenario: {}!", scenario.name());

    Ok(session)
}

pub(crate) fn session_name(scenario: &dyn Scenario, config: &Config) -> String {
    config
        .session_name
        .clone()
        .unwrap_or_else(|| scenario.name().to_owned())
}
