//! Action — the unit of work a scenario drives against its session.
//!
//! Every action speaks the same protocol: [`Action::run`] takes the session and either
//! hands back an updated one or fails with an [`ActionError`] carrying the untouched
//! session. A failed action must not leave partial metrics or results behind.
//!
//! Because the shape is uniform, scenario code can compose any mix of actions with `?`,
//! retry them, or skip them, without knowing what they are:
//!
//! ```rust,no_run
//! use barrage::{BoxError, Session, action::HttpAction};
//!
//! async fn browse(session: Session) -> Result<Session, BoxError> {
//!     let session = session.run(HttpAction::get("/")).await?;
//!     let session = session.run(HttpAction::get("/products")).await?;
//!     Ok(session)
//! }
//! ```
//!
//! New kinds of actions only need to implement [`Action`]; nothing else changes.
pub mod http;

pub use http::{HttpAction, HttpOptions, Method};

use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

use async_trait::async_trait;

use crate::{error::BoxError, session::Session};

#[async_trait]
pub trait Action
where
    Self: Display + Debug + Send + Sync + Sized + 'static,
{
    /// Execute against `session`, returning it updated with whatever this action records.
    async fn run(self, session: Session) -> Result<Session, ActionError<Self>>;

    /// Stop whatever this action has in flight.
    async fn abort(self, session: Session) -> Result<(Self, Session), ActionError<Self>>;
}

/// A failed action, along with the session as it was when the action started.
pub struct ActionError<A> {
    pub reason: BoxError,
    pub action: A,
    pub session: Session,
}

impl<A> ActionError<A> {
    pub fn new(reason: impl Into<BoxError>, action: A, session: Session) -> Self {
        Self {
            reason: reason.into(),
            action,
            session,
        }
    }
}

impl<A: Display> Display for ActionError<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.action, self.reason)
    }
}

impl<A: Display + Debug> Error for ActionError<A> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.reason.as_ref())
    }
}

// Sessions get large; keep them out of error logs.
impl<A: Debug> Debug for ActionError<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionError")
            .field("reason", &self.reason)
            .field("action", &self.action)
            .field("session", &self.session.name())
            .finish()
    }
}

/// Runs an action `times` times in a row, threading the session through.
///
/// Stops at the first failure, reporting it against the whole `Repeat`.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeat<A> {
    pub action: A,
    pub times: usize,
}

impl<A> Repeat<A> {
    pub fn new(action: A, times: usize) -> Self {
        Self { action, times }
    }
}

impl<A: Display> Display for Repeat<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.action, self.times)
    }
}

#[async_trait]
impl<A> Action for Repeat<A>
where
    A: Action + Clone,
{
    async fn run(self, session: Session) -> Result<Session, ActionError<Self>> {
        let mut session = session;
        for _ in 0..self.times {
            session = match self.action.clone().run(session).await {
                Ok(session) => session,
                Err(e) => return Err(ActionError::new(e.reason, self, e.session)),
            };
        }
        Ok(session)
    }

    async fn abort(self, session: Session) -> Result<(Self, Session), ActionError<Self>> {
        let times = self.times;
        match self.action.abort(session).await {
            Ok((action, session)) => Ok((Self { action, times }, session)),
            Err(e) => Err(ActionError::new(
                e.reason,
                Self {
                    action: e.action,
                    times,
                },
                e.session,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        client::tests::MockClient,
        config::Config,
        session::{Key, MetricValue},
    };

    /// Counts itself into the session, failing once `limit` is reached.
    #[derive(Debug, Clone)]
    struct Tick {
        limit: usize,
    }

    impl Display for Tick {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("tick")
        }
    }

    #[async_trait]
    impl Action for Tick {
        async fn run(self, session: Session) -> Result<Session, ActionError<Self>> {
            if session.metric_values(&Key::from("ticks")).len() >= self.limit {
                return Err(ActionError::new("limit reached", self, session));
            }
            Ok(session.add_metric("ticks", 1u64))
        }

        async fn abort(self, session: Session) -> Result<(Self, Session), ActionError<Self>> {
            Ok((self, session))
        }
    }

    fn session() -> Session {
        Session::new("s", Config::default(), Arc::new(MockClient::ok(200)))
    }

    #[tokio::test]
    async fn repeat_threads_the_session() {
        let session = session()
            .run(Repeat::new(Tick { limit: 10 }, 3))
            .await
            .unwrap();

        let ticks = session.metric_values(&Key::from("ticks"));
        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(|(_, v)| *v == MetricValue::Count(1)));
    }

    #[tokio::test]
    async fn repeat_stops_at_first_failure() {
        let err = session()
            .run(Repeat::new(Tick { limit: 2 }, 5))
            .await
            .unwrap_err();

        assert_eq!(err.reason.to_string(), "limit reached");
        assert_eq!(err.action.times, 5);
        assert_eq!(err.session.metric_values(&Key::from("ticks")).len(), 2);
        assert_eq!(err.to_string(), "tick x5 failed: limit reached");
    }

    #[tokio::test]
    async fn repeat_abort_delegates() {
        let (action, session) = Repeat::new(Tick { limit: 1 }, 2)
            .abort(session())
            .await
            .unwrap();

        assert_eq!(action.times, 2);
        assert!(session.metrics.is_empty());
    }
}
