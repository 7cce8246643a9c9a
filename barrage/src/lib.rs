//! Barrage — run many load-generation scenarios at once and merge what they measured.
//!
//! A scenario is plain async code that drives a sequence of actions (HTTP calls, mostly)
//! against its own [`Session`]. An [`Environment`] runs any number of scenarios
//! concurrently, each bounded by its own timeout, then folds their sessions into one
//! report with every metric and result namespaced by the session it came from.
//!
//! # Architecture
//!
//! - [`Session`]: per-scenario accumulator of config, metrics, results and assigns. Owned
//!   by exactly one scenario while it runs.
//! - [`Action`]: one unit of work. `run` takes the session and hands it back updated, or
//!   fails with an [`ActionError`] that leaves it untouched. [`HttpAction`] is the built-in
//!   one.
//! - [`Scenario`]: the logic driving actions. Implement the trait, or wrap a closure in
//!   [`ScenarioFn`].
//! - [`Environment`]: spawns one task per scenario, enforces timeouts, and merges the
//!   sessions with [`merge`].
//! - [`HttpClient`]: the transport. Barrage shapes requests and measures them; the client
//!   sends them.
//! - [`Report`] / [`Reporter`]: summarize a session and send the summary somewhere.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use barrage::{
//!     BoxError, Config, Environment, Report, Reporter, ScenarioEntry, ScenarioFn, Session,
//!     action::{HttpAction, HttpOptions},
//!     report::StdoutReporter,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let browse = ScenarioFn::new("browse", |session: Session| async move {
//!         let session = session.run(HttpAction::get("/")).await?;
//!         let session = session.delay(Duration::from_millis(100)).await;
//!         Ok::<_, BoxError>(session.run(HttpAction::get("/products")).await?)
//!     });
//!     let order = ScenarioFn::new("order", |session: Session| async move {
//!         let options = HttpOptions::new().json(json!({ "sku": "A-1", "qty": 2 }));
//!         Ok::<_, BoxError>(session.run(HttpAction::post("/orders", options)).await?)
//!     });
//!
//!     let merged = Environment::builder()
//!         .name("shop")
//!         .config(
//!             Config::builder()
//!                 .base_url("http://localhost:3000")
//!                 .scenario_timeout(Duration::from_secs(30))
//!                 .build(),
//!         )
//!         .scenarios(vec![
//!             ScenarioEntry::new(browse, Config::default()),
//!             ScenarioEntry::new(order, Config::default()),
//!         ])
//!         .build()
//!         .run()
//!         .await?;
//!
//!     StdoutReporter.report(&Report::from(&merged)).await
//! }
//! ```
//!
//! # Feature flags
//!
//! - `builtins`: provides [`ReqwestClient`](client::ReqwestClient) (also the default
//!   client of an [`Environment`]), [`StdoutReporter`](report::StdoutReporter) and
//!   [`JsonReporter`](report::JsonReporter). (Enabled by default)

/// Actions and the protocol they implement
pub mod action;
/// The HTTP transport boundary
pub mod client;
/// Session configuration
pub mod config;
/// Concurrent scenario orchestration
pub mod environment;
/// Crate errors
pub mod error;
/// Reports and Reporters
pub mod report;
/// Scenarios and running one to completion
pub mod scenario;
/// Sessions, their metrics and results, and merging them
pub mod session;

pub use action::{Action, ActionError, HttpAction};
pub use client::{HttpClient, Response};
pub use config::{Config, ScenarioTimeout};
pub use environment::{Environment, ScenarioEntry};
pub use error::{BoxError, Error, Result};
pub use report::{Report, Reporter};
pub use scenario::{Scenario, ScenarioFn, execute};
pub use session::{Key, MetricValue, Outcome, Session, merge};
