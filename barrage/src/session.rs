//! Session — the per-scenario accumulator of metrics, results and assigns.
//!
//! A [`Session`] is created empty when a scenario starts and is owned by that scenario
//! alone until it finishes. Every successful action hands back an updated session:
//! metrics appended, results recorded, assigns updated. Nothing is shared between
//! sessions while they run, so none of this needs synchronization.
//!
//! Keys recorded while a scenario runs are *local*. They only get namespaced with the
//! session name when sessions are folded together by [`merge`], which is what keeps two
//! scenarios that hit the same endpoint from overwriting each other.
//!
//! # Merging
//!
//! ```text
//! A.metrics: [duration, GET, /]   -> [(t1, 10ms)]
//! B.metrics: [duration, GET, /]   -> [(t2, 12ms)]
//!
//! merge([A, B]).metrics:
//!   [A, duration, GET, /] -> [(t1, 10ms)]
//!   [B, duration, GET, /] -> [(t2, 12ms)]
//! ```
//!
//! The merged session keeps the config, assigns and client of the first session. It is
//! a reporting artifact, not something to keep running scenarios on.
use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    action::{Action, ActionError},
    client::{HttpClient, Response},
    config::Config,
};

/// Wall-clock time a metric was recorded at.
pub type Timestamp = SystemTime;

/// Composite key used for both metrics and results, e.g. `[duration, GET, url]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns a copy of this key with `prefix` as its first segment.
    pub fn prefixed(&self, prefix: &str) -> Key {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(prefix.to_owned());
        segments.extend(self.0.iter().cloned());
        Key(segments)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(vec![value.to_owned()])
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(vec![value])
    }
}

impl From<Vec<String>> for Key {
    fn from(value: Vec<String>) -> Self {
        Key(value)
    }
}

impl<const N: usize> From<[&str; N]> for Key {
    fn from(value: [&str; N]) -> Self {
        Key::new(value)
    }
}

/// A single recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Duration(Duration),
    Count(u64),
    Gauge(f64),
}

impl MetricValue {
    /// The sample as a plain number. Durations are expressed in milliseconds.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Duration(d) => d.as_nanos() as f64 / 1_000_000.0,
            Self::Count(c) => *c as f64,
            Self::Gauge(g) => *g,
        }
    }
}

impl From<Duration> for MetricValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self::Count(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Gauge(value)
    }
}

/// What an action produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Response(Response),
    Value(Value),
}

impl From<Response> for Outcome {
    fn from(value: Response) -> Self {
        Self::Response(value)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

pub type Metrics = BTreeMap<Key, Vec<(Timestamp, MetricValue)>>;
pub type Results = BTreeMap<Key, Outcome>;

#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    config: Arc<Config>,
    client: Arc<dyn HttpClient>,
    pub metrics: Metrics,
    pub results: Results,
    pub assigns: BTreeMap<String, Value>,
}

impl Session {
    pub fn new(name: impl Into<String>, config: Config, client: Arc<dyn HttpClient>) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            client,
            metrics: Metrics::new(),
            results: Results::new(),
            assigns: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    /// Appends `value` under `key`, timestamped now.
    pub fn add_metric(self, key: impl Into<Key>, value: impl Into<MetricValue>) -> Self {
        self.add_metric_at(key, value, SystemTime::now())
    }

    pub fn add_metric_at(
        mut self,
        key: impl Into<Key>,
        value: impl Into<MetricValue>,
        at: Timestamp,
    ) -> Self {
        self.metrics
            .entry(key.into())
            .or_default()
            .push((at, value.into()));
        self
    }

    /// Records `outcome` under the action's string form. Last write wins.
    pub fn add_result(mut self, action: &impl fmt::Display, outcome: impl Into<Outcome>) -> Self {
        self.results
            .insert(Key::from(action.to_string()), outcome.into());
        self
    }

    pub fn assign<I, K>(mut self, assigns: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.assigns
            .extend(assigns.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn metric_values(&self, key: &Key) -> &[(Timestamp, MetricValue)] {
        self.metrics.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn result(&self, key: &Key) -> Option<&Outcome> {
        self.results.get(key)
    }

    pub fn get_assign(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// Copy of the metrics with every key prefixed by the session name.
    pub fn namespaced_metrics(&self) -> Metrics {
        self.metrics
            .iter()
            .map(|(k, v)| (k.prefixed(&self.name), v.clone()))
            .collect()
    }

    /// Copy of the results with every key prefixed by the session name.
    pub fn namespaced_results(&self) -> Results {
        self.results
            .iter()
            .map(|(k, v)| (k.prefixed(&self.name), v.clone()))
            .collect()
    }

    /// Runs `action` against this session.
    pub async fn run<A: Action>(self, action: A) -> Result<Session, ActionError<A>> {
        action.run(self).await
    }

    /// Pauses the scenario for `duration`.
    pub async fn delay(self, duration: Duration) -> Self {
        tokio::time::sleep(duration).await;
        self
    }
}

/// Folds `sessions` into one session whose metric and result keys are namespaced by the
/// name of the session they came from.
///
/// Metric samples under the same namespaced key are concatenated in input order;
/// results under the same namespaced key are last-write-wins. Config, assigns, client
/// and name come from the first session.
///
/// # Panics
///
/// Panics if `sessions` is empty. Merging nothing is a programming error; the
/// [`Environment`](crate::Environment) refuses to run without scenarios so it never
/// gets here.
pub fn merge<I>(sessions: I) -> Session
where
    I: IntoIterator<Item = Session>,
{
    let mut sessions = sessions.into_iter();
    let Some(first) = sessions.next() else {
        panic!("merge requires at least one session");
    };

    let metrics = first.namespaced_metrics();
    let results = first.namespaced_results();
    let mut merged = Session {
        metrics,
        results,
        ..first
    };

    for session in sessions {
        for (key, mut samples) in session.namespaced_metrics() {
            merged.metrics.entry(key).or_default().append(&mut samples);
        }
        merged.results.extend(session.namespaced_results());
    }

    merged
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::client::tests::MockClient;
    use serde_json::json;

    fn session(name: &str) -> Session {
        Session::new(name, Config::default(), Arc::new(MockClient::ok(200)))
    }

    fn sample(name: &str) -> Session {
        session(name)
            .add_metric(["duration", "GET", "/"], Duration::from_millis(10))
            .add_metric(["duration", "GET", "/"], Duration::from_millis(20))
            .add_metric("requests", 1u64)
            .add_result(&"GET /", json!({ "from": name }))
    }

    fn metric_set(session: &Session) -> BTreeSet<(Key, usize)> {
        session
            .metrics
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }

    fn result_set(session: &Session) -> BTreeSet<Key> {
        session.results.keys().cloned().collect()
    }

    #[test]
    fn metrics_append_under_the_same_key() {
        let s = sample("a");
        let key = Key::from(["duration", "GET", "/"]);

        let values: Vec<_> = s.metric_values(&key).iter().map(|(_, v)| *v).collect();
        assert_eq!(
            values,
            vec![
                MetricValue::Duration(Duration::from_millis(10)),
                MetricValue::Duration(Duration::from_millis(20)),
            ]
        );
        assert!(s.metric_values(&Key::from("missing")).is_empty());
    }

    #[test]
    fn explicit_timestamps_are_kept() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let s = session("a").add_metric_at("gauge", 1.5, at);

        assert_eq!(
            s.metric_values(&Key::from("gauge")),
            &[(at, MetricValue::Gauge(1.5))]
        );
    }

    #[test]
    fn results_are_last_write_wins() {
        let s = session("a")
            .add_result(&"GET /", json!(1))
            .add_result(&"GET /", json!(2));

        assert_eq!(s.results.len(), 1);
        assert_eq!(
            s.result(&Key::from("GET /")),
            Some(&Outcome::Value(json!(2)))
        );
    }

    #[test]
    fn assign_overwrites_existing_keys() {
        let s = session("a")
            .assign([("user", json!("alice")), ("step", json!(1))])
            .assign([("step", json!(2))]);

        assert_eq!(s.get_assign("user"), Some(&json!("alice")));
        assert_eq!(s.get_assign("step"), Some(&json!(2)));
    }

    #[test]
    fn namespacing_prefixes_every_key() {
        let s = sample("a");

        let metrics = s.namespaced_metrics();
        assert!(metrics.contains_key(&Key::from(["a", "duration", "GET", "/"])));
        assert!(metrics.contains_key(&Key::from(["a", "requests"])));
        assert!(s.namespaced_results().contains_key(&Key::from(["a", "GET /"])));
        // the session itself keeps local keys
        assert!(s.metrics.contains_key(&Key::from("requests")));
    }

    #[test]
    fn merge_namespaces_and_keeps_every_sample() {
        let inputs = vec![sample("a"), sample("b"), sample("c")];
        let mut expected_metrics = BTreeSet::new();
        let mut expected_results = BTreeSet::new();
        for s in &inputs {
            for (k, v) in &s.metrics {
                expected_metrics.insert((k.prefixed(s.name()), v.len()));
            }
            for k in s.results.keys() {
                expected_results.insert(k.prefixed(s.name()));
            }
        }

        let merged = merge(inputs);

        assert_eq!(metric_set(&merged), expected_metrics);
        assert_eq!(result_set(&merged), expected_results);
        assert_eq!(
            merged.result(&Key::from(["b", "GET /"])),
            Some(&Outcome::Value(json!({ "from": "b" })))
        );
    }

    #[test]
    fn merge_order_only_changes_what_the_first_session_contributes() {
        let a = sample("a").assign([("origin", json!("a"))]);
        let b = sample("b").assign([("origin", json!("b"))]);
        let c = sample("c");

        let abc = merge(vec![a.clone(), b.clone(), c.clone()]);
        let bac = merge(vec![b, a, c]);

        assert_eq!(metric_set(&abc), metric_set(&bac));
        assert_eq!(result_set(&abc), result_set(&bac));
        assert_eq!(abc.name(), "a");
        assert_eq!(bac.name(), "b");
        assert_eq!(abc.get_assign("origin"), Some(&json!("a")));
        assert_eq!(bac.get_assign("origin"), Some(&json!("b")));
    }

    #[test]
    fn merge_concatenates_samples_of_colliding_names() {
        let merged = merge(vec![sample("a"), sample("a")]);

        let key = Key::from(["a", "duration", "GET", "/"]);
        assert_eq!(merged.metric_values(&key).len(), 4);
        assert_eq!(merged.results.len(), 1);
    }

    #[test]
    fn merge_of_one_session_only_namespaces() {
        let merged = merge(vec![sample("solo")]);

        assert!(
            merged
                .metrics
                .keys()
                .all(|k| k.segments().first().map(String::as_str) == Some("solo"))
        );
    }

    #[test]
    #[should_panic(expected = "at least one session")]
    fn merge_of_nothing_panics() {
        merge(Vec::<Session>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_sleeps_then_hands_the_session_back() {
        let start = tokio::time::Instant::now();
        let s = session("a").delay(Duration::from_secs(3)).await;

        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(s.name(), "a");
    }
}
