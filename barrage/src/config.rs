use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use typed_builder::TypedBuilder;

/// How long an environment waits for a single scenario before failing the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTimeout {
    /// Wait for as long as the scenario takes.
    #[default]
    Unbounded,
    After(Duration),
}

impl ScenarioTimeout {
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Unbounded => None,
            Self::After(after) => Some(*after),
        }
    }
}

impl From<Duration> for ScenarioTimeout {
    fn from(value: Duration) -> Self {
        Self::After(value)
    }
}

/// Read-only options a session is seeded with.
///
/// Every field is optional so a scenario's config can be layered over the shared
/// environment config with [`Config::layered_over`]. Use the accessors to read values
/// with their defaults applied.
///
/// ```rust
/// use std::time::Duration;
/// use barrage::{Config, ScenarioTimeout};
///
/// let config = Config::builder()
///     .base_url("http://localhost:3000")
///     .scenario_timeout(Duration::from_secs(30))
///     .build();
///
/// assert_eq!(config.timeout(), ScenarioTimeout::After(Duration::from_secs(30)));
/// assert!(!config.skip_metrics_in_query_params());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct Config {
    /// Prefix for relative request paths.
    #[builder(default, setter(strip_option, into))]
    pub base_url: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub scenario_timeout: Option<ScenarioTimeout>,
    /// Drop the query string from HTTP metric keys to keep their cardinality down.
    #[builder(default, setter(strip_option))]
    pub skip_metrics_in_query_params: Option<bool>,
    /// Options handed to the HTTP client untouched.
    #[builder(default)]
    pub http: Map<String, Value>,
    /// Overrides the scenario's own name as the session name.
    #[builder(default, setter(strip_option, into))]
    pub session_name: Option<String>,
}

impl Config {
    pub fn timeout(&self) -> ScenarioTimeout {
        self.scenario_timeout.unwrap_or_default()
    }

    pub fn skip_metrics_in_query_params(&self) -> bool {
        self.skip_metrics_in_query_params.unwrap_or(false)
    }

    /// Returns `self` with every unset option taken from `base`.
    ///
    /// `http` maps are merged key by key, keys from `self` winning. `session_name` is
    /// never inherited: a shared name would make sessions collide when merged.
    pub fn layered_over(&self, base: &Config) -> Config {
        let mut http = base.http.clone();
        http.extend(self.http.clone());

        Config {
            base_url: self.base_url.clone().or_else(|| base.base_url.clone()),
            scenario_timeout: self.scenario_timeout.or(base.scenario_timeout),
            skip_metrics_in_query_params: self
                .skip_metrics_in_query_params
                .or(base.skip_metrics_in_query_params),
            http,
            session_name: self.session_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::default();

        assert_eq!(config.timeout(), ScenarioTimeout::Unbounded);
        assert_eq!(config.timeout().duration(), None);
        assert!(!config.skip_metrics_in_query_params());
    }

    #[test]
    fn scenario_options_win_over_base() {
        let mut base_http = Map::new();
        base_http.insert("timeout_ms".into(), json!(500));
        base_http.insert("pool".into(), json!("shared"));
        let base = Config::builder()
            .base_url("http://base.local")
            .scenario_timeout(Duration::from_secs(5))
            .skip_metrics_in_query_params(true)
            .http(base_http)
            .session_name("base")
            .build();

        let mut own_http = Map::new();
        own_http.insert("timeout_ms".into(), json!(50));
        let own = Config::builder()
            .base_url("http://own.local")
            .http(own_http)
            .build();

        let layered = own.layered_over(&base);

        assert_eq!(layered.base_url.as_deref(), Some("http://own.local"));
        assert_eq!(layered.timeout(), ScenarioTimeout::After(Duration::from_secs(5)));
        assert!(layered.skip_metrics_in_query_params());
        assert_eq!(layered.http["timeout_ms"], json!(50));
        assert_eq!(layered.http["pool"], json!("shared"));
        assert_eq!(layered.session_name, None);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: Config = serde_json::from_value(json!({
            "base_url": "http://x.com",
            "scenario_timeout": { "after": { "secs": 2, "nanos": 0 } }
        }))
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://x.com"));
        assert_eq!(config.timeout().duration(), Some(Duration::from_secs(2)));
        assert!(config.http.is_empty());
    }
}
