use std::fmt::{self, Display};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use super::{Action, ActionError};
use crate::{
    client::{Headers, Params, RequestOptions, Response},
    config::Config,
    session::{Key, Session},
};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body data, encoded when the action is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Form(Params),
}

/// Options for building an [`HttpAction`].
///
/// A request carries at most one payload: calling [`json`](Self::json) after
/// [`form`](Self::form) (or the reverse) replaces it.
///
/// ```rust
/// use barrage::action::{HttpAction, HttpOptions};
/// use serde_json::json;
///
/// let action = HttpAction::post(
///     "/login",
///     HttpOptions::new()
///         .json(json!({ "user": "alice" }))
///         .header("X-Trace", "1"),
/// );
///
/// assert_eq!(&action.body[..], br#"{"user":"alice"}"#);
/// assert_eq!(action.headers["Content-Type"], "application/json");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpOptions {
    pub headers: Headers,
    pub params: Params,
    pub payload: Option<Payload>,
}

impl HttpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, data: Value) -> Self {
        self.payload = Some(Payload::Json(data));
        self
    }

    pub fn form<I, K, V>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = data.into_iter().map(|(k, v)| (k.into(), v.into()));
        self.payload = Some(Payload::Form(pairs.collect()));
        self
    }
}

/// Encodes `params` as a query string, `?` included. No params, no `?`.
pub fn query_params_string(params: &[(String, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("?{encoded}")
}

/// Sets `name` to `value`, replacing any header with the same name in any case.
fn put_header(headers: &mut Headers, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// A single HTTP request and, once run, its response.
///
/// Its string form is `"<METHOD> <url>"` with the url built without any session config,
/// which is also the key its response is recorded under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpAction {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub params: Params,
    pub body: Bytes,
    pub response: Option<Response>,
}

impl HttpAction {
    pub fn new(method: Method, path: impl Into<String>, options: HttpOptions) -> Self {
        let mut headers = Headers::new();
        let body = match options.payload {
            Some(Payload::Json(data)) => {
                headers.insert(CONTENT_TYPE.into(), JSON_CONTENT_TYPE.into());
                Bytes::from(data.to_string())
            }
            Some(Payload::Form(data)) => {
                headers.insert(CONTENT_TYPE.into(), FORM_CONTENT_TYPE.into());
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&data)
                    .finish();
                Bytes::from(encoded)
            }
            None => Bytes::new(),
        };
        for (name, value) in options.headers {
            put_header(&mut headers, name, value);
        }

        Self {
            method,
            path: path.into(),
            headers,
            params: options.params,
            body,
            response: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, HttpOptions::default())
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path, HttpOptions::default())
    }

    pub fn post(path: impl Into<String>, options: HttpOptions) -> Self {
        Self::new(Method::Post, path, options)
    }

    pub fn put(path: impl Into<String>, options: HttpOptions) -> Self {
        Self::new(Method::Put, path, options)
    }

    pub fn patch(path: impl Into<String>, options: HttpOptions) -> Self {
        Self::new(Method::Patch, path, options)
    }

    pub fn delete(path: impl Into<String>, options: HttpOptions) -> Self {
        Self::new(Method::Delete, path, options)
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Url without the query string: `base_url` joined with `path` by plain
    /// concatenation, or `base_url` alone when the path is `/`.
    fn base_url(&self, config: &Config) -> String {
        match (self.path.as_str(), config.base_url.as_deref()) {
            ("/", Some(base)) => base.to_owned(),
            (path, Some(base)) => format!("{base}{path}"),
            (path, None) => path.to_owned(),
        }
    }

    /// The url this action requests. GET params are appended as a query string.
    pub fn full_url(&self, config: &Config) -> String {
        let url = self.base_url(config);
        match self.method {
            Method::Get => url + &query_params_string(&self.params),
            _ => url,
        }
    }

    /// The url used in this action's metric key.
    pub fn metrics_url(&self, config: &Config) -> String {
        if config.skip_metrics_in_query_params() {
            self.base_url(config)
        } else {
            self.full_url(config)
        }
    }
}

impl Display for HttpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.full_url(&Config::default()))
    }
}

#[async_trait]
impl Action for HttpAction {
    async fn run(mut self, session: Session) -> Result<Session, ActionError<Self>> {
        let config = session.config();
        let url = self.full_url(config);
        let metrics_url = self.metrics_url(config);
        let options = RequestOptions {
            params: self.params.clone(),
            http: config.http.clone(),
        };
        tracing::info!("{} {}", self.method, url);

        let start = Instant::now();
        let response = session
            .client()
            .request(self.method, &url, self.body.clone(), &self.headers, &options)
            .await;
        let response = match response {
            Ok(response) => response,
            Err(reason) => {
                tracing::warn!("{} {} failed: {}", self.method, url, reason);
                return Err(ActionError::new(reason, self, session));
            }
        };
        let elapsed = start.elapsed();

        self.response = Some(response.clone());
        let last_action = match serde_json::to_value(&self) {
            Ok(value) => value,
            Err(e) => return Err(ActionError::new(e, self, session)),
        };
        let key = Key::from(["duration", self.method.as_str(), metrics_url.as_str()]);

        Ok(session
            .assign([("last_action", last_action)])
            .add_result(&self, response)
            .add_metric(key, elapsed))
    }

    /// Requests are awaited inline, so there is never anything in flight to stop.
    async fn abort(self, session: Session) -> Result<(Self, Session), ActionError<Self>> {
        Ok((self, session))
    }
}
