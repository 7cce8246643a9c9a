//! The HTTP client collaborator.
//!
//! Barrage never talks to the network itself. [`HttpAction`](crate::action::HttpAction)
//! shapes a request and hands it to whatever [`HttpClient`] the session carries, so
//! connection pooling, TLS and retries live entirely on the other side of this trait.
//! The `builtins` feature provides [`ReqwestClient`].
use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{action::http::Method, error::BoxError};

pub type Headers = BTreeMap<String, String>;

/// Ordered key/value pairs, encoded in insertion order.
pub type Params = Vec<(String, String)>;

/// Options passed along with every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub params: Params,
    /// The session's `http` config, as is.
    pub http: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can execute a shaped HTTP request.
///
/// Only transport failures are errors. A response with any status code is `Ok`.
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
        headers: &Headers,
        options: &RequestOptions,
    ) -> Result<Response, BoxError>;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use std::time::Duration;

    use super::*;

    impl From<Method> for reqwest::Method {
        fn from(value: Method) -> Self {
            match value {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
                Method::Head => reqwest::Method::HEAD,
            }
        }
    }

    /// [`HttpClient`] backed by a shared [`reqwest::Client`].
    ///
    /// Build it once and share it: every session of an environment uses the same
    /// connection pool.
    ///
    /// Recognized `http` options:
    /// - `timeout_ms`: per-request timeout in milliseconds.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn request(
            &self,
            method: Method,
            url: &str,
            body: Bytes,
            headers: &Headers,
            options: &RequestOptions,
        ) -> Result<Response, BoxError> {
            let mut request = self.client.request(method.into(), url).body(body);
            for (name, value) in headers {
                request = request.header(name, value);
            }
            // GET params are already part of the url
            if method != Method::Get && !options.params.is_empty() {
                request = request.query(&options.params);
            }
            if let Some(ms) = options.http.get("timeout_ms").and_then(Value::as_u64) {
                request = request.timeout(Duration::from_millis(ms));
            }

            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response.bytes().await?;

            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }
}
