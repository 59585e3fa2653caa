//! HTTP transport.
//!
//! Everything above this module talks to the service through the
//! [`Transport`] trait: one request in, one response out. [`HttpTransport`]
//! is the reqwest implementation used by [`Client`](crate::Client).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::error::{Error, Result};
use crate::response::State;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tempoiq-rust/", env!("CARGO_PKG_VERSION"));

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request to the service. `path` is relative to the transport's base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// JSON body. GET and DELETE may carry one too.
    pub body: Option<String>,
}

impl Request {
    /// Create a request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response from the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl Response {
    /// Create a response.
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Classification of the status code.
    pub fn state(&self) -> State {
        State::from_status(self.status)
    }

    /// Turn a failure status into [`Error::Request`].
    ///
    /// The error message is the body, or the reason phrase if the body is
    /// empty. Partial success passes through.
    pub fn error_for_status(self) -> Result<Self> {
        if self.state() != State::Failure {
            return Ok(self);
        }
        let message = if self.body.trim().is_empty() {
            self.reason
        } else {
            self.body
        };
        Err(Error::Request {
            status: self.status,
            message,
        })
    }
}

/// Executes requests against the service.
///
/// Implementations own connection handling, authentication and timeouts.
/// A network failure before any status line is [`Error::Transport`]; any
/// status, including failures, is returned as a [`Response`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

/// reqwest-backed transport with HTTP basic auth.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    key: String,
    secret: String,
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    pub fn new(
        base_url: Url,
        key: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self::with_http_client(http, base_url, key, secret))
    }

    /// Create a transport on top of a caller-configured reqwest client.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: Url,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Base URL every request path is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| Error::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
            message: e.to_string(),
        })
    }
}

/// Build a request path from raw segments, ending with `/`.
///
/// Each segment is percent-encoded on its own, so a key containing `/` or
/// `?` stays one segment.
pub fn resource_path(segments: &[&str]) -> Result<String> {
    let invalid = |message: &str| Error::InvalidUrl {
        url: segments.join("/"),
        message: message.to_string(),
    };
    let mut url = Url::parse("http://localhost/").map_err(|e| invalid(&e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base"))?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Ok(url.path().to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let url = self.endpoint(&request.path)?;

        let mut builder = self
            .http
            .request(request.method.into(), url)
            .basic_auth(&self.key, Some(&self.secret));
        if let Some(body) = request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await.map_err(|e| Error::Request {
            status: status.as_u16(),
            message: format!("failed to read response body: {}", e),
        })?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "request completed"
        );

        Ok(Response {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}
