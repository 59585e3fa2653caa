//! Client configuration.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::HttpTransport;

/// Default API host.
pub const DEFAULT_HOST: &str = "api.tempoiq.com";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(50);

/// Connection settings for a [`Client`].
///
/// Missing fields take their defaults, so a config can be loaded from any
/// serde source with only the credentials filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API host name
    pub host: String,

    /// API port
    pub port: u16,

    /// Use https
    pub secure: bool,

    /// API key (basic auth user name)
    pub key: String,

    /// API secret (basic auth password)
    pub secret: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 443,
            secure: true,
            key: String::new(),
            secret: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Base URL every request path is joined to.
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let url = format!("{}://{}:{}/", scheme, self.host, self.port);
        match Url::parse(&url) {
            Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(parsed),
            Ok(_) => Err(Error::InvalidUrl {
                url,
                message: "missing host".to_string(),
            }),
            Err(e) => Err(Error::InvalidUrl {
                url,
                message: e.to_string(),
            }),
        }
    }
}

/// Fluent builder for [`Client`].
///
/// ```ignore
/// let client = ClientBuilder::new()
///     .host("my-env.backend.tempoiq.com")
///     .key("my-key")
///     .secret("my-secret")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config.
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config, http: None }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = key.into();
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = secret.into();
        self
    }

    /// Per-request timeout. Ignored when a custom HTTP client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Use a caller-configured reqwest client (proxies, TLS settings, ...).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// The config built so far.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let base_url = self.config.base_url()?;
        let transport = match self.http {
            Some(http) => {
                HttpTransport::with_http_client(http, base_url, self.config.key, self.config.secret)
            }
            None => HttpTransport::new(
                base_url,
                self.config.key,
                self.config.secret,
                self.config.timeout,
            )?,
        };
        Ok(Client::with_transport(transport))
    }
}
