//! Transport configuration.
//!
//! [`TransportConfig`] is the full configuration surface, built in code with
//! `with_*` methods. [`TransportSettings`] is its data-only subset, loadable
//! from a TOML file.

use crate::error::{ConfigError, ConnectError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tether_core::Credentials;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use url::Url;

/// Path of the socket endpoint, appended to the base URL.
pub const WEBSOCKET_PATH: &str = "/v1/websocket/";

/// Handshake header carrying the client agent tag.
pub const AGENT_HEADER: &str = "X-Client-Agent";

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(55);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest keepalive period the scheduler will run at.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest back-off step; a zero step would reconnect in a hot loop.
pub const MIN_RECONNECT_STEP: Duration = Duration::from_millis(10);

/// Mutates the handshake request before it is sent.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut Request);
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut Request) + Send + Sync,
{
    fn intercept(&self, request: &mut Request) {
        self(request)
    }
}

/// Resolves the endpoint host in place of the system resolver.
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// A fixed host table. Unknown hosts fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addr: IpAddr) -> Self {
        self.hosts.entry(host.into()).or_default().push(addr);
        self
    }
}

impl DnsResolver for StaticResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts.get(host).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
        })
    }
}

/// Delay before reconnect attempt K+1 after K consecutive failures:
/// `min(K * step, max)`, with `step` raised to at least
/// [`MIN_RECONNECT_STEP`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub step: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(200),
            max: Duration::from_secs(15),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, failures: u32) -> Duration {
        let step = self.step.max(MIN_RECONNECT_STEP);
        step.saturating_mul(failures).min(self.max.max(step))
    }
}

/// Everything the transport needs to open and keep a socket.
#[derive(Clone)]
pub struct TransportConfig {
    /// `http`, `https`, `ws` or `wss` base URL of the server.
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// Sent as the [`AGENT_HEADER`] handshake header.
    pub agent: Option<String>,
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// TLS setup for `wss` endpoints. `None` uses the built-in root store.
    pub tls: Option<Connector>,
    pub interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub resolver: Option<Arc<dyn DnsResolver>>,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            agent: None,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            tls: None,
            interceptors: Vec::new(),
            resolver: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Values below [`MIN_KEEPALIVE_INTERVAL`] are raised to it.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_tls(mut self, connector: Connector) -> Self {
        self.tls = Some(connector);
        self
    }

    pub fn with_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn with_resolver(mut self, resolver: impl DnsResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// The socket URL: base URL with its scheme mapped to `ws`/`wss`, the
    /// websocket path appended, and credentials as query parameters.
    pub fn endpoint(&self) -> Result<Url, ConnectError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConnectError::InvalidEndpoint(format!("{}: {e}", self.base_url)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConnectError::InvalidEndpoint(format!(
                    "unsupported scheme {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| ConnectError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;

        let path = format!("{}{WEBSOCKET_PATH}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(None);

        if let Some(credentials) = &self.credentials {
            url.query_pairs_mut()
                .append_pair("login", credentials.login())
                .append_pair("password", credentials.password());
        }

        Ok(url)
    }

    /// Apply data-only settings on top of this config. Zero intervals,
    /// timeouts and back-off steps are rejected.
    pub fn with_settings(mut self, settings: TransportSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        self.base_url = settings.base_url;
        if let Some(credentials) = settings.credentials {
            self.credentials = Some(credentials.parse()?);
        }
        if settings.agent.is_some() {
            self.agent = settings.agent;
        }
        if let Some(secs) = settings.keepalive_interval_secs {
            self.keepalive_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = settings.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = settings.reconnect_step_ms {
            self.reconnect.step = Duration::from_millis(ms);
        }
        if let Some(secs) = settings.reconnect_max_secs {
            self.reconnect.max = Duration::from_secs(secs);
        }
        if !settings.hosts.is_empty() {
            let mut resolver = StaticResolver::new();
            for (host, addrs) in settings.hosts {
                resolver.hosts.insert(host, addrs);
            }
            self.resolver = Some(Arc::new(resolver));
        }
        Ok(self)
    }

    pub fn from_settings(settings: TransportSettings) -> Result<Self, ConfigError> {
        Self::new(String::new()).with_settings(settings)
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("agent", &self.agent)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect", &self.reconnect)
            .field("tls", &self.tls.is_some())
            .field("interceptors", &self.interceptors.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Serializable transport settings.
///
/// ```toml
/// base_url = "https://chat.example.org"
/// credentials = "alice.1:secret"
/// agent = "tether-cli"
/// keepalive_interval_secs = 55
///
/// [hosts]
/// "chat.example.org" = ["203.0.113.7"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSettings {
    pub base_url: String,
    /// `login:password`
    pub credentials: Option<String>,
    pub agent: Option<String>,
    pub keepalive_interval_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub reconnect_step_ms: Option<u64>,
    pub reconnect_max_secs: Option<u64>,
    /// Static host overrides, consulted instead of the system resolver.
    #[serde(default)]
    pub hosts: HashMap<String, Vec<IpAddr>>,
}

impl TransportSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("keepalive_interval_secs", self.keepalive_interval_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("reconnect_step_ms", self.reconnect_step_ms),
            ("reconnect_max_secs", self.reconnect_max_secs),
        ];
        match durations.into_iter().find(|(_, value)| *value == Some(0)) {
            Some((field, _)) => Err(ConfigError::InvalidValue {
                field,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }
}
