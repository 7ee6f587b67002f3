use crate::{ConfigError, ConfigResult};
use std::fmt;

/// A proxy address with optional basic-auth credentials
///
/// Parsed from `ip:port` or `ip:port:user:pass`. `Display` prints
/// `host:port` only, so endpoints can be logged without leaking credentials.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    /// Parses `ip:port` or `ip:port:user:pass`
    pub fn parse(entry: &str) -> ConfigResult<Self> {
        let entry = entry.trim();
        let parts: Vec<&str> = entry.split(':').collect();

        let (host, port, credentials) = match parts.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, user, pass] => (*host, *port, Some((*user, *pass))),
            _ => return Err(invalid(entry, "expected ip:port or ip:port:user:pass")),
        };

        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(invalid(entry, "empty or malformed host"));
        }

        let port: u16 = port
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| invalid(entry, "port must be 1-65535"))?;

        let mut endpoint = Self::new(host, port);
        if let Some((user, pass)) = credentials {
            if user.is_empty() {
                return Err(invalid(entry, "empty proxy user"));
            }
            endpoint = endpoint.with_credentials(user, pass);
        }

        Ok(endpoint)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, the identity used for logging and client caching
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL without credentials; credentials go through basic auth
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, pass)| (user.as_str(), pass.as_str()))
    }
}

/// Error text carries only the `host:port` part of the entry
fn invalid(entry: &str, why: &str) -> ConfigError {
    let visible: Vec<&str> = entry.split(':').take(2).collect();
    ConfigError::InvalidProxy(format!("'{}': {}", visible.join(":"), why))
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}
