//! Egress proxy pool
//!
//! The pool is fixed at startup and never empty. Selection is uniform at random;
//! when an endpoint is excluded and more than one exists, selection repeats until
//! it lands on a different endpoint.

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use rand::Rng;

/// Identity of an endpoint within its pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EndpointId(pub usize);

/// One upstream proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Position in the pool
    pub id: EndpointId,
    /// URL scheme understood by the fetch tool (http, socks5, ...)
    pub scheme: String,
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional user name
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Full proxy URL including credentials, as passed to the fetch tool
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!(
                "{}://{}:{}@{}:{}",
                self.scheme,
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.host,
                self.port
            ),
            (Some(user), None) => format!(
                "{}://{}@{}:{}",
                self.scheme,
                urlencoding::encode(user),
                self.host,
                self.port
            ),
            _ => format!("{}://{}:{}", self.scheme, self.host, self.port),
        }
    }

    /// Proxy URL safe for logs and events: the password is never included
    pub fn redacted(&self) -> String {
        match &self.username {
            Some(user) => format!(
                "{}://{}:***@{}:{}",
                self.scheme,
                urlencoding::encode(user),
                self.host,
                self.port
            ),
            None => format!("{}://{}:{}", self.scheme, self.host, self.port),
        }
    }
}

// Credentials stay out of Debug output as well.
impl std::fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("id", &self.id)
            .field("url", &self.redacted())
            .finish()
    }
}

/// Fixed, non-empty set of proxy endpoints
#[derive(Clone, Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    /// Create a pool, failing if no endpoints are given
    ///
    /// Endpoint ids are reassigned to match their position in the pool.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::config("proxy pool is empty", "proxy.ports"));
        }
        let endpoints = endpoints
            .into_iter()
            .enumerate()
            .map(|(i, mut endpoint)| {
                endpoint.id = EndpointId(i);
                endpoint
            })
            .collect();
        Ok(Self { endpoints })
    }

    /// Expand a [`ProxyConfig`] into one endpoint per configured port
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let endpoints = config
            .ports
            .iter()
            .enumerate()
            .map(|(i, &port)| ProxyEndpoint {
                id: EndpointId(i),
                scheme: config.scheme.clone(),
                host: config.host.clone(),
                port,
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .collect();
        Self::new(endpoints)
    }

    /// Pick an endpoint uniformly at random, avoiding `excluding` when possible
    pub fn select(&self, excluding: Option<EndpointId>) -> &ProxyEndpoint {
        let mut rng = rand::thread_rng();
        if self.endpoints.len() == 1 {
            return &self.endpoints[0];
        }
        loop {
            let candidate = &self.endpoints[rng.gen_range(0..self.endpoints.len())];
            if Some(candidate.id) != excluding {
                return candidate;
            }
        }
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept alongside `len`
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in pool order
    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }
}
