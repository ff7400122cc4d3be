//! Endpoint declarations and the per-resource endpoint table.

use conductor_core::ResourceName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Transport scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    Https,
    /// Raw TCP
    Tcp,
    /// Raw UDP
    Udp,
}

impl Scheme {
    /// Returns `true` for HTTP and HTTPS.
    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// A network endpoint as declared on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Logical name; defaults to the scheme when absent.
    pub name: Option<String>,
    /// Transport scheme.
    pub scheme: Scheme,
    /// Host port.
    pub port: Option<u32>,
    /// Port inside the container or process.
    pub target_port: Option<u32>,
    /// Whether the orchestrator fronts the endpoint with its own listener.
    pub is_proxied: bool,
    /// Whether the endpoint is reachable from outside the application.
    pub is_external: bool,
    /// Environment variable that receives the port at launch.
    pub env: Option<String>,
}

impl EndpointSpec {
    /// A proxied, internal endpoint with no ports.
    #[must_use]
    pub fn new(scheme: Scheme) -> Self {
        Self {
            name: None,
            scheme,
            port: None,
            target_port: None,
            is_proxied: true,
            is_external: false,
            env: None,
        }
    }

    /// Shorthand for an HTTP endpoint.
    #[must_use]
    pub fn http() -> Self {
        Self::new(Scheme::Http)
    }

    /// Shorthand for an HTTPS endpoint.
    #[must_use]
    pub fn https() -> Self {
        Self::new(Scheme::Https)
    }

    /// Set the logical name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the host port.
    #[must_use]
    pub fn port(mut self, port: u32) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the target port.
    #[must_use]
    pub fn target_port(mut self, port: u32) -> Self {
        self.target_port = Some(port);
        self
    }

    /// Set the proxy flag.
    #[must_use]
    pub fn proxied(mut self, is_proxied: bool) -> Self {
        self.is_proxied = is_proxied;
        self
    }

    /// Set the externality flag.
    #[must_use]
    pub fn external(mut self, is_external: bool) -> Self {
        self.is_external = is_external;
        self
    }

    /// Set the variable that receives the port.
    #[must_use]
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env = Some(var.into());
        self
    }

    /// The logical name, defaulting to the scheme.
    #[must_use]
    pub fn effective_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.scheme.to_string())
    }

    /// The port a client inside the application connects to: the host port
    /// if fixed, otherwise the target port.
    #[must_use]
    pub fn connect_port(&self) -> Option<u32> {
        self.port.or(self.target_port)
    }

    /// `scheme://localhost:port` when a port is known.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.connect_port()
            .map(|port| format!("{}://localhost:{port}", self.scheme))
    }
}

/// Identifies one endpoint of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId {
    /// The owning resource.
    pub resource: ResourceName,
    /// The endpoint's logical name.
    pub name: String,
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource, self.name)
    }
}

/// The endpoints of one resource, keyed by logical name.
///
/// Upsert rules:
/// - an identical redeclaration is a no-op
/// - a different declaration under an existing name replaces it in place
/// - a declaration reusing another endpoint's explicit port evicts that endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointTable {
    entries: IndexMap<String, EndpointSpec>,
}

impl EndpointTable {
    /// Validate and upsert `spec`, returning the id it is known by.
    pub fn declare(&mut self, resource: &ResourceName, spec: EndpointSpec) -> ModelResult<EndpointId> {
        for port in [spec.port, spec.target_port].into_iter().flatten() {
            if !(1..=u32::from(u16::MAX)).contains(&port) {
                return Err(ModelError::InvalidPort {
                    resource: resource.clone(),
                    port,
                });
            }
        }

        let name = spec.effective_name();
        let id = EndpointId {
            resource: resource.clone(),
            name: name.clone(),
        };
        let mut spec = spec;
        spec.name = Some(name.clone());

        if self.entries.get(&name) == Some(&spec) {
            return Ok(id);
        }

        if let Some(port) = spec.port {
            self.entries
                .retain(|existing, other| *existing == name || other.port != Some(port));
        }

        // IndexMap::insert keeps the position of an existing key
        self.entries.insert(name, spec);
        Ok(id)
    }

    /// Look up an endpoint by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EndpointSpec> {
        self.entries.get(name)
    }

    /// The single endpoint, if there is exactly one.
    #[must_use]
    pub fn sole(&self) -> Option<&EndpointSpec> {
        if self.entries.len() == 1 {
            self.entries.values().next()
        } else {
            None
        }
    }

    /// Apply `f` to every endpoint.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut EndpointSpec)) {
        self.entries.values_mut().for_each(|spec| f(spec));
    }

    /// Endpoints in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.entries.values()
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no endpoint is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
