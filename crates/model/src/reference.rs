//! What a reference injects into the consuming resource.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Variable families a consuming resource receives from its references.
    ///
    /// Set on the consumer and applied to every reference it declares.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ReferenceEnvironment: u8 {
        /// `ConnectionStrings__{name}`, or the custom variable, for
        /// connection strings.
        const CONNECTION_STRING = 0b0000_0001;
        /// `services__{name}__{endpoint}__0` for external services, URI
        /// references and endpoints.
        const SERVICE_DISCOVERY = 0b0000_0010;
        /// `{NAME}_{ENDPOINT}` for endpoints of processes and containers.
        const ENDPOINTS = 0b0000_0100;
    }
}

impl Default for ReferenceEnvironment {
    fn default() -> Self {
        Self::all()
    }
}

/// The `{NAME}_{ENDPOINT}` variable of one endpoint.
pub(crate) fn endpoint_variable(resource: &str, endpoint: &str) -> String {
    format!("{resource}_{endpoint}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_injects_everything() {
        let flags = ReferenceEnvironment::default();
        assert!(flags.contains(ReferenceEnvironment::CONNECTION_STRING));
        assert!(flags.contains(ReferenceEnvironment::SERVICE_DISCOVERY));
        assert!(flags.contains(ReferenceEnvironment::ENDPOINTS));
    }

    #[test]
    fn endpoint_variable_is_upper_snake_case() {
        assert_eq!(endpoint_variable("catalog-api", "http"), "CATALOG_API_HTTP");
        assert_eq!(endpoint_variable("web", "admin.v2"), "WEB_ADMIN_V2");
    }

    #[test]
    fn flags_survive_serialization() {
        let flags = ReferenceEnvironment::CONNECTION_STRING | ReferenceEnvironment::ENDPOINTS;
        let json = serde_json::to_string(&flags).unwrap();
        let back: ReferenceEnvironment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
