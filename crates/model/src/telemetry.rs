//! OTLP exporter settings injected into launched resources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration key holding the gRPC collector endpoint.
pub const GRPC_ENDPOINT_KEY: &str = "Otlp:Endpoint";
/// Configuration key holding the HTTP collector endpoint.
pub const HTTP_ENDPOINT_KEY: &str = "Otlp:HttpEndpoint";

/// Wire protocol of the OTLP exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtlpProtocol {
    /// OTLP over gRPC.
    #[default]
    Grpc,
    /// OTLP over HTTP with protobuf bodies.
    HttpProtobuf,
}

impl OtlpProtocol {
    /// Value of `OTEL_EXPORTER_OTLP_PROTOCOL`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::HttpProtobuf => "http/protobuf",
        }
    }

    /// Configuration key overriding the collector endpoint.
    #[must_use]
    pub fn endpoint_key(self) -> &'static str {
        match self {
            Self::Grpc => GRPC_ENDPOINT_KEY,
            Self::HttpProtobuf => HTTP_ENDPOINT_KEY,
        }
    }

    /// Collector endpoint used when the configuration has none.
    #[must_use]
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Grpc => "http://localhost:4317",
            Self::HttpProtobuf => "http://localhost:4318",
        }
    }
}

impl fmt::Display for OtlpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
