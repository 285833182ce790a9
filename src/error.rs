//! Error types for ospfip-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Floating IP inventory error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// A zone could not be built from already validated records.
    #[error("failed to build zone {origin}: {reason}")]
    Zone {
        /// Zone origin that failed.
        origin: String,
        /// Reason reported by the zone store.
        reason: String,
    },
}

/// Errors returned by a floating IP inventory backend.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Transport or decoding failure.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Authentication was rejected or returned an unusable token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service catalog has no usable endpoint.
    #[error("no {interface} endpoint for service {service} in catalog")]
    MissingEndpoint {
        /// Service type looked up (e.g. "network").
        service: String,
        /// Endpoint interface looked up (e.g. "public").
        interface: String,
    },

    /// The configured CA bundle could not be loaded.
    #[error("invalid CA bundle {path}: {reason}")]
    CaBundle {
        /// Path of the bundle.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configured or returned URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
