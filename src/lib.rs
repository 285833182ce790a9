//! ospfip-dns - An authoritative DNS server for OpenStack floating IPs.
//!
//! Floating IPs opt in with the identifier tag `coredns:plugin:ospfip` and
//! name themselves with a second tag `coredns:plugin:ospfip:<domain>`. The
//! server periodically lists tagged floating IPs, groups the names into zones
//! and answers A, AAAA and PTR queries for them.
//!
//! ## Features
//!
//! - Forward records for fully qualified and wildcard names
//! - Reverse (PTR) records for non-wildcard names
//! - Periodic refresh with atomic snapshot replacement
//! - Queries outside the served names fall through to a next handler
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          ospfip-dns                             │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ OpenStack client │───▶│ Refresh          │                  │
//! │  │ (Keystone +      │    │ Scheduler        │                  │
//! │  │  Neutron)        │    └────────┬─────────┘                  │
//! │  └──────────────────┘             │ tags → zones                │
//! │                                   ▼                             │
//! │                          ┌──────────────────┐                  │
//! │                          │ Snapshot Store   │                  │
//! │                          └────────┬─────────┘                  │
//! │                                   ▼                             │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ next handler     │◀───│ Hickory DNS      │◀── UDP/TCP       │
//! │  │ (not ours)       │    │ Server           │                  │
//! │  └──────────────────┘    └──────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! api.mycluster.example.net  A    → zone mycluster.example.net → 192.0.0.3
//! x.apps.mycluster.example.net A  → *.apps.mycluster.example.net → 192.0.0.4
//! 3.0.0.192.in-addr.arpa     PTR  → api.mycluster.example.net.
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ospfip_dns::{Config, DnsServer, OpenStackClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = load_config()?;
//!     let inventory = Arc::new(OpenStackClient::new(config.openstack)?);
//!
//!     let token = CancellationToken::new();
//!     let server = DnsServer::new(config.dns, inventory);
//!     server.run(token).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod inventory;
pub mod metrics;
pub mod openstack;
pub mod refresh;
pub mod resolver;
pub mod server;
pub mod state;
pub mod tags;
pub mod telemetry;
pub mod zone;

// Re-export main types
pub use config::{Config, DnsConfig, OpenStackConfig, TelemetryConfig};
pub use error::{DnsError, InventoryError};
pub use handler::FloatingIpHandler;
pub use inventory::{FloatingIp, FloatingIpInventory};
pub use openstack::OpenStackClient;
pub use refresh::RefreshScheduler;
pub use server::DnsServer;
pub use state::SnapshotStore;
pub use zone::{Snapshot, ZoneAssembler};
