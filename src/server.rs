//! DNS server setup and lifecycle management.

use hickory_server::authority::Catalog;
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::handler::FloatingIpHandler;
use crate::inventory::FloatingIpInventory;
use crate::refresh::RefreshScheduler;
use crate::state::SnapshotStore;
use crate::zone::ZoneAssembler;

const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS server answering for tagged floating IPs.
pub struct DnsServer {
    config: DnsConfig,
    inventory: Arc<dyn FloatingIpInventory>,
    store: SnapshotStore,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration and inventory.
    pub fn new(config: DnsConfig, inventory: Arc<dyn FloatingIpInventory>) -> Self {
        Self {
            config,
            inventory,
            store: SnapshotStore::new(),
        }
    }

    /// Get a reference to the snapshot store.
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run the DNS server until `token` is cancelled.
    ///
    /// Sockets are bound first, then the first refresh completes before any
    /// query is served; failures of either are returned. The refresh loop
    /// never outlives this call.
    pub async fn run(self, token: CancellationToken) -> Result<(), DnsError> {
        self.config.validate()?;
        info!(
            listen_addr = %self.config.listen_addr,
            origins = ?self.config.origins,
            ttl = self.config.ttl,
            refresh = ?self.config.refresh,
            "Starting ospfip-dns server"
        );

        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;

        let assembler = ZoneAssembler::new(self.config.origin_names()?, self.config.ttl);
        let scheduler = RefreshScheduler::new(
            self.inventory.clone(),
            assembler,
            self.store.clone(),
            self.config.refresh,
        );
        let refresh_token = token.child_token();
        let refresh_handle = scheduler.start(refresh_token.clone()).await?;

        let handler = FloatingIpHandler::new(self.store.clone(), self.config.ttl, Catalog::new());
        let mut server = ServerFuture::new(handler);

        server.register_socket(udp_socket);
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);
        info!(addr = %self.config.listen_addr, "DNS TCP listening");

        info!(
            zones = self.store.get().zones_count(),
            "DNS server ready to serve queries"
        );

        tokio::select! {
            _ = token.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        info!("Waiting for refresh loop to stop...");
        refresh_token.cancel();
        let _ = refresh_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
