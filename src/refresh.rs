//! Periodic refresh of the snapshot from the floating IP inventory.
//!
//! Each cycle lists the floating IPs tagged with the identifier tag, assembles
//! a new snapshot off to the side and swaps it into the store. A failed cycle
//! leaves the previous snapshot in place; the next tick tries again.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::DnsError;
use crate::inventory::FloatingIpInventory;
use crate::metrics::{self, RefreshOutcome, Timer};
use crate::state::SnapshotStore;
use crate::tags::{derive_claim, PLUGIN_TAG_IDENTIFIER};
use crate::zone::ZoneAssembler;

/// Summary of an installed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Floating IPs returned by the inventory.
    pub floating_ips: usize,
    /// Zones in the new snapshot.
    pub zones: usize,
    /// Reverse records in the new snapshot.
    pub reverse_records: usize,
}

/// Keeps a [`SnapshotStore`] in sync with the inventory.
pub struct RefreshScheduler {
    inventory: Arc<dyn FloatingIpInventory>,
    assembler: ZoneAssembler,
    store: SnapshotStore,
    interval: Duration,
}

impl RefreshScheduler {
    /// Create a scheduler writing into `store` every `interval`.
    pub fn new(
        inventory: Arc<dyn FloatingIpInventory>,
        assembler: ZoneAssembler,
        store: SnapshotStore,
        interval: Duration,
    ) -> Self {
        Self {
            inventory,
            assembler,
            store,
            interval,
        }
    }

    /// Run one fetch-assemble-install cycle.
    ///
    /// The store is only touched once the new snapshot is complete.
    pub async fn refresh_once(&self) -> Result<RefreshSummary, DnsError> {
        let timer = Timer::start();

        let floating_ips = match self.inventory.list_tagged(PLUGIN_TAG_IDENTIFIER).await {
            Ok(floating_ips) => floating_ips,
            Err(e) => {
                metrics::record_refresh(RefreshOutcome::FetchError, timer.elapsed());
                return Err(e.into());
            }
        };

        let claims = floating_ips
            .iter()
            .map(|fip| (fip.address.as_str(), derive_claim(fip.tags.as_slice())));
        let snapshot = match self.assembler.assemble(claims) {
            Ok(snapshot) => snapshot,
            // Only reachable if the zone store rejects records that passed validation.
            Err(e) => {
                metrics::record_refresh(RefreshOutcome::AssemblyError, timer.elapsed());
                return Err(e);
            }
        };

        let summary = RefreshSummary {
            floating_ips: floating_ips.len(),
            zones: snapshot.zones_count(),
            reverse_records: snapshot.reverse_records().len(),
        };
        let zone_names: Vec<String> = snapshot.zone_names().iter().map(|z| z.to_string()).collect();

        self.store.replace(snapshot);
        self.store.emit_metrics();
        metrics::record_refresh(RefreshOutcome::Success, timer.elapsed());

        debug!(zones = ?zone_names, "currently authoritative for zones");
        Ok(summary)
    }

    /// Refresh once, then keep refreshing in the background until `token`
    /// is cancelled.
    ///
    /// A failure of the first refresh is returned and nothing is spawned.
    pub async fn start(self, token: CancellationToken) -> Result<JoinHandle<()>, DnsError> {
        info!("Running initial update of records...");
        let summary = self.refresh_once().await?;
        info!(
            floating_ips = summary.floating_ips,
            zones = summary.zones,
            reverse_records = summary.reverse_records,
            "Initial records loaded"
        );

        Ok(tokio::spawn(self.run(token)))
    }

    async fn run(self, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!("refresh loop shutting down");
                    return;
                }

                _ = tokio::time::sleep(self.interval) => {
                    match self.refresh_once().await {
                        Ok(summary) => debug!(
                            floating_ips = summary.floating_ips,
                            zones = summary.zones,
                            "refreshed records"
                        ),
                        Err(e) if !token.is_cancelled() => {
                            error!("Failed to update zones: {}", e);
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    }
}
