//! Floating IP inventory boundary.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::InventoryError;

/// A floating IP and its tags, as listed by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FloatingIp {
    /// Floating IP address as returned by the API.
    #[serde(rename = "floating_ip_address")]
    pub address: String,
    /// Tags in API order.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FloatingIp {
    /// Create a floating IP entry.
    pub fn new(address: impl Into<String>, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            address: address.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Source of tagged floating IPs.
#[async_trait]
pub trait FloatingIpInventory: Send + Sync {
    /// List every floating IP carrying `tag`, or all of them if `tag` is empty.
    async fn list_tagged(&self, tag: &str) -> Result<Vec<FloatingIp>, InventoryError>;
}
