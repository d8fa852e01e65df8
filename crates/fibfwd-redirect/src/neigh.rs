//! Neighbor cache and local interface address lookups.

use fibfwd_types::{IpAddress, MacAddress};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;

/// IP to link-layer address mapping maintained outside the engine.
///
/// The family to consult is carried by the address itself.
pub trait NeighborCache: Send + Sync {
    fn lookup(&self, addr: &IpAddress) -> Option<MacAddress>;
}

/// Own MAC address of each local interface, keyed by ifindex.
pub trait InterfaceMacs: Send + Sync {
    fn mac_by_ifindex(&self, ifindex: u32) -> Option<MacAddress>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborStats {
    pub neighbors_added: u64,
    pub neighbors_removed: u64,
    pub neighbors_updated: u64,
    pub ipv4_neighbors: u64,
    pub ipv6_neighbors: u64,
}

#[derive(Default)]
struct NeighborTableInner {
    entries: HashMap<IpAddress, MacAddress>,
    stats: NeighborStats,
}

/// In-memory neighbor cache.
///
/// Writers (the control plane) and readers (the forwarding path) may run
/// concurrently; a reader sees either the old or the new entry.
#[derive(Default)]
pub struct NeighborTable {
    inner: RwLock<NeighborTableInner>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or updates the entry for `ip`. Returns the previous MAC, if any.
    pub fn insert(&self, ip: IpAddress, mac: MacAddress) -> Option<MacAddress> {
        let mut inner = self.inner.write();
        let previous = inner.entries.insert(ip, mac);

        if previous.is_some() {
            inner.stats.neighbors_updated = inner.stats.neighbors_updated.saturating_add(1);
        } else {
            inner.stats.neighbors_added = inner.stats.neighbors_added.saturating_add(1);
            if ip.is_ipv4() {
                inner.stats.ipv4_neighbors = inner.stats.ipv4_neighbors.saturating_add(1);
            } else {
                inner.stats.ipv6_neighbors = inner.stats.ipv6_neighbors.saturating_add(1);
            }
        }

        debug!("NeighborTable: {} is-at {}", ip, mac);
        previous
    }

    pub fn remove(&self, ip: &IpAddress) -> Option<MacAddress> {
        let mut inner = self.inner.write();
        let removed = inner.entries.remove(ip)?;

        if ip.is_ipv4() {
            inner.stats.ipv4_neighbors = inner.stats.ipv4_neighbors.saturating_sub(1);
        } else {
            inner.stats.ipv6_neighbors = inner.stats.ipv6_neighbors.saturating_sub(1);
        }
        inner.stats.neighbors_removed = inner.stats.neighbors_removed.saturating_add(1);

        debug!("NeighborTable: removed {}", ip);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn stats(&self) -> NeighborStats {
        self.inner.read().stats.clone()
    }
}

impl NeighborCache for NeighborTable {
    fn lookup(&self, addr: &IpAddress) -> Option<MacAddress> {
        self.inner.read().entries.get(addr).copied()
    }
}

/// ifindex to own-MAC table.
#[derive(Default)]
pub struct InterfaceTable {
    macs: RwLock<HashMap<u32, MacAddress>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mac(&self, ifindex: u32, mac: MacAddress) {
        self.macs.write().insert(ifindex, mac);
    }

    pub fn remove(&self, ifindex: u32) -> Option<MacAddress> {
        self.macs.write().remove(&ifindex)
    }
}

impl InterfaceMacs for InterfaceTable {
    fn mac_by_ifindex(&self, ifindex: u32) -> Option<MacAddress> {
        self.macs.read().get(&ifindex).copied()
    }
}
