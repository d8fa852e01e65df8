//! Platform transmit hooks: plain redirect and deferred neighbor redirect.

use fibfwd_types::{AddressFamily, IpAddress};

/// Next hop handed to the platform when its link-layer address is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredNeighbor {
    next_hop: IpAddress,
}

impl DeferredNeighbor {
    pub fn new(next_hop: IpAddress) -> Self {
        Self { next_hop }
    }

    pub fn family(&self) -> AddressFamily {
        self.next_hop.family()
    }

    pub fn next_hop(&self) -> &IpAddress {
        &self.next_hop
    }
}

/// What the platform did with a deferred redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredVerdict {
    Redirected,
    Drop,
}

/// Transmit side of the platform the engine runs on.
pub trait RedirectPlatform: Send + Sync {
    /// Whether the platform can resolve neighbors and transmit
    /// asynchronously after the engine returns.
    fn neigh_resolver_available(&self) -> bool;

    /// Forwards the packet out of `ifindex`. Failures past this point are
    /// the platform's concern.
    fn redirect(&self, ifindex: u32);

    /// Hands the packet to the platform's neighbor subsystem for resolution
    /// and transmission out of `ifindex`. `next_hop` may be absent.
    fn redirect_neigh(&self, ifindex: u32, next_hop: Option<&DeferredNeighbor>)
        -> DeferredVerdict;
}
