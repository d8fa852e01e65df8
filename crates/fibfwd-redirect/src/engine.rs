//! FIB redirect engine.
//!
//! One decision per packet:
//!
//! ```text
//! LOOKUP --success------> L3 --ok--> rewrite(FIB MACs) ------------> REDIRECT
//! LOOKUP --no-neighbor--> L3 --ok--> resolver available? -- yes --> DEFERRED REDIRECT
//!                                                        \-- no ---> neighbor cache
//!                                                                    --hit--> rewrite --> REDIRECT
//!                                                                    --miss-> DROP
//! LOOKUP --other--------> DROP
//! L3 --reject-----------> DROP
//! ```

use crate::config::RedirectConfig;
use crate::error::{DropReason, MetricsError};
use crate::fib::{FibLookup, FibLookupRequest, FibStatus};
use crate::l3::{Direction, L3Header, L3Processor};
use crate::metrics::{RedirectMetrics, RedirectPath};
use crate::neigh::{InterfaceMacs, NeighborCache};
use crate::platform::{DeferredNeighbor, DeferredVerdict, RedirectPlatform};
use fibfwd_types::{IpAddress, Ipv4Address, Ipv6Address, MacAddress, PacketBuffer};
use log::{debug, trace};
use std::fmt;
use std::sync::Arc;

/// Verdict for a single packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectOutcome {
    /// Forwarded out of the given egress ifindex.
    Redirected(u32),
    Drop(DropReason),
}

impl RedirectOutcome {
    pub fn is_redirected(&self) -> bool {
        matches!(self, RedirectOutcome::Redirected(_))
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            RedirectOutcome::Drop(reason) => Some(*reason),
            RedirectOutcome::Redirected(_) => None,
        }
    }
}

impl fmt::Display for RedirectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectOutcome::Redirected(ifindex) => write!(f, "redirected to ifindex {}", ifindex),
            RedirectOutcome::Drop(reason) => write!(f, "drop ({})", reason),
        }
    }
}

/// Link-layer resolution captured from the FIB lookup.
enum Resolution {
    Resolved { smac: MacAddress, dmac: MacAddress },
    NoNeighbor(Option<DeferredNeighbor>),
}

/// Per-packet forwarding decision against the FIB.
///
/// Holds only read-only handles to its collaborators; nothing is retained
/// between packets.
pub struct FibRedirect {
    config: RedirectConfig,
    fib: Arc<dyn FibLookup>,
    neighbors: Arc<dyn NeighborCache>,
    interfaces: Arc<dyn InterfaceMacs>,
    l3: Arc<dyn L3Processor>,
    platform: Arc<dyn RedirectPlatform>,
    metrics: Option<RedirectMetrics>,
}

impl FibRedirect {
    pub fn new(
        config: RedirectConfig,
        fib: Arc<dyn FibLookup>,
        neighbors: Arc<dyn NeighborCache>,
        interfaces: Arc<dyn InterfaceMacs>,
        l3: Arc<dyn L3Processor>,
        platform: Arc<dyn RedirectPlatform>,
    ) -> Self {
        Self {
            config,
            fib,
            neighbors,
            interfaces,
            l3,
            platform,
            metrics: None,
        }
    }

    /// Attaches counters that are updated with every verdict.
    pub fn with_metrics(mut self, metrics: RedirectMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Attaches counters named after the configured `metrics_prefix`.
    pub fn with_configured_metrics(self) -> Result<Self, MetricsError> {
        let metrics = RedirectMetrics::from_config(&self.config)?;
        Ok(self.with_metrics(metrics))
    }

    pub fn config(&self) -> &RedirectConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&RedirectMetrics> {
        self.metrics.as_ref()
    }

    /// Redirects an IPv4 packet whose header sits at `l3_offset`.
    pub fn redirect_v4(
        &self,
        packet: &mut dyn PacketBuffer,
        l3_offset: usize,
        src: Ipv4Address,
        dst: Ipv4Address,
        ingress_ifindex: u32,
    ) -> RedirectOutcome {
        self.redirect(packet, &L3Header::v4(l3_offset, src, dst), ingress_ifindex)
    }

    /// Redirects an IPv6 packet whose header sits at `l3_offset`.
    pub fn redirect_v6(
        &self,
        packet: &mut dyn PacketBuffer,
        l3_offset: usize,
        src: Ipv6Address,
        dst: Ipv6Address,
        ingress_ifindex: u32,
    ) -> RedirectOutcome {
        self.redirect(packet, &L3Header::v6(l3_offset, src, dst), ingress_ifindex)
    }

    /// Decides and applies the forwarding action for one packet.
    pub fn redirect(
        &self,
        packet: &mut dyn PacketBuffer,
        header: &L3Header,
        ingress_ifindex: u32,
    ) -> RedirectOutcome {
        let (outcome, path) = self.decide(packet, header, ingress_ifindex);

        match outcome {
            RedirectOutcome::Redirected(ifindex) => {
                trace!(
                    "FibRedirect: {} -> {} via ifindex {} ({})",
                    header.src(),
                    header.dst(),
                    ifindex,
                    path.map_or("?", |p| p.as_str())
                );
            }
            RedirectOutcome::Drop(reason) => {
                debug!(
                    "FibRedirect: dropping {} -> {} from ifindex {}: {}",
                    header.src(),
                    header.dst(),
                    ingress_ifindex,
                    reason
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            match (&outcome, path) {
                (RedirectOutcome::Redirected(_), Some(path)) => metrics.record_redirect(path),
                (RedirectOutcome::Drop(reason), _) => metrics.record_drop(reason),
                (RedirectOutcome::Redirected(_), None) => {}
            }
        }

        outcome
    }

    fn decide(
        &self,
        packet: &mut dyn PacketBuffer,
        header: &L3Header,
        ingress_ifindex: u32,
    ) -> (RedirectOutcome, Option<RedirectPath>) {
        let request = FibLookupRequest::new(
            ingress_ifindex,
            header.src(),
            header.dst(),
            self.config.lookup.flags(),
        );

        let result = self.fib.lookup(&request);
        let resolution = match result.status {
            FibStatus::Success => Resolution::Resolved {
                smac: result.smac,
                dmac: result.dmac,
            },
            FibStatus::NoNeighbor => {
                Resolution::NoNeighbor(result.next_hop.map(DeferredNeighbor::new))
            }
            status => {
                trace!("FibRedirect: lookup for {} returned {}", request.dst, status);
                return (RedirectOutcome::Drop(DropReason::NoRoute), None);
            }
        };

        let oif = result.ifindex;

        if let Err(reject) = self.l3.process(packet, header, Direction::Egress) {
            return (RedirectOutcome::Drop(DropReason::L3Rejected(reject)), None);
        }

        let path = match resolution {
            Resolution::Resolved { smac, dmac } => {
                if let Err(reason) = self.rewrite(packet, &dmac, &smac) {
                    return (RedirectOutcome::Drop(reason), None);
                }
                RedirectPath::Direct
            }
            Resolution::NoNeighbor(next_hop) => {
                if self.config.resolver_enabled() && self.platform.neigh_resolver_available() {
                    let outcome = match self.platform.redirect_neigh(oif, next_hop.as_ref()) {
                        DeferredVerdict::Redirected => RedirectOutcome::Redirected(oif),
                        DeferredVerdict::Drop => {
                            RedirectOutcome::Drop(DropReason::DeferredRedirectFailure)
                        }
                    };
                    return (outcome, Some(RedirectPath::Deferred));
                }

                let target = next_hop.map_or(request.dst, |nh| *nh.next_hop());
                if let Err(reason) = self.resolve_and_rewrite(packet, oif, &target) {
                    return (RedirectOutcome::Drop(reason), None);
                }
                RedirectPath::Neighbor
            }
        };

        self.platform.redirect(oif);
        (RedirectOutcome::Redirected(oif), Some(path))
    }

    /// Resolves `next_hop` in the neighbor cache of its own family, which may
    /// differ from the packet's family, and rewrites the frame.
    fn resolve_and_rewrite(
        &self,
        packet: &mut dyn PacketBuffer,
        oif: u32,
        next_hop: &IpAddress,
    ) -> Result<(), DropReason> {
        let dmac = self.neighbors.lookup(next_hop).ok_or_else(|| {
            trace!("FibRedirect: no {} neighbor entry for {}", next_hop.family(), next_hop);
            DropReason::UnresolvedNeighbor
        })?;
        let smac = self.interfaces.mac_by_ifindex(oif).ok_or_else(|| {
            trace!("FibRedirect: no local MAC for ifindex {}", oif);
            DropReason::UnresolvedNeighbor
        })?;

        self.rewrite(packet, &dmac, &smac)
    }

    /// Writes destination then source MAC. The source is left alone if the
    /// destination store fails.
    fn rewrite(
        &self,
        packet: &mut dyn PacketBuffer,
        dmac: &MacAddress,
        smac: &MacAddress,
    ) -> Result<(), DropReason> {
        let off = self.config.l2_offset;
        MacAddress::store_destination(packet, dmac, off)
            .map_err(|_| DropReason::HeaderWriteError)?;
        MacAddress::store_source(packet, smac, off).map_err(|_| DropReason::HeaderWriteError)
    }
}
