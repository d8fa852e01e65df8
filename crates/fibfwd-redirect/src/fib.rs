//! FIB lookup interface and a static longest-prefix-match table.

use crate::neigh::{InterfaceMacs, NeighborCache};
use fibfwd_types::{AddressFamily, IpAddress, IpPrefix, MacAddress};
use log::trace;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// FIB lookup return codes as reported by the kernel helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FibStatus {
    Success,
    Blackhole,
    Unreachable,
    Prohibit,
    NotForwarded,
    ForwardingDisabled,
    UnsupportedLwt,
    NoNeighbor,
    FragmentationNeeded,
    NoSourceAddress,
    Unknown(i32),
}

impl FibStatus {
    /// Maps a raw return code to a status.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => FibStatus::Success,
            1 => FibStatus::Blackhole,
            2 => FibStatus::Unreachable,
            3 => FibStatus::Prohibit,
            4 => FibStatus::NotForwarded,
            5 => FibStatus::ForwardingDisabled,
            6 => FibStatus::UnsupportedLwt,
            7 => FibStatus::NoNeighbor,
            8 => FibStatus::FragmentationNeeded,
            9 => FibStatus::NoSourceAddress,
            other => FibStatus::Unknown(other),
        }
    }

    pub fn is_success(&self) -> bool {
        *self == FibStatus::Success
    }
}

impl fmt::Display for FibStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FibStatus::Success => "BPF_FIB_LKUP_RET_SUCCESS",
            FibStatus::Blackhole => "BPF_FIB_LKUP_RET_BLACKHOLE",
            FibStatus::Unreachable => "BPF_FIB_LKUP_RET_UNREACHABLE",
            FibStatus::Prohibit => "BPF_FIB_LKUP_RET_PROHIBIT",
            FibStatus::NotForwarded => "BPF_FIB_LKUP_RET_NOT_FWDED",
            FibStatus::ForwardingDisabled => "BPF_FIB_LKUP_RET_FWD_DISABLED",
            FibStatus::UnsupportedLwt => "BPF_FIB_LKUP_RET_UNSUPP_LWT",
            FibStatus::NoNeighbor => "BPF_FIB_LKUP_RET_NO_NEIGH",
            FibStatus::FragmentationNeeded => "BPF_FIB_LKUP_RET_FRAG_NEEDED",
            FibStatus::NoSourceAddress => "BPF_FIB_LKUP_RET_NO_SRC_ADDR",
            FibStatus::Unknown(code) => return write!(f, "unknown FIB status {}", code),
        };
        f.write_str(s)
    }
}

/// Flags passed along with a lookup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FibLookupFlags(u32);

impl FibLookupFlags {
    /// Consult the main table directly, skipping policy rules.
    pub const DIRECT: FibLookupFlags = FibLookupFlags(1 << 0);
    /// Perform the lookup from the egress perspective.
    pub const OUTPUT: FibLookupFlags = FibLookupFlags(1 << 1);

    pub const fn empty() -> Self {
        FibLookupFlags(0)
    }

    pub const fn contains(&self, other: FibLookupFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A single FIB query, built fresh per packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibLookupRequest {
    pub family: AddressFamily,
    /// Ingress interface index.
    pub ifindex: u32,
    pub src: IpAddress,
    pub dst: IpAddress,
    pub flags: FibLookupFlags,
}

impl FibLookupRequest {
    /// Builds a request; the family is taken from the destination.
    pub fn new(ifindex: u32, src: IpAddress, dst: IpAddress, flags: FibLookupFlags) -> Self {
        Self {
            family: dst.family(),
            ifindex,
            src,
            dst,
            flags,
        }
    }
}

/// The FIB's answer. MAC addresses are meaningful only on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibLookupResult {
    pub status: FibStatus,
    /// Egress interface index.
    pub ifindex: u32,
    pub smac: MacAddress,
    pub dmac: MacAddress,
    /// Next hop the route resolved to. May be of the other family than the
    /// request (e.g. an IPv4 route via an IPv6 gateway).
    pub next_hop: Option<IpAddress>,
}

impl FibLookupResult {
    pub fn success(ifindex: u32, smac: MacAddress, dmac: MacAddress) -> Self {
        Self {
            status: FibStatus::Success,
            ifindex,
            smac,
            dmac,
            next_hop: None,
        }
    }

    pub fn no_neighbor(ifindex: u32, next_hop: Option<IpAddress>) -> Self {
        Self {
            status: FibStatus::NoNeighbor,
            ifindex,
            smac: MacAddress::ZERO,
            dmac: MacAddress::ZERO,
            next_hop,
        }
    }

    pub fn failed(status: FibStatus) -> Self {
        Self {
            status,
            ifindex: 0,
            smac: MacAddress::ZERO,
            dmac: MacAddress::ZERO,
            next_hop: None,
        }
    }
}

/// Routing table consulted once per packet.
///
/// Implementations must be side-effect free and complete synchronously.
pub trait FibLookup: Send + Sync {
    fn lookup(&self, request: &FibLookupRequest) -> FibLookupResult;
}

/// A route held by [`StaticFib`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibRoute {
    pub prefix: IpPrefix,
    /// Egress interface index.
    pub ifindex: u32,
    /// Gateway; `None` for a connected route.
    pub gateway: Option<IpAddress>,
    pub blackhole: bool,
}

impl FibRoute {
    pub fn connected(prefix: IpPrefix, ifindex: u32) -> Self {
        Self {
            prefix,
            ifindex,
            gateway: None,
            blackhole: false,
        }
    }

    pub fn via(prefix: IpPrefix, gateway: IpAddress, ifindex: u32) -> Self {
        Self {
            prefix,
            ifindex,
            gateway: Some(gateway),
            blackhole: false,
        }
    }

    pub fn blackhole(prefix: IpPrefix) -> Self {
        Self {
            prefix,
            ifindex: 0,
            gateway: None,
            blackhole: true,
        }
    }
}

/// In-memory longest-prefix-match FIB.
///
/// Resolves next-hop MACs through the same neighbor cache and interface table
/// the engine uses, so a route whose gateway is not yet in the cache answers
/// `NoNeighbor`. There are no policy rules, so lookup flags do not change the
/// result.
pub struct StaticFib {
    routes: RwLock<Vec<FibRoute>>,
    neighbors: Arc<dyn NeighborCache>,
    interfaces: Arc<dyn InterfaceMacs>,
}

impl StaticFib {
    pub fn new(neighbors: Arc<dyn NeighborCache>, interfaces: Arc<dyn InterfaceMacs>) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            neighbors,
            interfaces,
        }
    }

    /// Adds a route, replacing any existing route for the same prefix.
    pub fn add_route(&self, route: FibRoute) {
        let mut routes = self.routes.write();
        match routes.iter_mut().find(|r| r.prefix == route.prefix) {
            Some(existing) => *existing = route,
            None => routes.push(route),
        }
    }

    /// Removes the route for `prefix`, returning it if present.
    pub fn remove_route(&self, prefix: &IpPrefix) -> Option<FibRoute> {
        let mut routes = self.routes.write();
        let pos = routes.iter().position(|r| &r.prefix == prefix)?;
        Some(routes.remove(pos))
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    fn best_match(&self, dst: &IpAddress) -> Option<FibRoute> {
        self.routes
            .read()
            .iter()
            .filter(|r| r.prefix.contains(dst))
            .fold(None, |best: Option<&FibRoute>, r| match best {
                Some(b) if b.prefix.prefix_len() >= r.prefix.prefix_len() => Some(b),
                _ => Some(r),
            })
            .cloned()
    }
}

impl FibLookup for StaticFib {
    fn lookup(&self, request: &FibLookupRequest) -> FibLookupResult {
        let Some(route) = self.best_match(&request.dst) else {
            trace!("StaticFib: no route to {}", request.dst);
            return FibLookupResult::failed(FibStatus::Unreachable);
        };

        if route.blackhole {
            trace!("StaticFib: {} hits blackhole {}", request.dst, route.prefix);
            return FibLookupResult::failed(FibStatus::Blackhole);
        }

        let next_hop = route.gateway.unwrap_or(request.dst);
        let smac = self.interfaces.mac_by_ifindex(route.ifindex);
        let dmac = self.neighbors.lookup(&next_hop);

        match (smac, dmac) {
            (Some(smac), Some(dmac)) => {
                let mut result = FibLookupResult::success(route.ifindex, smac, dmac);
                result.next_hop = Some(next_hop);
                result
            }
            _ => FibLookupResult::no_neighbor(route.ifindex, Some(next_hop)),
        }
    }
}
