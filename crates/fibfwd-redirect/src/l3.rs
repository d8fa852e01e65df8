//! L3 header view and the hop-count processor run before any L2 rewrite.

use crate::error::L3Reject;
use fibfwd_types::{AddressFamily, IpAddress, Ipv4Address, Ipv6Address, PacketBuffer};
use log::trace;
use std::net::{Ipv4Addr, Ipv6Addr};

const IPV4_MIN_HLEN: usize = 20;
const IPV6_HLEN: usize = 40;

const IPV4_TTL_OFF: usize = 8;
const IPV4_SADDR_OFF: usize = 12;
const IPV4_DADDR_OFF: usize = 16;

const IPV6_HOP_LIMIT_OFF: usize = 7;
const IPV6_SADDR_OFF: usize = 8;
const IPV6_DADDR_OFF: usize = 24;

/// Absolute position of a header field; an overflowing offset is malformed.
fn field_at(offset: usize, rel: usize) -> Result<usize, L3Reject> {
    offset.checked_add(rel).ok_or(L3Reject::Malformed)
}

/// Which way the packet is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ingress,
    Egress,
}

/// A validated L3 header: its offset in the packet and the addresses that
/// seed the FIB lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3Header {
    V4 {
        offset: usize,
        src: Ipv4Address,
        dst: Ipv4Address,
    },
    V6 {
        offset: usize,
        src: Ipv6Address,
        dst: Ipv6Address,
    },
}

impl L3Header {
    pub fn v4(offset: usize, src: Ipv4Address, dst: Ipv4Address) -> Self {
        L3Header::V4 { offset, src, dst }
    }

    pub fn v6(offset: usize, src: Ipv6Address, dst: Ipv6Address) -> Self {
        L3Header::V6 { offset, src, dst }
    }

    /// Reads the version nibble and addresses of the header at `offset`.
    pub fn from_packet<B: PacketBuffer + ?Sized>(buf: &B, offset: usize) -> Result<Self, L3Reject> {
        let mut first = [0u8; 1];
        buf.load_bytes(offset, &mut first)
            .map_err(|_| L3Reject::Malformed)?;

        match first[0] >> 4 {
            4 => {
                if usize::from(first[0] & 0x0f) * 4 < IPV4_MIN_HLEN {
                    return Err(L3Reject::Malformed);
                }
                let mut saddr = [0u8; 4];
                let mut daddr = [0u8; 4];
                buf.load_bytes(field_at(offset, IPV4_SADDR_OFF)?, &mut saddr)
                    .map_err(|_| L3Reject::Malformed)?;
                buf.load_bytes(field_at(offset, IPV4_DADDR_OFF)?, &mut daddr)
                    .map_err(|_| L3Reject::Malformed)?;
                Ok(L3Header::v4(
                    offset,
                    Ipv4Addr::from(saddr).into(),
                    Ipv4Addr::from(daddr).into(),
                ))
            }
            6 => {
                let mut saddr = [0u8; 16];
                let mut daddr = [0u8; 16];
                buf.load_bytes(field_at(offset, IPV6_SADDR_OFF)?, &mut saddr)
                    .map_err(|_| L3Reject::Malformed)?;
                buf.load_bytes(field_at(offset, IPV6_DADDR_OFF)?, &mut daddr)
                    .map_err(|_| L3Reject::Malformed)?;
                Ok(L3Header::v6(
                    offset,
                    Ipv6Addr::from(saddr).into(),
                    Ipv6Addr::from(daddr).into(),
                ))
            }
            _ => Err(L3Reject::Malformed),
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            L3Header::V4 { .. } => AddressFamily::Inet,
            L3Header::V6 { .. } => AddressFamily::Inet6,
        }
    }

    /// Byte offset of the L3 header in the packet.
    pub fn offset(&self) -> usize {
        match self {
            L3Header::V4 { offset, .. } | L3Header::V6 { offset, .. } => *offset,
        }
    }

    pub fn src(&self) -> IpAddress {
        match self {
            L3Header::V4 { src, .. } => IpAddress::V4(*src),
            L3Header::V6 { src, .. } => IpAddress::V6(*src),
        }
    }

    pub fn dst(&self) -> IpAddress {
        match self {
            L3Header::V4 { dst, .. } => IpAddress::V4(*dst),
            L3Header::V6 { dst, .. } => IpAddress::V6(*dst),
        }
    }
}

/// Hop-count and checksum processing for a forwarded packet.
///
/// Runs exactly once per packet, before any L2 rewrite. A rejection stops all
/// further processing of the packet.
pub trait L3Processor: Send + Sync {
    fn process(
        &self,
        packet: &mut dyn PacketBuffer,
        header: &L3Header,
        direction: Direction,
    ) -> Result<(), L3Reject>;
}

/// Decrements the IPv4 TTL (with incremental header checksum update) or the
/// IPv6 hop limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardL3Processor;

impl StandardL3Processor {
    fn process_v4(packet: &mut dyn PacketBuffer, offset: usize) -> Result<(), L3Reject> {
        // ttl, protocol, checksum
        let ttl_at = field_at(offset, IPV4_TTL_OFF)?;
        let mut word = [0u8; 4];
        packet
            .load_bytes(ttl_at, &mut word)
            .map_err(|_| L3Reject::Malformed)?;

        let ttl = word[0];
        if ttl <= 1 {
            trace!("L3: IPv4 TTL {} exhausted", ttl);
            return Err(L3Reject::HopLimitExceeded);
        }

        let old = u16::from_be_bytes([ttl, word[1]]);
        let new = u16::from_be_bytes([ttl - 1, word[1]]);
        let check = u16::from_be_bytes([word[2], word[3]]);
        let check = csum_replace(check, old, new);

        word[0] = ttl - 1;
        word[2..4].copy_from_slice(&check.to_be_bytes());
        packet
            .store_bytes(ttl_at, &word)
            .map_err(|_| L3Reject::Malformed)
    }

    fn process_v6(packet: &mut dyn PacketBuffer, offset: usize) -> Result<(), L3Reject> {
        let hop_at = field_at(offset, IPV6_HOP_LIMIT_OFF)?;
        let mut hop_limit = [0u8; 1];
        packet
            .load_bytes(hop_at, &mut hop_limit)
            .map_err(|_| L3Reject::Malformed)?;

        if hop_limit[0] <= 1 {
            trace!("L3: IPv6 hop limit {} exhausted", hop_limit[0]);
            return Err(L3Reject::HopLimitExceeded);
        }

        packet
            .store_bytes(hop_at, &[hop_limit[0] - 1])
            .map_err(|_| L3Reject::Malformed)
    }
}

impl L3Processor for StandardL3Processor {
    fn process(
        &self,
        packet: &mut dyn PacketBuffer,
        header: &L3Header,
        _direction: Direction,
    ) -> Result<(), L3Reject> {
        match header {
            L3Header::V4 { offset, .. } => {
                if packet.len() < field_at(*offset, IPV4_MIN_HLEN)? {
                    return Err(L3Reject::Malformed);
                }
                Self::process_v4(packet, *offset)
            }
            L3Header::V6 { offset, .. } => {
                if packet.len() < field_at(*offset, IPV6_HLEN)? {
                    return Err(L3Reject::Malformed);
                }
                Self::process_v6(packet, *offset)
            }
        }
    }
}

/// Incremental one's-complement checksum update (RFC 1624, eqn. 3) for one
/// 16-bit word changing from `old` to `new`.
fn csum_replace(check: u16, old: u16, new: u16) -> u16 {
    let mut sum = u32::from(!check) + u32::from(!old) + u32::from(new);
    sum = (sum & 0xffff) + (sum >> 16);
    sum = (sum & 0xffff) + (sum >> 16);
    !(sum as u16)
}
