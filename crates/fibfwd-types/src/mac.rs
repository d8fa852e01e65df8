//! MAC address type with lane comparison and frame accessors.

use crate::buffer::{BufferError, PacketBuffer};
use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of an Ethernet hardware address in bytes.
pub const ETH_ALEN: usize = 6;

/// Length of an untagged Ethernet header in bytes.
pub const ETH_HLEN: usize = 14;

/// A 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use fibfwd_types::MacAddress;
///
/// let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:11:22:33:44:55");
///
/// // Also supports hyphen-separated format
/// let mac2: MacAddress = "00-11-22-33-44-55".parse().unwrap();
/// assert_eq!(mac, mac2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; ETH_ALEN]);

impl MacAddress {
    /// The broadcast MAC address (FF:FF:FF:FF:FF:FF).
    pub const BROADCAST: MacAddress = MacAddress([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; ETH_ALEN]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; ETH_ALEN] {
        &self.0
    }

    /// Returns the address as a 32-bit lane (octets 0-3) and a 16-bit lane
    /// (octets 4-5), both in native byte order.
    pub const fn lanes(&self) -> (u32, u16) {
        let b = &self.0;
        (
            u32::from_ne_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_ne_bytes([b[4], b[5]]),
        )
    }

    /// Compares two addresses lane by lane.
    ///
    /// The result is zero iff the addresses are equal. Its sign carries no
    /// ordering meaning.
    pub const fn compare(a: &MacAddress, b: &MacAddress) -> i64 {
        let (a1, a2) = a.lanes();
        let (b1, b2) = b.lanes();

        let diff = a1 as i64 - b1 as i64;
        if diff != 0 {
            return diff;
        }
        a2 as i64 - b2 as i64
    }

    /// Returns true if this is a multicast address.
    ///
    /// A multicast address has the least significant bit of the first octet set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true if this is a unicast address.
    pub const fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true if this is a locally administered address.
    pub const fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Returns true if this is the broadcast address.
    pub const fn is_broadcast(&self) -> bool {
        Self::compare(self, &Self::BROADCAST) == 0
    }

    /// Returns true if this is the zero address.
    pub const fn is_zero(&self) -> bool {
        Self::compare(self, &Self::ZERO) == 0
    }

    /// Reads the source address of the Ethernet header at `off`.
    pub fn load_source<B: PacketBuffer + ?Sized>(
        buf: &B,
        off: usize,
    ) -> Result<MacAddress, BufferError> {
        Self::load_at(buf, off.saturating_add(ETH_ALEN))
    }

    /// Reads the destination address of the Ethernet header at `off`.
    pub fn load_destination<B: PacketBuffer + ?Sized>(
        buf: &B,
        off: usize,
    ) -> Result<MacAddress, BufferError> {
        Self::load_at(buf, off)
    }

    /// Overwrites the source address of the Ethernet header at `off`.
    pub fn store_source<B: PacketBuffer + ?Sized>(
        buf: &mut B,
        mac: &MacAddress,
        off: usize,
    ) -> Result<(), BufferError> {
        buf.store_bytes(off.saturating_add(ETH_ALEN), &mac.0)
    }

    /// Overwrites the destination address of the Ethernet header at `off`.
    pub fn store_destination<B: PacketBuffer + ?Sized>(
        buf: &mut B,
        mac: &MacAddress,
        off: usize,
    ) -> Result<(), BufferError> {
        buf.store_bytes(off, &mac.0)
    }

    fn load_at<B: PacketBuffer + ?Sized>(buf: &B, at: usize) -> Result<MacAddress, BufferError> {
        let mut bytes = [0u8; ETH_ALEN];
        buf.load_bytes(at, &mut bytes)?;
        Ok(MacAddress(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != ETH_ALEN {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; ETH_ALEN];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; ETH_ALEN]> for MacAddress {
    fn from(bytes: [u8; ETH_ALEN]) -> Self {
        MacAddress(bytes)
    }
}

impl From<MacAddress> for [u8; ETH_ALEN] {
    fn from(mac: MacAddress) -> [u8; ETH_ALEN] {
        mac.0
    }
}
