//! Network primitives shared by the fibfwd forwarding path.
//!
//! - [`MacAddress`]: 48-bit Ethernet addresses, lane comparison and
//!   Ethernet-header accessors
//! - [`PacketBuffer`]: bounds-checked byte access to a packet
//! - [`IpAddress`], [`IpPrefix`], [`AddressFamily`]: family-tagged L3 addresses

mod buffer;
mod ip;
mod mac;

pub use buffer::{BufferError, PacketBuffer};
pub use ip::{AddressFamily, IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::{MacAddress, ETH_ALEN, ETH_HLEN};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
