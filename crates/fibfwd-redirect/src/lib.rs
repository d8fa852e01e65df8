//! FIB-driven packet redirect engine.
//!
//! Given a packet's validated L3 header and its ingress interface,
//! [`FibRedirect`] consults the FIB, runs hop-count processing, rewrites the
//! Ethernet addresses and redirects the packet out of the egress interface,
//! or classifies it as a drop.
//!
//! # Architecture
//!
//! ```text
//!   packet + L3Header
//!          │
//!          ▼
//!   ┌──────────────┐  lookup   ┌──────────────────┐
//!   │  FibRedirect │──────────▶│ FibLookup        │
//!   │              │  process  ├──────────────────┤
//!   │              │──────────▶│ L3Processor      │
//!   │              │  lookup   ├──────────────────┤
//!   │              │──────────▶│ NeighborCache    │
//!   │              │           │ InterfaceMacs    │
//!   │              │ redirect  ├──────────────────┤
//!   │              │──────────▶│ RedirectPlatform │
//!   └──────────────┘           └──────────────────┘
//! ```
//!
//! All collaborators are injected as trait objects. [`StaticFib`],
//! [`NeighborTable`], [`InterfaceTable`] and [`StandardL3Processor`] are
//! in-memory implementations usable without a kernel.

pub mod config;
pub mod engine;
pub mod error;
pub mod fib;
pub mod l3;
pub mod metrics;
pub mod neigh;
pub mod platform;

pub use config::{LookupMode, NeighResolverMode, RedirectConfig};
pub use engine::{FibRedirect, RedirectOutcome};
pub use error::{ConfigError, DropReason, L3Reject, MetricsError};
pub use fib::{
    FibLookup, FibLookupFlags, FibLookupRequest, FibLookupResult, FibRoute, FibStatus, StaticFib,
};
pub use l3::{Direction, L3Header, L3Processor, StandardL3Processor};
pub use metrics::{RedirectMetrics, RedirectPath};
pub use neigh::{InterfaceMacs, InterfaceTable, NeighborCache, NeighborStats, NeighborTable};
pub use platform::{DeferredNeighbor, DeferredVerdict, RedirectPlatform};
