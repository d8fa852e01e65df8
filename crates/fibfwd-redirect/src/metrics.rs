//! Prometheus counters for redirect verdicts.

use crate::config::RedirectConfig;
use crate::error::{DropReason, MetricsError};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Which branch produced a successful redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectPath {
    /// MACs came straight from the FIB result.
    Direct,
    /// Destination MAC came from the neighbor cache.
    Neighbor,
    /// The platform resolved the neighbor asynchronously.
    Deferred,
}

impl RedirectPath {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RedirectPath::Direct => "direct",
            RedirectPath::Neighbor => "neighbor",
            RedirectPath::Deferred => "deferred",
        }
    }
}

/// Drop and redirect counters, registered in a private registry.
#[derive(Clone)]
pub struct RedirectMetrics {
    pub drops_total: IntCounterVec,
    pub redirects_total: IntCounterVec,
    pub registry: Arc<Registry>,
}

impl RedirectMetrics {
    pub fn new(prefix: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let drops_total = IntCounterVec::new(
            Opts::new(
                format!("{}_redirect_drops_total", prefix),
                "Packets dropped by the FIB redirect engine, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(drops_total.clone()))?;

        let redirects_total = IntCounterVec::new(
            Opts::new(
                format!("{}_redirects_total", prefix),
                "Packets redirected by the FIB redirect engine, by resolution path",
            ),
            &["path"],
        )?;
        registry.register(Box::new(redirects_total.clone()))?;

        // Pre-create every series so they export as zero.
        for label in DropReason::LABELS {
            drops_total.with_label_values(&[label]);
        }
        for path in [RedirectPath::Direct, RedirectPath::Neighbor, RedirectPath::Deferred] {
            redirects_total.with_label_values(&[path.as_str()]);
        }

        Ok(Self {
            drops_total,
            redirects_total,
            registry: Arc::new(registry),
        })
    }

    /// Builds counters named after `config.metrics_prefix`.
    pub fn from_config(config: &RedirectConfig) -> Result<Self, MetricsError> {
        Self::new(&config.metrics_prefix)
    }

    pub fn record_drop(&self, reason: &DropReason) {
        self.drops_total.with_label_values(&[reason.as_str()]).inc();
    }

    pub fn record_redirect(&self, path: RedirectPath) {
        self.redirects_total.with_label_values(&[path.as_str()]).inc();
    }

    pub fn drops(&self, reason: &DropReason) -> u64 {
        self.drops_total.with_label_values(&[reason.as_str()]).get()
    }

    pub fn redirects(&self, path: RedirectPath) -> u64 {
        self.redirects_total.with_label_values(&[path.as_str()]).get()
    }

    /// Gathers all counters in Prometheus text format.
    pub fn gather_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = vec![];
        encoder.encode(&self.registry.gather(), &mut buf).ok();
        String::from_utf8(buf).unwrap_or_else(|_| String::from("# Error encoding metrics\n"))
    }
}
