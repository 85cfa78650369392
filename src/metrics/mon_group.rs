//! Node-level replication counters
//!
//! Shared by every replication job of a storage node and exported through a
//! Prometheus registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::{Error, Result};

/// Replication monitoring counters
#[derive(Debug, Clone)]
pub struct ReplMonGroup {
    /// Bytes of blobs fully recovered
    pub repl_work_units_done: IntCounter,
    /// Bytes of planned blobs not yet fully recovered
    pub repl_work_units_remaining: IntGauge,
    pub repl_phantom_like_recovered: IntCounter,
    pub repl_phantom_like_dropped: IntCounter,
    pub repl_phantom_like_unrecovered: IntCounter,
    /// Restoration or record build failures
    pub repl_recovery_group_type_errors: IntCounter,
}

impl ReplMonGroup {
    pub fn new() -> Result<Self> {
        Ok(Self {
            repl_work_units_done: IntCounter::new(
                "repl_work_units_done",
                "Bytes of blobs fully recovered by replication",
            )?,
            repl_work_units_remaining: IntGauge::new(
                "repl_work_units_remaining",
                "Bytes of planned blobs awaiting recovery",
            )?,
            repl_phantom_like_recovered: IntCounter::new(
                "repl_phantom_like_recovered",
                "Possibly phantom blobs that were recovered",
            )?,
            repl_phantom_like_dropped: IntCounter::new(
                "repl_phantom_like_dropped",
                "Blobs confirmed phantom and dropped",
            )?,
            repl_phantom_like_unrecovered: IntCounter::new(
                "repl_phantom_like_unrecovered",
                "Possibly phantom blobs left unrecovered",
            )?,
            repl_recovery_group_type_errors: IntCounter::new(
                "repl_recovery_group_type_errors",
                "Blobs whose erasure restoration or record build failed",
            )?,
        })
    }

    /// Register every counter with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.repl_work_units_done.clone()))?;
        registry.register(Box::new(self.repl_work_units_remaining.clone()))?;
        registry.register(Box::new(self.repl_phantom_like_recovered.clone()))?;
        registry.register(Box::new(self.repl_phantom_like_dropped.clone()))?;
        registry.register(Box::new(self.repl_phantom_like_unrecovered.clone()))?;
        registry.register(Box::new(self.repl_recovery_group_type_errors.clone()))?;
        Ok(())
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn render_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| Error::Internal(format!("Metrics exposition is not UTF-8: {}", e)))
}
