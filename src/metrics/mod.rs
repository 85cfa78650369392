//! Metrics module
//!
//! Provides the node-level replication counters exported to Prometheus.

mod mon_group;

pub use mon_group::{render_text, ReplMonGroup};
