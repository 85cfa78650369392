//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                             │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                    Ports (Traits)                         │  │
//! │  │  ErasureCoder │ ReplPlanner │ PeerPartSource              │  │
//! │  │  PhantomChecker │ RecordCommitter                         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                      │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │ ReedSolomonCoder │ VecPlanner │ InMemoryPeerSource        │  │
//! │  │ StaticPhantomChecker │ InMemoryRecordStore                │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod memory;
mod reed_solomon;

pub use memory::{InMemoryPeerSource, InMemoryRecordStore, StaticPhantomChecker, VecPlanner};
pub use reed_solomon::ReedSolomonCoder;
