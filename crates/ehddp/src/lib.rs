// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # eHDDP - Enhanced Hybrid Domain Discovery Protocol
//!
//! Topology discovery for hybrid SDN fabrics: controller-managed switches,
//! legacy switches, switches pending configuration and sensor nodes that
//! the controller cannot program. Discovery frames accumulate one hop per
//! traversed device, so a single REPLY reveals the whole path it took.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ehddp::{Collaborators, DiscoveryConfig, DiscoveryService, LogStatsSink, MemoryNetwork};
//! use ehddp::inventory::StaticReference;
//!
//! fn main() -> ehddp::Result<()> {
//!     let network = Arc::new(MemoryNetwork::new());
//!     network.add_managed_switch(1);
//!
//!     let collaborators = Collaborators::from_memory(
//!         network,
//!         Arc::new(StaticReference::default()),
//!         Arc::new(LogStatsSink),
//!     );
//!     let service = DiscoveryService::start(DiscoveryConfig::default(), collaborators)?;
//!     // ... frames punted by the fabric reach service.controller().classifier()
//!     service.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  cycle       Broadcast -> Harvest -> Settle, stats reporting  |
//! +---------------------------------------------------------------+
//! |  classifier  frame classes, half-link pairing, relay replies  |
//! +---------------------------------------------------------------+
//! |  topology    cycle state, link/device/host inference          |
//! +---------------------------------------------------------------+
//! |  protocol    hop codec, discovery frame, Ethernet framing     |
//! +---------------------------------------------------------------+
//! |  inventory   host controller ports (packet I/O, inventories)  |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`protocol`] - Wire format
//! - [`classifier`] - Inbound frame handling
//! - [`topology`] - Inference and per-cycle bookkeeping
//! - [`cycle`] - Discovery loop and service lifecycle
//! - [`inventory`] - Collaborator traits and the in-memory network
//! - [`config`] - Constants and [`DiscoveryConfig`]

pub mod classifier;
pub mod config;
pub mod cycle;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod protocol;
pub mod topology;

pub use classifier::{classify, FrameClass, PacketClassifier};
pub use config::{ConfigError, DiscoveryConfig, ReferenceCounts};
pub use cycle::{CycleReport, DiscoveryController, DiscoveryService, LogStatsSink, StatsSink};
pub use error::{ClassificationError, Error, Result};
pub use inventory::{Collaborators, InboundPacket, MemoryNetwork};
pub use protocol::{DiscoveryFrame, EthernetFrame, Hop, HopConfig, MacAddr, Opcode};
pub use topology::{ConnectPoint, DeviceKind, DeviceUri, LinkDescription, LinkKey};
