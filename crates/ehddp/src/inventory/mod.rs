// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collaborator ports consumed by the discovery service.
//!
//! The host controller provides raw frame I/O and its device, link and host
//! inventories. Each is a plain trait injected once through
//! [`Collaborators`]; [`MemoryNetwork`] implements all of them in memory.

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ReferenceCounts;
use crate::cycle::StatsSink;
use crate::topology::{ConnectPoint, DeviceKind, DeviceUri, LinkDescription};

pub use memory::MemoryNetwork;

/// A collaborator refused or could not take a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    Rejected(String),
    Unavailable(String),
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::Rejected(s) => write!(f, "rejected: {}", s),
            InventoryError::Unavailable(s) => write!(f, "unavailable: {}", s),
        }
    }
}

impl std::error::Error for InventoryError {}

/// Frame intercepted by the host, with the port it arrived on.
#[derive(Debug)]
pub struct InboundPacket {
    pub received_from: ConnectPoint,
    /// Full link-layer frame.
    pub data: Vec<u8>,
    handled: AtomicBool,
}

impl InboundPacket {
    pub fn new(received_from: ConnectPoint, data: Vec<u8>) -> Self {
        Self {
            received_from,
            data,
            handled: AtomicBool::new(false),
        }
    }

    /// Stop other consumers on the host from processing this frame.
    pub fn mark_handled(&self) {
        self.handled.store(true, Ordering::Release);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPort {
    /// Every port of the device.
    Flood,
    Port(u32),
}

/// Frame to send out of a managed switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub device: DeviceUri,
    pub output: OutputPort,
    /// Full link-layer frame.
    pub data: Vec<u8>,
}

/// Called for every intercepted frame of a registered ether-type.
///
/// Invocations may run concurrently.
pub trait PacketProcessor: Send + Sync {
    fn process(&self, packet: &InboundPacket);
}

pub trait PacketIo: Send + Sync {
    fn emit(&self, frame: OutboundFrame) -> crate::Result<()>;

    /// Start delivering frames of `ether_type` to `processor`.
    fn add_processor(&self, ether_type: u16, processor: Arc<dyn PacketProcessor>);

    fn remove_processor(&self, ether_type: u16);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub uri: DeviceUri,
    pub kind: DeviceKind,
    pub manufacturer: String,
    pub hw_version: String,
    pub sw_version: String,
    pub chassis_id: u64,
}

impl DeviceDescriptor {
    pub fn discovered(uri: DeviceUri) -> Self {
        Self {
            uri,
            kind: uri.kind,
            manufacturer: "eHDDP".to_string(),
            hw_version: uri.kind.to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            chassis_id: uri.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortDescriptor {
    pub number: u32,
    pub enabled: bool,
}

pub trait DeviceInventory: Send + Sync {
    /// Switches currently under direct control.
    fn managed_switches(&self) -> Vec<DeviceUri>;

    /// Create the device, or refresh it if already known.
    fn connect_device(
        &self,
        uri: &DeviceUri,
        descriptor: &DeviceDescriptor,
    ) -> Result<(), InventoryError>;

    fn update_ports(&self, uri: &DeviceUri, ports: &[PortDescriptor]) -> Result<(), InventoryError>;

    fn port_exists(&self, uri: &DeviceUri, port: u32) -> bool;
}

pub trait LinkInventory: Send + Sync {
    fn link_detected(&self, description: &LinkDescription) -> Result<(), InventoryError>;

    fn link_vanished(&self, description: &LinkDescription) -> Result<(), InventoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDescriptor {
    pub kind: DeviceKind,
    pub location: ConnectPoint,
}

pub trait HostInventory: Send + Sync {
    fn host_detected(&self, host: &DeviceUri, descriptor: &HostDescriptor)
        -> Result<(), InventoryError>;

    fn host_exists(&self, host: &DeviceUri) -> bool;
}

/// Expected fabric size for cycle-validity judgement.
pub trait ReferenceData: Send + Sync {
    fn reference_counts(&self) -> Option<ReferenceCounts>;
}

/// Reference counts fixed at construction (typically from configuration).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticReference(pub Option<ReferenceCounts>);

impl ReferenceData for StaticReference {
    fn reference_counts(&self) -> Option<ReferenceCounts> {
        self.0
    }
}

/// Everything the service talks to, injected once.
#[derive(Clone)]
pub struct Collaborators {
    pub packets: Arc<dyn PacketIo>,
    pub devices: Arc<dyn DeviceInventory>,
    pub links: Arc<dyn LinkInventory>,
    pub hosts: Arc<dyn HostInventory>,
    pub reference: Arc<dyn ReferenceData>,
    pub stats: Arc<dyn StatsSink>,
}

impl Collaborators {
    /// Wire every port to one in-memory network.
    pub fn from_memory(
        network: Arc<MemoryNetwork>,
        reference: Arc<dyn ReferenceData>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            packets: network.clone(),
            devices: network.clone(),
            links: network.clone(),
            hosts: network,
            reference,
            stats,
        }
    }
}
