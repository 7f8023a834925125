// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory implementation of every collaborator port.
//!
//! Records each inventory call so tests and the simulator can inspect what
//! discovery registered. Emitted frames are queued on a crossbeam channel.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use super::{
    DeviceDescriptor, DeviceInventory, HostDescriptor, HostInventory, InboundPacket,
    InventoryError, LinkInventory, OutboundFrame, PacketIo, PacketProcessor, PortDescriptor,
};
use crate::error::{Error, Result};
use crate::topology::{DeviceUri, LinkDescription};

#[derive(Default)]
struct LinkLog {
    active: HashSet<LinkDescription>,
    detected: Vec<LinkDescription>,
    vanished: Vec<LinkDescription>,
}

pub struct MemoryNetwork {
    managed: RwLock<BTreeSet<DeviceUri>>,
    devices: Mutex<BTreeMap<DeviceUri, DeviceDescriptor>>,
    connect_calls: Mutex<Vec<DeviceUri>>,
    ports: Mutex<HashMap<DeviceUri, BTreeSet<u32>>>,
    links: Mutex<LinkLog>,
    hosts: Mutex<BTreeMap<DeviceUri, HostDescriptor>>,
    processors: RwLock<HashMap<u16, Arc<dyn PacketProcessor>>>,
    rejected: Mutex<HashSet<DeviceUri>>,
    emit_tx: Sender<OutboundFrame>,
    emit_rx: Receiver<OutboundFrame>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        let (emit_tx, emit_rx) = channel::unbounded();
        Self {
            managed: RwLock::new(BTreeSet::new()),
            devices: Mutex::new(BTreeMap::new()),
            connect_calls: Mutex::new(Vec::new()),
            ports: Mutex::new(HashMap::new()),
            links: Mutex::new(LinkLog::default()),
            hosts: Mutex::new(BTreeMap::new()),
            processors: RwLock::new(HashMap::new()),
            rejected: Mutex::new(HashSet::new()),
            emit_tx,
            emit_rx,
        }
    }

    /// Put a switch under direct control.
    pub fn add_managed_switch(&self, id: u64) {
        self.managed.write().insert(DeviceUri::switch(id));
    }

    /// Make every registration touching `uri` fail with `InventoryError`.
    pub fn reject(&self, uri: DeviceUri) {
        self.rejected.lock().insert(uri);
    }

    /// Frames handed to `emit`, in order. Each is delivered once.
    pub fn emitted(&self) -> &Receiver<OutboundFrame> {
        &self.emit_rx
    }

    pub fn drain_emitted(&self) -> Vec<OutboundFrame> {
        self.emit_rx.try_iter().collect()
    }

    /// Hand a frame to the processor registered for its ether-type.
    ///
    /// Returns whether a processor took it and marked it handled.
    pub fn deliver(&self, packet: &InboundPacket) -> bool {
        let Some(ether_type) = packet
            .data
            .get(12..14)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
        else {
            return false;
        };
        let processor = self.processors.read().get(&ether_type).cloned();
        match processor {
            Some(processor) => {
                processor.process(packet);
                packet.is_handled()
            }
            None => false,
        }
    }

    pub fn has_processor(&self, ether_type: u16) -> bool {
        self.processors.read().contains_key(&ether_type)
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices.lock().values().cloned().collect()
    }

    /// Every `connect_device` call, refreshes included.
    pub fn connect_calls(&self) -> Vec<DeviceUri> {
        self.connect_calls.lock().clone()
    }

    pub fn ports(&self, uri: &DeviceUri) -> Vec<u32> {
        self.ports
            .lock()
            .get(uri)
            .map(|ports| ports.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Links detected and not yet vanished.
    pub fn active_links(&self) -> Vec<LinkDescription> {
        let mut links: Vec<_> = self.links.lock().active.iter().copied().collect();
        links.sort();
        links
    }

    pub fn detected_links(&self) -> Vec<LinkDescription> {
        self.links.lock().detected.clone()
    }

    pub fn vanished_links(&self) -> Vec<LinkDescription> {
        self.links.lock().vanished.clone()
    }

    pub fn hosts(&self) -> Vec<(DeviceUri, HostDescriptor)> {
        self.hosts
            .lock()
            .iter()
            .map(|(uri, host)| (*uri, host.clone()))
            .collect()
    }

    fn check_rejected(&self, uri: &DeviceUri) -> std::result::Result<(), InventoryError> {
        if self.rejected.lock().contains(uri) {
            Err(InventoryError::Rejected(format!("{} is blocked", uri)))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIo for MemoryNetwork {
    fn emit(&self, frame: OutboundFrame) -> Result<()> {
        if !self.managed.read().contains(&frame.device) {
            return Err(Error::Emit(format!("{} is not a managed switch", frame.device)));
        }
        self.emit_tx
            .send(frame)
            .map_err(|e| Error::Emit(e.to_string()))
    }

    fn add_processor(&self, ether_type: u16, processor: Arc<dyn PacketProcessor>) {
        self.processors.write().insert(ether_type, processor);
    }

    fn remove_processor(&self, ether_type: u16) {
        self.processors.write().remove(&ether_type);
    }
}

impl DeviceInventory for MemoryNetwork {
    fn managed_switches(&self) -> Vec<DeviceUri> {
        self.managed.read().iter().copied().collect()
    }

    fn connect_device(
        &self,
        uri: &DeviceUri,
        descriptor: &DeviceDescriptor,
    ) -> std::result::Result<(), InventoryError> {
        self.check_rejected(uri)?;
        self.connect_calls.lock().push(*uri);
        self.devices.lock().insert(*uri, descriptor.clone());
        Ok(())
    }

    fn update_ports(
        &self,
        uri: &DeviceUri,
        ports: &[PortDescriptor],
    ) -> std::result::Result<(), InventoryError> {
        if !self.devices.lock().contains_key(uri) {
            return Err(InventoryError::Unavailable(format!("{} is not connected", uri)));
        }
        let mut all = self.ports.lock();
        let known = all.entry(*uri).or_default();
        known.extend(ports.iter().filter(|p| p.enabled).map(|p| p.number));
        Ok(())
    }

    fn port_exists(&self, uri: &DeviceUri, port: u32) -> bool {
        self.ports
            .lock()
            .get(uri)
            .is_some_and(|ports| ports.contains(&port))
    }
}

impl LinkInventory for MemoryNetwork {
    fn link_detected(&self, description: &LinkDescription) -> std::result::Result<(), InventoryError> {
        self.check_rejected(&description.key.src.device)?;
        self.check_rejected(&description.key.dst.device)?;
        let mut links = self.links.lock();
        links.active.insert(*description);
        links.detected.push(*description);
        Ok(())
    }

    fn link_vanished(&self, description: &LinkDescription) -> std::result::Result<(), InventoryError> {
        let mut links = self.links.lock();
        links.active.remove(description);
        links.vanished.push(*description);
        Ok(())
    }
}

impl HostInventory for MemoryNetwork {
    fn host_detected(
        &self,
        host: &DeviceUri,
        descriptor: &HostDescriptor,
    ) -> std::result::Result<(), InventoryError> {
        self.check_rejected(host)?;
        self.hosts.lock().insert(*host, descriptor.clone());
        Ok(())
    }

    fn host_exists(&self, host: &DeviceUri) -> bool {
        self.hosts.lock().contains_key(host)
    }
}
