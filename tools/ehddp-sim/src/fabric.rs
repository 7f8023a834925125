// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulated hybrid fabric.
//!
//! A single delivery thread owns every datapath. Frames the controller emits
//! are taken from the [`MemoryNetwork`] queue, carried over the layout's
//! wires and handled by the node they reach:
//!
//! - managed switches punt every discovery frame back to the controller;
//! - legacy and pending switches learn the port toward the origin on the
//!   first REQUEST of a cycle, stamp their hop and flood it on; a repeated
//!   REQUEST (or a single-port switch) is answered with a REPLY seeded by
//!   the switch itself; REPLYs are stamped and sent toward the origin;
//! - sensors answer every REQUEST with a REPLY seeded by themselves.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use ehddp::config::{BROADCAST_MAC, FLOOD_PORT};
use ehddp::inventory::{OutboundFrame, OutputPort};
use ehddp::protocol::{DiscoveryFrame, EthernetFrame, Hop};
use ehddp::{ConnectPoint, DeviceUri, InboundPacket, MemoryNetwork, Opcode};

use crate::layout::{Layout, Role};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Frame sitting on a wire, about to reach `port` of node `node`.
struct Transit {
    node: usize,
    port: u32,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FabricCounters {
    pub carried: AtomicU64,
    pub punted: AtomicU64,
    pub dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FabricSnapshot {
    pub carried: u64,
    pub punted: u64,
    pub dropped: u64,
}

impl FabricCounters {
    pub fn snapshot(&self) -> FabricSnapshot {
        FabricSnapshot {
            carried: self.carried.load(Ordering::Relaxed),
            punted: self.punted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct Datapaths {
    layout: Arc<Layout>,
    network: Arc<MemoryNetwork>,
    ether_type: u16,
    /// Per node: (cycle stamp, port toward the origin).
    learned: Vec<Option<(u64, u32)>>,
    queue: VecDeque<Transit>,
    counters: Arc<FabricCounters>,
}

impl Datapaths {
    fn inject(&mut self, frame: OutboundFrame) {
        let Some(node) = self.layout.managed(frame.device.id) else {
            log::warn!("[ehddp-sim] emit on unknown switch {}", frame.device);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match frame.output {
            OutputPort::Flood => {
                let ports: Vec<u32> = self.layout.node(node).ports.iter().copied().collect();
                for port in ports {
                    self.transmit(node, port, frame.data.clone());
                }
            }
            OutputPort::Port(port) => self.transmit(node, port, frame.data),
        }
    }

    fn transmit(&mut self, node: usize, port: u32, data: Vec<u8>) {
        match self.layout.peer(node, port) {
            Some((peer, peer_port)) => {
                self.counters.carried.fetch_add(1, Ordering::Relaxed);
                self.queue.push_back(Transit {
                    node: peer,
                    port: peer_port,
                    data,
                });
            }
            None => {
                log::trace!(
                    "[ehddp-sim] {}:{} is not wired",
                    self.layout.node(node).name,
                    port
                );
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn drain(&mut self) {
        while let Some(transit) = self.queue.pop_front() {
            self.arrive(transit);
        }
    }

    fn arrive(&mut self, transit: Transit) {
        let node = self.layout.node(transit.node);
        if node.role == Role::Managed {
            let packet = InboundPacket::new(
                ConnectPoint::new(DeviceUri::switch(node.id), transit.port),
                transit.data,
            );
            if self.network.deliver(&packet) {
                self.counters.punted.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        let frame = match EthernetFrame::decode(&transit.data)
            .and_then(|eth| eth.discovery_frame(self.ether_type))
        {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[ehddp-sim] {} dropped frame: {}", node.name, e);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match (node.role, frame.opcode) {
            (Role::Sensor, Opcode::Request) => self.answer(transit.node, transit.port, &frame),
            (Role::Legacy | Role::Pending, Opcode::Request) => {
                self.forward_request(transit.node, transit.port, frame)
            }
            (Role::Legacy | Role::Pending, Opcode::Reply) => {
                self.forward_reply(transit.node, transit.port, frame)
            }
            _ => {}
        }
    }

    /// Reply to `request` with a one-hop chain seeded by this node.
    fn answer(&mut self, index: usize, port: u32, request: &DiscoveryFrame) {
        let node = self.layout.node(index);
        let mut reply =
            DiscoveryFrame::new(Opcode::Reply, request.sequence, request.prev_addr.clone());
        reply.ack_nonce = request.ack_nonce;
        reply.block_time_ms = request.block_time_ms;
        reply.last_addr = node.hw_addr();
        reply
            .hops
            .push(Hop::new(node.device_type, node.id, port, port, true));
        self.send(index, &[port], &reply);
    }

    fn forward_request(&mut self, index: usize, port: u32, mut request: DiscoveryFrame) {
        let repeated = matches!(self.learned[index], Some((seq, _)) if seq == request.sequence);
        if repeated {
            self.answer(index, port, &request);
            return;
        }
        self.learned[index] = Some((request.sequence, port));

        let node = self.layout.node(index);
        let onward: Vec<u32> = node.ports.iter().copied().filter(|p| *p != port).collect();
        if onward.is_empty() {
            self.answer(index, port, &request);
            return;
        }
        let hop = Hop::new(node.device_type, node.id, port, FLOOD_PORT, true);
        if let Err(e) = request.push_hop(hop, &node.hw_addr()) {
            log::debug!("[ehddp-sim] {} stops REQUEST: {}", node.name, e);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.send(index, &onward, &request);
    }

    fn forward_reply(&mut self, index: usize, port: u32, mut reply: DiscoveryFrame) {
        let node = self.layout.node(index);
        let toward = match self.learned[index] {
            Some((seq, toward)) if seq == reply.sequence => toward,
            _ => {
                log::debug!("[ehddp-sim] {} has no path for cycle {}", node.name, reply.sequence);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let hop = Hop::new(node.device_type, node.id, port, toward, true);
        if let Err(e) = reply.push_hop(hop, &node.hw_addr()) {
            log::debug!("[ehddp-sim] {} stops REPLY: {}", node.name, e);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.send(index, &[toward], &reply);
    }

    fn send(&mut self, index: usize, ports: &[u32], frame: &DiscoveryFrame) {
        let src = self.layout.node(index).mac();
        let data = match EthernetFrame::wrap(BROADCAST_MAC, src, self.ether_type, frame) {
            Ok(eth) => eth.encode(),
            Err(e) => {
                log::warn!("[ehddp-sim] {} cannot encode: {}", self.layout.node(index).name, e);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        for port in ports {
            self.transmit(index, *port, data.clone());
        }
    }
}

/// Delivery thread carrying frames between the controller and the datapaths.
pub struct Fabric {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<FabricCounters>,
}

impl Fabric {
    pub fn start(
        layout: Arc<Layout>,
        network: Arc<MemoryNetwork>,
        ether_type: u16,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(FabricCounters::default());
        let emitted: Receiver<OutboundFrame> = network.emitted().clone();
        let mut datapaths = Datapaths {
            learned: vec![None; layout.nodes().len()],
            layout,
            network,
            ether_type,
            queue: VecDeque::new(),
            counters: Arc::clone(&counters),
        };

        let stop = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("ehddp-fabric".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match emitted.recv_timeout(POLL_INTERVAL) {
                        Ok(frame) => {
                            datapaths.inject(frame);
                            datapaths.drain();
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            counters,
        })
    }

    pub fn stop(mut self) -> FabricSnapshot {
        self.teardown();
        self.counters.snapshot()
    }

    fn teardown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Fabric {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehddp::config::EHDDP_ETHER_TYPE;
    use ehddp::inventory::StaticReference;
    use ehddp::topology::{DeviceKind, LinkKey, SensorKind};
    use ehddp::{Collaborators, CycleReport, DiscoveryConfig, DiscoveryService, StatsSink};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<CycleReport>>);

    impl StatsSink for Collect {
        fn record(&self, report: &CycleReport) {
            self.0.lock().push(report.clone());
        }
    }

    fn network_for(layout: &Layout) -> Arc<MemoryNetwork> {
        let network = Arc::new(MemoryNetwork::new());
        for id in layout.managed_ids() {
            network.add_managed_switch(id);
        }
        network
    }

    fn run_one_cycle(json: &str) -> (Arc<MemoryNetwork>, Arc<Collect>, Arc<CycleReport>) {
        let layout = Arc::new(Layout::from_json(json).expect("layout"));
        let network = network_for(&layout);
        let stats = Arc::new(Collect::default());
        let collaborators = Collaborators::from_memory(
            network.clone(),
            Arc::new(StaticReference(Some(layout.reference()))),
            stats.clone(),
        );
        let fabric = Fabric::start(layout, network.clone(), EHDDP_ETHER_TYPE).expect("fabric");
        let config = DiscoveryConfig {
            harvest_window_ms: 300,
            ..Default::default()
        };
        let service =
            DiscoveryService::start_with_limit(config, collaborators, Some(1)).expect("service");
        while !service.is_finished() {
            thread::sleep(Duration::from_millis(10));
        }
        let report = service.last_report().expect("one cycle settled");
        service.stop();
        fabric.stop();
        (network, stats, report)
    }

    fn of(id: u64, port: u32) -> ConnectPoint {
        ConnectPoint::new(DeviceUri::switch(id), port)
    }

    #[test]
    fn test_two_managed_switches() {
        let (network, stats, report) = run_one_cycle(
            r#"{ "nodes": [ { "name": "s1", "role": "managed", "id": 1 },
                            { "name": "s2", "role": "managed", "id": 2 } ],
                 "links": [ { "a": "s1:1", "b": "s2:3" } ] }"#,
        );
        assert!(report.valid);
        assert_eq!(report.managed_switches, 2);
        assert_eq!(report.links, 2);
        assert_eq!(stats.0.lock().len(), 1);

        let detected: Vec<LinkKey> = network.detected_links().iter().map(|d| d.key).collect();
        assert!(detected.contains(&LinkKey::new(of(1, 1), of(2, 3))));
        assert!(detected.contains(&LinkKey::new(of(2, 3), of(1, 1))));
        assert!(network.detected_links().iter().all(|d| d.durable));
        // settled cycles retract what they registered
        assert!(network.active_links().is_empty());
    }

    #[test]
    fn test_legacy_switch_and_sensor() {
        let (network, _stats, report) = run_one_cycle(
            r#"{ "nodes": [ { "name": "s1", "role": "managed", "id": 1 },
                            { "name": "s2", "role": "managed", "id": 2 },
                            { "name": "l1", "role": "legacy", "id": 16 },
                            { "name": "t1", "role": "sensor", "id": 32, "sensor": "smoke" } ],
                 "links": [ { "a": "s1:1", "b": "l1:1" },
                            { "a": "l1:2", "b": "s2:2" },
                            { "a": "l1:3", "b": "t1:1" } ] }"#,
        );
        assert!(report.valid);
        assert_eq!(report.legacy_switches, 1);
        assert_eq!(report.sensors, 1);

        let legacy = DeviceUri::new(DeviceKind::LegacySwitch, 16);
        let sensor = DeviceUri::new(DeviceKind::Sensor(SensorKind::Smoke), 32);
        assert!(network.devices().iter().any(|d| d.uri == legacy));
        assert!(network.devices().iter().any(|d| d.uri == sensor));

        let detected: Vec<LinkKey> = network.detected_links().iter().map(|d| d.key).collect();
        assert!(detected.contains(&LinkKey::new(ConnectPoint::new(legacy, 1), of(1, 1))));
        assert!(detected.contains(&LinkKey::new(
            ConnectPoint::new(sensor, 1),
            ConnectPoint::new(legacy, 3)
        )));

        let hosts = network.hosts();
        let (_, host) = hosts.iter().find(|(uri, _)| *uri == sensor).expect("sensor host");
        assert_eq!(host.location, ConnectPoint::new(legacy, 3));
    }

    #[test]
    fn test_unreachable_switch_invalidates_cycle() {
        let (_network, stats, report) = run_one_cycle(
            r#"{ "nodes": [ { "name": "s1", "role": "managed", "id": 1 },
                            { "name": "s2", "role": "managed", "id": 2 },
                            { "name": "s3", "role": "managed", "id": 3 } ],
                 "links": [ { "a": "s1:1", "b": "s2:1" } ] }"#,
        );
        assert!(!report.valid);
        assert_eq!(report.managed_switches, 2);
        assert!(stats.0.lock().is_empty());
    }
}
