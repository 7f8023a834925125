// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end discovery cycles against the in-memory network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use ehddp::config::{BROADCAST_MAC, EHDDP_ETHER_TYPE, FLOOD_PORT, PROTOCOL_MAC};
use ehddp::inventory::{
    DeviceDescriptor, DeviceInventory, InventoryError, LinkInventory, OutboundFrame, OutputPort,
    PacketIo, PacketProcessor, PortDescriptor, ReferenceData, StaticReference,
};
use ehddp::protocol::{DeviceType, HwAddr};
use ehddp::{
    Collaborators, ConnectPoint, CycleReport, DeviceKind, DeviceUri, DiscoveryConfig,
    DiscoveryController, DiscoveryFrame, DiscoveryService, EthernetFrame, Hop, InboundPacket,
    LinkDescription, LinkKey, MemoryNetwork, Opcode, ReferenceCounts, StatsSink,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Collect(Mutex<Vec<CycleReport>>);

impl StatsSink for Collect {
    fn record(&self, report: &CycleReport) {
        self.0.lock().push(report.clone());
    }
}

struct Harness {
    network: Arc<MemoryNetwork>,
    stats: Arc<Collect>,
    controller: DiscoveryController,
}

fn reference(switches: usize) -> Option<ReferenceCounts> {
    Some(ReferenceCounts {
        expected_switches: switches,
        ..Default::default()
    })
}

fn harness(switches: &[u64], expected: Option<ReferenceCounts>) -> Harness {
    let network = Arc::new(MemoryNetwork::new());
    for id in switches {
        network.add_managed_switch(*id);
    }
    let stats = Arc::new(Collect::default());
    let collaborators = Collaborators::from_memory(
        network.clone(),
        Arc::new(StaticReference(expected)),
        stats.clone(),
    );
    let controller = DiscoveryController::new(
        DiscoveryConfig::default(),
        collaborators,
        Arc::new(AtomicBool::new(false)),
    )
    .expect("default config");
    network.add_processor(EHDDP_ETHER_TYPE, controller.classifier());
    Harness {
        network,
        stats,
        controller,
    }
}

fn at(switch: u64, port: u32) -> ConnectPoint {
    ConnectPoint::new(DeviceUri::switch(switch), port)
}

fn decode(frame: &OutboundFrame) -> (EthernetFrame, DiscoveryFrame) {
    let eth = EthernetFrame::decode(&frame.data).expect("ethernet");
    let discovery = eth.discovery_frame(EHDDP_ETHER_TYPE).expect("discovery frame");
    (eth, discovery)
}

fn inbound(at: ConnectPoint, frame: &DiscoveryFrame) -> InboundPacket {
    let eth = EthernetFrame::wrap(BROADCAST_MAC, PROTOCOL_MAC, EHDDP_ETHER_TYPE, frame)
        .expect("encodes");
    InboundPacket::new(at, eth.encode())
}

#[test]
fn test_broadcast_floods_request_from_every_switch() {
    let h = harness(&[1, 2, 3], None);
    let state = h.controller.broadcast();

    let emitted = h.network.drain_emitted();
    assert_eq!(emitted.len(), 3);
    assert_eq!(state.roster_len(), 3);
    assert_eq!(state.counters.snapshot().sent, 3);

    for (frame, id) in emitted.iter().zip([1u64, 2, 3]) {
        assert_eq!(frame.device, DeviceUri::switch(id));
        assert_eq!(frame.output, OutputPort::Flood);
        assert!(frame.data.len() >= 60);

        let (eth, request) = decode(frame);
        assert_eq!(eth.dst, BROADCAST_MAC);
        assert_eq!(eth.src, PROTOCOL_MAC);
        assert_eq!(request.opcode, Opcode::Request);
        assert_eq!(request.sequence, state.sequence());
        assert!(PROTOCOL_MAC.matches(&request.prev_addr));
        assert_eq!(request.hops.len(), 1);
        let seed = &request.hops[0];
        assert_eq!(seed.device_type, DeviceType::ControlledSwitch);
        assert_eq!(seed.device_id, id);
        assert_eq!((seed.in_port, seed.out_port), (FLOOD_PORT, FLOOD_PORT));
        assert_eq!(seed.config.as_byte(), 0x7F);
    }
    h.controller.settle(&state);
}

#[test]
fn test_scenario_a_direct_switches() {
    let h = harness(&[1, 2], reference(2));
    let state = h.controller.broadcast();
    let floods = h.network.drain_emitted();
    assert_eq!(floods.len(), 2);

    // S1 port 1 is cabled to S2 port 1; each hears the other's flood.
    assert!(h.network.deliver(&InboundPacket::new(at(2, 1), floods[0].data.clone())));
    assert!(h.network.deliver(&InboundPacket::new(at(1, 1), floods[1].data.clone())));

    let links = h.network.active_links();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.durable && l.bidirectional));
    assert!(state.has_link(&LinkKey::new(at(1, 1), at(2, 1))));
    assert!(state.has_link(&LinkKey::new(at(2, 1), at(1, 1))));
    assert!(h.network.devices().is_empty());

    thread::sleep(Duration::from_millis(2));
    let report = h.controller.settle(&state);
    assert!(report.valid);
    assert_eq!(report.managed_switches, 2);
    assert_eq!(report.links, 2);
    assert_eq!(report.received, 2);
    assert_eq!(h.stats.0.lock().len(), 1);

    assert!(h.network.active_links().is_empty());
    assert_eq!(h.network.vanished_links().len(), 2);
    assert!(h.controller.active_cycle().is_none());
}

#[test]
fn test_scenario_b_chain_through_legacy_switch() {
    let h = harness(&[1, 2], reference(2));
    let state = h.controller.broadcast();
    h.network.drain_emitted();

    let legacy = DeviceUri::new(DeviceKind::LegacySwitch, 0x0000_1122_3344_5566);
    let mut reply =
        DiscoveryFrame::new(Opcode::Reply, state.sequence(), HwAddr::from(PROTOCOL_MAC));
    reply.hops = vec![
        Hop::new(DeviceType::ControlledSwitch, 2, 5, 5, true),
        Hop::new(DeviceType::LegacySwitch, legacy.id, 3, 4, false),
    ];
    assert!(h.network.deliver(&inbound(at(1, 2), &reply)));

    let devices = h.network.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].uri, legacy);
    assert_eq!(devices[0].hw_version, "LEGACY_SWITCH");
    assert_eq!(h.network.ports(&legacy), vec![3, 4]);

    let s2_l1 = LinkKey::new(at(2, 5), ConnectPoint::new(legacy, 3));
    let l1_s1 = LinkKey::new(ConnectPoint::new(legacy, 4), at(1, 2));
    let links = h.network.active_links();
    assert!(links.iter().all(|l| !l.durable));
    assert!(links.iter().any(|l| l.key == s2_l1 && l.bidirectional));
    assert!(links.iter().any(|l| l.key == s2_l1.reverse()));
    assert!(links.iter().any(|l| l.key == l1_s1 && !l.bidirectional));
    assert!(!links.iter().any(|l| l.key == l1_s1.reverse()));

    let report = h.controller.settle(&state);
    assert_eq!(report.legacy_switches, 1);
    assert_eq!(report.data, 2);
    assert!(h.network.active_links().is_empty());
}

#[test]
fn test_scenario_c_stale_request_is_ignored() {
    let h = harness(&[1, 2], reference(2));
    let state = h.controller.broadcast();
    h.network.drain_emitted();

    let stale = DiscoveryFrame::request(
        state.sequence() - 1,
        HwAddr::from(PROTOCOL_MAC),
        2,
        ehddp::HopConfig::widest(true),
    );
    let packet = inbound(at(1, 1), &stale);
    assert!(h.network.deliver(&packet));
    assert!(packet.is_handled());

    assert_eq!(state.counters.snapshot().received, 0);
    assert_eq!(state.pending_half_links(), 0);
    assert_eq!(state.observed_switches(), 0);
    assert!(h.network.detected_links().is_empty());

    let report = h.controller.settle(&state);
    assert!(!report.valid);
    assert!(h.stats.0.lock().is_empty());
}

#[test]
fn test_frames_after_settle_are_foreign() {
    let h = harness(&[1, 2], None);
    let state = h.controller.broadcast();
    let floods = h.network.drain_emitted();
    h.controller.settle(&state);

    assert!(h.network.deliver(&InboundPacket::new(at(2, 1), floods[0].data.clone())));
    assert_eq!(state.counters.snapshot().received, 0);
    assert!(h.network.detected_links().is_empty());
}

#[test]
fn test_cycles_are_independent() {
    let h = harness(&[1, 2], reference(2));
    for _ in 0..2 {
        let state = h.controller.broadcast();
        let floods = h.network.drain_emitted();
        h.network.deliver(&InboundPacket::new(at(2, 1), floods[0].data.clone()));
        h.network.deliver(&InboundPacket::new(at(1, 1), floods[1].data.clone()));
        thread::sleep(Duration::from_millis(2));
        assert!(h.controller.settle(&state).valid);
    }
    assert_eq!(h.controller.completed_cycles(), 2);
    assert_eq!(h.network.detected_links().len(), 4);
    assert_eq!(h.network.vanished_links().len(), 4);
    assert_eq!(h.stats.0.lock().len(), 2);
    let stamps: Vec<u64> = h.stats.0.lock().iter().map(|r| r.sequence).collect();
    assert!(stamps[0] < stamps[1]);
}

#[test]
fn test_service_registers_and_removes_processor() {
    let network = Arc::new(MemoryNetwork::new());
    network.add_managed_switch(1);
    let collaborators = Collaborators::from_memory(
        network.clone(),
        Arc::new(StaticReference::default()),
        Arc::new(Collect::default()),
    );
    let config = DiscoveryConfig {
        harvest_window_ms: 20,
        ..Default::default()
    };

    let service =
        DiscoveryService::start_with_limit(config, collaborators, Some(2)).expect("start");
    assert!(network.has_processor(EHDDP_ETHER_TYPE));

    let deadline = Instant::now() + Duration::from_secs(10);
    while !service.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(service.is_finished());
    assert_eq!(service.completed_cycles(), 2);
    assert_eq!(network.drain_emitted().len(), 2);

    service.stop();
    assert!(!network.has_processor(EHDDP_ETHER_TYPE));
}

#[test]
fn test_stop_cuts_harvest_short() {
    let network = Arc::new(MemoryNetwork::new());
    network.add_managed_switch(1);
    let collaborators = Collaborators::from_memory(
        network.clone(),
        Arc::new(StaticReference::default()),
        Arc::new(Collect::default()),
    );
    let config = DiscoveryConfig {
        harvest_window_ms: 60_000,
        ..Default::default()
    };

    let service = DiscoveryService::start(config, collaborators).expect("start");
    let controller = Arc::clone(service.controller());
    let deadline = Instant::now() + Duration::from_secs(10);
    while controller.active_cycle().is_none() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(controller.active_cycle().is_some());

    let stopping = Instant::now();
    service.stop();
    assert!(stopping.elapsed() < Duration::from_secs(5));
    assert_eq!(controller.completed_cycles(), 1);
    assert!(controller.active_cycle().is_none());
    assert!(controller.last_report().is_some());
    assert!(!network.has_processor(EHDDP_ETHER_TYPE));
}

/// Where [`SettlingInventory`] closes the active cycle.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SettleOn {
    Connect,
    LinkDetected,
}

/// Inventory that settles the active cycle from inside its first callback.
struct SettlingInventory {
    network: Arc<MemoryNetwork>,
    on: SettleOn,
    fired: AtomicBool,
    controller: OnceLock<Weak<DiscoveryController>>,
}

impl SettlingInventory {
    fn settle_once(&self, point: SettleOn) {
        if point != self.on || self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let controller = self.controller.get().and_then(Weak::upgrade);
        if let Some(controller) = controller {
            if let Some(state) = controller.active_cycle() {
                controller.settle(&state);
            }
        }
    }
}

impl DeviceInventory for SettlingInventory {
    fn managed_switches(&self) -> Vec<DeviceUri> {
        self.network.managed_switches()
    }

    fn connect_device(
        &self,
        uri: &DeviceUri,
        descriptor: &DeviceDescriptor,
    ) -> Result<(), InventoryError> {
        self.settle_once(SettleOn::Connect);
        self.network.connect_device(uri, descriptor)
    }

    fn update_ports(&self, uri: &DeviceUri, ports: &[PortDescriptor]) -> Result<(), InventoryError> {
        self.network.update_ports(uri, ports)
    }

    fn port_exists(&self, uri: &DeviceUri, port: u32) -> bool {
        self.network.port_exists(uri, port)
    }
}

impl LinkInventory for SettlingInventory {
    fn link_detected(&self, description: &LinkDescription) -> Result<(), InventoryError> {
        self.settle_once(SettleOn::LinkDetected);
        self.network.link_detected(description)
    }

    fn link_vanished(&self, description: &LinkDescription) -> Result<(), InventoryError> {
        self.network.link_vanished(description)
    }
}

fn settle_during_chain(on: SettleOn) -> Arc<MemoryNetwork> {
    let network = Arc::new(MemoryNetwork::new());
    network.add_managed_switch(1);
    network.add_managed_switch(2);
    let inventory = Arc::new(SettlingInventory {
        network: network.clone(),
        on,
        fired: AtomicBool::new(false),
        controller: OnceLock::new(),
    });
    let collaborators = Collaborators {
        packets: network.clone(),
        devices: inventory.clone(),
        links: inventory.clone(),
        hosts: network.clone(),
        reference: Arc::new(StaticReference(reference(2))),
        stats: Arc::new(Collect::default()),
    };
    let controller = Arc::new(
        DiscoveryController::new(
            DiscoveryConfig::default(),
            collaborators,
            Arc::new(AtomicBool::new(false)),
        )
        .expect("default config"),
    );
    assert!(inventory.controller.set(Arc::downgrade(&controller)).is_ok());

    let state = controller.broadcast();
    network.drain_emitted();
    let mut reply =
        DiscoveryFrame::new(Opcode::Reply, state.sequence(), HwAddr::from(PROTOCOL_MAC));
    reply.hops = vec![
        Hop::new(DeviceType::ControlledSwitch, 2, 5, 5, true),
        Hop::new(DeviceType::LegacySwitch, 0xA, 3, 4, true),
    ];
    let packet = inbound(at(1, 2), &reply);
    controller.classifier().process(&packet);

    assert!(packet.is_handled());
    assert!(inventory.fired.load(Ordering::SeqCst));
    assert!(state.is_closed());
    assert_eq!(controller.completed_cycles(), 1);
    assert!(controller.active_cycle().is_none());
    network
}

#[test]
fn test_settle_before_links_registers_nothing() {
    let network = settle_during_chain(SettleOn::Connect);
    assert!(network.detected_links().is_empty());
    assert!(network.active_links().is_empty());
}

#[test]
fn test_settle_during_link_detection_withdraws_it() {
    let network = settle_during_chain(SettleOn::LinkDetected);
    let detected = network.detected_links();
    assert_eq!(detected.len(), 1);
    assert_eq!(network.vanished_links(), detected);
    assert!(network.active_links().is_empty());
}

struct UnreachableReference;

impl ReferenceData for UnreachableReference {
    fn reference_counts(&self) -> Option<ReferenceCounts> {
        panic!("reference store offline");
    }
}

#[test]
fn test_stop_survives_panicked_cycle_thread() {
    let network = Arc::new(MemoryNetwork::new());
    network.add_managed_switch(1);
    let collaborators = Collaborators::from_memory(
        network.clone(),
        Arc::new(UnreachableReference),
        Arc::new(Collect::default()),
    );
    let config = DiscoveryConfig {
        harvest_window_ms: 10,
        ..Default::default()
    };

    let service = DiscoveryService::start(config, collaborators).expect("start");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !service.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(service.is_finished());
    assert_eq!(service.completed_cycles(), 0);

    service.stop();
    assert!(!network.has_processor(EHDDP_ETHER_TYPE));
}
