// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound discovery frame classification.
//!
//! Every intercepted frame is marked handled, then decoded and sorted into a
//! [`FrameClass`]. Frames from another origin or an older cycle are dropped
//! before they touch cycle state.
//!
//! ```text
//! opcode        hops  first hop        class
//! ------------  ----  ---------------  -------------
//! ACK_REQUEST   any   -                Ack
//! REQUEST       1     -                RequestDirect
//! REQUEST       >1    -                RequestRelay
//! REPLY         1     managed switch   ReplyDirect
//! REPLY         1     anything else    ReplyChain
//! REPLY         >1    -                ReplyChain
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::mapref::entry::Entry;

use crate::config::{ConfigError, DiscoveryConfig, BROADCAST_MAC};
use crate::error::{ClassificationError, Error, Result};
use crate::inventory::{InboundPacket, OutboundFrame, OutputPort, PacketIo, PacketProcessor};
use crate::protocol::{
    DeviceType, DiscoveryFrame, EthernetFrame, HwAddr, MacAddr, Opcode, WidthPolicy,
};
use crate::topology::{ConnectPoint, DiscoveryCycleState, HalfLink, InferenceEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Other origin or stale cycle.
    Foreign,
    Ack,
    /// Neighbour managed switch heard our flood directly.
    RequestDirect,
    /// Flood crossed uncontrolled devices; answer back along the path.
    RequestRelay,
    ReplyDirect,
    ReplyChain,
}

/// Sort a decoded frame. `active_sequence` is the running cycle's stamp.
pub fn classify(
    frame: &DiscoveryFrame,
    protocol_mac: &MacAddr,
    active_sequence: Option<u64>,
) -> std::result::Result<FrameClass, ClassificationError> {
    if !protocol_mac.matches(&frame.prev_addr) || active_sequence != Some(frame.sequence) {
        return Ok(FrameClass::Foreign);
    }
    let hops = frame.hop_count();
    match (frame.opcode, hops) {
        (Opcode::AckRequest, _) => Ok(FrameClass::Ack),
        (Opcode::Request, 1) => Ok(FrameClass::RequestDirect),
        (Opcode::Request, n) if n > 1 => Ok(FrameClass::RequestRelay),
        (Opcode::Reply, 1) if frame.hops[0].device_type == DeviceType::ControlledSwitch => {
            Ok(FrameClass::ReplyDirect)
        }
        (Opcode::Reply, n) if n >= 1 => Ok(FrameClass::ReplyChain),
        (opcode, hops) => Err(ClassificationError::UnexpectedShape { opcode, hops }),
    }
}

pub struct PacketClassifier {
    protocol_mac: MacAddr,
    ether_type: u16,
    width_policy: WidthPolicy,
    block_time_ms: u32,
    register_hosts: bool,
    packets: Arc<dyn PacketIo>,
    engine: Arc<InferenceEngine>,
    cycle: Arc<ArcSwapOption<DiscoveryCycleState>>,
}

impl PacketClassifier {
    pub fn new(
        config: &DiscoveryConfig,
        packets: Arc<dyn PacketIo>,
        engine: Arc<InferenceEngine>,
        cycle: Arc<ArcSwapOption<DiscoveryCycleState>>,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            protocol_mac: config.protocol_mac()?,
            ether_type: config.ether_type,
            width_policy: config.width_policy,
            block_time_ms: config.block_time_ms,
            register_hosts: config.register_sensor_hosts,
            packets,
            engine,
            cycle,
        })
    }

    /// Classify and act on one frame. The caller marks it handled.
    pub fn handle(&self, packet: &InboundPacket) -> Result<FrameClass> {
        crate::trace_fn!("PacketClassifier::handle");
        let Some(state) = self.cycle.load_full() else {
            return Ok(FrameClass::Foreign);
        };
        if state.is_closed() {
            return Ok(FrameClass::Foreign);
        }

        let frame = match EthernetFrame::decode(&packet.data)
            .and_then(|eth| eth.discovery_frame(self.ether_type))
        {
            Ok(frame) => frame,
            Err(e) => {
                state.counters.discarded.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Codec(e));
            }
        };

        let class = classify(&frame, &self.protocol_mac, Some(state.sequence()))?;
        let terminal = packet.received_from;
        match class {
            FrameClass::Foreign | FrameClass::Ack => return Ok(class),
            _ => {}
        }

        state.counters.received.fetch_add(1, Ordering::Relaxed);
        if terminal.device.is_managed() {
            state.observe_switch(terminal.device.id);
        }
        for hop in &frame.hops {
            if hop.device_type.is_programmable() {
                state.observe_switch(hop.device_id);
            }
        }

        match class {
            FrameClass::RequestDirect => self.half_link(&state, &frame, terminal),
            FrameClass::RequestRelay => {
                self.relay(&state, &frame, terminal)?;
                state
                    .counters
                    .data
                    .fetch_add(frame.hop_count() as u64, Ordering::Relaxed);
            }
            FrameClass::ReplyDirect => self.engine.record_chain(&state, &frame.hops, terminal),
            FrameClass::ReplyChain => {
                self.engine.ensure_devices(&state, &frame.hops);
                self.engine.record_chain(&state, &frame.hops, terminal);
                if self.register_hosts {
                    self.engine.record_hosts(&state, &frame.hops, terminal);
                }
                state
                    .counters
                    .data
                    .fetch_add(frame.hop_count() as u64, Ordering::Relaxed);
            }
            FrameClass::Foreign | FrameClass::Ack => {}
        }
        Ok(class)
    }

    /// Hop-1 REQUEST: wait for the reverse direction, then commit.
    fn half_link(&self, state: &DiscoveryCycleState, frame: &DiscoveryFrame, receiver: ConnectPoint) {
        let sender = frame.hops[0].device_id;
        let local = receiver.device.id;
        if sender == local {
            return;
        }
        let key = (sender.min(local), sender.max(local));
        let matched = match state.half_links.entry(key) {
            Entry::Occupied(entry) if entry.get().receiver.device != receiver.device => {
                Some(entry.remove())
            }
            Entry::Occupied(mut entry) => {
                entry.insert(HalfLink { receiver });
                None
            }
            Entry::Vacant(entry) => {
                entry.insert(HalfLink { receiver });
                None
            }
        };
        if let Some(other) = matched {
            log::debug!(
                "[ehddp-classify] half-links {} and {} paired",
                other.receiver,
                receiver
            );
            self.engine
                .record_direct_link(state, other.receiver, receiver, true);
        }
    }

    /// Answer a multi-hop REQUEST with a REPLY seeded by the receiving switch.
    fn relay(
        &self,
        state: &DiscoveryCycleState,
        request: &DiscoveryFrame,
        receiver: ConnectPoint,
    ) -> Result<()> {
        let mut reply = DiscoveryFrame::new(
            Opcode::Reply,
            request.sequence,
            HwAddr::from(self.protocol_mac),
        );
        reply.block_time_ms = self.block_time_ms;
        reply.hops.push(self.width_policy.hop(
            DeviceType::ControlledSwitch,
            receiver.device.id,
            receiver.port,
            receiver.port,
            true,
        ));
        let eth = EthernetFrame::wrap(BROADCAST_MAC, self.protocol_mac, self.ether_type, &reply)?;
        self.packets.emit(OutboundFrame {
            device: receiver.device,
            output: OutputPort::Port(receiver.port),
            data: eth.encode(),
        })?;
        state.counters.sent.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "[ehddp-classify] relayed {}-hop REQUEST as REPLY out of {}",
            request.hop_count(),
            receiver
        );
        Ok(())
    }
}

impl PacketProcessor for PacketClassifier {
    fn process(&self, packet: &InboundPacket) {
        packet.mark_handled();
        match self.handle(packet) {
            Ok(FrameClass::Foreign) => {
                log::trace!("[ehddp-classify] foreign frame at {}", packet.received_from)
            }
            Ok(_) => {}
            Err(Error::Codec(e)) => {
                log::debug!("[ehddp-classify] dropped frame at {}: {}", packet.received_from, e)
            }
            Err(e) => log::warn!("[ehddp-classify] frame at {}: {}", packet.received_from, e),
        }
    }
}
