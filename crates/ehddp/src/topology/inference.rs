// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology inference: hop chains to device, link and host registrations.
//!
//! A chain `h0, h1, .., hn` received at connect point `T` yields the pairs
//! `(h0.out, h1.in), .., (hn.out, T)`. Pairs touching a sentinel port or
//! joining a device to itself are skipped.
//!
//! Links between two managed switches are durable and bidirectional no matter
//! what the frame says. Any other link replaces whatever was registered under
//! either of its directional keys and follows the hop's bidirectional flag.

use std::sync::Arc;

use super::device::{ConnectPoint, DeviceKind, DeviceUri};
use super::link::{LinkDescription, LinkKey};
use super::state::DiscoveryCycleState;
use crate::config::is_sentinel_port;
use crate::inventory::{
    DeviceDescriptor, DeviceInventory, HostDescriptor, HostInventory, LinkInventory,
    PortDescriptor,
};
use crate::protocol::{DeviceType, Hop};

pub struct InferenceEngine {
    devices: Arc<dyn DeviceInventory>,
    links: Arc<dyn LinkInventory>,
    hosts: Arc<dyn HostInventory>,
}

fn hop_uri(hop: &Hop) -> Option<DeviceUri> {
    DeviceKind::classify(hop.device_type).map(|kind| DeviceUri::new(kind, hop.device_id))
}

impl InferenceEngine {
    pub fn new(
        devices: Arc<dyn DeviceInventory>,
        links: Arc<dyn LinkInventory>,
        hosts: Arc<dyn HostInventory>,
    ) -> Self {
        Self {
            devices,
            links,
            hosts,
        }
    }

    /// Create or refresh every hop device the southbound protocol does not own.
    pub fn ensure_devices(&self, state: &DiscoveryCycleState, hops: &[Hop]) {
        crate::trace_fn!("InferenceEngine::ensure_devices");
        for hop in hops {
            if hop.device_type == DeviceType::ControlledSwitch {
                continue;
            }
            let Some(uri) = hop_uri(hop) else {
                log::debug!("[ehddp-infer] skipping hop with device type 0 ({:#x})", hop.device_id);
                continue;
            };

            if let Err(e) = self
                .devices
                .connect_device(&uri, &DeviceDescriptor::discovered(uri))
            {
                log::warn!("[ehddp-infer] connect {} failed: {}", uri, e);
                continue;
            }
            if state.note_device(uri) {
                log::debug!("[ehddp-infer] device {} ({})", uri, uri.kind);
            }

            let mut new_ports: Vec<PortDescriptor> = Vec::with_capacity(2);
            for port in [hop.in_port, hop.out_port] {
                if is_sentinel_port(port)
                    || new_ports.iter().any(|p| p.number == port)
                    || self.devices.port_exists(&uri, port)
                {
                    continue;
                }
                new_ports.push(PortDescriptor {
                    number: port,
                    enabled: true,
                });
            }
            if !new_ports.is_empty() {
                if let Err(e) = self.devices.update_ports(&uri, &new_ports) {
                    log::warn!("[ehddp-infer] ports of {} rejected: {}", uri, e);
                }
            }
        }
    }

    /// Link consecutive hops, ending at the real receive connect point.
    pub fn record_chain(&self, state: &DiscoveryCycleState, hops: &[Hop], terminal: ConnectPoint) {
        crate::trace_fn!("InferenceEngine::record_chain");
        for (i, hop) in hops.iter().enumerate() {
            let Some(uri) = hop_uri(hop) else {
                continue;
            };
            let a = ConnectPoint::new(uri, hop.out_port);
            let b = match hops.get(i + 1) {
                Some(next) => match hop_uri(next) {
                    Some(next_uri) => ConnectPoint::new(next_uri, next.in_port),
                    None => continue,
                },
                None => terminal,
            };
            if is_sentinel_port(a.port) || is_sentinel_port(b.port) {
                log::trace!("[ehddp-infer] sentinel port in {} - {}", a, b);
                continue;
            }
            if a.device == b.device {
                continue;
            }
            self.record_direct_link(state, a, b, hop.bidirectional());
        }
    }

    pub fn record_direct_link(
        &self,
        state: &DiscoveryCycleState,
        a: ConnectPoint,
        b: ConnectPoint,
        bidirectional: bool,
    ) {
        let forward = LinkKey::new(a, b);
        let reverse = forward.reverse();

        if a.device.is_managed() && b.device.is_managed() {
            if state.has_link(&forward) {
                return;
            }
            self.register(state, LinkDescription::durable(forward));
            self.register(state, LinkDescription::durable(reverse));
            return;
        }

        {
            let mut links = state.links.lock();
            links.keys.remove(&forward);
            links.keys.remove(&reverse);
        }
        self.register(state, LinkDescription::transient(forward, bidirectional));
        if bidirectional {
            self.register(state, LinkDescription::transient(reverse, bidirectional));
        }
    }

    fn register(&self, state: &DiscoveryCycleState, description: LinkDescription) {
        if !state.begin_link(description) {
            return;
        }
        let accepted = match self.links.link_detected(&description) {
            Ok(()) => {
                log::debug!("[ehddp-infer] link {}", description);
                true
            }
            Err(e) => {
                log::warn!("[ehddp-infer] link {} rejected: {}", description, e);
                false
            }
        };
        if state.finish_link(&description, accepted) {
            log::debug!(
                "[ehddp-infer] cycle {} closed while registering {}, withdrawing",
                state.sequence(),
                description
            );
            if let Err(e) = self.links.link_vanished(&description) {
                log::warn!("[ehddp-infer] vanish {} failed: {}", description, e);
            }
        }
    }

    /// Register each sensor hop as a host at the next element's inbound port.
    pub fn record_hosts(&self, state: &DiscoveryCycleState, hops: &[Hop], terminal: ConnectPoint) {
        for (i, hop) in hops.iter().enumerate() {
            let DeviceType::Sensor(_) = hop.device_type else {
                continue;
            };
            let Some(uri) = hop_uri(hop) else {
                continue;
            };
            let location = match hops.get(i + 1) {
                Some(next) => match hop_uri(next) {
                    Some(next_uri) => ConnectPoint::new(next_uri, next.in_port),
                    None => continue,
                },
                None => terminal,
            };
            if is_sentinel_port(location.port) {
                continue;
            }

            let known = self.hosts.host_exists(&uri);
            let descriptor = HostDescriptor {
                kind: uri.kind,
                location,
            };
            match self.hosts.host_detected(&uri, &descriptor) {
                Ok(()) => {
                    state.note_host(uri);
                    if known {
                        log::debug!("[ehddp-infer] host {} refreshed at {}", uri, location);
                    } else {
                        log::info!("[ehddp-infer] host {} ({}) detected at {}", uri, uri.kind, location);
                    }
                }
                Err(e) => log::warn!("[ehddp-infer] host {} rejected: {}", uri, e),
            }
        }
    }

    /// Vanish every link registered this cycle and empty the cycle's sets.
    ///
    /// Returns the number of descriptions retracted.
    pub fn retract_cycle(&self, state: &DiscoveryCycleState) -> usize {
        crate::trace_fn!("InferenceEngine::retract_cycle");
        let descriptions = state.take_descriptions();
        for description in &descriptions {
            if let Err(e) = self.links.link_vanished(description) {
                log::warn!("[ehddp-infer] vanish {} failed: {}", description, e);
            }
        }
        log::debug!(
            "[ehddp-infer] cycle {} retracted {} links",
            state.sequence(),
            descriptions.len()
        );
        descriptions.len()
    }
}
