// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! State owned by one discovery cycle.
//!
//! Created at Broadcast, mutated by concurrent classifier invocations during
//! Harvest, consumed and retracted at Settle. Each collection has its own
//! lock; the half-link table is a `DashMap` so check-and-commit of a pair is
//! atomic per key.
//!
//! A link registration is two-phase: [`begin_link`] claims the description,
//! the caller notifies the inventory, then [`finish_link`] confirms it.
//! Retraction closes the cycle and takes only confirmed descriptions; a
//! registration still in flight learns from `finish_link` that it must
//! withdraw its own link. Either way each detected link vanishes once.
//!
//! [`begin_link`]: DiscoveryCycleState::begin_link
//! [`finish_link`]: DiscoveryCycleState::finish_link

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::device::{ConnectPoint, DeviceKind, DeviceUri};
use super::link::{LinkDescription, LinkKey};

/// Frame counters for one cycle.
#[derive(Debug, Default)]
pub struct CycleCounters {
    pub sent: AtomicU64,
    pub received: AtomicU64,
    /// One unit per wire hop carried by relayed or chained frames.
    pub data: AtomicU64,
    pub discarded: AtomicU64,
}

/// Copy of [`CycleCounters`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub sent: u64,
    pub received: u64,
    pub data: u64,
    pub discarded: u64,
}

impl CycleCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            data: self.data.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// One direction of a managed-switch pair awaiting its reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfLink {
    pub receiver: ConnectPoint,
}

#[derive(Debug, Default)]
pub(crate) struct LinkSets {
    pub(crate) keys: HashSet<LinkKey>,
    pub(crate) descriptions: HashSet<LinkDescription>,
    /// Claimed but not yet confirmed by the inventory.
    in_flight: HashSet<LinkDescription>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Observed {
    switches: HashSet<u64>,
    converged_at: Option<Instant>,
}

#[derive(Debug)]
pub struct DiscoveryCycleState {
    sequence: u64,
    started_at: Instant,
    pub(crate) half_links: DashMap<(u64, u64), HalfLink>,
    pub(crate) links: Mutex<LinkSets>,
    devices: Mutex<HashSet<DeviceUri>>,
    hosts: Mutex<HashSet<DeviceUri>>,
    roster: Mutex<HashSet<DeviceUri>>,
    observed: Mutex<Observed>,
    pub counters: CycleCounters,
}

impl DiscoveryCycleState {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            started_at: Instant::now(),
            half_links: DashMap::new(),
            links: Mutex::new(LinkSets::default()),
            devices: Mutex::new(HashSet::new()),
            hosts: Mutex::new(HashSet::new()),
            roster: Mutex::new(HashSet::new()),
            observed: Mutex::new(Observed::default()),
            counters: CycleCounters::default(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Track a switch the cycle flooded a REQUEST from.
    pub fn add_to_roster(&self, switch: DeviceUri) {
        self.roster.lock().insert(switch);
    }

    pub fn roster_len(&self) -> usize {
        self.roster.lock().len()
    }

    /// Note a managed switch seen in a frame of this cycle.
    pub fn observe_switch(&self, id: u64) {
        let mut observed = self.observed.lock();
        if observed.switches.insert(id) {
            observed.converged_at = Some(Instant::now());
        }
    }

    pub fn observed_switches(&self) -> usize {
        self.observed.lock().switches.len()
    }

    /// Time from cycle start until the last new managed switch was seen.
    pub fn convergence(&self) -> Option<Duration> {
        self.observed
            .lock()
            .converged_at
            .map(|at| at.saturating_duration_since(self.started_at))
    }

    pub(crate) fn note_device(&self, uri: DeviceUri) -> bool {
        self.devices.lock().insert(uri)
    }

    pub(crate) fn note_host(&self, uri: DeviceUri) -> bool {
        self.hosts.lock().insert(uri)
    }

    pub fn devices_of(&self, pred: impl Fn(DeviceKind) -> bool) -> usize {
        self.devices.lock().iter().filter(|d| pred(d.kind)).count()
    }

    pub fn hosts_len(&self) -> usize {
        self.hosts.lock().len()
    }

    pub fn link_keys(&self) -> usize {
        self.links.lock().keys.len()
    }

    pub fn has_link(&self, key: &LinkKey) -> bool {
        self.links.lock().keys.contains(key)
    }

    pub fn descriptions(&self) -> Vec<LinkDescription> {
        let mut descriptions: Vec<_> = self.links.lock().descriptions.iter().copied().collect();
        descriptions.sort();
        descriptions
    }

    /// Whether Settle has retracted this cycle.
    pub fn is_closed(&self) -> bool {
        self.links.lock().closed
    }

    /// Claim `description` for registration. False if already claimed or
    /// the cycle is closed.
    pub(crate) fn begin_link(&self, description: LinkDescription) -> bool {
        let mut links = self.links.lock();
        if links.closed {
            return false;
        }
        links.keys.insert(description.key);
        let fresh = links.descriptions.insert(description);
        if fresh {
            links.in_flight.insert(description);
        }
        fresh
    }

    /// Settle a claim once the inventory answered. Returns true when the
    /// cycle closed meanwhile and the caller must withdraw the link itself.
    pub(crate) fn finish_link(&self, description: &LinkDescription, accepted: bool) -> bool {
        let mut links = self.links.lock();
        links.in_flight.remove(description);
        if !accepted || links.closed {
            links.descriptions.remove(description);
            if !links.closed {
                links.keys.remove(&description.key);
            }
        }
        accepted && links.closed
    }

    pub fn pending_half_links(&self) -> usize {
        self.half_links.len()
    }

    /// Close the cycle and drop everything but the stamp and counters.
    ///
    /// Returns the confirmed descriptions. In-flight ones stay with their
    /// registrar.
    pub(crate) fn take_descriptions(&self) -> Vec<LinkDescription> {
        let mut links = self.links.lock();
        links.closed = true;
        links.keys.clear();
        let LinkSets {
            descriptions,
            in_flight,
            ..
        } = &mut *links;
        let mut taken: Vec<_> = descriptions
            .iter()
            .filter(|d| !in_flight.contains(*d))
            .copied()
            .collect();
        descriptions.retain(|d| in_flight.contains(d));
        drop(links);
        self.half_links.clear();
        self.devices.lock().clear();
        self.hosts.lock().clear();
        taken.sort();
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let state = DiscoveryCycleState::new(1);
        state.counters.sent.fetch_add(2, Ordering::Relaxed);
        state.counters.data.fetch_add(5, Ordering::Relaxed);
        let snapshot = state.counters.snapshot();
        assert_eq!(snapshot.sent, 2);
        assert_eq!(snapshot.data, 5);
        assert_eq!(snapshot.received, 0);
    }

    #[test]
    fn test_convergence_moves_only_on_new_switch() {
        let state = DiscoveryCycleState::new(1);
        assert!(state.convergence().is_none());
        state.observe_switch(1);
        let first = state.convergence().expect("observed");
        std::thread::sleep(Duration::from_millis(5));
        state.observe_switch(1);
        assert_eq!(state.convergence(), Some(first));
        state.observe_switch(2);
        assert!(state.convergence().expect("observed") > first);
        assert_eq!(state.observed_switches(), 2);
    }

    fn description(port: u32) -> LinkDescription {
        LinkDescription::transient(
            LinkKey::new(
                ConnectPoint::new(DeviceUri::switch(1), port),
                ConnectPoint::new(DeviceUri::switch(2), port),
            ),
            false,
        )
    }

    #[test]
    fn test_claim_is_deduplicated() {
        let state = DiscoveryCycleState::new(1);
        assert!(state.begin_link(description(1)));
        assert!(!state.begin_link(description(1)));
        assert!(!state.finish_link(&description(1), true));
        assert_eq!(state.descriptions(), vec![description(1)]);
    }

    #[test]
    fn test_rejected_claim_is_released() {
        let state = DiscoveryCycleState::new(1);
        assert!(state.begin_link(description(1)));
        assert!(!state.finish_link(&description(1), false));
        assert!(state.descriptions().is_empty());
        assert_eq!(state.link_keys(), 0);
        assert!(state.begin_link(description(1)));
    }

    #[test]
    fn test_closing_leaves_in_flight_claims_to_registrar() {
        let state = DiscoveryCycleState::new(1);
        assert!(state.begin_link(description(1)));
        assert!(!state.finish_link(&description(1), true));
        assert!(state.begin_link(description(2)));

        assert_eq!(state.take_descriptions(), vec![description(1)]);
        assert!(state.is_closed());
        assert!(!state.begin_link(description(3)));

        assert!(state.finish_link(&description(2), true));
        assert!(state.descriptions().is_empty());
        assert!(state.take_descriptions().is_empty());
    }
}
