// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broadcast, Harvest, Settle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;

use super::stats::CycleReport;
use crate::classifier::PacketClassifier;
use crate::config::{DiscoveryConfig, BROADCAST_MAC, FLOOD_PORT};
use crate::error::{Error, Result};
use crate::inventory::{Collaborators, OutboundFrame, OutputPort};
use crate::protocol::{DeviceType, DiscoveryFrame, EthernetFrame, HwAddr, MacAddr, Opcode};
use crate::topology::{DeviceUri, DiscoveryCycleState, InferenceEngine};

/// Harvest sleeps in slices this long so shutdown is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct DiscoveryController {
    config: DiscoveryConfig,
    protocol_mac: MacAddr,
    collaborators: Collaborators,
    engine: Arc<InferenceEngine>,
    classifier: Arc<PacketClassifier>,
    cycle: Arc<ArcSwapOption<DiscoveryCycleState>>,
    last_report: ArcSwapOption<CycleReport>,
    last_sequence: AtomicU64,
    completed: AtomicU64,
    shutdown: Arc<AtomicBool>,
}

impl DiscoveryController {
    pub fn new(
        config: DiscoveryConfig,
        collaborators: Collaborators,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.validate()?;
        let protocol_mac = config.protocol_mac()?;
        let engine = Arc::new(InferenceEngine::new(
            Arc::clone(&collaborators.devices),
            Arc::clone(&collaborators.links),
            Arc::clone(&collaborators.hosts),
        ));
        let cycle = Arc::new(ArcSwapOption::empty());
        let classifier = Arc::new(PacketClassifier::new(
            &config,
            Arc::clone(&collaborators.packets),
            Arc::clone(&engine),
            Arc::clone(&cycle),
        )?);
        Ok(Self {
            config,
            protocol_mac,
            collaborators,
            engine,
            classifier,
            cycle,
            last_report: ArcSwapOption::empty(),
            last_sequence: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            shutdown,
        })
    }

    pub fn classifier(&self) -> Arc<PacketClassifier> {
        Arc::clone(&self.classifier)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Cycle currently harvesting, if any.
    pub fn active_cycle(&self) -> Option<Arc<DiscoveryCycleState>> {
        self.cycle.load_full()
    }

    pub fn last_report(&self) -> Option<Arc<CycleReport>> {
        self.last_report.load_full()
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Wall-clock milliseconds, forced past the previous cycle's stamp.
    fn next_sequence(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let previous = self.last_sequence.load(Ordering::Relaxed);
        let sequence = now.max(previous + 1);
        self.last_sequence.store(sequence, Ordering::Relaxed);
        sequence
    }

    /// Start a cycle and flood a hop-1 REQUEST from every managed switch.
    pub fn broadcast(&self) -> Arc<DiscoveryCycleState> {
        crate::trace_fn!("DiscoveryController::broadcast");
        let state = Arc::new(DiscoveryCycleState::new(self.next_sequence()));
        self.cycle.store(Some(Arc::clone(&state)));

        let switches = self.collaborators.devices.managed_switches();
        for switch in &switches {
            match self.flood_from(&state, switch) {
                Ok(()) => {
                    state.add_to_roster(*switch);
                    state.counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => log::warn!("[ehddp-cycle] flood from {} failed: {}", switch, e),
            }
        }
        log::debug!(
            "[ehddp-cycle] cycle {} flooded from {}/{} switches",
            state.sequence(),
            state.roster_len(),
            switches.len()
        );
        state
    }

    fn flood_from(&self, state: &DiscoveryCycleState, switch: &DeviceUri) -> Result<()> {
        let mut request =
            DiscoveryFrame::new(Opcode::Request, state.sequence(), HwAddr::from(self.protocol_mac));
        request.block_time_ms = self.config.block_time_ms;
        request.hops.push(self.config.width_policy.hop(
            DeviceType::ControlledSwitch,
            switch.id,
            FLOOD_PORT,
            FLOOD_PORT,
            true,
        ));
        let eth = EthernetFrame::wrap(
            BROADCAST_MAC,
            self.protocol_mac,
            self.config.ether_type,
            &request,
        )?;
        self.collaborators.packets.emit(OutboundFrame {
            device: *switch,
            output: OutputPort::Flood,
            data: eth.encode(),
        })
    }

    /// Wait out the harvest window. Shutdown cuts it short.
    pub fn harvest(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.harvest_window();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(Error::SchedulingInterrupt);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Close the cycle: judge it, report it, retract its links.
    pub fn settle(&self, state: &DiscoveryCycleState) -> CycleReport {
        crate::trace_fn!("DiscoveryController::settle");
        self.cycle.store(None);

        let reference = self
            .collaborators
            .reference
            .reference_counts()
            .or(self.config.reference);
        let report = CycleReport::from_state(state, reference);
        if report.valid {
            self.collaborators.stats.record(&report);
        } else if reference.is_none() {
            log::debug!(
                "[ehddp-cycle] cycle {} not judged: no reference data ({} switches, {} links)",
                report.sequence,
                report.managed_switches,
                report.links
            );
        } else {
            log::info!(
                "[ehddp-cycle] cycle {} invalid: {} of {} switches seen",
                report.sequence,
                report.managed_switches,
                reference.map_or(0, |r| r.expected_switches)
            );
        }

        self.engine.retract_cycle(state);
        self.last_report.store(Some(Arc::new(report.clone())));
        self.completed.fetch_add(1, Ordering::AcqRel);
        report
    }

    /// One full cycle. Never fails; problems are logged.
    pub fn run_cycle(&self) -> CycleReport {
        let state = self.broadcast();
        if let Err(e) = self.harvest() {
            log::info!("[ehddp-cycle] cycle {}: {}, settling early", state.sequence(), e);
        }
        self.settle(&state)
    }

    /// Run cycles back to back until shutdown (or `limit` cycles).
    pub fn run(&self, limit: Option<u64>) {
        log::info!("[ehddp-cycle] discovery loop started");
        let mut runs = 0u64;
        while !self.shutdown.load(Ordering::Relaxed) {
            if limit.is_some_and(|limit| runs >= limit) {
                break;
            }
            self.run_cycle();
            runs += 1;
        }
        log::info!("[ehddp-cycle] discovery loop stopped after {} cycles", runs);
    }
}
