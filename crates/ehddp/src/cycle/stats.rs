// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-cycle statistics records.

use serde::Serialize;

use crate::config::ReferenceCounts;
use crate::topology::{CounterSnapshot, DeviceKind, DiscoveryCycleState};

/// Summary of one settled cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub sequence: u64,
    pub valid: bool,
    /// Cycle start until the last new managed switch was seen.
    pub convergence_ms: Option<u64>,
    pub sent: u64,
    pub received: u64,
    pub data: u64,
    pub discarded: u64,
    pub flooded_switches: usize,
    pub managed_switches: usize,
    pub legacy_switches: usize,
    pub sensors: usize,
    pub hosts: usize,
    pub links: usize,
    pub reference: Option<ReferenceCounts>,
}

impl CycleReport {
    pub fn from_state(state: &DiscoveryCycleState, reference: Option<ReferenceCounts>) -> Self {
        let CounterSnapshot {
            sent,
            received,
            data,
            discarded,
        } = state.counters.snapshot();
        let convergence = state.convergence();
        let managed_switches = state.observed_switches();
        let valid = match (reference, convergence) {
            (Some(reference), Some(elapsed)) => {
                !elapsed.is_zero() && managed_switches == reference.expected_switches
            }
            _ => false,
        };
        Self {
            sequence: state.sequence(),
            valid,
            convergence_ms: convergence.map(|d| d.as_millis() as u64),
            sent,
            received,
            data,
            discarded,
            flooded_switches: state.roster_len(),
            managed_switches,
            legacy_switches: state.devices_of(|k| k == DeviceKind::LegacySwitch),
            sensors: state.devices_of(|k| matches!(k, DeviceKind::Sensor(_))),
            hosts: state.hosts_len(),
            links: state.link_keys(),
            reference,
        }
    }
}

/// Receives one record per valid cycle.
pub trait StatsSink: Send + Sync {
    fn record(&self, report: &CycleReport);
}

/// Writes reports to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatsSink;

impl StatsSink for LogStatsSink {
    fn record(&self, report: &CycleReport) {
        log::info!(
            "[ehddp-stats] cycle={} converged_ms={} sent={} received={} data={} discarded={} \
             switches={} legacy={} sensors={} links={}",
            report.sequence,
            report.convergence_ms.unwrap_or(0),
            report.sent,
            report.received,
            report.data,
            report.discarded,
            report.managed_switches,
            report.legacy_switches,
            report.sensors,
            report.links
        );
    }
}
