// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cycle record sinks and the end-of-run topology printout.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use colored::Colorize;
use ehddp::topology::LinkDescription;
use ehddp::{CycleReport, LogStatsSink, MemoryNetwork, StatsSink};
use parking_lot::Mutex;

/// Logs every valid cycle and, optionally, appends it as a JSON line.
pub struct ReportSink {
    file: Option<Mutex<BufWriter<File>>>,
    recorded: AtomicU64,
}

impl ReportSink {
    pub fn new(path: Option<&Path>) -> io::Result<Self> {
        let file = match path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };
        Ok(Self {
            file,
            recorded: AtomicU64::new(0),
        })
    }

    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}

impl StatsSink for ReportSink {
    fn record(&self, report: &CycleReport) {
        LogStatsSink.record(report);
        self.recorded.fetch_add(1, Ordering::Relaxed);

        let Some(file) = &self.file else {
            return;
        };
        let line = match serde_json::to_string(report) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("[ehddp-sim] cannot serialize cycle {}: {}", report.sequence, e);
                return;
            }
        };
        let mut file = file.lock();
        if let Err(e) = writeln!(file, "{}", line).and_then(|()| file.flush()) {
            log::warn!("[ehddp-sim] stats write failed: {}", e);
        }
    }
}

/// Print devices, hosts and every link registered during the run.
pub fn print_topology(network: &MemoryNetwork, last: Option<&CycleReport>) {
    println!();
    println!("{}", "=== Inferred Topology ===".bold());
    println!();

    let devices = network.devices();
    println!("{} ({})", "Devices".cyan().bold(), devices.len());
    for device in &devices {
        println!("  {} {}", device.uri.to_string().green(), device.hw_version.dimmed());
    }
    println!();

    let hosts = network.hosts();
    println!("{} ({})", "Hosts".cyan().bold(), hosts.len());
    for (uri, host) in &hosts {
        println!("  {} at {}", uri.to_string().green(), host.location);
    }
    println!();

    let links: BTreeSet<LinkDescription> = network.detected_links().into_iter().collect();
    println!("{} ({})", "Links".cyan().bold(), links.len());
    for link in &links {
        let kind = if link.durable { "durable" } else { "transient" };
        let direction = if link.bidirectional { "<->" } else { "->" };
        println!(
            "  {} {} {}  {}",
            link.key.src,
            direction,
            link.key.dst,
            kind.dimmed()
        );
    }
    println!();

    println!("{}", "--- Last cycle ---".dimmed());
    match last {
        Some(report) => println!(
            "  stamp={} valid={} converged_ms={} sent={} received={} data={} discarded={}",
            report.sequence,
            report.valid,
            report
                .convergence_ms
                .map_or_else(|| "-".to_string(), |ms| ms.to_string()),
            report.sent,
            report.received,
            report.data,
            report.discarded
        ),
        None => println!("  no cycle settled"),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehddp::topology::DiscoveryCycleState;

    #[test]
    fn test_json_lines_appended() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stats.jsonl");
        let sink = ReportSink::new(Some(&path)).expect("open");

        let report = CycleReport::from_state(&DiscoveryCycleState::new(42), None);
        sink.record(&report);
        sink.record(&report);
        assert_eq!(sink.recorded(), 2);

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(parsed["sequence"], 42);
    }

    #[test]
    fn test_log_only_sink() {
        let sink = ReportSink::new(None).expect("no file");
        sink.record(&CycleReport::from_state(&DiscoveryCycleState::new(1), None));
        assert_eq!(sink.recorded(), 1);
    }
}
