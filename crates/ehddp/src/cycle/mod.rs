// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery cycle controller and service lifecycle.
//!
//! [`DiscoveryService`] is the unit started and stopped by the host: it
//! registers the classifier for the discovery ether-type and runs
//! [`DiscoveryController`] cycles on a dedicated thread.

mod controller;
mod stats;

pub use controller::DiscoveryController;
pub use stats::{CycleReport, LogStatsSink, StatsSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::inventory::Collaborators;

pub struct DiscoveryService {
    controller: Arc<DiscoveryController>,
    collaborators: Collaborators,
    ether_type: u16,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl DiscoveryService {
    /// Intercept discovery frames and start cycling until stopped.
    pub fn start(config: DiscoveryConfig, collaborators: Collaborators) -> Result<Self> {
        Self::start_with_limit(config, collaborators, None)
    }

    /// Like [`start`](Self::start), but the loop ends after `limit` cycles.
    pub fn start_with_limit(
        config: DiscoveryConfig,
        collaborators: Collaborators,
        limit: Option<u64>,
    ) -> Result<Self> {
        crate::trace_fn!("DiscoveryService::start");
        let shutdown = Arc::new(AtomicBool::new(false));
        let ether_type = config.ether_type;
        let controller = Arc::new(DiscoveryController::new(
            config,
            collaborators.clone(),
            Arc::clone(&shutdown),
        )?);

        collaborators
            .packets
            .add_processor(ether_type, controller.classifier());

        let loop_controller = Arc::clone(&controller);
        let handle = thread::Builder::new()
            .name("ehddp-cycle".to_string())
            .spawn(move || loop_controller.run(limit));
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                collaborators.packets.remove_processor(ether_type);
                return Err(Error::Spawn(e.to_string()));
            }
        };
        log::info!(
            "[ehddp-cycle] discovery started (ether-type 0x{:04x}, harvest {} ms)",
            ether_type,
            controller.config().harvest_window_ms
        );

        Ok(Self {
            controller,
            collaborators,
            ether_type,
            handle: Some(handle),
            shutdown,
        })
    }

    pub fn controller(&self) -> &Arc<DiscoveryController> {
        &self.controller
    }

    pub fn completed_cycles(&self) -> u64 {
        self.controller.completed_cycles()
    }

    pub fn last_report(&self) -> Option<Arc<CycleReport>> {
        self.controller.last_report()
    }

    /// True once a cycle limit was reached.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop cycling and remove frame interception.
    ///
    /// An in-flight harvest is cut short and settled.
    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[ehddp-cycle] cycle thread panicked");
            }
            self.collaborators.packets.remove_processor(self.ether_type);
            log::info!("[ehddp-cycle] discovery stopped");
        }
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.teardown();
    }
}
