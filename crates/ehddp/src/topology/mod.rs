// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology model and inference engine.

pub mod device;
pub mod inference;
pub mod link;
pub mod state;

pub use device::{ConnectPoint, DeviceKind, DeviceUri, SensorKind};
pub use inference::InferenceEngine;
pub use link::{LinkDescription, LinkKey};
pub use state::{CounterSnapshot, CycleCounters, DiscoveryCycleState, HalfLink};
