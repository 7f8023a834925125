// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! eHDDP wire codec
//!
//! - `frame`: discovery frame header and hop array
//! - `hop`: per-hop records and the width-selecting configuration byte
//! - `ethernet`: link-layer carriage under the discovery ether-type
//! - `cursor`: big-endian read/write cursors

mod cursor;
pub mod error;
pub mod ethernet;
pub mod frame;
pub mod hop;

pub use error::{CodecError, HopField};
pub use ethernet::EthernetFrame;
pub use frame::{DiscoveryFrame, HwAddr, MacAddr, Opcode, ParseMacError};
pub use hop::{DeviceType, Hop, HopConfig, WidthPolicy};
