// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and discovery service configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::protocol::{MacAddr, WidthPolicy};

/// Ether-type carrying discovery frames (0xFFAA).
pub const EHDDP_ETHER_TYPE: u16 = 0xFFAA;

/// Synthetic address discovery frames originate from.
pub const PROTOCOL_MAC: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Destination of REQUEST floods.
pub const BROADCAST_MAC: MacAddr = MacAddr::BROADCAST;

/// Version written in the low nibble of the first header byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// The hop count field holds at most 31.
pub const MAX_HOPS: usize = 31;

/// Previous-hop address length when none is configured.
pub const DEFAULT_ADDR_LEN: usize = 6;

/// Block-time hint carried in every frame.
pub const DEFAULT_BLOCK_TIME_MS: u32 = 3000;

/// Device type codes at or above this value are sensors.
pub const SENSOR_BASE: u16 = 4;

/// Port numbers that never name a real port (255 = flood/unknown).
pub const SENTINEL_PORTS: [u32; 2] = [0, FLOOD_PORT];

/// Port number meaning "all ports".
pub const FLOOD_PORT: u32 = 255;

/// Minimum Ethernet frame size without FCS.
pub const MIN_ETHERNET_FRAME: usize = 60;

pub fn is_sentinel_port(port: u32) -> bool {
    SENTINEL_PORTS.contains(&port)
}

/// Expected fabric size, used to judge whether a cycle converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceCounts {
    #[serde(default)]
    pub expected_nodes: usize,
    #[serde(default)]
    pub expected_links: usize,
    #[serde(default)]
    pub expected_switches: usize,
}

/// Discovery service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Time to wait for replies after each flood (milliseconds)
    #[serde(default = "default_harvest_window")]
    pub harvest_window_ms: u64,

    /// Block-time hint written into outgoing frames (milliseconds)
    #[serde(default = "default_block_time")]
    pub block_time_ms: u32,

    /// Synthetic source/destination address of the protocol
    #[serde(default = "default_protocol_mac")]
    pub protocol_mac: String,

    /// Ether-type to intercept and emit under
    #[serde(default = "default_ether_type")]
    pub ether_type: u16,

    /// Field widths for locally built hops
    #[serde(default)]
    pub width_policy: WidthPolicy,

    /// Register sensors found in chains as hosts
    #[serde(default = "default_true")]
    pub register_sensor_hosts: bool,

    /// Expected fabric size when the reference collaborator has none
    #[serde(default)]
    pub reference: Option<ReferenceCounts>,
}

fn default_harvest_window() -> u64 {
    3000
}

fn default_block_time() -> u32 {
    DEFAULT_BLOCK_TIME_MS
}

fn default_protocol_mac() -> String {
    PROTOCOL_MAC.to_string()
}

fn default_ether_type() -> u16 {
    EHDDP_ETHER_TYPE
}

fn default_true() -> bool {
    true
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            harvest_window_ms: default_harvest_window(),
            block_time_ms: default_block_time(),
            protocol_mac: default_protocol_mac(),
            ether_type: default_ether_type(),
            width_policy: WidthPolicy::default(),
            register_sensor_hosts: true,
            reference: None,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get harvest window as Duration.
    pub fn harvest_window(&self) -> Duration {
        Duration::from_millis(self.harvest_window_ms)
    }

    /// Parsed protocol address.
    pub fn protocol_mac(&self) -> Result<MacAddr, ConfigError> {
        self.protocol_mac
            .parse()
            .map_err(|e: crate::protocol::ParseMacError| ConfigError::InvalidValue(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.harvest_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "harvest_window_ms cannot be 0".into(),
            ));
        }
        let mac = self.protocol_mac()?;
        if mac == BROADCAST_MAC {
            return Err(ConfigError::InvalidValue(
                "protocol_mac cannot be the broadcast address".into(),
            ));
        }
        if self.ether_type < 0x0600 {
            return Err(ConfigError::InvalidValue(format!(
                "ether_type 0x{:04x} is a length field",
                self.ether_type
            )));
        }
        if let Some(reference) = &self.reference {
            if reference.expected_switches == 0 {
                return Err(ConfigError::InvalidValue(
                    "reference.expected_switches cannot be 0".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(s) => write!(f, "I/O error: {}", s),
            Self::ParseError(s) => write!(f, "Parse error: {}", s),
            Self::SerializeError(s) => write!(f, "Serialize error: {}", s),
            Self::InvalidValue(s) => write!(f, "Invalid value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
