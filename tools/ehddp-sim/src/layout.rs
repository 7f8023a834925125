// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fabric description loaded from a JSON topology file.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "name": "s1", "role": "managed", "id": 1 },
//!     { "name": "l1", "role": "legacy", "id": 16 },
//!     { "name": "t1", "role": "sensor", "id": 32, "sensor": "temperature" }
//!   ],
//!   "links": [
//!     { "a": "s1:1", "b": "l1:1" },
//!     { "a": "l1:2", "b": "t1:1" }
//!   ]
//! }
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use ehddp::config::is_sentinel_port;
use ehddp::protocol::{DeviceType, HwAddr, MacAddr};
use ehddp::topology::SensorKind;
use ehddp::ReferenceCounts;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Punts every discovery frame to the controller.
    Managed,
    Legacy,
    /// Programmable but not yet under control; forwards like a legacy switch.
    Pending,
    Sensor,
}

#[derive(Debug, Deserialize)]
struct NodeSpec {
    name: String,
    role: Role,
    id: u64,
    #[serde(default)]
    sensor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkSpec {
    a: String,
    b: String,
}

#[derive(Debug, Deserialize)]
struct TopologyFile {
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    links: Vec<LinkSpec>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub role: Role,
    pub id: u64,
    pub device_type: DeviceType,
    pub ports: BTreeSet<u32>,
}

impl Node {
    /// Link-layer address the node stamps into forwarded frames.
    pub fn mac(&self) -> MacAddr {
        MacAddr::from_u64(self.id)
    }

    pub fn hw_addr(&self) -> HwAddr {
        HwAddr::from(self.mac())
    }
}

#[derive(Debug, Clone)]
pub enum LayoutError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Io(s) => write!(f, "I/O error: {}", s),
            LayoutError::Parse(s) => write!(f, "Parse error: {}", s),
            LayoutError::Invalid(s) => write!(f, "Invalid topology: {}", s),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Validated fabric: nodes plus the port-to-port wiring.
#[derive(Debug, Clone)]
pub struct Layout {
    nodes: Vec<Node>,
    peers: HashMap<(usize, u32), (usize, u32)>,
}

fn sensor_type(name: &str) -> Option<DeviceType> {
    (0..13u16)
        .map(SensorKind::from_offset)
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
        .map(|kind| DeviceType::Sensor(kind.offset()))
}

impl Layout {
    pub fn from_file(path: &Path) -> Result<Self, LayoutError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LayoutError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let file: TopologyFile =
            serde_json::from_str(json).map_err(|e| LayoutError::Parse(e.to_string()))?;
        Self::build(file)
    }

    fn build(file: TopologyFile) -> Result<Self, LayoutError> {
        let mut nodes = Vec::with_capacity(file.nodes.len());
        let mut by_name = HashMap::new();
        let mut ids = HashSet::new();

        for spec in file.nodes {
            let device_type = match spec.role {
                Role::Managed => DeviceType::ControlledSwitch,
                Role::Legacy => DeviceType::LegacySwitch,
                Role::Pending => DeviceType::PendingConfigSwitch,
                Role::Sensor => {
                    let name = spec.sensor.as_deref().unwrap_or("temperature");
                    sensor_type(name).ok_or_else(|| {
                        LayoutError::Invalid(format!("{}: unknown sensor kind '{}'", spec.name, name))
                    })?
                }
            };
            if by_name.contains_key(&spec.name) {
                return Err(LayoutError::Invalid(format!("duplicate node '{}'", spec.name)));
            }
            if !ids.insert(spec.id) {
                return Err(LayoutError::Invalid(format!("duplicate id {}", spec.id)));
            }
            by_name.insert(spec.name.clone(), nodes.len());
            nodes.push(Node {
                name: spec.name,
                role: spec.role,
                id: spec.id,
                device_type,
                ports: BTreeSet::new(),
            });
        }

        let endpoint = |text: &str| -> Result<(usize, u32), LayoutError> {
            let (name, port) = text
                .rsplit_once(':')
                .ok_or_else(|| LayoutError::Invalid(format!("endpoint '{}' is not name:port", text)))?;
            let node = *by_name
                .get(name)
                .ok_or_else(|| LayoutError::Invalid(format!("unknown node '{}'", name)))?;
            let port: u32 = port
                .parse()
                .map_err(|_| LayoutError::Invalid(format!("bad port in '{}'", text)))?;
            if is_sentinel_port(port) {
                return Err(LayoutError::Invalid(format!("port {} is reserved", port)));
            }
            Ok((node, port))
        };

        let mut peers = HashMap::new();
        for link in &file.links {
            let a = endpoint(&link.a)?;
            let b = endpoint(&link.b)?;
            if a.0 == b.0 {
                return Err(LayoutError::Invalid(format!("{} loops back to itself", link.a)));
            }
            for end in [a, b] {
                if peers.contains_key(&end) {
                    return Err(LayoutError::Invalid(format!(
                        "port {}:{} wired twice",
                        nodes[end.0].name, end.1
                    )));
                }
            }
            peers.insert(a, b);
            peers.insert(b, a);
            nodes[a.0].ports.insert(a.1);
            nodes[b.0].ports.insert(b.1);
        }

        for node in &nodes {
            if node.role == Role::Sensor && node.ports.len() != 1 {
                return Err(LayoutError::Invalid(format!(
                    "sensor '{}' needs exactly one link",
                    node.name
                )));
            }
        }

        Ok(Self { nodes, peers })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Far end of the wire plugged into `port` of node `index`.
    pub fn peer(&self, index: usize, port: u32) -> Option<(usize, u32)> {
        self.peers.get(&(index, port)).copied()
    }

    /// Node index of the managed switch with this datapath id.
    pub fn managed(&self, id: u64) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.role == Role::Managed && n.id == id)
    }

    pub fn managed_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.role == Role::Managed)
            .map(|n| n.id)
    }

    /// Expected counts: every programmable switch should be observed.
    pub fn reference(&self) -> ReferenceCounts {
        let switches = self
            .nodes
            .iter()
            .filter(|n| n.device_type.is_programmable())
            .count();
        ReferenceCounts {
            expected_nodes: self.nodes.len(),
            expected_links: self.peers.len(),
            expected_switches: switches,
        }
    }

    pub fn sensors(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.role == Role::Sensor)
            .count()
    }
}
