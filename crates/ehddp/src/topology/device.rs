// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device classification and inventory-facing identifiers.
//!
//! Wire device types map onto [`DeviceKind`]; a kind plus a 64-bit id
//! normalizes to one [`DeviceUri`] rendered as `of:`, `sw:` or `sensor:`
//! followed by 16 hex digits.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::protocol::DeviceType;

/// Sensor subtype, indexed by the offset above `SENSOR_BASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorKind {
    Temperature,
    Wind,
    Pressure,
    Light,
    Accelerometer,
    Vibration,
    Gyroscope,
    Proximity,
    Distance,
    Movement,
    Smoke,
    Magnetism,
    Humidity,
    /// Offset with no assigned subtype.
    Other(u16),
}

const SENSOR_KINDS: [SensorKind; 13] = [
    SensorKind::Temperature,
    SensorKind::Wind,
    SensorKind::Pressure,
    SensorKind::Light,
    SensorKind::Accelerometer,
    SensorKind::Vibration,
    SensorKind::Gyroscope,
    SensorKind::Proximity,
    SensorKind::Distance,
    SensorKind::Movement,
    SensorKind::Smoke,
    SensorKind::Magnetism,
    SensorKind::Humidity,
];

impl SensorKind {
    pub fn from_offset(offset: u16) -> Self {
        SENSOR_KINDS
            .get(usize::from(offset))
            .copied()
            .unwrap_or(SensorKind::Other(offset))
    }

    pub fn offset(self) -> u16 {
        match self {
            SensorKind::Other(offset) => offset,
            kind => SENSOR_KINDS
                .iter()
                .position(|k| *k == kind)
                .map_or(0, |i| i as u16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Temperature => "TEMPERATURE",
            SensorKind::Wind => "WIND",
            SensorKind::Pressure => "PRESSURE",
            SensorKind::Light => "LIGHT",
            SensorKind::Accelerometer => "ACCELEROMETER",
            SensorKind::Vibration => "VIBRATION",
            SensorKind::Gyroscope => "GYROSCOPE",
            SensorKind::Proximity => "PROXIMITY",
            SensorKind::Distance => "DISTANCE",
            SensorKind::Movement => "MOVEMENT",
            SensorKind::Smoke => "SMOKE",
            SensorKind::Magnetism => "MAGNETISM",
            SensorKind::Humidity => "HUMIDITY",
            SensorKind::Other(_) => "SENSOR",
        }
    }
}

/// What a hop is, as far as the inventories care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceKind {
    /// Managed, or programmable and awaiting configuration.
    ControlledSwitch,
    LegacySwitch,
    Sensor(SensorKind),
}

impl DeviceKind {
    /// `None` for type code 0, which no device emits.
    pub fn classify(device_type: DeviceType) -> Option<Self> {
        match device_type {
            DeviceType::ControlledSwitch | DeviceType::PendingConfigSwitch => {
                Some(DeviceKind::ControlledSwitch)
            }
            DeviceType::LegacySwitch => Some(DeviceKind::LegacySwitch),
            DeviceType::Sensor(offset) => Some(DeviceKind::Sensor(SensorKind::from_offset(offset))),
            DeviceType::Unknown => None,
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            DeviceKind::ControlledSwitch => "of",
            DeviceKind::LegacySwitch => "sw",
            DeviceKind::Sensor(_) => "sensor",
        }
    }

    pub fn is_switch(self) -> bool {
        !matches!(self, DeviceKind::Sensor(_))
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::ControlledSwitch => f.write_str("CONTROLLED_SWITCH"),
            DeviceKind::LegacySwitch => f.write_str("LEGACY_SWITCH"),
            DeviceKind::Sensor(kind) => f.write_str(kind.name()),
        }
    }
}

/// Normalized device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceUri {
    pub kind: DeviceKind,
    pub id: u64,
}

impl DeviceUri {
    pub fn new(kind: DeviceKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn switch(id: u64) -> Self {
        Self::new(DeviceKind::ControlledSwitch, id)
    }

    pub fn is_managed(&self) -> bool {
        self.kind == DeviceKind::ControlledSwitch
    }
}

impl fmt::Display for DeviceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}", self.kind.scheme(), self.id)
    }
}

impl Serialize for DeviceUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A port on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectPoint {
    pub device: DeviceUri,
    pub port: u32,
}

impl ConnectPoint {
    pub fn new(device: DeviceUri, port: u32) -> Self {
        Self { device, port }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}
