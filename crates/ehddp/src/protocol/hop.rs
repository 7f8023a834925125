// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-hop records and their configuration byte.
//!
//! Configuration byte layout:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +-------+-----------+-------+---+
//! | type  | device id | port  | B |
//! +-------+-----------+-------+---+
//! ```
//!
//! Each width code stores `bytes - 1`. `B` is the per-hop bidirectional flag.
//! Datapaths always write `0x7F`: 2-byte type, 8-byte id, 4-byte ports,
//! bidirectional.

use serde::{Deserialize, Serialize};

use super::error::{CodecError, HopField};
use crate::config::SENSOR_BASE;

/// Device type code carried by each hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Switch already managed through the southbound protocol (code 1).
    ControlledSwitch,
    /// Non-programmable forwarding device (code 2).
    LegacySwitch,
    /// Programmable switch not yet configured by the controller (code 3).
    PendingConfigSwitch,
    /// Leaf sensor; the value is the offset from `SENSOR_BASE`.
    Sensor(u16),
    /// Code 0, never emitted by conforming devices.
    Unknown,
}

impl DeviceType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => DeviceType::Unknown,
            1 => DeviceType::ControlledSwitch,
            2 => DeviceType::LegacySwitch,
            3 => DeviceType::PendingConfigSwitch,
            n => DeviceType::Sensor(n - SENSOR_BASE),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            DeviceType::Unknown => 0,
            DeviceType::ControlledSwitch => 1,
            DeviceType::LegacySwitch => 2,
            DeviceType::PendingConfigSwitch => 3,
            DeviceType::Sensor(offset) => SENSOR_BASE.saturating_add(offset),
        }
    }

    /// True for switches that speak the southbound protocol (or will).
    pub fn is_programmable(self) -> bool {
        matches!(
            self,
            DeviceType::ControlledSwitch | DeviceType::PendingConfigSwitch
        )
    }
}

const TYPE_SHIFT: u8 = 6;
const ID_SHIFT: u8 = 3;
const PORT_SHIFT: u8 = 1;
const BIDIRECTIONAL_BIT: u8 = 0b0000_0001;

const TYPE_WIDTHS: [usize; 2] = [1, 2];
const ID_WIDTHS: [usize; 5] = [1, 2, 4, 6, 8];
const PORT_WIDTHS: [usize; 3] = [1, 2, 4];

/// Per-hop configuration byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HopConfig(u8);

impl HopConfig {
    /// Layout every deployed datapath writes (2/8/4 bytes).
    pub const fn widest(bidirectional: bool) -> Self {
        Self(0b0111_1110 | bidirectional as u8)
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Build from explicit widths in bytes.
    pub fn from_widths(
        type_width: usize,
        id_width: usize,
        port_width: usize,
        bidirectional: bool,
    ) -> Result<Self, CodecError> {
        let type_code = width_code(HopField::DeviceType, type_width, &TYPE_WIDTHS)?;
        let id_code = width_code(HopField::DeviceId, id_width, &ID_WIDTHS)?;
        let port_code = width_code(HopField::Port, port_width, &PORT_WIDTHS)?;
        Ok(Self(
            (type_code << TYPE_SHIFT)
                | (id_code << ID_SHIFT)
                | (port_code << PORT_SHIFT)
                | bidirectional as u8,
        ))
    }

    /// Narrowest layout that holds the given values.
    pub fn fitting(
        device_type: u16,
        device_id: u64,
        in_port: u32,
        out_port: u32,
        bidirectional: bool,
    ) -> Self {
        let type_width = narrowest(u64::from(device_type), &TYPE_WIDTHS);
        let id_width = narrowest(device_id, &ID_WIDTHS);
        let port_width = narrowest(u64::from(in_port.max(out_port)), &PORT_WIDTHS);
        // Every value fits one of the listed widths, so the codes are valid.
        let type_code = (type_width - 1) as u8;
        let id_code = (id_width - 1) as u8;
        let port_code = (port_width - 1) as u8;
        Self(
            (type_code << TYPE_SHIFT)
                | (id_code << ID_SHIFT)
                | (port_code << PORT_SHIFT)
                | bidirectional as u8,
        )
    }

    pub fn type_width(self) -> Result<usize, CodecError> {
        decode_width(HopField::DeviceType, (self.0 >> TYPE_SHIFT) & 0b11, &TYPE_WIDTHS)
    }

    pub fn id_width(self) -> Result<usize, CodecError> {
        decode_width(HopField::DeviceId, (self.0 >> ID_SHIFT) & 0b111, &ID_WIDTHS)
    }

    pub fn port_width(self) -> Result<usize, CodecError> {
        decode_width(HopField::Port, (self.0 >> PORT_SHIFT) & 0b11, &PORT_WIDTHS)
    }

    pub fn bidirectional(self) -> bool {
        self.0 & BIDIRECTIONAL_BIT != 0
    }

    pub fn with_bidirectional(self, bidirectional: bool) -> Self {
        Self((self.0 & !BIDIRECTIONAL_BIT) | bidirectional as u8)
    }
}

fn decode_width(field: HopField, code: u8, allowed: &[usize]) -> Result<usize, CodecError> {
    let width = usize::from(code) + 1;
    if allowed.contains(&width) {
        Ok(width)
    } else {
        Err(CodecError::InvalidWidth { field, code })
    }
}

fn width_code(field: HopField, width: usize, allowed: &[usize]) -> Result<u8, CodecError> {
    if allowed.contains(&width) {
        Ok((width - 1) as u8)
    } else {
        Err(CodecError::InvalidWidth {
            field,
            code: width.saturating_sub(1).min(usize::from(u8::MAX)) as u8,
        })
    }
}

fn narrowest(value: u64, allowed: &[usize]) -> usize {
    allowed
        .iter()
        .copied()
        .find(|width| fits(value, *width))
        .unwrap_or(8)
}

pub(crate) fn fits(value: u64, width: usize) -> bool {
    width >= 8 || value < (1u64 << (width * 8))
}

/// One device traversed by a discovery frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hop {
    pub config: HopConfig,
    pub device_type: DeviceType,
    pub device_id: u64,
    pub in_port: u32,
    pub out_port: u32,
}

impl Hop {
    /// Hop using the widest (datapath-compatible) layout.
    pub fn new(
        device_type: DeviceType,
        device_id: u64,
        in_port: u32,
        out_port: u32,
        bidirectional: bool,
    ) -> Self {
        Self {
            config: HopConfig::widest(bidirectional),
            device_type,
            device_id,
            in_port,
            out_port,
        }
    }

    /// Hop using the narrowest layout that holds its values.
    pub fn compact(
        device_type: DeviceType,
        device_id: u64,
        in_port: u32,
        out_port: u32,
        bidirectional: bool,
    ) -> Self {
        Self {
            config: HopConfig::fitting(
                device_type.code(),
                device_id,
                in_port,
                out_port,
                bidirectional,
            ),
            device_type,
            device_id,
            in_port,
            out_port,
        }
    }

    pub fn bidirectional(&self) -> bool {
        self.config.bidirectional()
    }

    /// Encoded size in bytes, configuration byte included.
    pub fn encoded_len(&self) -> Result<usize, CodecError> {
        Ok(1 + self.config.type_width()?
            + self.config.id_width()?
            + 2 * self.config.port_width()?)
    }

    /// Check each field fits the width its configuration selects.
    pub fn check_widths(&self) -> Result<(), CodecError> {
        let checks = [
            ("device type", u64::from(self.device_type.code()), self.config.type_width()?),
            ("device id", self.device_id, self.config.id_width()?),
            ("in port", u64::from(self.in_port), self.config.port_width()?),
            ("out port", u64::from(self.out_port), self.config.port_width()?),
        ];
        for (field, value, width) in checks {
            if !fits(value, width) {
                return Err(CodecError::FieldOverflow {
                    field,
                    value,
                    width,
                });
            }
        }
        Ok(())
    }
}

/// How locally built hops pick their field widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthPolicy {
    /// `0x7F`/`0x7E` layout, byte-compatible with deployed datapaths.
    #[default]
    Widest,
    /// Narrowest widths that hold the values.
    Compact,
}

impl WidthPolicy {
    pub fn hop(
        self,
        device_type: DeviceType,
        device_id: u64,
        in_port: u32,
        out_port: u32,
        bidirectional: bool,
    ) -> Hop {
        match self {
            WidthPolicy::Widest => Hop::new(device_type, device_id, in_port, out_port, bidirectional),
            WidthPolicy::Compact => {
                Hop::compact(device_type, device_id, in_port, out_port, bidirectional)
            }
        }
    }
}
