// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery frame: fixed header followed by up to 31 hop records.
//!
//! ```text
//! +--------+--------+--------+----------------+-------+-----------+
//! | ver/fl | opcode |  hops  | sequence (u64) | alen  | prev addr |
//! +--------+--------+--------+----------------+-------+-----------+
//! | ack nonce (u64) | last addr | src addr | block time (u32) | hops...
//! +-----------------+-----------+----------+------------------+--------
//! ```

use std::fmt;
use std::str::FromStr;

use super::cursor::{Cursor, CursorMut};
use super::error::CodecError;
use super::hop::{DeviceType, Hop, HopConfig};
use crate::config::{
    DEFAULT_ADDR_LEN, DEFAULT_BLOCK_TIME_MS, FLOOD_PORT, MAX_HOPS, PROTOCOL_VERSION,
};

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Request = 1,
    Reply = 2,
    AckRequest = 3,
    Resent = 4,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            1 => Ok(Opcode::Request),
            2 => Ok(Opcode::Reply),
            3 => Ok(Opcode::AckRequest),
            4 => Ok(Opcode::Resent),
            other => Err(CodecError::UnsupportedOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Request => "REQUEST",
            Opcode::Reply => "REPLY",
            Opcode::AckRequest => "ACK_REQUEST",
            Opcode::Resent => "RESENT",
        };
        f.write_str(name)
    }
}

/// Link-layer address carried in the frame header.
///
/// Usually six bytes, but the header length byte allows any size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HwAddr(Vec<u8>);

impl HwAddr {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<MacAddr> for HwAddr {
    fn from(mac: MacAddr) -> Self {
        Self(mac.0.to_vec())
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_colon_hex(f, &self.0)
    }
}

/// Six-byte Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Pack into the low 48 bits of a device identifier.
    pub fn to_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[2..]);
        MacAddr(mac)
    }

    pub fn matches(&self, addr: &HwAddr) -> bool {
        addr.as_bytes() == self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_colon_hex(f, &self.0)
    }
}

/// Error parsing a textual MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacError(pub String);

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid MAC address '{}'", self.0)
    }
}

impl std::error::Error for ParseMacError {}

impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for slot in mac.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(MacAddr(mac))
    }
}

fn write_colon_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{:02X}", byte)?;
    }
    Ok(())
}

/// Decoded discovery frame.
///
/// The hop count is not stored: it is always `hops.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFrame {
    pub version: u8,
    pub flags: u8,
    pub opcode: Opcode,
    pub sequence: u64,
    pub prev_addr: HwAddr,
    pub ack_nonce: u64,
    pub last_addr: HwAddr,
    pub src_addr: HwAddr,
    pub block_time_ms: u32,
    pub hops: Vec<Hop>,
}

impl DiscoveryFrame {
    /// New frame with every address set to `origin` and a random ack nonce.
    pub fn new(opcode: Opcode, sequence: u64, origin: HwAddr) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: 0,
            opcode,
            sequence,
            prev_addr: origin.clone(),
            ack_nonce: fastrand::u64(..),
            last_addr: origin.clone(),
            src_addr: origin,
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            hops: Vec::new(),
        }
    }

    /// Hop-1 REQUEST a managed switch floods out all its ports.
    ///
    /// The seeding hop carries the flood port on both sides.
    pub fn request(sequence: u64, origin: HwAddr, switch_id: u64, config: HopConfig) -> Self {
        let mut frame = Self::new(Opcode::Request, sequence, origin);
        frame.hops.push(Hop {
            config,
            device_type: DeviceType::ControlledSwitch,
            device_id: switch_id,
            in_port: FLOOD_PORT,
            out_port: FLOOD_PORT,
        });
        frame
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Append a hop the way a forwarding device does.
    ///
    /// `last_hop` becomes the last-updating address; it must have the same
    /// length as the previous-hop address.
    pub fn push_hop(&mut self, hop: Hop, last_hop: &HwAddr) -> Result<(), CodecError> {
        if self.hops.len() >= MAX_HOPS {
            return Err(CodecError::HopLimitExceeded(self.hops.len() + 1));
        }
        if last_hop.len() != self.prev_addr.len() {
            return Err(CodecError::AddressLengthMismatch {
                expected: self.prev_addr.len(),
                actual: last_hop.len(),
            });
        }
        self.hops.push(hop);
        self.last_addr = last_hop.clone();
        Ok(())
    }

    pub fn encoded_len(&self) -> Result<usize, CodecError> {
        let header = 3 + 8 + 1 + 8 + 4 + 3 * self.prev_addr.len();
        self.hops
            .iter()
            .try_fold(header, |acc, hop| Ok(acc + hop.encoded_len()?))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        crate::trace_fn!("DiscoveryFrame::encode");
        if self.hops.len() > MAX_HOPS {
            return Err(CodecError::HopLimitExceeded(self.hops.len()));
        }
        let addr_len = self.prev_addr.len();
        if addr_len > usize::from(u8::MAX) {
            return Err(CodecError::FieldOverflow {
                field: "address length",
                value: addr_len as u64,
                width: 1,
            });
        }
        for addr in [&self.last_addr, &self.src_addr] {
            if addr.len() != addr_len {
                return Err(CodecError::AddressLengthMismatch {
                    expected: addr_len,
                    actual: addr.len(),
                });
            }
        }

        let mut cursor = CursorMut::with_capacity(self.encoded_len()?);
        cursor.write_u8(((self.flags & 0x0F) << 4) | (self.version & 0x0F));
        cursor.write_u8(self.opcode.as_u8());
        cursor.write_u8(self.hops.len() as u8);
        cursor.write_u64(self.sequence);
        cursor.write_u8(addr_len as u8);
        cursor.write_bytes(self.prev_addr.as_bytes());
        cursor.write_u64(self.ack_nonce);
        cursor.write_bytes(self.last_addr.as_bytes());
        cursor.write_bytes(self.src_addr.as_bytes());
        cursor.write_u32(self.block_time_ms);

        for hop in &self.hops {
            hop.check_widths()?;
            let config = hop.config;
            cursor.write_u8(config.as_byte());
            cursor.write_uint(u64::from(hop.device_type.code()), config.type_width()?);
            cursor.write_uint(hop.device_id, config.id_width()?);
            let port_width = config.port_width()?;
            cursor.write_uint(u64::from(hop.in_port), port_width);
            cursor.write_uint(u64::from(hop.out_port), port_width);
        }

        Ok(cursor.into_inner())
    }

    /// Decode a frame; bytes after the last hop are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        crate::trace_fn!("DiscoveryFrame::decode");
        let mut cursor = Cursor::new(bytes);

        let first = cursor.read_u8()?;
        let opcode = Opcode::from_u8(cursor.read_u8()?)?;
        let hop_count = usize::from(cursor.read_u8()?);
        if hop_count > MAX_HOPS {
            return Err(CodecError::HopLimitExceeded(hop_count));
        }
        let sequence = cursor.read_u64()?;
        let addr_len = usize::from(cursor.read_u8()?);
        let prev_addr = HwAddr::from_bytes(cursor.read_bytes(addr_len)?);
        let ack_nonce = cursor.read_u64()?;
        let last_addr = HwAddr::from_bytes(cursor.read_bytes(addr_len)?);
        let src_addr = HwAddr::from_bytes(cursor.read_bytes(addr_len)?);
        let block_time_ms = cursor.read_u32()?;

        let mut hops = Vec::with_capacity(hop_count);
        for _ in 0..hop_count {
            let config = HopConfig::from_byte(cursor.read_u8()?);
            let type_code = cursor.read_uint(config.type_width()?)?;
            let device_id = cursor.read_uint(config.id_width()?)?;
            let port_width = config.port_width()?;
            let in_port = cursor.read_uint(port_width)?;
            let out_port = cursor.read_uint(port_width)?;
            hops.push(Hop {
                config,
                // type and port widths never exceed their target sizes
                device_type: DeviceType::from_code(type_code as u16),
                device_id,
                in_port: in_port as u32,
                out_port: out_port as u32,
            });
        }

        Ok(Self {
            version: first & 0x0F,
            flags: first >> 4,
            opcode,
            sequence,
            prev_addr,
            ack_nonce,
            last_addr,
            src_addr,
            block_time_ms,
            hops,
        })
    }
}

impl Default for DiscoveryFrame {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: 0,
            opcode: Opcode::Request,
            sequence: 0,
            prev_addr: HwAddr(vec![0; DEFAULT_ADDR_LEN]),
            ack_nonce: 0,
            last_addr: HwAddr(vec![0; DEFAULT_ADDR_LEN]),
            src_addr: HwAddr(vec![0; DEFAULT_ADDR_LEN]),
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            hops: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::from_u8(1), Ok(Opcode::Request));
        assert_eq!(Opcode::from_u8(4), Ok(Opcode::Resent));
        assert_eq!(Opcode::from_u8(9), Err(CodecError::UnsupportedOpcode(9)));
        assert_eq!(Opcode::AckRequest.to_string(), "ACK_REQUEST");
    }

    #[test]
    fn test_mac_parse_and_display() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().expect("valid mac");
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.to_u64(), 0xAABB_CCDD_EEFF);
        assert_eq!(MacAddr::from_u64(0xAABB_CCDD_EEFF), mac);
        assert!("aa:bb:cc".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<MacAddr>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_header_layout() {
        let origin = HwAddr::from(MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        let mut frame = DiscoveryFrame::new(Opcode::Reply, 0x0102_0304_0506_0708, origin);
        frame.ack_nonce = 0x1111_1111_1111_1111;
        frame.block_time_ms = 3000;

        let bytes = frame.encode().expect("encodes");
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 2);
        assert_eq!(bytes[2], 0);
        assert_eq!(&bytes[3..11], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bytes[11], 6);
        assert_eq!(&bytes[12..18], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(&bytes[18..26], &[0x11; 8]);
        assert_eq!(&bytes[38..42], &3000u32.to_be_bytes());
        assert_eq!(bytes.len(), frame.encoded_len().expect("valid widths"));
    }

    #[test]
    fn test_datapath_hop_layout() {
        let mut frame = DiscoveryFrame::default();
        frame.hops.push(Hop::new(
            DeviceType::LegacySwitch,
            0x0000_0000_0000_00AB,
            3,
            7,
            true,
        ));
        let bytes = frame.encode().expect("encodes");
        let hop = &bytes[42..];
        assert_eq!(hop.len(), 1 + 2 + 8 + 4 + 4);
        assert_eq!(hop[0], 0x7F);
        assert_eq!(&hop[1..3], &[0, 2]);
        assert_eq!(hop[10], 0xAB);
        assert_eq!(&hop[11..15], &[0, 0, 0, 3]);
        assert_eq!(&hop[15..19], &[0, 0, 0, 7]);
    }

    #[test]
    fn test_decode_ignores_padding() {
        let mut frame = DiscoveryFrame::default();
        frame.hops.push(Hop::compact(DeviceType::Sensor(2), 9, 1, 1, false));
        let mut bytes = frame.encode().expect("encodes");
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(DiscoveryFrame::decode(&bytes), Ok(frame));
    }

    #[test]
    fn test_push_hop_updates_last_address() {
        let origin = HwAddr::from(MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        let mut frame =
            DiscoveryFrame::request(1, origin.clone(), 1, HopConfig::widest(true));
        let legacy = HwAddr::from(MacAddr([0, 0, 0, 0, 0, 2]));
        frame
            .push_hop(Hop::new(DeviceType::LegacySwitch, 2, 1, 2, true), &legacy)
            .expect("room for hop");
        assert_eq!(frame.hop_count(), 2);
        assert_eq!(frame.last_addr, legacy);
        assert_eq!(frame.prev_addr, origin);

        let short = HwAddr::from_bytes(&[1, 2]);
        assert!(matches!(
            frame.push_hop(Hop::new(DeviceType::LegacySwitch, 3, 1, 2, true), &short),
            Err(CodecError::AddressLengthMismatch { expected: 6, actual: 2 })
        ));
    }

    #[test]
    fn test_mismatched_address_lengths_rejected() {
        let mut frame = DiscoveryFrame::default();
        frame.src_addr = HwAddr::from_bytes(&[1, 2, 3]);
        assert!(matches!(
            frame.encode(),
            Err(CodecError::AddressLengthMismatch { .. })
        ));
    }
}
