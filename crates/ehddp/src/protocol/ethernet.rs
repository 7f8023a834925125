// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ethernet II carriage for discovery frames.

use super::cursor::{Cursor, CursorMut};
use super::error::CodecError;
use super::frame::{DiscoveryFrame, MacAddr};
use crate::config::MIN_ETHERNET_FRAME;

const ETHERNET_HEADER_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: u16,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Wrap an encoded discovery frame.
    pub fn wrap(
        dst: MacAddr,
        src: MacAddr,
        ether_type: u16,
        frame: &DiscoveryFrame,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            dst,
            src,
            ether_type,
            payload: frame.encode()?,
        })
    }

    /// Serialize, zero-padding to the Ethernet minimum (FCS excluded).
    pub fn encode(&self) -> Vec<u8> {
        let len = (ETHERNET_HEADER_LEN + self.payload.len()).max(MIN_ETHERNET_FRAME);
        let mut cursor = CursorMut::with_capacity(len);
        cursor.write_bytes(&self.dst.octets());
        cursor.write_bytes(&self.src.octets());
        cursor.write_u16(self.ether_type);
        cursor.write_bytes(&self.payload);
        let mut bytes = cursor.into_inner();
        bytes.resize(len, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let dst = read_mac(&mut cursor)?;
        let src = read_mac(&mut cursor)?;
        let ether_type = cursor.read_u16()?;
        let payload = cursor.read_bytes(cursor.remaining())?.to_vec();
        Ok(Self {
            dst,
            src,
            ether_type,
            payload,
        })
    }

    /// Decode the payload as a discovery frame if it carries `ether_type`.
    pub fn discovery_frame(&self, ether_type: u16) -> Result<DiscoveryFrame, CodecError> {
        if self.ether_type != ether_type {
            return Err(CodecError::NotDiscoveryFrame(self.ether_type));
        }
        DiscoveryFrame::decode(&self.payload)
    }
}

fn read_mac(cursor: &mut Cursor<'_>) -> Result<MacAddr, CodecError> {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(cursor.read_bytes(6)?);
    Ok(MacAddr(mac))
}
