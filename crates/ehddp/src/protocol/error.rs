// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec errors for discovery frames and their link-layer carriage.

use std::fmt;

/// Hop field selected by a width code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopField {
    DeviceType,
    DeviceId,
    Port,
}

impl fmt::Display for HopField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopField::DeviceType => write!(f, "device type"),
            HopField::DeviceId => write!(f, "device id"),
            HopField::Port => write!(f, "port"),
        }
    }
}

/// Malformed, truncated or unencodable discovery frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended `needed` bytes short while reading at `offset`.
    Truncated { offset: usize, needed: usize },
    /// Opcode outside {REQUEST, REPLY, ACK_REQUEST, RESENT}.
    UnsupportedOpcode(u8),
    /// More hops than the 5-bit hop count can carry.
    HopLimitExceeded(usize),
    /// Width code selects a field size the protocol does not define.
    InvalidWidth { field: HopField, code: u8 },
    /// Value does not fit the width selected by its configuration byte.
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },
    /// Last-hop/origin address length differs from the previous-hop length.
    AddressLengthMismatch { expected: usize, actual: usize },
    /// Link-layer frame carries another ether-type.
    NotDiscoveryFrame(u16),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated { offset, needed } => {
                write!(f, "truncated frame at offset {} ({} more bytes needed)", offset, needed)
            }
            CodecError::UnsupportedOpcode(op) => write!(f, "unsupported opcode {}", op),
            CodecError::HopLimitExceeded(n) => write!(f, "{} hops exceeds the hop limit", n),
            CodecError::InvalidWidth { field, code } => {
                write!(f, "invalid {} width code {}", field, code)
            }
            CodecError::FieldOverflow {
                field,
                value,
                width,
            } => write!(f, "{} value {} does not fit in {} bytes", field, value, width),
            CodecError::AddressLengthMismatch { expected, actual } => write!(
                f,
                "address length {} does not match previous-hop length {}",
                actual, expected
            ),
            CodecError::NotDiscoveryFrame(ether_type) => {
                write!(f, "ether-type 0x{:04x} is not a discovery frame", ether_type)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::InvalidWidth {
            field: HopField::Port,
            code: 2,
        };
        assert_eq!(err.to_string(), "invalid port width code 2");

        let err = CodecError::Truncated {
            offset: 12,
            needed: 3,
        };
        assert_eq!(
            err.to_string(),
            "truncated frame at offset 12 (3 more bytes needed)"
        );
    }
}
