// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Big-endian read/write cursors for discovery frame encoding.
//!
//! Network byte order throughout. Besides the fixed primitives, both cursors
//! move unsigned integers of 1..=8 bytes, which the per-hop fields need.

use super::error::CodecError;

/// Generate fixed-width write methods (big-endian).
macro_rules! impl_write_be {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    };
}

/// Generate fixed-width read methods (bounds checked, big-endian).
macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type, CodecError> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_be_bytes(bytes))
        }
    };
}

/// Growable write cursor.
pub struct CursorMut {
    buffer: Vec<u8>,
}

impl CursorMut {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    impl_write_be!(write_u16, u16);
    impl_write_be!(write_u32, u32);
    impl_write_be!(write_u64, u64);

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write the low `width` bytes of `value`, most significant first.
    ///
    /// Callers check that `value` fits; the high bytes are dropped otherwise.
    pub fn write_uint(&mut self, value: u64, width: usize) {
        debug_assert!((1..=8).contains(&width));
        let bytes = value.to_be_bytes();
        self.buffer.extend_from_slice(&bytes[8 - width..]);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Immutable read cursor (bounds checked, zero-copy).
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    impl_read_be!(read_u16, u16, 2);
    impl_read_be!(read_u32, u32, 4);
    impl_read_be!(read_u64, u64, 8);

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.offset + len > self.buffer.len() {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed: self.offset + len - self.buffer.len(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read a `width`-byte big-endian unsigned integer (1..=8 bytes).
    pub fn read_uint(&mut self, width: usize) -> Result<u64, CodecError> {
        debug_assert!((1..=8).contains(&width));
        let raw = self.read_bytes(width)?;
        Ok(raw.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}
