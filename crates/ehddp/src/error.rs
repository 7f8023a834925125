// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type.
//!
//! None of these are fatal to the discovery loop: each is logged at the frame
//! or cycle boundary where it occurs and discovery carries on.

use std::fmt;

use crate::config::ConfigError;
use crate::inventory::InventoryError;
use crate::protocol::{CodecError, Opcode};

/// Frame decoded fine but its opcode/hop-count combination has no handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    UnexpectedShape { opcode: Opcode, hops: usize },
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationError::UnexpectedShape { opcode, hops } => {
                write!(f, "no handler for {} with {} hops", opcode, hops)
            }
        }
    }
}

impl std::error::Error for ClassificationError {}

#[derive(Debug, Clone)]
pub enum Error {
    Codec(CodecError),
    Classification(ClassificationError),
    Inventory(InventoryError),
    Config(ConfigError),
    /// Packet I/O refused an outbound frame.
    Emit(String),
    /// Harvest wait cut short by shutdown.
    SchedulingInterrupt,
    /// Cycle thread could not be started.
    Spawn(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "codec error: {}", e),
            Error::Classification(e) => write!(f, "classification error: {}", e),
            Error::Inventory(e) => write!(f, "inventory error: {}", e),
            Error::Config(e) => write!(f, "config error: {}", e),
            Error::Emit(reason) => write!(f, "emit failed: {}", reason),
            Error::SchedulingInterrupt => write!(f, "harvest interrupted"),
            Error::Spawn(reason) => write!(f, "cannot start cycle thread: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            Error::Classification(e) => Some(e),
            Error::Inventory(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Emit(_) | Error::SchedulingInterrupt | Error::Spawn(_) => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<ClassificationError> for Error {
    fn from(e: ClassificationError) -> Self {
        Error::Classification(e)
    }
}

impl From<InventoryError> for Error {
    fn from(e: InventoryError) -> Self {
        Error::Inventory(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_conversions_keep_source() {
        let err: Error = CodecError::UnsupportedOpcode(7).into();
        assert_eq!(err.to_string(), "codec error: unsupported opcode 7");
        assert!(err.source().is_some());

        let err: Error = ClassificationError::UnexpectedShape {
            opcode: Opcode::Resent,
            hops: 2,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "classification error: no handler for RESENT with 2 hops"
        );
        assert!(Error::SchedulingInterrupt.source().is_none());
    }
}
