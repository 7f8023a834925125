// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Directed link keys and the descriptions handed to the link inventory.

use std::fmt;

use serde::Serialize;

use super::device::ConnectPoint;

/// Directed pair of connect points. `a -> b` and `b -> a` are distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkKey {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl LinkKey {
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self { src, dst }
    }

    pub fn reverse(&self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Link registration: key plus annotations.
///
/// Two descriptions are the same registration only if every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkDescription {
    pub key: LinkKey,
    /// Expected to persist across inventory refreshes.
    pub durable: bool,
    pub bidirectional: bool,
}

impl LinkDescription {
    pub fn durable(key: LinkKey) -> Self {
        Self {
            key,
            durable: true,
            bidirectional: true,
        }
    }

    pub fn transient(key: LinkKey, bidirectional: bool) -> Self {
        Self {
            key,
            durable: false,
            bidirectional,
        }
    }
}

impl fmt::Display for LinkDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.key,
            if self.durable { "durable" } else { "transient" },
            if self.bidirectional {
                "bidirectional"
            } else {
                "unidirectional"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::DeviceUri;

    #[test]
    fn test_reverse_key_is_distinct() {
        let key = LinkKey::new(
            ConnectPoint::new(DeviceUri::switch(1), 1),
            ConnectPoint::new(DeviceUri::switch(2), 2),
        );
        assert_ne!(key, key.reverse());
        assert_eq!(key, key.reverse().reverse());
    }

    #[test]
    fn test_annotations_distinguish_descriptions() {
        let key = LinkKey::new(
            ConnectPoint::new(DeviceUri::switch(1), 1),
            ConnectPoint::new(DeviceUri::switch(2), 2),
        );
        assert_ne!(
            LinkDescription::transient(key, true),
            LinkDescription::transient(key, false)
        );
        assert_ne!(LinkDescription::durable(key), LinkDescription::transient(key, true));
    }
}
