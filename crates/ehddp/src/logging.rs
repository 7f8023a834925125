// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Function-entry tracing.
//!
//! Library code logs through the `log` facade with a bracketed component tag
//! (`[ehddp-codec]`, `[ehddp-classify]`, `[ehddp-infer]`, `[ehddp-cycle]`).
//! With the `trace` feature, `trace_fn!` additionally records function entry
//! at trace level; without it the macro expands to nothing.

/// Function-entry trace marker (when `trace` feature enabled).
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        log::trace!("[ehddp-trace] -> {}", $fn_name);
    };
}

/// No-op trace macro (when `trace` feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
