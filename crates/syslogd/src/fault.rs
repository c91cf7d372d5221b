// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rate limiting for diagnostics on hot paths.
//!
//! The collector may receive its own output (another instance can forward our logs to us), so an
//! unthrottled error log per bad message can turn into a feedback loop. Call sites that would log
//! a recoverable per-message failure go through [`report_fault!`] instead: at most one such line
//! is emitted per reset period, by whichever caller flips the gate first.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Process-wide gate for high-frequency error output.
///
/// Created once at startup, shared via `Arc`, and re-opened by exactly one task running
/// [`FaultReporter::run_reset_loop`].
#[derive(Debug, Default)]
pub struct FaultReporter {
    limited: AtomicBool,
    suppressed: AtomicU64,
}

impl FaultReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the caller won the current window and may emit its diagnostic.
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .limited
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
        if !acquired {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        acquired
    }

    /// Re-opens the gate for the next window.
    pub fn reset(&self) {
        self.limited.store(false, Ordering::Release);
    }

    /// Number of diagnostics swallowed since startup.
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Resets the gate every `period` until cancelled.
    pub async fn run_reset_loop(
        self: Arc<Self>,
        period: Duration,
        cancel_token: CancellationToken,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.reset(),
                _ = cancel_token.cancelled() => {
                    debug!("Fault reset task stopped");
                    return;
                }
            }
        }
    }
}

/// Logs an error through a [`FaultReporter`], dropping it if another diagnostic already went out
/// in the current window.
#[macro_export]
macro_rules! report_fault {
    ($reporter:expr, $($arg:tt)+) => {
        if $reporter.try_acquire() {
            ::tracing::error!($($arg)+);
        }
    };
}
