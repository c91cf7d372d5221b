// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// strftime pattern of a plain daily log file name. Fixed width, so lexicographic order of the
/// formatted names equals chronological order.
pub const BASENAME_FORMAT: &str = "%Y-%m-%d.log";

pub const PLAIN_SUFFIX: &str = ".log";

pub const COMPRESSED_SUFFIX: &str = ".log.zst";

/// Messages whose own timestamp lies further in the past than this are dropped. The same span
/// keeps the previous day's file "in use" for the retention classifier.
pub const ACCEPTANCE_WINDOW_HOURS: i64 = 24;

/// Compressed archives older than this many days are deleted.
pub const RETENTION_DAYS: i64 = 7;

/// Cached file handles without a write for this long are closed on the next sweep.
pub const IDLE_HANDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Number of messages between two idle-handle sweeps.
pub const EVICTION_STRIDE: usize = 100;

pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const FAULT_RESET_INTERVAL: Duration = Duration::from_secs(1);

/// zstd level used for daily archives.
pub const COMPRESSION_LEVEL: i32 = 3;

// Largest UDP payload. RFC3164 caps messages at 1024 bytes, but plenty of senders exceed it.
pub const BUFFER_SIZE: usize = 65535;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
