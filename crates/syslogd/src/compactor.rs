// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic compaction and pruning of stored logs.
//!
//! Every cycle compresses the cold plain files reported by [`retention`](crate::retention) and
//! deletes expired archives. A failure on one file is logged and the batch moves on.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::constants::{COMPRESSION_LEVEL, MAINTENANCE_INTERVAL};
use crate::errors::RetentionError;
use crate::retention::{cold_log_file_names, to_delete_log_file_names};

/// Outcome of one maintenance cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub compressed: usize,
    pub compress_failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
}

/// Compresses `path` into `<path>.zst` and removes `path`.
///
/// The archive is written to a temporary file in the same directory and renamed into place only
/// once complete, so a truncated archive is never visible under its final name. The plain file
/// is removed only after the rename succeeded.
pub fn compress_file(path: &Path) -> io::Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let mut dest = OsString::from(path.as_os_str());
    dest.push(".zst");
    let dest = PathBuf::from(dest);

    let src = File::open(path)?;
    let permissions = src.metadata()?.permissions();

    let mut prefix = OsString::from(".");
    prefix.push(name);
    prefix.push(".zst");
    let tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let mut encoder = zstd::stream::Encoder::new(tmp.as_file(), COMPRESSION_LEVEL)?;
    io::copy(&mut BufReader::new(src), &mut encoder)?;
    encoder.finish()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.as_file().sync_all()?;

    tmp.persist(&dest).map_err(|e| e.error)?;
    fs::remove_file(path)?;
    Ok(dest)
}

/// Compresses every cold plain file below `root`.
pub fn compress_old_logs(
    root: &Path,
    summary: &mut MaintenanceSummary,
) -> Result<(), RetentionError> {
    let cold = match cold_log_file_names(root, &Local::now()) {
        Ok(cold) => cold,
        Err(RetentionError::RootNotFound(_)) => return Ok(()), // no log files written yet
        Err(e) => return Err(e),
    };
    for path in cold {
        info!("compressing {} to {}.zst", path.display(), path.display());
        match compress_file(&path) {
            Ok(_) => summary.compressed += 1,
            Err(e) => {
                error!("compressing {}: {}", path.display(), e);
                summary.compress_failed += 1;
            }
        }
    }
    Ok(())
}

/// Deletes every archive below `root` that is past the retention window.
pub fn delete_old_logs(
    root: &Path,
    summary: &mut MaintenanceSummary,
) -> Result<(), RetentionError> {
    let to_delete = match to_delete_log_file_names(root, &Local::now()) {
        Ok(to_delete) => to_delete,
        Err(RetentionError::RootNotFound(_)) => return Ok(()), // no log files written yet
        Err(e) => return Err(e),
    };
    for path in to_delete {
        info!("deleting log file older than 7 days: {}", path.display());
        match fs::remove_file(&path) {
            Ok(()) => summary.deleted += 1,
            Err(e) => {
                error!("deleting {}: {}", path.display(), e);
                summary.delete_failed += 1;
            }
        }
    }
    Ok(())
}

/// Background task that runs [`RetentionWorker::run_once`] on a fixed period.
#[derive(Debug, Clone)]
pub struct RetentionWorker {
    root: PathBuf,
    period: Duration,
}

impl RetentionWorker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            period: MAINTENANCE_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// One blocking maintenance cycle: compress, then prune. A failing phase is logged and does
    /// not prevent the other.
    pub fn run_once(&self) -> MaintenanceSummary {
        let mut summary = MaintenanceSummary::default();
        if let Err(e) = compress_old_logs(&self.root, &mut summary) {
            error!("compressing old logs: {}", e);
        }
        if let Err(e) = delete_old_logs(&self.root, &mut summary) {
            error!("deleting old logs: {}", e);
        }
        summary
    }

    /// Runs a cycle immediately and then once per period until cancelled. Cycles run on the
    /// blocking pool and never overlap.
    pub async fn spin(self, cancel_token: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel_token.cancelled() => break,
            }
            let worker = self.clone();
            match tokio::task::spawn_blocking(move || worker.run_once()).await {
                Ok(summary) if summary != MaintenanceSummary::default() => {
                    info!("Log maintenance finished: {:?}", summary);
                }
                Ok(_) => debug!("Log maintenance finished, nothing to do"),
                Err(e) => error!("Log maintenance task failed: {}", e),
            }
        }
        debug!("Retention worker stopped");
    }
}
