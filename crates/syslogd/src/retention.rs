// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read-only classification of stored files for the retention worker.
//!
//! Both queries rely on daily file names sorting chronologically as plain strings, so every
//! boundary is just a formatted file name.
//!
//! * Cold files (safe to compress): plain files dated strictly before `now - 24h`. Messages up to
//!   24 hours old are still accepted, so yesterday's and today's files may receive writes.
//! * Expired files (safe to delete): archives dated strictly before `now - 7 days`.
//!
//! The two sets are disjoint (plain vs. compressed) and never contain a file the write path can
//! still touch, which is why no locking against the ingestion pipeline is needed.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, TimeZone};

use crate::constants::{ACCEPTANCE_WINDOW_HOURS, RETENTION_DAYS};
use crate::errors::RetentionError;
use crate::layout::{basename_for, host_dirs, log_files, LogFileKind};

/// Plain files that no acceptable message can target any more, per host in host order.
pub fn cold_log_file_names<Tz>(
    root: &Path,
    now: &DateTime<Tz>,
) -> Result<Vec<PathBuf>, RetentionError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let earliest_in_use =
        basename_for(&(now.clone() - TimeDelta::hours(ACCEPTANCE_WINDOW_HOURS)));
    let currently_in_use = basename_for(now);

    let mut cold_log_file_names = Vec::new();
    for host_dir in list_host_dirs(root)? {
        let Some(mut cold) = list_host_files(&host_dir, LogFileKind::Plain)? else {
            continue;
        };
        // Drop everything from the first in-use day onwards. Truncating at the insertion point
        // rather than only on an exact match also excludes files dated in the future.
        for boundary in [&earliest_in_use, &currently_in_use] {
            let idx = cold.partition_point(|path| file_name(path) < boundary.as_str());
            cold.truncate(idx);
        }
        cold_log_file_names.extend(cold);
    }
    Ok(cold_log_file_names)
}

/// Archives older than the retention window, per host in host order. Plain files are never
/// returned.
pub fn to_delete_log_file_names<Tz>(
    root: &Path,
    now: &DateTime<Tz>,
) -> Result<Vec<PathBuf>, RetentionError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let oldest_to_keep = basename_for(&(now.clone() - TimeDelta::days(RETENTION_DAYS)));

    let mut to_delete = Vec::new();
    for host_dir in list_host_dirs(root)? {
        let Some(archives) = list_host_files(&host_dir, LogFileKind::Compressed)? else {
            continue;
        };
        to_delete.extend(
            archives
                .into_iter()
                .filter(|path| file_name(path) < oldest_to_keep.as_str()),
        );
    }
    Ok(to_delete)
}

fn list_host_dirs(root: &Path) -> Result<Vec<PathBuf>, RetentionError> {
    host_dirs(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RetentionError::RootNotFound(root.to_path_buf()),
        _ => RetentionError::Io(e),
    })
}

// A host directory removed while we iterate has nothing to classify.
fn list_host_files(
    host_dir: &Path,
    kind: LogFileKind,
) -> Result<Option<Vec<PathBuf>>, RetentionError> {
    match log_files(host_dir, Some(kind)) {
        Ok(files) => Ok(Some(files)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Listed paths always come from read_dir with UTF-8 names.
fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}
