// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Open file handles of the write path, keyed by host and day.
//!
//! The number of distinct (host, day) pairs grows without bound over the lifetime of the
//! collector, so handles are closed once idle rather than kept until exit. The cache is owned by
//! the ingestion pipeline alone; nothing else ever sees it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::fault::FaultReporter;
use crate::layout::FileKey;
use crate::report_fault;

/// An exclusively owned descriptor plus the time of its last write.
#[derive(Debug)]
pub struct OpenFile {
    file: File,
    last_use: Instant,
}

impl OpenFile {
    /// Appends `record` at the current offset and marks the handle as used, whether or not the
    /// write succeeded.
    pub fn append(&mut self, record: &[u8]) -> io::Result<()> {
        let result = self.file.write_all(record);
        self.last_use = Instant::now();
        result
    }

    pub fn last_use(&self) -> Instant {
        self.last_use
    }
}

#[derive(Debug)]
pub struct FileHandleCache {
    root: PathBuf,
    files: HashMap<FileKey, OpenFile>,
    fault: Arc<FaultReporter>,
}

impl FileHandleCache {
    pub fn new(root: impl Into<PathBuf>, fault: Arc<FaultReporter>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
            fault,
        }
    }

    /// Returns the cached handle for `key`, opening (and creating) the file if needed. Open
    /// failures are returned as is; the next message for the same key simply tries again.
    pub fn get_or_open(&mut self, key: FileKey) -> io::Result<&mut OpenFile> {
        use std::collections::hash_map::Entry;

        match self.files.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = open_file(&self.root, entry.key())?;
                debug!("Opened log file {}", entry.key());
                Ok(entry.insert(OpenFile {
                    file,
                    last_use: Instant::now(),
                }))
            }
        }
    }

    /// Closes every handle not written to within `threshold`. Returns how many were closed.
    pub fn evict_idle(&mut self, threshold: Duration) -> usize {
        self.evict_idle_at(Instant::now(), threshold)
    }

    pub fn evict_idle_at(&mut self, now: Instant, threshold: Duration) -> usize {
        let before = self.files.len();
        let fault = &self.fault;
        self.files.retain(|key, open| {
            if now.saturating_duration_since(open.last_use) < threshold {
                return true;
            }
            info!("closing unused log file for key={}", key);
            // The entry is forgotten even if flushing fails: a leaked descriptor is preferable
            // to a cache that only ever grows.
            if let Err(e) = open.file.sync_all() {
                report_fault!(fault, "error closing log file {}: {}", key, e);
            }
            false
        });
        before - self.files.len()
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.files.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn open_file(root: &Path, key: &FileKey) -> io::Result<File> {
    fs::create_dir_all(key.host_dir(root))?;
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(key.path(root))?;
    // Seek to the end once instead of opening in append mode, which would make the kernel seek
    // on every write. We are the only writer, so the offset stays correct.
    file.seek(SeekFrom::End(0))?;
    Ok(file)
}
