// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented search over the per-host log files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, TimeDelta};
use regex::bytes::Regex;
use tracing::debug;

use syslogd::constants::COMPRESSED_SUFFIX;
use syslogd::layout::{basename_for, host_dirs, log_files};

use crate::errors::SearchError;

/// Which files of a host a grep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrepRange {
    /// The plain files of the last 24 hours and today
    #[default]
    TodayYesterday,
    /// Every plain file and archive of the host
    All,
}

impl FromStr for GrepRange {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "todayyesterday" => Ok(GrepRange::TodayYesterday),
            "all" => Ok(GrepRange::All),
            other => Err(SearchError::InvalidRange(other.to_string())),
        }
    }
}

/// A validated grep request.
#[derive(Debug, Clone)]
pub struct GrepRequest {
    pub host: String,
    pub pattern: Regex,
    pub range: GrepRange,
}

impl GrepRequest {
    /// Validates the request parameters in the order the service reports them: host, pattern,
    /// range.
    pub fn new(host: &str, q: Option<&str>, range: Option<&str>) -> Result<Self, SearchError> {
        if host.is_empty() {
            return Err(SearchError::EmptyHost);
        }
        let q = q.unwrap_or_default();
        if q.is_empty() {
            return Err(SearchError::EmptyPattern);
        }
        let pattern = Regex::new(q).map_err(|e| SearchError::InvalidPattern(q.to_string(), e))?;
        let range = range.unwrap_or_default().parse()?;
        Ok(GrepRequest {
            host: host.to_string(),
            pattern,
            range,
        })
    }

    /// Resolves the files to scan, oldest first. Fails with [`SearchError::HostNotFound`] unless
    /// `host` is one of the directories below `root`.
    pub fn files(&self, root: &Path, now: &DateTime<Local>) -> Result<Vec<PathBuf>, SearchError> {
        if !list_hosts(root)?.contains(&self.host) {
            return Err(SearchError::HostNotFound(self.host.clone()));
        }
        let host_dir = root.join(&self.host);
        match self.range {
            GrepRange::TodayYesterday => {
                let yesterday = now.clone() - TimeDelta::hours(24);
                Ok(vec![
                    host_dir.join(basename_for(&yesterday)),
                    host_dir.join(basename_for(now)),
                ])
            }
            GrepRange::All => Ok(log_files(&host_dir, None)?),
        }
    }
}

/// Host names with a directory below `root`, sorted. A missing root has no hosts.
pub fn list_hosts(root: &Path) -> io::Result<Vec<String>> {
    let dirs = match host_dirs(root) {
        Ok(dirs) => dirs,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(dirs
        .iter()
        .filter_map(|dir| dir.file_name()?.to_str().map(str::to_string))
        .collect())
}

/// Receives matching lines. Returning `false` from [`MatchSink::matched`], or reporting
/// [`MatchSink::cancelled`], stops the scan.
pub trait MatchSink {
    /// `line` includes its trailing newline.
    fn matched(&mut self, line: &[u8]) -> bool;

    fn cancelled(&self) -> bool {
        false
    }
}

impl MatchSink for Vec<u8> {
    fn matched(&mut self, line: &[u8]) -> bool {
        self.extend_from_slice(line);
        true
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Aborted,
}

// how many lines are scanned between two cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Scans `files` in order and hands every line matching `pattern` to `sink`. Files that do not
/// exist are skipped; archives are decompressed while reading.
pub fn grep_files<S: MatchSink>(
    files: &[PathBuf],
    pattern: &Regex,
    sink: &mut S,
) -> io::Result<ScanOutcome> {
    for path in files {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("skipping missing log file {}", path.display());
                continue;
            }
            Err(e) => return Err(e),
        };
        let compressed = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(COMPRESSED_SUFFIX));
        let reader: Box<dyn Read> = if compressed {
            Box::new(zstd::stream::read::Decoder::new(file)?)
        } else {
            Box::new(file)
        };
        if grep_reader(BufReader::new(reader), pattern, sink)? == ScanOutcome::Aborted {
            return Ok(ScanOutcome::Aborted);
        }
    }
    Ok(ScanOutcome::Completed)
}

fn grep_reader<R: BufRead, S: MatchSink>(
    mut reader: R,
    pattern: &Regex,
    sink: &mut S,
) -> io::Result<ScanOutcome> {
    let mut line = Vec::new();
    let mut scanned = 0usize;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(ScanOutcome::Completed);
        }
        scanned += 1;
        if scanned % CANCEL_CHECK_INTERVAL == 0 && sink.cancelled() {
            return Ok(ScanOutcome::Aborted);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if !pattern.is_match(&line) {
            continue;
        }
        line.push(b'\n');
        if !sink.matched(&line) {
            return Ok(ScanOutcome::Aborted);
        }
    }
}
