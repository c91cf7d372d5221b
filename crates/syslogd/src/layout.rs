// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! On-disk layout shared by the collector and the retrieval service:
//!
//! ```text
//! <root>/<hostname>/<YYYY-MM-DD>.log        plain, append-only
//! <root>/<hostname>/<YYYY-MM-DD>.log.zst    zstd archive, immutable
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use crate::constants::{BASENAME_FORMAT, COMPRESSED_SUFFIX, PLAIN_SUFFIX};

/// Formats the plain daily file name for the calendar day of `t`, in `t`'s time zone.
pub fn basename_for<Tz>(t: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    t.format(BASENAME_FORMAT).to_string()
}

/// Identifies one daily log file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub hostname: String,
    pub basename: String,
}

impl FileKey {
    /// Key of the file a message from `hostname` stamped `timestamp` belongs to. The day is the
    /// message's own local calendar day, not the time it was received.
    pub fn for_message<Tz: TimeZone>(hostname: &str, timestamp: &DateTime<Tz>) -> Self {
        Self {
            hostname: hostname.to_string(),
            basename: basename_for(&timestamp.with_timezone(&Local)),
        }
    }

    pub fn host_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.hostname)
    }

    pub fn path(&self, root: &Path) -> PathBuf {
        self.host_dir(root).join(&self.basename)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hostname, self.basename)
    }
}

/// The two states a daily log file can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFileKind {
    Plain,
    Compressed,
}

impl LogFileKind {
    /// Classifies a file name; anything that is neither `*.log` nor `*.log.zst` (temporary files
    /// included) yields `None`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(COMPRESSED_SUFFIX) {
            Some(Self::Compressed)
        } else if name.ends_with(PLAIN_SUFFIX) {
            Some(Self::Plain)
        } else {
            None
        }
    }
}

/// Whether `hostname` can be used as a single directory component below the storage root.
pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty()
        && !hostname.starts_with('.')
        && !hostname.contains(['/', '\\', '\0'])
}

/// Lists host directories below `root`, sorted by name. Plain files at the top level are ignored.
pub fn host_dirs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Lists the log files of one host directory, optionally restricted to one kind, sorted by name
/// (and therefore by date).
pub fn log_files(host_dir: &Path, kind: Option<LogFileKind>) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(host_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match LogFileKind::from_file_name(name) {
            Some(found) if kind.map_or(true, |wanted| wanted == found) => {
                files.push(entry.path());
            }
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local, TimeZone};

    #[test]
    fn test_basename_is_fixed_width_date() {
        let t = Local.with_ymd_and_hms(2022, 8, 3, 16, 20, 0).unwrap();
        assert_eq!(basename_for(&t), "2022-08-03.log");
    }

    #[test]
    fn test_file_key_uses_local_day_of_message() {
        let t = Local.with_ymd_and_hms(2022, 8, 13, 23, 59, 0).unwrap();
        let key = FileKey::for_message("dr", &t.fixed_offset());
        assert_eq!(key.hostname, "dr");
        assert_eq!(key.basename, "2022-08-13.log");
        assert_eq!(
            key.path(Path::new("/perm/syslogd")),
            PathBuf::from("/perm/syslogd/dr/2022-08-13.log")
        );
        assert_eq!(key.to_string(), "dr/2022-08-13.log");
    }

    #[test]
    fn test_file_key_converts_sender_offset_to_local() {
        let sender = FixedOffset::east_opt(14 * 3600).unwrap();
        let t = sender.with_ymd_and_hms(2022, 8, 13, 1, 0, 0).unwrap();
        let key = FileKey::for_message("dr", &t);
        assert_eq!(key.basename, basename_for(&t.with_timezone(&Local)));
    }

    #[test]
    fn test_log_file_kind() {
        assert_eq!(
            LogFileKind::from_file_name("2022-08-10.log"),
            Some(LogFileKind::Plain)
        );
        assert_eq!(
            LogFileKind::from_file_name("2022-08-10.log.zst"),
            Some(LogFileKind::Compressed)
        );
        assert_eq!(LogFileKind::from_file_name(".2022-08-10.log.zstAbC123"), None);
        assert_eq!(LogFileKind::from_file_name("notes.txt"), None);
    }

    #[test]
    fn test_hostname_validation() {
        assert!(is_valid_hostname("router7"));
        assert!(is_valid_hostname("web-1.example.com"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("."));
        assert!(!is_valid_hostname(".."));
        assert!(!is_valid_hostname(".hidden"));
        assert!(!is_valid_hostname("a/b"));
        assert!(!is_valid_hostname("a\\b"));
    }

    #[test]
    fn test_listing_sorts_and_filters() {
        let root = tempfile::tempdir().unwrap();
        let host = root.path().join("dr");
        fs::create_dir_all(&host).unwrap();
        fs::create_dir_all(root.path().join("alpha")).unwrap();
        fs::write(root.path().join("stray.log"), b"").unwrap();
        for name in ["2022-08-12.log", "2022-08-10.log.zst", "2022-08-11.log", "x.tmp"] {
            fs::write(host.join(name), b"").unwrap();
        }

        assert_eq!(
            host_dirs(root.path()).unwrap(),
            vec![root.path().join("alpha"), host.clone()]
        );
        assert_eq!(
            log_files(&host, None).unwrap(),
            vec![
                host.join("2022-08-10.log.zst"),
                host.join("2022-08-11.log"),
                host.join("2022-08-12.log"),
            ]
        );
        assert_eq!(
            log_files(&host, Some(LogFileKind::Compressed)).unwrap(),
            vec![host.join("2022-08-10.log.zst")]
        );
    }
}
