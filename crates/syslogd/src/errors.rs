// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

/// Failures decoding an RFC3164 datagram.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty packet")]
    Empty,
    #[error("missing <PRI> header")]
    MissingPriority,
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Why the ingestion pipeline did not persist a message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("message is missing hostname, tag, content or timestamp")]
    Incomplete,
    #[error("hostname {0:?} is not a valid directory name")]
    InvalidHostname(String),
    #[error("dropping message with timestamp with too large clock drift: timestamp {0}")]
    ClockDrift(DateTime<FixedOffset>),
    #[error("error opening log file: {0}")]
    Open(#[source] std::io::Error),
    #[error("error writing log file: {0}")]
    Write(#[source] std::io::Error),
}

/// Failures listing the storage tree.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// The storage root does not exist yet, i.e. no message has been written.
    #[error("log directory {0} not found")]
    RootNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RetentionError::RootNotFound(PathBuf::from("/perm/syslogd"));
        assert_eq!(error.to_string(), "log directory /perm/syslogd not found");

        let error = ConfigError::InvalidValue {
            key: "SYSLOGD_LISTEN",
            value: "nope".to_string(),
            reason: "invalid socket address syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid value for SYSLOGD_LISTEN: \"nope\": invalid socket address syntax"
        );
    }

    #[test]
    fn test_io_error_converts_to_retention_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: RetentionError = io.into();
        assert!(matches!(error, RetentionError::Io(_)));
    }
}
