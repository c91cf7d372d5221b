// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use hyper::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Reasons a grep request is refused before any output is produced.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("not found")]
    EmptyHost,
    #[error("host {0:?} not found")]
    HostNotFound(String),
    #[error("empty pattern (q= parameter)")]
    EmptyPattern,
    #[error("invalid regexp: {0:?}: {1}")]
    InvalidPattern(String, regex::Error),
    #[error("invalid range= parameter {0:?} (expected one of todayyesterday or all)")]
    InvalidRange(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::EmptyHost | SearchError::HostNotFound(_) => StatusCode::NOT_FOUND,
            SearchError::EmptyPattern
            | SearchError::InvalidPattern(..)
            | SearchError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            SearchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SearchError::EmptyHost.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SearchError::HostNotFound("dr".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(SearchError::EmptyPattern.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SearchError::InvalidRange("week".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            SearchError::from(io).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SearchError::HostNotFound("dr".to_string()).to_string(),
            "host \"dr\" not found"
        );
        assert_eq!(
            SearchError::InvalidRange("week".to_string()).to_string(),
            "invalid range= parameter \"week\" (expected one of todayyesterday or all)"
        );
    }
}
