// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, FixedOffset, SecondsFormat};

/// A decoded log record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub hostname: String,
    pub tag: String,
    pub content: String,
    /// Event time supplied by the sender. `None` if the packet carried no usable timestamp.
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl LogMessage {
    /// Returns the timestamp if every field needed to store the message is present.
    pub fn complete_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        if self.hostname.is_empty() || self.tag.is_empty() || self.content.is_empty() {
            return None;
        }
        self.timestamp
    }
}

/// Formats one stored record: `rfc3339=<timestamp> <tag>: <content>\n`.
pub fn format_record(timestamp: &DateTime<FixedOffset>, tag: &str, content: &str) -> String {
    format!(
        "rfc3339={} {}: {}\n",
        timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        tag,
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message() -> LogMessage {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        LogMessage {
            hostname: "gokrazy".to_string(),
            tag: "iptables".to_string(),
            content: "Try `iptables -h' for more information.".to_string(),
            timestamp: Some(offset.with_ymd_and_hms(2022, 8, 13, 14, 41, 30).unwrap()),
        }
    }

    #[test]
    fn test_complete_message() {
        assert!(message().complete_timestamp().is_some());
    }

    #[test]
    fn test_incomplete_messages() {
        let mut m = message();
        m.hostname.clear();
        assert!(m.complete_timestamp().is_none());

        let mut m = message();
        m.tag.clear();
        assert!(m.complete_timestamp().is_none());

        let mut m = message();
        m.content.clear();
        assert!(m.complete_timestamp().is_none());

        let mut m = message();
        m.timestamp = None;
        assert!(m.complete_timestamp().is_none());
    }

    #[test]
    fn test_format_record() {
        let m = message();
        assert_eq!(
            format_record(&m.timestamp.unwrap(), &m.tag, &m.content),
            "rfc3339=2022-08-13T14:41:30+02:00 iptables: Try `iptables -h' for more information.\n"
        );
    }

    #[test]
    fn test_format_record_keeps_sub_second_precision() {
        let t = DateTime::parse_from_rfc3339("2022-08-13T14:41:30.250+02:00").unwrap();
        assert_eq!(
            format_record(&t, "sshd", "accepted"),
            "rfc3339=2022-08-13T14:41:30.250+02:00 sshd: accepted\n"
        );
    }
}
