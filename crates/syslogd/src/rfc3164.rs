// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoder for BSD syslog (RFC3164) datagrams:
//!
//! ```text
//! <PRI>TIMESTAMP HOSTNAME TAG[PID]: CONTENT
//! ```
//!
//! TIMESTAMP is either the classic `Mmm dd hh:mm:ss` stamp, which carries neither year nor zone
//! and is read as local time, or an RFC3339 timestamp as sent by some newer clients.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone};

use crate::errors::ParseError;
use crate::message::LogMessage;

const MAX_PRIORITY: u8 = 191;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Decodes one datagram. `now` resolves the year of BSD stamps.
///
/// Structural problems (no priority, unparsable timestamp) are errors. Missing hostname, tag or
/// content produce empty fields, which the ingestion pipeline rejects. Bytes that are not valid
/// UTF-8 are replaced with U+FFFD rather than rejecting the message.
pub fn parse(packet: &[u8], now: &DateTime<Local>) -> Result<LogMessage, ParseError> {
    let packet = String::from_utf8_lossy(packet);
    let packet = packet.trim_end_matches(['\n', '\r', '\0']);
    if packet.is_empty() {
        return Err(ParseError::Empty);
    }

    let rest = strip_priority(packet)?;
    let (timestamp, rest) = parse_timestamp(rest, now)?;

    let rest = rest.trim_start();
    let (hostname, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let (tag, content) = split_tag(rest);

    Ok(LogMessage {
        hostname: hostname.to_string(),
        tag: tag.to_string(),
        content: content.to_string(),
        timestamp: Some(timestamp),
    })
}

fn strip_priority(packet: &str) -> Result<&str, ParseError> {
    let rest = packet.strip_prefix('<').ok_or(ParseError::MissingPriority)?;
    let (digits, rest) = rest.split_once('>').ok_or(ParseError::MissingPriority)?;
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPriority(digits.to_string()));
    }
    match digits.parse::<u8>() {
        Ok(priority) if priority <= MAX_PRIORITY => Ok(rest),
        _ => Err(ParseError::InvalidPriority(digits.to_string())),
    }
}

fn parse_timestamp<'a>(
    input: &'a str,
    now: &DateTime<Local>,
) -> Result<(DateTime<FixedOffset>, &'a str), ParseError> {
    if input.starts_with(|c: char| c.is_ascii_digit()) {
        let (stamp, rest) = input.split_once(' ').unwrap_or((input, ""));
        let timestamp = DateTime::parse_from_rfc3339(stamp)
            .map_err(|_| ParseError::InvalidTimestamp(stamp.to_string()))?;
        return Ok((timestamp, rest));
    }
    parse_bsd_timestamp(input, now)
}

// "Aug 13 14:41:30" or "Aug  3 14:41:30"
fn parse_bsd_timestamp<'a>(
    input: &'a str,
    now: &DateTime<Local>,
) -> Result<(DateTime<FixedOffset>, &'a str), ParseError> {
    let invalid = || ParseError::InvalidTimestamp(input.chars().take(15).collect());

    let (month, rest) = input.split_once(' ').ok_or_else(invalid)?;
    let month = MONTHS
        .iter()
        .position(|m| *m == month)
        .ok_or_else(invalid)?;
    let rest = rest.trim_start();
    let (day, rest) = rest.split_once(' ').ok_or_else(invalid)?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let (time, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").map_err(|_| invalid())?;

    // No year on the wire: assume the current one, unless that places the message more than a
    // day ahead of us (a December message received in January).
    let mut year = now.year();
    let mut resolved = resolve_local(year, month, day, time).ok_or_else(invalid)?;
    if resolved - now.fixed_offset() > TimeDelta::days(1) {
        year -= 1;
        resolved = resolve_local(year, month, day, time).ok_or_else(invalid)?;
    }
    Ok((resolved, rest))
}

fn resolve_local(
    year: i32,
    month0: usize,
    day: u32,
    time: NaiveTime,
) -> Option<DateTime<FixedOffset>> {
    let month = u32::try_from(month0).ok()? + 1;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.fixed_offset())
}

fn split_tag(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| c == '[' || c == ':' || c.is_whitespace())
        .unwrap_or(input.len());
    let tag = &input[..end];
    let mut rest = &input[end..];

    if rest.starts_with('[') {
        rest = match rest.find(']') {
            Some(close) => &rest[close + 1..],
            None => "",
        };
    }
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let content = rest.strip_prefix(' ').unwrap_or(rest);
    (tag, content)
}
