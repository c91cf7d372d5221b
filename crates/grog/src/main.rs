// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::io::{self, Write};

use anyhow::{bail, Context};
use clap::Parser;
use reqwest::{StatusCode, Url};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RECORD_PREFIX: &str = "rfc3339=";

/// Greps the syslog of a host through a syslog-web service
#[derive(Parser, Debug)]
#[command(name = "grog")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Hostname to grep the log for
    #[arg(long, default_value = "dr")]
    hostname: String,

    /// Base URL of the syslog-web service to query
    #[arg(long, default_value = "http://router7:8514")]
    web_base: String,

    /// Syslog range to grep
    #[arg(long, default_value = "todayyesterday", value_parser = ["todayyesterday", "all"])]
    range: String,

    /// Regular expression to grep for
    pattern: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    tokio::select! {
        res = grog(&cli) => res,
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            bail!("interrupted");
        }
    }
}

async fn grog(cli: &Cli) -> anyhow::Result<()> {
    let url = grep_url(&cli.web_base, &cli.hostname, &cli.pattern, &cli.range)?;
    info!("Grepping syslog via HTTP: {}", url);

    let mut response = reqwest::get(url).await?;
    if response.status() != StatusCode::OK {
        bail!(
            "unexpected HTTP response code: got {}, want {}",
            response.status(),
            StatusCode::OK
        );
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut pending: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        pending.extend_from_slice(&chunk);
        let Some(last_newline) = pending.iter().rposition(|b| *b == b'\n') else {
            continue;
        };
        for line in pending[..last_newline].split(|b| *b == b'\n') {
            write_line(&mut out, line)?;
        }
        pending.drain(..=last_newline);
        out.flush()?;
    }
    if !pending.is_empty() {
        write_line(&mut out, &pending)?;
    }
    out.flush()?;
    Ok(())
}

fn grep_url(base: &str, hostname: &str, pattern: &str, range: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid web base URL {base:?}"))?;
    url.set_path(&format!("/grep/{hostname}"));
    url.query_pairs_mut()
        .clear()
        .append_pair("q", pattern)
        .append_pair("range", range);
    Ok(url)
}

fn write_line<W: Write>(out: &mut W, line: &[u8]) -> io::Result<()> {
    out.write_all(strip_record_prefix(line))?;
    out.write_all(b"\n")
}

/// Drops the leading `rfc3339=<timestamp> ` field of a stored record.
fn strip_record_prefix(line: &[u8]) -> &[u8] {
    if !line.starts_with(RECORD_PREFIX.as_bytes()) {
        return line;
    }
    match line.iter().position(|b| *b == b' ') {
        Some(idx) => &line[idx + 1..],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_record_prefix() {
        assert_eq!(
            strip_record_prefix(b"rfc3339=2022-08-18T10:00:00+02:00 kernel: eth0 up"),
            b"kernel: eth0 up"
        );
        assert_eq!(strip_record_prefix(b"kernel: eth0 up"), b"kernel: eth0 up");
        assert_eq!(strip_record_prefix(b"rfc3339=broken"), b"rfc3339=broken");
    }

    #[test]
    fn test_grep_url() {
        let url = grep_url("http://router7:8514", "dr", "eth0 up|down", "all").unwrap();
        assert_eq!(
            url.as_str(),
            "http://router7:8514/grep/dr?q=eth0+up%7Cdown&range=all"
        );
    }

    #[test]
    fn test_grep_url_replaces_base_path_and_query() {
        let url = grep_url("http://localhost:8514/ignored?x=1", "router7", "x", "todayyesterday")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8514/grep/router7?q=x&range=todayyesterday"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(grep_url("router7:8514 nope", "dr", "x", "all").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["grog", "kernel"]).unwrap();
        assert_eq!(cli.hostname, "dr");
        assert_eq!(cli.web_base, "http://router7:8514");
        assert_eq!(cli.range, "todayyesterday");
        assert_eq!(cli.pattern, "kernel");
    }

    #[test]
    fn test_cli_rejects_unknown_range() {
        assert!(Cli::try_parse_from(["grog", "--range", "week", "kernel"]).is_err());
        assert!(Cli::try_parse_from(["grog"]).is_err());
    }

    #[test]
    fn test_write_line() {
        let mut out = Vec::new();
        write_line(&mut out, b"rfc3339=2022-08-18T10:00:00Z sshd: login").unwrap();
        assert_eq!(out, b"sshd: login\n");
    }
}
