// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;

use crate::constants::DEFAULT_QUEUE_CAPACITY;
use crate::errors::ConfigError;

pub const OUTDIR_ENV: &str = "SYSLOGD_OUTDIR";
pub const LISTEN_ENV: &str = "SYSLOGD_LISTEN";
pub const QUEUE_CAPACITY_ENV: &str = "SYSLOGD_QUEUE_CAPACITY";
pub const LOG_LEVEL_ENV: &str = "SYSLOGD_LOG_LEVEL";

const DEFAULT_OUTDIR: &str = "/perm/syslogd";
const DEFAULT_LISTEN: &str = "127.0.0.1:5514";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the log tree, `<outdir>/<host>/<YYYY-MM-DD>.log`
    pub outdir: PathBuf,
    /// `host:port` to listen on. The host may be a name; it is resolved when binding.
    pub listen_addr: String,
    /// Capacity of the queue between the UDP listener and the writer
    pub queue_capacity: usize,
    pub log_level: String,
}

impl Config {
    pub fn new() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which returns the value of a setting if present.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let outdir = lookup(OUTDIR_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTDIR.to_string());

        let listen = lookup(LISTEN_ENV).unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen_addr = normalize_listen_addr(&listen).map_err(|reason| {
            ConfigError::InvalidValue {
                key: LISTEN_ENV,
                value: listen.clone(),
                reason,
            }
        })?;

        let queue_capacity = match lookup(QUEUE_CAPACITY_ENV) {
            None => DEFAULT_QUEUE_CAPACITY,
            Some(value) => match value.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        key: QUEUE_CAPACITY_ENV,
                        value,
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(capacity) => capacity,
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        key: QUEUE_CAPACITY_ENV,
                        value,
                        reason: e.to_string(),
                    })
                }
            },
        };

        let log_level = lookup(LOG_LEVEL_ENV)
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Config {
            outdir: PathBuf::from(outdir),
            listen_addr,
            queue_capacity,
            log_level,
        })
    }
}

// Accepts `[host]:port`. An empty host listens on all IPv4 interfaces; names are resolved at
// bind time.
fn normalize_listen_addr(addr: &str) -> Result<String, String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| "expected [host]:port".to_string())?;
    port.parse::<u16>().map_err(|e| format!("invalid port: {e}"))?;
    if host.is_empty() {
        return Ok(format!("0.0.0.0:{port}"));
    }
    Ok(addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&'static str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.outdir, PathBuf::from("/perm/syslogd"));
        assert_eq!(config.listen_addr, "127.0.0.1:5514");
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (OUTDIR_ENV, "/tmp/logs"),
            (LISTEN_ENV, "0.0.0.0:514"),
            (QUEUE_CAPACITY_ENV, "16"),
            (LOG_LEVEL_ENV, "DEBUG"),
        ])
        .unwrap();
        assert_eq!(config.outdir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.listen_addr, "0.0.0.0:514");
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_empty_outdir_falls_back_to_default() {
        let config = config_from(&[(OUTDIR_ENV, "")]).unwrap();
        assert_eq!(config.outdir, PathBuf::from("/perm/syslogd"));
    }

    #[test]
    fn test_invalid_listen_addr() {
        let err = config_from(&[(LISTEN_ENV, "router7")]).unwrap_err();
        assert!(err.to_string().starts_with("invalid value for SYSLOGD_LISTEN"));
        assert!(config_from(&[(LISTEN_ENV, "router7:syslog")]).is_err());
    }

    #[test]
    fn test_listen_addr_accepts_host_names() {
        let config = config_from(&[(LISTEN_ENV, "localhost:5514")]).unwrap();
        assert_eq!(config.listen_addr, "localhost:5514");
        let config = config_from(&[(LISTEN_ENV, "[::1]:5514")]).unwrap();
        assert_eq!(config.listen_addr, "[::1]:5514");
        let config = config_from(&[(LISTEN_ENV, ":514")]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:514");
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let err = config_from(&[(QUEUE_CAPACITY_ENV, "0")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for SYSLOGD_QUEUE_CAPACITY: \"0\": must be greater than zero"
        );
    }

    #[test]
    fn test_non_numeric_queue_capacity_is_rejected() {
        assert!(config_from(&[(QUEUE_CAPACITY_ENV, "lots")]).is_err());
    }
}
