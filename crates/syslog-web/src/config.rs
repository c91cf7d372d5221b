// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;

use crate::errors::ConfigError;

pub const DIR_ENV: &str = "SYSLOGWEB_DIR";
pub const LISTEN_ENV: &str = "SYSLOGWEB_LISTEN";
pub const LOG_LEVEL_ENV: &str = "SYSLOGWEB_LOG_LEVEL";

const DEFAULT_DIR: &str = "/perm/syslogd";
// 514 is syslog, 80 is web
const DEFAULT_LISTEN: &str = "127.0.0.1:8514";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory to serve logs from
    pub dir: PathBuf,
    /// `[host]:port` pairs to listen on; host names are resolved when binding
    pub listen_addrs: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn new() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let dir = lookup(DIR_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DIR.to_string());

        let listen = lookup(LISTEN_ENV).unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen_addrs: Vec<String> = listen
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();
        if listen_addrs.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: LISTEN_ENV,
                value: listen,
                reason: "no listen address given".to_string(),
            });
        }
        if let Some(addr) = listen_addrs.iter().find(|addr| !addr.contains(':')) {
            return Err(ConfigError::InvalidValue {
                key: LISTEN_ENV,
                value: listen.clone(),
                reason: format!("{addr:?} is missing a port"),
            });
        }

        let log_level = lookup(LOG_LEVEL_ENV)
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Config {
            dir: PathBuf::from(dir),
            listen_addrs,
            log_level,
        })
    }
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
        assert_eq!(config.dir, PathBuf::from("/perm/syslogd"));
        assert_eq!(config.listen_addrs, vec!["127.0.0.1:8514".to_string()]);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_multiple_listen_addrs() {
        let config = config_from(&[(LISTEN_ENV, "localhost:8514, 10.0.0.1:8514,[::1]:8514")]).unwrap();
        assert_eq!(
            config.listen_addrs,
            vec!["localhost:8514", "10.0.0.1:8514", "[::1]:8514"]
        );
    }

    #[test]
    fn test_empty_listen_is_rejected() {
        let err = config_from(&[(LISTEN_ENV, " , ")]).unwrap_err();
        assert!(err.to_string().contains("no listen address given"));
    }

    #[test]
    fn test_listen_addr_without_port_is_rejected() {
        assert!(config_from(&[(LISTEN_ENV, "router7")]).is_err());
    }
}
